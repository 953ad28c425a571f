// Materialized rows: families of columns holding timestamped cell versions.

/// One timestamped value within a column. Labels are carried, never interpreted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub value: Vec<u8>,
    pub timestamp: i64,
    pub labels: Vec<String>,
}

impl Cell {
    pub fn new(value: impl Into<Vec<u8>>, timestamp: i64) -> Self {
        Self {
            value: value.into(),
            timestamp,
            labels: Vec::new(),
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }
}

/// Cells for one qualifier, in the order the store delivered them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Column {
    pub qualifier: Vec<u8>,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(qualifier: impl Into<Vec<u8>>) -> Self {
        Self {
            qualifier: qualifier.into(),
            cells: Vec::new(),
        }
    }

    /// The first delivered cell; newest-first by store convention.
    pub fn latest(&self) -> Option<&Cell> {
        self.cells.first()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Family {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Family {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(&self, qualifier: &[u8]) -> Option<&Column> {
        self.columns
            .iter()
            .find(|column| column.qualifier.as_slice() == qualifier)
    }

    /// Column for `qualifier`, created at the end if missing.
    pub fn column_mut(&mut self, qualifier: &[u8]) -> &mut Column {
        let index = match self
            .columns
            .iter()
            .position(|column| column.qualifier.as_slice() == qualifier)
        {
            Some(index) => index,
            None => {
                self.columns.push(Column::new(qualifier));
                self.columns.len() - 1
            }
        };
        &mut self.columns[index]
    }
}

/// A complete row. Families and columns keep first-seen order so equality is stable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    key: Vec<u8>,
    pub families: Vec<Family>,
}

impl Row {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            families: Vec::new(),
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn family(&self, name: &str) -> Option<&Family> {
        self.families.iter().find(|family| family.name == name)
    }

    pub fn family_mut(&mut self, name: &str) -> &mut Family {
        let index = match self.families.iter().position(|family| family.name == name) {
            Some(index) => index,
            None => {
                self.families.push(Family::new(name));
                self.families.len() - 1
            }
        };
        &mut self.families[index]
    }

    pub fn cells(&self, family: &str, qualifier: &[u8]) -> &[Cell] {
        self.family(family)
            .and_then(|family| family.column(qualifier))
            .map(|column| column.cells.as_slice())
            .unwrap_or(&[])
    }

    pub fn cell_count(&self) -> usize {
        self.families
            .iter()
            .flat_map(|family| family.columns.iter())
            .map(|column| column.cells.len())
            .sum()
    }

    /// Append a cell version, creating the family and column as needed.
    pub fn push_cell(&mut self, family: &str, qualifier: &[u8], cell: Cell) {
        self.family_mut(family).column_mut(qualifier).cells.push(cell);
    }
}

#[cfg(test)]
mod tests {
    use super::{Cell, Row};

    #[test]
    fn push_cell_groups_by_family_then_qualifier() {
        let mut row = Row::new("r1");
        row.push_cell("cf", b"a", Cell::new("v2", 2));
        row.push_cell("meta", b"x", Cell::new("m", 1));
        row.push_cell("cf", b"a", Cell::new("v1", 1));
        row.push_cell("cf", b"b", Cell::new("b", 1));

        assert_eq!(row.key(), b"r1");
        assert_eq!(row.families.len(), 2);
        assert_eq!(row.families[0].name, "cf");
        let values: Vec<_> = row
            .cells("cf", b"a")
            .iter()
            .map(|cell| cell.value.clone())
            .collect();
        assert_eq!(values, vec![b"v2".to_vec(), b"v1".to_vec()]);
        assert_eq!(row.cell_count(), 4);
        assert_eq!(
            row.family("cf").and_then(|family| family.column(b"a")).and_then(|column| column.latest()),
            Some(&Cell::new("v2", 2))
        );
    }

    #[test]
    fn missing_cells_read_as_empty() {
        let row = Row::new("r1");
        assert!(row.cells("cf", b"q").is_empty());
        assert_eq!(row.cell_count(), 0);
    }
}
