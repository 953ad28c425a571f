// Chunk-events from the streaming read protocol and the fold that turns them into rows.
use crate::core::row::{Cell, Row};
use tracing::{trace, warn};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RowStatus {
    #[default]
    None,
    Commit,
    Reset,
}

/// One fragment of a streamed row. Every field is independently optional.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChunkEvent {
    pub row_key: Option<Vec<u8>>,
    pub family: Option<String>,
    pub qualifier: Option<Vec<u8>>,
    pub timestamp: Option<i64>,
    pub value: Option<Vec<u8>>,
    pub labels: Option<Vec<String>>,
    pub status: RowStatus,
}

impl ChunkEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.row_key = Some(key.into());
        self
    }

    /// Set every cell field at once.
    pub fn with_cell(
        mut self,
        family: impl Into<String>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: i64,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.family = Some(family.into());
        self.qualifier = Some(qualifier.into());
        self.timestamp = Some(timestamp);
        self.value = Some(value.into());
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn commit(mut self) -> Self {
        self.status = RowStatus::Commit;
        self
    }

    pub fn reset(mut self) -> Self {
        self.status = RowStatus::Reset;
        self
    }

    /// Labels alone do not make a cell.
    pub fn has_cell_fields(&self) -> bool {
        self.family.is_some()
            || self.qualifier.is_some()
            || self.timestamp.is_some()
            || self.value.is_some()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AssemblerState {
    Idle,
    Accumulating,
}

#[derive(Debug)]
struct PendingCell {
    family: String,
    qualifier: Vec<u8>,
    cell: Cell,
}

/// Sequential fold from chunk-events to committed rows.
///
/// Use one assembler per stream: state left over from an unrelated stream
/// would attach its cells to the wrong row. Malformed input never fails;
/// the assembler emits whatever it can build from what it has seen.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    row_key: Option<Vec<u8>>,
    pending: Vec<PendingCell>,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AssemblerState {
        if self.pending.is_empty() {
            AssemblerState::Idle
        } else {
            AssemblerState::Accumulating
        }
    }

    pub fn pending_cells(&self) -> usize {
        self.pending.len()
    }

    /// Feed one chunk; returns the row completed by it, if any.
    pub fn push(&mut self, chunk: ChunkEvent) -> Option<Row> {
        let has_cell = chunk.has_cell_fields();
        let ChunkEvent {
            row_key,
            family,
            qualifier,
            timestamp,
            value,
            labels,
            status,
        } = chunk;

        if let Some(key) = row_key {
            self.row_key = Some(key);
        }

        if has_cell {
            if family.is_none() || qualifier.is_none() {
                warn!(
                    missing_family = family.is_none(),
                    missing_qualifier = qualifier.is_none(),
                    "chunk omits cell coordinates; using empty values"
                );
            }
            self.pending.push(PendingCell {
                family: family.unwrap_or_default(),
                qualifier: qualifier.unwrap_or_default(),
                cell: Cell {
                    value: value.unwrap_or_default(),
                    timestamp: timestamp.unwrap_or_default(),
                    labels: labels.unwrap_or_default(),
                },
            });
        }

        match status {
            RowStatus::None => None,
            RowStatus::Commit => Some(self.commit_row()),
            RowStatus::Reset => {
                trace!(discarded = self.pending.len(), "row reset");
                self.pending.clear();
                None
            }
        }
    }

    fn commit_row(&mut self) -> Row {
        let key = self.row_key.clone().unwrap_or_default();
        let mut row = Row::new(key);
        for pending in self.pending.drain(..) {
            row.push_cell(&pending.family, &pending.qualifier, pending.cell);
        }
        trace!(row_key = %bstr::BStr::new(row.key()), cells = row.cell_count(), "row committed");
        row
    }
}

/// Fold a complete batch of chunks from a fresh assembler.
///
/// Returns the committed rows in commit order plus the number of trailing
/// cells that never saw a commit.
pub fn assemble<I>(chunks: I) -> (Vec<Row>, usize)
where
    I: IntoIterator<Item = ChunkEvent>,
{
    let mut assembler = ChunkAssembler::new();
    let rows = chunks
        .into_iter()
        .filter_map(|chunk| assembler.push(chunk))
        .collect();
    (rows, assembler.pending_cells())
}

#[cfg(test)]
mod tests {
    use super::{AssemblerState, ChunkAssembler, ChunkEvent, assemble};
    use crate::core::row::Cell;

    #[test]
    fn two_versions_then_commit_yield_one_row() {
        let chunks = vec![
            ChunkEvent::new().with_row_key("r1").with_cell("cf", "q", 20, "new"),
            ChunkEvent::new().with_cell("cf", "q", 10, "old").commit(),
        ];
        let (rows, dangling) = assemble(chunks);
        assert_eq!(dangling, 0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key(), b"r1");
        assert_eq!(
            rows[0].cells("cf", b"q"),
            &[Cell::new("new", 20), Cell::new("old", 10)]
        );
    }

    #[test]
    fn reset_discards_buffered_cells() {
        let mut assembler = ChunkAssembler::new();
        assert!(assembler
            .push(ChunkEvent::new().with_row_key("r1").with_cell("cf", "q", 1, "a"))
            .is_none());
        assert_eq!(assembler.state(), AssemblerState::Accumulating);
        assert!(assembler.push(ChunkEvent::new().reset()).is_none());
        assert_eq!(assembler.state(), AssemblerState::Idle);

        let row = assembler
            .push(ChunkEvent::new().with_row_key("r1").with_cell("cf", "q", 2, "b").commit())
            .expect("row");
        assert_eq!(row.cells("cf", b"q"), &[Cell::new("b", 2)]);
    }

    #[test]
    fn reset_without_commit_emits_nothing() {
        let chunks = vec![
            ChunkEvent::new().with_row_key("r1").with_cell("cf", "q", 1, "a"),
            ChunkEvent::new().with_cell("cf", "q", 0, "b"),
            ChunkEvent::new().reset(),
        ];
        let (rows, dangling) = assemble(chunks);
        assert!(rows.is_empty());
        assert_eq!(dangling, 0);
    }

    #[test]
    fn independent_commits_yield_rows_in_commit_order() {
        let chunks = vec![
            ChunkEvent::new().with_row_key("a").with_cell("cf", "q", 1, "1").commit(),
            ChunkEvent::new().with_row_key("b").with_cell("cf", "q", 1, "2"),
            ChunkEvent::new().with_cell("other", "z", 1, "3").commit(),
        ];
        let (rows, _) = assemble(chunks);
        let keys: Vec<_> = rows.iter().map(|row| row.key().to_vec()).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(rows[1].families.len(), 2);
    }

    #[test]
    fn cells_group_by_family_then_qualifier_in_arrival_order() {
        let chunks = vec![
            ChunkEvent::new().with_row_key("r").with_cell("cf", "x", 3, "x3"),
            ChunkEvent::new().with_cell("cf", "y", 1, "y1"),
            ChunkEvent::new().with_cell("cf", "x", 2, "x2").with_labels(["hot"]),
            ChunkEvent::new().commit(),
        ];
        let (rows, _) = assemble(chunks);
        let family = rows[0].family("cf").expect("family");
        assert_eq!(family.columns.len(), 2);
        assert_eq!(family.columns[0].qualifier, b"x".to_vec());
        assert_eq!(
            family.columns[0].cells,
            vec![Cell::new("x3", 3), Cell::new("x2", 2).with_labels(["hot"])]
        );
    }

    #[test]
    fn partial_cell_fields_are_taken_literally() {
        let chunk = ChunkEvent {
            row_key: Some(b"r".to_vec()),
            value: Some(b"v".to_vec()),
            ..ChunkEvent::default()
        };
        let (rows, _) = assemble(vec![chunk, ChunkEvent::new().commit()]);
        assert_eq!(rows[0].cells("", b""), &[Cell::new("v", 0)]);
    }

    #[test]
    fn commit_without_context_degrades_to_empty_row() {
        let (rows, _) = assemble(vec![ChunkEvent::new().commit()]);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].key().is_empty());
        assert!(rows[0].families.is_empty());
    }

    #[test]
    fn status_free_chunk_without_cells_is_a_no_op() {
        let mut assembler = ChunkAssembler::new();
        assert!(assembler.push(ChunkEvent::new().with_labels(["x"])).is_none());
        assert_eq!(assembler.state(), AssemblerState::Idle);
    }

    #[test]
    fn uncommitted_tail_is_reported() {
        let chunks = vec![
            ChunkEvent::new().with_row_key("a").with_cell("cf", "q", 1, "1").commit(),
            ChunkEvent::new().with_row_key("b").with_cell("cf", "q", 1, "2"),
        ];
        let (rows, dangling) = assemble(chunks);
        assert_eq!(rows.len(), 1);
        assert_eq!(dangling, 1);
    }
}
