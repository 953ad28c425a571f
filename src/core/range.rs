// Row-key ranges, row sets, and the prefix successor used for prefix scans.
use crate::core::error::{Error, ErrorKind};
use std::ops::Bound;

/// A contiguous interval of row keys. Each side is independently unbounded,
/// inclusive (`Bound::Included`, "closed") or exclusive (`Bound::Excluded`, "open").
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RowRange {
    start: Bound<Vec<u8>>,
    end: Bound<Vec<u8>>,
}

impl RowRange {
    /// `[start, end)`, the conventional half-open interval.
    pub fn new(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self::with_bounds(Bound::Included(start.into()), Bound::Excluded(end.into()))
    }

    /// `(start, end)`
    pub fn open(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self::with_bounds(Bound::Excluded(start.into()), Bound::Excluded(end.into()))
    }

    /// `[start, end]`
    pub fn closed(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self::with_bounds(Bound::Included(start.into()), Bound::Included(end.into()))
    }

    /// `(start, end]`
    pub fn open_closed(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self::with_bounds(Bound::Excluded(start.into()), Bound::Included(end.into()))
    }

    /// `[start, +inf)`
    pub fn from_key(start: impl Into<Vec<u8>>) -> Self {
        Self::with_bounds(Bound::Included(start.into()), Bound::Unbounded)
    }

    /// `(-inf, end)`
    pub fn until_key(end: impl Into<Vec<u8>>) -> Self {
        Self::with_bounds(Bound::Unbounded, Bound::Excluded(end.into()))
    }

    pub fn unbounded() -> Self {
        Self::with_bounds(Bound::Unbounded, Bound::Unbounded)
    }

    /// Every key that starts with `prefix`: `[prefix, prefix_successor(prefix))`.
    ///
    /// The empty prefix yields the fully unbounded range. A prefix made only of
    /// `0xFF` bytes has no successor, so its end is unbounded.
    pub fn prefix(prefix: impl Into<Vec<u8>>) -> Self {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Self::unbounded();
        }
        let end = match prefix_successor(&prefix) {
            Some(successor) => Bound::Excluded(successor),
            None => Bound::Unbounded,
        };
        Self::with_bounds(Bound::Included(prefix), end)
    }

    pub fn with_bounds(start: Bound<Vec<u8>>, end: Bound<Vec<u8>>) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> Bound<&[u8]> {
        bound_slice(&self.start)
    }

    pub fn end(&self) -> Bound<&[u8]> {
        bound_slice(&self.end)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        let after_start = match &self.start {
            Bound::Unbounded => true,
            Bound::Included(start) => key >= start.as_slice(),
            Bound::Excluded(start) => key > start.as_slice(),
        };
        let before_end = match &self.end {
            Bound::Unbounded => true,
            Bound::Included(end) => key <= end.as_slice(),
            Bound::Excluded(end) => key < end.as_slice(),
        };
        after_start && before_end
    }

    fn starts_at_or_before(&self, key: &[u8]) -> bool {
        match &self.start {
            Bound::Unbounded => true,
            Bound::Included(start) | Bound::Excluded(start) => start.as_slice() <= key,
        }
    }

    /// True when no key greater than `key` lies inside the range.
    fn ends_at_or_before(&self, key: &[u8]) -> bool {
        RowRange::with_bounds(Bound::Excluded(key.to_vec()), self.end.clone()).is_empty()
    }

    /// True when no byte string can satisfy both bounds.
    pub fn is_empty(&self) -> bool {
        match (&self.start, &self.end) {
            (_, Bound::Excluded(end)) if end.is_empty() => true,
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
            (Bound::Included(start), Bound::Included(end)) => start > end,
            (Bound::Included(start), Bound::Excluded(end))
            | (Bound::Excluded(start), Bound::Included(end)) => start >= end,
            // (a, a\x00) holds nothing: a\x00 is the immediate successor of a.
            (Bound::Excluded(start), Bound::Excluded(end)) => {
                start >= end
                    || (end.len() == start.len() + 1 && end.starts_with(start) && end[start.len()] == 0)
            }
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.is_empty() {
            return Err(Error::new(ErrorKind::Range)
                .with_message("row range selects no keys")
                .with_hint("Check that the start bound sorts before the end bound."));
        }
        Ok(())
    }
}

/// Smallest key strictly greater than every key that has `prefix` as a byte prefix.
///
/// Trailing `0xFF` bytes are stripped and the last remaining byte is incremented.
/// Returns `None` when the prefix is empty or made only of `0xFF` bytes.
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut out = prefix.to_vec();
    while let Some(last) = out.pop() {
        if last != u8::MAX {
            out.push(last + 1);
            return Some(out);
        }
    }
    None
}

fn bound_slice(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(key) => Bound::Included(key.as_slice()),
        Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Explicit row keys plus row ranges; a row is selected when it matches either.
///
/// An empty set selects nothing. Use [`RowSet::all`] to select every row.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RowSet {
    keys: Vec<Vec<u8>>,
    ranges: Vec<RowRange>,
}

impl RowSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self::from_ranges([RowRange::unbounded()])
    }

    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            ranges: Vec::new(),
        }
    }

    pub fn from_ranges<I>(ranges: I) -> Self
    where
        I: IntoIterator<Item = RowRange>,
    {
        Self {
            keys: Vec::new(),
            ranges: ranges.into_iter().collect(),
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn with_range(mut self, range: RowRange) -> Self {
        self.ranges.push(range);
        self
    }

    pub fn keys(&self) -> &[Vec<u8>] {
        &self.keys
    }

    pub fn ranges(&self) -> &[RowRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.ranges.is_empty()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.keys.iter().any(|candidate| candidate.as_slice() == key)
            || self.ranges.iter().any(|range| range.contains(key))
    }

    pub fn validate(&self) -> Result<(), Error> {
        for range in &self.ranges {
            range.validate()?;
        }
        Ok(())
    }

    /// The row set to request after `last_key` has been delivered.
    ///
    /// Leading ranges that hold nothing past `last_key` are dropped, then the
    /// first remaining range starts at `Excluded(last_key)` unless it already
    /// starts later. Later ranges are left as they are. A set of explicit keys
    /// with no ranges gains the range `(last_key, +inf)`. Explicit keys at or
    /// before `last_key` are dropped in every case.
    pub fn resume_after(&self, last_key: &[u8]) -> RowSet {
        let keys = self
            .keys
            .iter()
            .filter(|key| key.as_slice() > last_key)
            .cloned()
            .collect();
        let past_last = Bound::Excluded(last_key.to_vec());
        if self.ranges.is_empty() {
            let ranges = vec![RowRange::with_bounds(past_last, Bound::Unbounded)];
            return RowSet { keys, ranges };
        }

        let mut ranges: Vec<RowRange> = self
            .ranges
            .iter()
            .skip_while(|range| range.ends_at_or_before(last_key))
            .cloned()
            .collect();
        if let Some(first) = ranges.first_mut() {
            if first.starts_at_or_before(last_key) {
                first.start = past_last;
            }
        }
        RowSet { keys, ranges }
    }
}
