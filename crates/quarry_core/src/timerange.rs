use serde::{Deserialize, Serialize};

/// A restriction on the designated time column of table leaves.
///
/// Bounds are nanoseconds since the unix epoch. The range is half-open:
/// a row at instant `t` is kept when `begin <= t < end`. This convention
/// applies at every leaf; there is no per-call-site variation.
///
/// The range is read-only while an evaluation is in flight. It is
/// consumed at table materialization and in scope cache keys, so the
/// same sub-tree evaluated under two ranges never collides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub begin: i64,
    pub end: i64,
}

impl TimeRange {
    pub const fn new(begin: i64, end: i64) -> Self {
        TimeRange { begin, end }
    }

    pub const fn contains(&self, instant: i64) -> bool {
        self.begin <= instant && instant < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_open_bounds() {
        let range = TimeRange::new(15, 30);
        assert!(!range.contains(10));
        assert!(range.contains(15));
        assert!(range.contains(20));
        assert!(!range.contains(30));
    }
}
