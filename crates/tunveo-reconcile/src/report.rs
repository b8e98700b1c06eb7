use std::fmt;

/// Counters for one reconciliation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Items considered this cycle
    pub examined: usize,
    pub deleted: usize,
    /// Items found to be in use and left alone
    pub retained: usize,
    /// Items not decided this cycle (bad data, failed lookups, already gone)
    pub skipped: usize,
    /// Deletions the control plane rejected
    pub failed: usize,
    /// The initial listing failed and nothing was examined
    pub aborted: bool,
}

impl SweepReport {
    pub fn aborted() -> Self {
        Self {
            aborted: true,
            ..Self::default()
        }
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.aborted {
            return write!(f, "aborted before examining anything");
        }
        write!(
            f,
            "examined={} deleted={} retained={} skipped={} failed={}",
            self.examined, self.deleted, self.retained, self.skipped, self.failed
        )
    }
}
