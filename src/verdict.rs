//! Pass/fail outcome of a verification

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictStatus {
    Passed,
    Failed,
    /// Not applicable: recorded but never scored
    NoAutoRun,
}

impl VerdictStatus {
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            VerdictStatus::Passed
        } else {
            VerdictStatus::Failed
        }
    }

    /// AND-combine: any failure fails, anything passed passes, otherwise
    /// nothing was scored.
    pub fn combine(statuses: impl IntoIterator<Item = VerdictStatus>) -> VerdictStatus {
        let mut combined = VerdictStatus::NoAutoRun;
        for status in statuses {
            match status {
                VerdictStatus::Failed => return VerdictStatus::Failed,
                VerdictStatus::Passed => combined = VerdictStatus::Passed,
                VerdictStatus::NoAutoRun => {}
            }
        }
        combined
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictStatus::Passed => write!(f, "PASSED"),
            VerdictStatus::Failed => write!(f, "FAILED"),
            VerdictStatus::NoAutoRun => write!(f, "No Auto Run"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine() {
        use VerdictStatus::*;
        assert_eq!(VerdictStatus::combine([Passed, Passed]), Passed);
        assert_eq!(VerdictStatus::combine([Passed, Failed, Passed]), Failed);
        assert_eq!(VerdictStatus::combine([NoAutoRun, Passed]), Passed);
        assert_eq!(VerdictStatus::combine([NoAutoRun]), NoAutoRun);
        assert_eq!(VerdictStatus::combine([]), NoAutoRun);
    }
}
