//! Builder RPC status codes and the return envelope. `BuildStatus`
//! discriminants are fixed so a non-Rust builder could speak the same wire
//! format.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum BuildStatus {
    Success = 0,
    AlreadyBuilt = 1,
    Skipped = 2,
    Failed = 3,
    TimedOut = 4,
    Canceled = 5,
    CanceledRequeue = 6,
    SoftwareFailure = 7,
}

/// Return value of `builder.BuildPackage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStatusReturn {
    pub success: BuildStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Vec<String>>,
    /// Populated from an internal stopwatch when available; callers must not
    /// rely on it being set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl BuildStatusReturn {
    pub fn new(status: BuildStatus) -> Self {
        Self {
            success: status,
            packages: None,
            duration: None,
        }
    }

    pub fn with_packages(status: BuildStatus, packages: Vec<String>) -> Self {
        Self {
            success: status,
            packages: Some(packages),
            duration: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_wire_discriminants() {
        assert_eq!(serde_json::to_string(&BuildStatus::Success).unwrap(), "0");
        assert_eq!(
            serde_json::to_string(&BuildStatus::SoftwareFailure).unwrap(),
            "7"
        );
    }
}
