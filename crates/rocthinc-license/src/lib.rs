//! License records and the gate for paywalled actions.
//!
//! One row per user email. Rows are created by the first billing event and
//! are never deleted afterwards, only status-transitioned. The billing
//! webhook is the only mutation path.

mod gate;
mod store;

pub use gate::{Action, Denied, authorize};
pub use store::{LicenseError, LicenseRecord, LicenseStore};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Subscription status of a user. `None` is the default for users the
/// billing provider has never reported on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Expired,
    None,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Active => "active",
            LicenseStatus::Expired => "expired",
            LicenseStatus::None => "none",
        }
    }

    /// Whether `self -> next` is a permitted transition. Re-asserting the
    /// current status is permitted so duplicate webhook delivery stays
    /// idempotent.
    pub fn can_transition_to(&self, next: LicenseStatus) -> bool {
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (LicenseStatus::None, LicenseStatus::Active)
                | (LicenseStatus::Active, LicenseStatus::Expired)
                | (LicenseStatus::Expired, LicenseStatus::Active)
        )
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LicenseStatus::Active),
            "expired" => Ok(LicenseStatus::Expired),
            "none" => Ok(LicenseStatus::None),
            other => Err(format!("unknown license status '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_round_trip() {
        for status in [LicenseStatus::Active, LicenseStatus::Expired, LicenseStatus::None] {
            assert_eq!(status.as_str().parse::<LicenseStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<LicenseStatus>().is_err());
    }

    #[test]
    fn permitted_transitions() {
        use LicenseStatus::*;
        assert!(None.can_transition_to(Active));
        assert!(Active.can_transition_to(Expired));
        assert!(Expired.can_transition_to(Active));
        // Idempotent re-assertion.
        assert!(Active.can_transition_to(Active));
        // No path back to none, no none -> expired.
        assert!(!Active.can_transition_to(None));
        assert!(!Expired.can_transition_to(None));
        assert!(!None.can_transition_to(Expired));
    }
}
