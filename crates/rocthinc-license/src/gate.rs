use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::LicenseStatus;

/// User actions the gate decides on. Code execution and multi-writer
/// editing are paywalled; reading and note editing never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewPage,
    EditNotes,
    RunThinc,
    RunPython,
    TeamEditing,
}

impl Action {
    pub fn requires_active_license(&self) -> bool {
        match self {
            Action::ViewPage | Action::EditNotes => false,
            Action::RunThinc | Action::RunPython | Action::TeamEditing => true,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::ViewPage => "view_page",
            Action::EditNotes => "edit_notes",
            Action::RunThinc => "run_thinc",
            Action::RunPython => "run_python",
            Action::TeamEditing => "team_editing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{action} requires an active subscription (current status: {status})")]
pub struct Denied {
    pub action: Action,
    pub status: LicenseStatus,
}

/// Decide whether a user with the given license status may perform an
/// action. Everything except code execution and team editing stays
/// available regardless of status.
pub fn authorize(status: LicenseStatus, action: Action) -> Result<(), Denied> {
    if action.requires_active_license() && status != LicenseStatus::Active {
        return Err(Denied { action, status });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_user_may_do_everything() {
        for action in [
            Action::ViewPage,
            Action::EditNotes,
            Action::RunThinc,
            Action::RunPython,
            Action::TeamEditing,
        ] {
            assert!(authorize(LicenseStatus::Active, action).is_ok());
        }
    }

    #[test]
    fn inactive_user_keeps_reading_and_notes() {
        for status in [LicenseStatus::Expired, LicenseStatus::None] {
            assert!(authorize(status, Action::ViewPage).is_ok());
            assert!(authorize(status, Action::EditNotes).is_ok());
        }
    }

    #[test]
    fn inactive_user_is_denied_execution_and_team_editing() {
        for status in [LicenseStatus::Expired, LicenseStatus::None] {
            for action in [Action::RunThinc, Action::RunPython, Action::TeamEditing] {
                let denied = authorize(status, action).unwrap_err();
                assert_eq!(denied.action, action);
                assert_eq!(denied.status, status);
            }
        }
    }
}
