//! Request-level state machine.
//!
//! ```text
//! Draft ──submit──▶ Submitted ──approve──▶ Approved
//!   ▲                  │
//!   │               reject
//!   │                  ▼
//!   └───(submit)── Rejected
//!
//! any non-terminal ──delete──▶ Deleted
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use datashare_core::error::AppError;
use datashare_core::result::AppResult;

use super::status::ShareObjectStatus;

/// Actions that change a request's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareAction {
    /// Send the request to the approvers.
    Submit,
    /// Grant the request.
    Approve,
    /// Deny the request.
    Reject,
    /// Logically delete the request.
    Delete,
}

impl fmt::Display for ShareAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Delete => "delete",
        };
        write!(f, "{name}")
    }
}

/// Transition table for [`ShareObjectStatus`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ShareObjectStateMachine;

impl ShareObjectStateMachine {
    /// Compute the status reached by applying `action` in `from`.
    pub fn transition(from: ShareObjectStatus, action: ShareAction) -> AppResult<ShareObjectStatus> {
        use ShareObjectStatus::*;

        let to = match (from, action) {
            (Draft | Rejected, ShareAction::Submit) => Submitted,
            (Submitted, ShareAction::Approve) => Approved,
            (Submitted, ShareAction::Reject) => Rejected,
            (Draft | Submitted | Approved | Rejected, ShareAction::Delete) => Deleted,
            _ => {
                return Err(AppError::invalid_transition(format!(
                    "Cannot {action} a share request in status {from}"
                )));
            }
        };
        Ok(to)
    }

    /// Whether `action` is legal in `from`.
    pub fn can(from: ShareObjectStatus, action: ShareAction) -> bool {
        Self::transition(from, action).is_ok()
    }

    /// Reject attribute edits on a terminal request.
    pub fn ensure_editable(status: ShareObjectStatus) -> AppResult<()> {
        if status.is_terminal() {
            return Err(AppError::invalid_transition(format!(
                "Share request is {status} and can no longer be modified"
            )));
        }
        Ok(())
    }
}
