//! Caller role relative to a sharing request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The caller's relationship to a share request.
///
/// Resolved outside this system from the caller's identity and their
/// relationship to the dataset (approver) or the consuming principal
/// (requester).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareRole {
    /// Member of the consuming team that raised the request.
    Requester,
    /// Owner or steward of the dataset being shared.
    Approver,
}

impl ShareRole {
    /// Return the role as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requester => "Requester",
            Self::Approver => "Approver",
        }
    }
}

impl fmt::Display for ShareRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ShareRole {
    type Err = datashare_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "requester" | "requesters" => Ok(Self::Requester),
            "approver" | "approvers" => Ok(Self::Approver),
            _ => Err(datashare_core::AppError::validation(format!(
                "Invalid share role: '{s}'. Expected one of: Requester, Approver"
            ))),
        }
    }
}
