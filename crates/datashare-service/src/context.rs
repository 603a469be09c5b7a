//! Request context carrying the caller identity and resolved share role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use datashare_entity::share::ShareRole;

/// Context for the current caller.
///
/// Identity and role resolution happen upstream; the orchestrator trusts
/// the role it is handed and only checks what that role may do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Caller identity (user or group name).
    pub actor: String,
    /// The caller's role relative to the target share request.
    pub role: ShareRole,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context.
    pub fn new(actor: impl Into<String>, role: ShareRole) -> Self {
        Self {
            actor: actor.into(),
            role,
            request_time: Utc::now(),
        }
    }

    /// Context for a member of the requesting team.
    pub fn requester(actor: impl Into<String>) -> Self {
        Self::new(actor, ShareRole::Requester)
    }

    /// Context for a dataset owner or steward.
    pub fn approver(actor: impl Into<String>) -> Self {
        Self::new(actor, ShareRole::Approver)
    }
}
