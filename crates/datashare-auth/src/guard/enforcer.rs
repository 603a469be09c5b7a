//! Enforcement of the capability table, including status-gated operations.

use tracing::debug;

use datashare_core::error::AppError;
use datashare_core::result::AppResult;
use datashare_entity::share::{
    ShareItemStateMachine, ShareItemStatus, ShareObjectStatus, ShareRole,
};

use super::policies::{CapabilityTable, ShareOperation};

/// Stateless check of (role, operation) against the capability table.
///
/// Every check happens before the orchestrator mutates anything, so a
/// rejected call leaves the request untouched.
#[derive(Debug, Clone, Default)]
pub struct PermissionGuard {
    /// The capability configuration.
    table: CapabilityTable,
}

impl PermissionGuard {
    /// Creates a guard with the default capability table.
    pub fn new() -> Self {
        Self {
            table: CapabilityTable::new(),
        }
    }

    /// Checks that `role` holds the capability for `operation`.
    pub fn require(&self, role: ShareRole, operation: ShareOperation) -> AppResult<()> {
        if self.table.allows(role, operation) {
            Ok(())
        } else {
            debug!(%role, %operation, "Capability check denied");
            Err(AppError::permission_denied(format!(
                "Role '{role}' may not perform '{operation}'"
            )))
        }
    }

    /// Checks whether the role may perform the operation (returns bool).
    pub fn allows(&self, role: ShareRole, operation: ShareOperation) -> bool {
        self.table.allows(role, operation)
    }

    /// Authorizes attaching items to a request in `status`.
    ///
    /// Items may only be added while the request is `Draft` or `Rejected`.
    pub fn authorize_add_items(&self, role: ShareRole, status: ShareObjectStatus) -> AppResult<()> {
        self.require(role, ShareOperation::AddItem)?;
        if !status.accepts_new_items() {
            return Err(AppError::conflict(format!(
                "Items cannot be added to a share request in status {status}"
            )));
        }
        Ok(())
    }

    /// Authorizes detaching an item in `item_status`, whatever the request status.
    pub fn authorize_remove_item(
        &self,
        role: ShareRole,
        item_status: ShareItemStatus,
    ) -> AppResult<()> {
        self.require(role, ShareOperation::RemoveItem)?;
        ShareItemStateMachine::check_removable(item_status)
    }
}
