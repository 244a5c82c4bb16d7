use uuid::Uuid;

use crate::services::auth::AuthError;

/// Gate for destructive operations: only the owner may proceed.
pub fn require_ownership(resource_owner_id: &Uuid, caller_id: &Uuid) -> Result<(), AuthError> {
    if resource_owner_id == caller_id {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}
