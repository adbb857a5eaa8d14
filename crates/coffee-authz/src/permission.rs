//! Scope enforcement over verified claims.
//!
//! Permission strings follow `<verb>:<resource>` (e.g. `patch:drinks`) but are
//! opaque here: membership is exact string match, no wildcards.
use crate::errors::{AuthError, AuthResult};
use crate::token::ClaimSet;

pub const GET_DRINKS_DETAIL: &str = "get:drinks-detail";
pub const POST_DRINKS: &str = "post:drinks";
pub const PATCH_DRINKS: &str = "patch:drinks";
pub const DELETE_DRINKS: &str = "delete:drinks";

/// Confirm `required_permission` is granted by `claims`.
pub fn check(required_permission: &str, claims: &ClaimSet) -> AuthResult<()> {
    let granted = claims
        .permissions
        .as_ref()
        .ok_or(AuthError::PermissionsClaimMissing)?;
    if !granted.contains(required_permission) {
        return Err(AuthError::PermissionDenied {
            required: required_permission.to_string(),
        });
    }
    Ok(())
}
