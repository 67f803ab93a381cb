use crate::auth::{config::AdminAllowList, principal::Principal};

/// Decide whether a principal may enter the admin area.
///
/// Allow-listed emails are admins; otherwise the `role`/`is_admin` claims of
/// the application metadata, then of the user metadata, are checked. Absent
/// principals are never admins.
#[must_use]
pub fn is_admin(principal: Option<&Principal>, admins: &AdminAllowList) -> bool {
    let Some(principal) = principal else {
        return false;
    };

    if principal.email().is_some_and(|email| admins.contains(email)) {
        return true;
    }

    principal
        .role_claims()
        .iter()
        .any(|claim| claim.grants_admin())
}
