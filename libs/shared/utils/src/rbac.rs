use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::warn;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::extractor::extract_user;

/// Succeeds with the caller's role when it is one of `allowed`.
pub fn require_role(user: &User, allowed: &[Role]) -> Result<Role, AppError> {
    let role = user.role();
    if allowed.contains(&role) {
        return Ok(role);
    }

    warn!("User {} with role {} denied, requires one of {:?}", user.id, role, allowed);
    Err(AppError::Forbidden(format!(
        "This action requires the {} role",
        allowed
            .iter()
            .map(Role::to_string)
            .collect::<Vec<_>>()
            .join(" or ")
    )))
}

pub fn is_admin(user: &User) -> bool {
    user.role() == Role::Admin
}

pub fn is_owner_or_admin(user: &User, owner_id: &str) -> bool {
    user.id == owner_id || is_admin(user)
}

/// Route layer for admin-only routers. Must sit inside `auth_middleware`.
pub async fn require_admin(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    let user = extract_user(&request)?;
    require_role(&user, &[Role::Admin])?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestUser;
    use assert_matches::assert_matches;

    #[test]
    fn require_role_accepts_listed_roles() {
        let doctor = TestUser::doctor("d@example.com").to_user();
        assert_eq!(require_role(&doctor, &[Role::Doctor, Role::Admin]).unwrap(), Role::Doctor);
    }

    #[test]
    fn require_role_rejects_other_roles() {
        let patient = TestUser::patient("p@example.com").to_user();
        assert_matches!(require_role(&patient, &[Role::Admin]), Err(AppError::Forbidden(_)));
    }

    #[test]
    fn owner_or_admin() {
        let patient = TestUser::patient("p@example.com").to_user();
        let admin = TestUser::admin("a@example.com").to_user();
        assert!(is_owner_or_admin(&patient, &patient.id));
        assert!(!is_owner_or_admin(&patient, "someone-else"));
        assert!(is_owner_or_admin(&admin, "someone-else"));
    }
}
