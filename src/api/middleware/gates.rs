//! Route-level authorization gates.
//!
//! Each gate includes the one before it: a permission check only runs for an
//! activated user, and activation is only checked for an authenticated one.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::api::error::ApiError;
use crate::auth::{PermissionOracle, Principal, User};

fn authenticated(principal: &Principal) -> Result<&User, ApiError> {
    principal.user().ok_or(ApiError::AuthenticationRequired)
}

fn activated(principal: &Principal) -> Result<&User, ApiError> {
    let user = authenticated(principal)?;
    if user.activated {
        Ok(user)
    } else {
        Err(ApiError::AccountNotActivated)
    }
}

async fn permitted<'a>(
    principal: &'a Principal,
    oracle: &PermissionOracle,
    code: &str,
) -> Result<&'a User, ApiError> {
    let user = activated(principal)?;
    let permissions = oracle.permissions_for(user.id).await?;
    if permissions.includes(code) {
        Ok(user)
    } else {
        tracing::info!(user_id = user.id, code, "permission denied");
        Err(ApiError::Forbidden)
    }
}

pub async fn require_authenticated(
    principal: Principal,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authenticated(&principal)?;
    Ok(next.run(request).await)
}

pub async fn require_activated(
    principal: Principal,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    activated(&principal)?;
    Ok(next.run(request).await)
}

/// State for [`require_permission`]: where to look codes up and which one to demand.
#[derive(Clone)]
pub struct PermissionGate {
    oracle: PermissionOracle,
    code: &'static str,
}

impl PermissionGate {
    #[must_use]
    pub const fn new(oracle: PermissionOracle, code: &'static str) -> Self {
        Self { oracle, code }
    }
}

pub async fn require_permission(
    State(gate): State<PermissionGate>,
    principal: Principal,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    permitted(&principal, &gate.oracle, gate.code).await?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permissions::{MOVIES_READ, MOVIES_WRITE};
    use crate::auth::Permissions;
    use crate::store::{MemoryStore, PermissionBackend};
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Arc;

    struct FailingBackend;

    #[async_trait]
    impl PermissionBackend for FailingBackend {
        async fn find_permissions_by_user(&self, _user_id: i64) -> Result<Permissions> {
            anyhow::bail!("connection reset")
        }

        async fn add_permissions_for_user(&self, _user_id: i64, _codes: &[&str]) -> Result<()> {
            anyhow::bail!("connection reset")
        }
    }

    fn user(activated: bool) -> Principal {
        Principal::Authenticated(User {
            id: 1,
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            activated,
            created_at: Utc::now(),
            version: 1,
        })
    }

    #[test]
    fn anonymous_never_passes() {
        assert!(matches!(
            authenticated(&Principal::Anonymous),
            Err(ApiError::AuthenticationRequired)
        ));
        assert!(matches!(
            activated(&Principal::Anonymous),
            Err(ApiError::AuthenticationRequired)
        ));
    }

    #[test]
    fn unactivated_is_authenticated_but_not_activated() {
        let principal = user(false);
        assert!(authenticated(&principal).is_ok());
        assert!(matches!(
            activated(&principal),
            Err(ApiError::AccountNotActivated)
        ));
    }

    #[tokio::test]
    async fn permission_requires_code() -> Result<()> {
        let oracle = PermissionOracle::new(Arc::new(MemoryStore::new()));
        oracle.grant(1, &[MOVIES_READ]).await?;
        let principal = user(true);

        assert!(permitted(&principal, &oracle, MOVIES_READ).await.is_ok());
        assert!(matches!(
            permitted(&principal, &oracle, MOVIES_WRITE).await,
            Err(ApiError::Forbidden)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn permission_checks_activation_first() -> Result<()> {
        let oracle = PermissionOracle::new(Arc::new(MemoryStore::new()));
        oracle.grant(1, &[MOVIES_READ]).await?;
        assert!(matches!(
            permitted(&user(false), &oracle, MOVIES_READ).await,
            Err(ApiError::AccountNotActivated)
        ));
        assert!(matches!(
            permitted(&Principal::Anonymous, &oracle, MOVIES_READ).await,
            Err(ApiError::AuthenticationRequired)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn oracle_failure_is_internal() {
        let oracle = PermissionOracle::new(Arc::new(FailingBackend));
        assert!(matches!(
            permitted(&user(true), &oracle, MOVIES_READ).await,
            Err(ApiError::Internal(_))
        ));
    }
}
