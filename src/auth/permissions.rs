//! Flat permission codes and the oracle that looks them up.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::store::{bounded, CallError, PermissionBackend};

use super::tokens::DEFAULT_STORE_TIMEOUT;

pub const MOVIES_READ: &str = "movies:read";
pub const MOVIES_WRITE: &str = "movies:write";

/// Unordered set of permission codes held by one user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Permissions(BTreeSet<String>);

impl Permissions {
    #[must_use]
    pub fn includes(&self, code: &str) -> bool {
        self.0.contains(code)
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("permission lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Backend(anyhow::Error),
}

impl From<CallError> for PermissionError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Timeout(limit) => Self::Timeout(limit),
            CallError::Backend(err) => Self::Backend(err),
        }
    }
}

/// Answers "which codes does this user hold", bounded by the store timeout.
#[derive(Clone)]
pub struct PermissionOracle {
    backend: Arc<dyn PermissionBackend>,
    timeout: Duration,
}

impl PermissionOracle {
    #[must_use]
    pub fn new(backend: Arc<dyn PermissionBackend>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// # Errors
    /// Backend failure or timeout.
    pub async fn permissions_for(&self, user_id: i64) -> Result<Permissions, PermissionError> {
        Ok(bounded(self.timeout, self.backend.find_permissions_by_user(user_id)).await?)
    }

    /// # Errors
    /// Backend failure or timeout.
    pub async fn grant(&self, user_id: i64, codes: &[&str]) -> Result<(), PermissionError> {
        bounded(
            self.timeout,
            self.backend.add_permissions_for_user(user_id, codes),
        )
        .await?;
        tracing::debug!(user_id, codes = ?codes, "granted permissions");
        Ok(())
    }
}
