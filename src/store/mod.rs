//! Persistence seams.
//!
//! Each concern gets its own backend trait so the core only depends on what it
//! queries. [`PgStore`] implements all of them over `PostgreSQL`; [`MemoryStore`]
//! keeps everything in process for tests and `--storage memory` runs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::permissions::Permissions;
use crate::auth::tokens::Scope;
use crate::auth::user::{NewUser, User};
use crate::movies::{Metadata, Movie, MovieFilters, NewMovie};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persisted form of a token: only the hash ever reaches storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRecord {
    pub hash: Vec<u8>,
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    pub scope: Scope,
}

#[derive(Debug, PartialEq, Eq)]
pub enum InsertUserOutcome {
    Created(User),
    DuplicateEmail,
}

/// Result of a version-checked update.
#[derive(Debug, PartialEq, Eq)]
pub enum UpdateOutcome<T> {
    Updated(T),
    Conflict,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

#[async_trait]
pub trait TokenBackend: Send + Sync {
    async fn insert_token(&self, record: &TokenRecord) -> Result<()>;

    async fn delete_tokens(&self, scope: Scope, user_id: i64) -> Result<()>;

    /// Owner of a token matching `(scope, hash)` whose expiry is after `now`.
    async fn find_user_by_token(
        &self,
        scope: Scope,
        hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<User>>;
}

#[async_trait]
pub trait PermissionBackend: Send + Sync {
    async fn find_permissions_by_user(&self, user_id: i64) -> Result<Permissions>;

    /// Grant codes to a user; unknown codes are an error, already held codes are ignored.
    async fn add_permissions_for_user(&self, user_id: i64, codes: &[&str]) -> Result<()>;
}

#[async_trait]
pub trait UserBackend: Send + Sync {
    async fn insert_user(&self, user: &NewUser) -> Result<InsertUserOutcome>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist `user` if its `version` still matches; the returned user carries the bumped version.
    async fn update_user(&self, user: &User) -> Result<UpdateOutcome<User>>;
}

#[async_trait]
pub trait MovieBackend: Send + Sync {
    async fn insert_movie(&self, movie: &NewMovie) -> Result<Movie>;

    async fn get_movie(&self, id: i64) -> Result<Option<Movie>>;

    async fn update_movie(&self, movie: &Movie) -> Result<UpdateOutcome<Movie>>;

    async fn delete_movie(&self, id: i64) -> Result<DeleteOutcome>;

    async fn list_movies(&self, filters: &MovieFilters) -> Result<(Vec<Movie>, Metadata)>;
}

/// Every backend behind one handle, as the API state holds it.
#[derive(Clone)]
pub struct Backends {
    pub tokens: Arc<dyn TokenBackend>,
    pub permissions: Arc<dyn PermissionBackend>,
    pub users: Arc<dyn UserBackend>,
    pub movies: Arc<dyn MovieBackend>,
}

impl Backends {
    /// Use one store value for every seam.
    pub fn from_store<S>(store: S) -> Self
    where
        S: TokenBackend + PermissionBackend + UserBackend + MovieBackend + 'static,
    {
        let store = Arc::new(store);
        Self {
            tokens: store.clone(),
            permissions: store.clone(),
            users: store.clone(),
            movies: store,
        }
    }
}

/// Failure of a time-bounded backend call.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Run a backend call with an upper bound on its duration.
///
/// # Errors
/// [`CallError::Timeout`] once `limit` elapses, otherwise the backend's own error.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, CallError>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(CallError::Backend),
        Err(_) => Err(CallError::Timeout(limit)),
    }
}
