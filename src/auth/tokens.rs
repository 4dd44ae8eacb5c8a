//! Opaque bearer tokens: generation, hashing, scoping and lifecycle.
//!
//! The plaintext is handed back exactly once. Storage only ever sees the
//! SHA-256 hash, so a leaked table cannot be replayed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::auth::user::User;
use crate::store::{bounded, CallError, TokenBackend, TokenRecord};
use crate::validator::{ValidationErrors, Validator};

/// Random bytes per token; base32 without padding renders 16 bytes as 26 characters.
const TOKEN_BYTES: usize = 16;
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// Purpose a token is valid for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Authentication,
    Activation,
    PasswordReset,
}

impl Scope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Activation => "activation",
            Self::PasswordReset => "password-reset",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly issued token. `plaintext` is never persisted or logged.
#[derive(Debug)]
pub struct Token {
    pub plaintext: SecretString,
    pub hash: Vec<u8>,
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    pub scope: Scope,
}

/// Per-scope lifetimes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenTtls {
    pub authentication: Duration,
    pub activation: Duration,
    pub password_reset: Duration,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            authentication: Duration::from_secs(24 * 60 * 60),
            activation: Duration::from_secs(3 * 24 * 60 * 60),
            password_reset: Duration::from_secs(45 * 60),
        }
    }
}

impl TokenTtls {
    #[must_use]
    pub const fn for_scope(&self, scope: Scope) -> Duration {
        match scope {
            Scope::Authentication => self.authentication,
            Scope::Activation => self.activation,
            Scope::PasswordReset => self.password_reset,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(ValidationErrors),
    #[error("token not found")]
    NotFound,
    #[error("token store timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Backend(anyhow::Error),
}

impl From<CallError> for TokenError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Timeout(limit) => Self::Timeout(limit),
            CallError::Backend(err) => Self::Backend(err),
        }
    }
}

/// Source of wall-clock time for expiry decisions.
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Generate a new random plaintext token.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_plaintext() -> anyhow::Result<SecretString> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate token")?;
    Ok(SecretString::from(BASE32_NOPAD.encode(&bytes)))
}

/// SHA-256 of the plaintext; the only form that is stored or compared.
#[must_use]
pub fn hash_plaintext(plaintext: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hasher.finalize().to_vec()
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
}

/// Issues, resolves and revokes tokens against a [`TokenBackend`].
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn TokenBackend>,
    clock: Arc<dyn WallClock>,
    timeout: Duration,
}

impl TokenStore {
    #[must_use]
    pub fn new(backend: Arc<dyn TokenBackend>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create and persist a token for `user_id`. Nothing is returned until the insert succeeds.
    ///
    /// # Errors
    /// Backend failure or timeout.
    pub async fn issue(
        &self,
        user_id: i64,
        ttl: Duration,
        scope: Scope,
    ) -> Result<Token, TokenError> {
        let ttl = chrono::Duration::from_std(ttl)
            .context("token ttl out of range")
            .map_err(TokenError::Backend)?;
        let plaintext = generate_plaintext().map_err(TokenError::Backend)?;
        let hash = hash_plaintext(plaintext.expose_secret());
        let expiry = self.clock.now() + ttl;

        let record = TokenRecord {
            hash: hash.clone(),
            user_id,
            expiry,
            scope,
        };
        bounded(self.timeout, self.backend.insert_token(&record)).await?;

        tracing::debug!(user_id, scope = %scope, "issued token");
        Ok(Token {
            plaintext,
            hash,
            user_id,
            expiry,
            scope,
        })
    }

    /// Resolve a presented plaintext to its owner.
    ///
    /// Unknown, expired and wrong-scope tokens all come back as
    /// [`TokenError::NotFound`].
    ///
    /// # Errors
    /// `Malformed` before any backend call, `NotFound`, or a store failure.
    pub async fn resolve(&self, scope: Scope, plaintext: &str) -> Result<User, TokenError> {
        let mut v = Validator::new();
        validate_token_plaintext(&mut v, plaintext);
        v.finish().map_err(TokenError::Malformed)?;

        let hash = hash_plaintext(plaintext);
        let now = self.clock.now();
        bounded(
            self.timeout,
            self.backend.find_user_by_token(scope, &hash, now),
        )
        .await?
        .ok_or(TokenError::NotFound)
    }

    /// Delete every token of `scope` owned by `user_id`. Idempotent.
    ///
    /// # Errors
    /// Backend failure or timeout.
    pub async fn revoke_all(&self, scope: Scope, user_id: i64) -> Result<(), TokenError> {
        bounded(self.timeout, self.backend.delete_tokens(scope, user_id)).await?;
        tracing::debug!(user_id, scope = %scope, "revoked tokens");
        Ok(())
    }
}
