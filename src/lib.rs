//! # Greenlight (movie catalog API)
//!
//! `greenlight` serves a JSON REST API over a movie catalog with user accounts.
//!
//! ## Request pipeline
//!
//! Every request passes through, outermost first:
//!
//! 1. panic recovery, so a defect anywhere below answers a generic `500`
//!    instead of tearing down the connection task;
//! 2. request id + trace span, with a second panic guard inside it so handler
//!    panics are logged with method, route and request id;
//! 3. CORS for trusted origins (preflight requests stop here);
//! 4. per-client admission control (token bucket keyed by peer IP);
//! 5. authentication, which attaches exactly one [`auth::Principal`];
//! 6. per-route gates: authenticated → activated → permission code.
//!
//! ## Tokens
//!
//! Bearer tokens are 26-character base32 strings from the OS CSPRNG. Only the
//! SHA-256 hash is persisted. Tokens carry a scope (`authentication`,
//! `activation`, `password-reset`) and are valid only for that scope; a scope
//! mismatch looks exactly like an unknown token.

pub mod api;
pub mod auth;
pub mod cli;
pub mod mail;
pub mod movies;
pub mod store;
pub mod validator;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
