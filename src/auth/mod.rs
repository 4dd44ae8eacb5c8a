//! Tokens, principals, permissions and user credentials.

pub mod permissions;
pub mod principal;
pub mod tokens;
pub mod user;

pub use permissions::{PermissionError, PermissionOracle, Permissions};
pub use principal::Principal;
pub use tokens::{Scope, Token, TokenError, TokenStore, TokenTtls};
pub use user::User;
