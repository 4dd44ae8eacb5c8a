//! Request pipeline stages.

pub mod authenticate;
pub mod cors;
pub mod gates;
pub mod rate_limit;
pub mod recover;

pub use authenticate::authenticate;
pub use gates::{require_activated, require_authenticated, require_permission, PermissionGate};
pub use rate_limit::{
    admit, AdmissionController, AdmissionDecision, LimiterConfig, NoopRateLimiter, RateLimiter,
};
