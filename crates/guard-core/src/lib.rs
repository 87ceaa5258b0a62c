//! Domain types and pure policy for the LearnHub client guards.
//!
//! Holds the auth session model, the session validity check, protected-route
//! matching, the shared error type, and CLI/persisted settings.

pub mod error;
pub mod routes;
pub mod session;
pub mod settings;

pub use error::{GuardError, Result};
pub use routes::{is_protected, RouteGuard, RoutePattern};
pub use session::{check_validity, AuthStatus, MonitorInputs, Session, SignInReason, Validity};
pub use settings::MonitorConfig;
