//! Auth session model and the validity policy shared by every liveness check.
//!
//! The session is owned by an external auth provider; this module only reads
//! it. [`check_validity`] is the single policy function used both for the
//! immediate check and for each periodic tick.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GuardError, Result};
use crate::routes::RouteGuard;

/// Default location of the sign-in page.
pub const DEFAULT_SIGN_IN_PATH: &str = "/signin";

// ── Session ───────────────────────────────────────────────────────────────────

/// The auth provider's view of the current user session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Set by the provider when a token refresh failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Session {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            error: None,
        }
    }
}

// ── AuthStatus ────────────────────────────────────────────────────────────────

/// Authentication status reported alongside the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Authenticated,
    Unauthenticated,
    Loading,
}

impl AuthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStatus::Authenticated => "authenticated",
            AuthStatus::Unauthenticated => "unauthenticated",
            AuthStatus::Loading => "loading",
        }
    }
}

impl FromStr for AuthStatus {
    type Err = GuardError;

    /// Case-insensitive construction from a string slice.
    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "authenticated" => Ok(AuthStatus::Authenticated),
            "unauthenticated" => Ok(AuthStatus::Unauthenticated),
            "loading" => Ok(AuthStatus::Loading),
            other => Err(GuardError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Validity ──────────────────────────────────────────────────────────────────

/// Why a session was rejected. The name doubles as the `error` query marker
/// on the sign-in redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignInReason {
    SessionError,
    NoAccessToken,
}

impl SignInReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignInReason::SessionError => "SessionError",
            SignInReason::NoAccessToken => "NoAccessToken",
        }
    }

    /// Build the redirect target for this reason, e.g.
    /// `/signin?error=NoAccessToken`.
    pub fn sign_in_target(&self, sign_in_path: &str) -> String {
        let separator = if sign_in_path.contains('?') { '&' } else { '?' };
        format!("{sign_in_path}{separator}error={}", self.as_str())
    }
}

impl fmt::Display for SignInReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid(SignInReason),
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }
}

/// Evaluate a session. A provider error takes precedence over a missing token.
pub fn check_validity(session: &Session) -> Validity {
    if session.error.is_some() {
        Validity::Invalid(SignInReason::SessionError)
    } else if session.access_token.is_none() {
        Validity::Invalid(SignInReason::NoAccessToken)
    } else {
        Validity::Valid
    }
}

// ── MonitorInputs ─────────────────────────────────────────────────────────────

/// Everything the liveness monitor reacts to. A change to any field re-runs
/// the monitor's checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorInputs {
    pub status: AuthStatus,
    #[serde(default)]
    pub session: Option<Session>,
    pub path: String,
}

impl MonitorInputs {
    pub fn new(status: AuthStatus, session: Option<Session>, path: impl Into<String>) -> Self {
        Self {
            status,
            session,
            path: path.into(),
        }
    }

    /// Whether checks apply: authenticated, a session is present, and the
    /// current path is protected by `guard`.
    pub fn is_monitored(&self, guard: &RouteGuard) -> bool {
        self.status == AuthStatus::Authenticated
            && self.session.is_some()
            && guard.is_protected(&self.path)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
