//! Default fallback view shown by a faulted boundary.

use std::fmt;

use serde::Serialize;

use crate::boundary::{ComponentStack, RenderFault};

/// Heading shown for every captured fault; causes are never discriminated.
pub const FALLBACK_HEADING: &str = "Something went wrong";

/// Message used when a fault carries no text of its own.
pub const EMPTY_FAULT_MESSAGE: &str = "An unexpected error occurred";

// ── RecoveryAction ────────────────────────────────────────────────────────────

/// User-triggered ways out of a faulted boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Clear the fault and re-render the children.
    TryAgain,
    /// Discard all client-side state with a full reload.
    Reload,
}

impl RecoveryAction {
    pub const ALL: [RecoveryAction; 2] = [RecoveryAction::TryAgain, RecoveryAction::Reload];

    pub fn label(&self) -> &'static str {
        match self {
            RecoveryAction::TryAgain => "Try again",
            RecoveryAction::Reload => "Reload page",
        }
    }
}

// ── FallbackView ──────────────────────────────────────────────────────────────

/// Content of the default fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackView {
    pub heading: String,
    pub message: String,
    /// Raw fault detail; only populated in development mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub actions: Vec<RecoveryAction>,
}

impl FallbackView {
    pub fn new(fault: &RenderFault, info: Option<&ComponentStack>, dev_mode: bool) -> Self {
        let message = if fault.message().trim().is_empty() {
            EMPTY_FAULT_MESSAGE.to_string()
        } else {
            fault.message().to_string()
        };

        let detail = dev_mode.then(|| match info {
            Some(stack) if !stack.is_empty() => format!("Error: {fault}{stack}"),
            _ => format!("Error: {fault}"),
        });

        Self {
            heading: FALLBACK_HEADING.to_string(),
            message,
            detail,
            actions: RecoveryAction::ALL.to_vec(),
        }
    }
}

impl fmt::Display for FallbackView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.heading)?;
        writeln!(f, "{}", self.message)?;
        if let Some(detail) = &self.detail {
            writeln!(f)?;
            writeln!(f, "{detail}")?;
        }
        writeln!(f)?;
        let actions: Vec<String> = self
            .actions
            .iter()
            .map(|a| format!("[{}]", a.label()))
            .collect();
        write!(f, "{}", actions.join(" "))
    }
}
