//! Navigation seam used by the liveness monitor.
//!
//! The monitor never observes the result of a redirect; implementations are
//! fire-and-forget.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Something that can move the user to another route.
pub trait Navigator: Send + Sync {
    fn redirect(&self, target: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn redirect(&self, target: &str) {
        self(target)
    }
}

// ── RecordingNavigator ────────────────────────────────────────────────────────

/// A redirect issued through a [`RecordingNavigator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectRecord {
    pub target: String,
    pub at: DateTime<Utc>,
}

/// Navigator that keeps every redirect it receives, in order.
///
/// Cloning shares the underlying log, so one clone can be handed to a
/// monitor while another is inspected.
#[derive(Debug, Clone, Default)]
pub struct RecordingNavigator {
    log: Arc<Mutex<Vec<RedirectRecord>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all redirects so far.
    pub fn redirects(&self) -> Vec<RedirectRecord> {
        self.lock().clone()
    }

    /// Redirect targets only, in issue order.
    pub fn targets(&self) -> Vec<String> {
        self.lock().iter().map(|r| r.target.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RedirectRecord>> {
        // A poisoned log still holds valid records.
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, target: &str) {
        tracing::info!(target, "redirecting");
        self.lock().push(RedirectRecord {
            target: target.to_string(),
            at: Utc::now(),
        });
    }
}
