//! Session liveness monitoring.
//!
//! [`SessionLivenessMonitor`] re-validates the auth session whenever its
//! inputs change and then periodically on a tokio timer, redirecting to the
//! sign-in page as soon as the session is found invalid. Checks only apply
//! while the user is authenticated, a session is present, and the current
//! path is protected.
//!
//! Every call to [`SessionLivenessMonitor::update`] tears the previous timer
//! down before anything else happens, so at most one timer is live per
//! monitor and a tick never acts on inputs that have since been replaced.

use std::sync::{Arc, Mutex, MutexGuard};

use guard_core::error::{GuardError, Result};
use guard_core::session::{check_validity, MonitorInputs, Session, Validity};
use guard_core::settings::MonitorConfig;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::navigator::Navigator;

// ── Public types ──────────────────────────────────────────────────────────────

/// What caused a validity check to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckTrigger {
    /// The monitor's inputs changed (including the first update).
    InputsChanged,
    /// The periodic timer fired.
    Tick,
}

impl CheckTrigger {
    fn as_str(&self) -> &'static str {
        match self {
            CheckTrigger::InputsChanged => "inputs_changed",
            CheckTrigger::Tick => "tick",
        }
    }
}

// ── SessionLivenessMonitor ────────────────────────────────────────────────────

/// Background enforcer of a live auth session on protected routes.
///
/// Feed it the current [`MonitorInputs`] through [`update`](Self::update)
/// every time the session, auth status, or path changes; call
/// [`unmount`](Self::unmount) (or drop it) when the view tree detaches.
///
/// # Example
/// ```no_run
/// use guard_core::session::{AuthStatus, MonitorInputs, Session};
/// use guard_core::settings::MonitorConfig;
/// use guard_runtime::liveness::SessionLivenessMonitor;
/// use guard_runtime::navigator::RecordingNavigator;
///
/// # async fn run() -> guard_core::Result<()> {
/// let navigator = RecordingNavigator::new();
/// let mut monitor = SessionLivenessMonitor::new(navigator.clone(), MonitorConfig::default())?;
/// monitor.update(MonitorInputs::new(
///     AuthStatus::Authenticated,
///     Some(Session::with_token("token")),
///     "/dashboard",
/// ));
/// assert!(monitor.has_active_timer());
/// # Ok(())
/// # }
/// ```
pub struct SessionLivenessMonitor {
    config: MonitorConfig,
    navigator: Arc<dyn Navigator>,
    runtime: Handle,
    /// Inputs of the last update; `None` while unmounted.
    inputs: Option<MonitorInputs>,
    timer: Option<CheckTimer>,
}

impl SessionLivenessMonitor {
    /// Create a monitor bound to the current tokio runtime.
    ///
    /// Returns [`GuardError::NoRuntime`] when called outside a runtime and
    /// [`GuardError::Config`] when the check interval is zero.
    pub fn new(navigator: impl Navigator + 'static, config: MonitorConfig) -> Result<Self> {
        if config.check_interval.is_zero() {
            return Err(GuardError::Config(
                "session check interval must be non-zero".to_string(),
            ));
        }
        let runtime = Handle::try_current().map_err(|e| GuardError::NoRuntime(e.to_string()))?;
        Ok(Self {
            config,
            navigator: Arc::new(navigator),
            runtime,
            inputs: None,
            timer: None,
        })
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// React to new inputs.
    ///
    /// Steps:
    /// 1. Ignore the call when the inputs equal the previous ones.
    /// 2. Tear down the live timer, if any.
    /// 3. When the inputs are monitored, check the session immediately and
    ///    establish a fresh periodic timer bound to these inputs.
    pub fn update(&mut self, inputs: MonitorInputs) {
        if self.inputs.as_ref() == Some(&inputs) {
            return;
        }

        self.teardown_timer();

        match (&inputs.session, inputs.is_monitored(&self.config.guard)) {
            (Some(session), true) => {
                enforce(
                    self.navigator.as_ref(),
                    &self.config.sign_in_path,
                    session,
                    &inputs.path,
                    CheckTrigger::InputsChanged,
                );
                self.timer = Some(self.spawn_timer(session.clone(), inputs.path.clone()));
            }
            _ => {
                tracing::debug!(
                    status = %inputs.status,
                    path = %inputs.path,
                    has_session = inputs.session.is_some(),
                    "session monitoring not applicable"
                );
            }
        }

        self.inputs = Some(inputs);
    }

    /// Detach the monitor: cancel the timer and forget the inputs.
    pub fn unmount(&mut self) {
        self.teardown_timer();
        self.inputs = None;
    }

    /// Whether a periodic check is currently scheduled.
    pub fn has_active_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Inputs of the most recent update, or `None` while unmounted.
    pub fn inputs(&self) -> Option<&MonitorInputs> {
        self.inputs.as_ref()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn teardown_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            drop(timer);
            tracing::debug!("session check timer torn down");
        }
    }

    fn spawn_timer(&self, session: Session, path: String) -> CheckTimer {
        let period = self.config.check_interval;
        let first_tick = Instant::now() + period;
        let cancelled = Arc::new(Mutex::new(false));
        let navigator = Arc::clone(&self.navigator);
        let sign_in_path = self.config.sign_in_path.clone();
        let flag = Arc::clone(&cancelled);

        let handle = self.runtime.spawn(async move {
            let mut interval = time::interval_at(first_tick, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                // Held across the check so teardown waits for a running tick.
                let cancelled = lock_flag(&flag);
                if *cancelled {
                    break;
                }
                enforce(
                    navigator.as_ref(),
                    &sign_in_path,
                    &session,
                    &path,
                    CheckTrigger::Tick,
                );
            }
        });

        tracing::debug!(interval_secs = period.as_secs(), "session check timer established");
        CheckTimer { cancelled, handle }
    }
}

// ── CheckTimer ────────────────────────────────────────────────────────────────

/// Handle to one scheduled periodic check. Dropping it cancels the task.
struct CheckTimer {
    cancelled: Arc<Mutex<bool>>,
    handle: JoinHandle<()>,
}

impl Drop for CheckTimer {
    fn drop(&mut self) {
        // Blocks until an in-flight tick finishes; later ticks see the flag.
        *lock_flag(&self.cancelled) = true;
        self.handle.abort();
    }
}

fn lock_flag(flag: &Mutex<bool>) -> MutexGuard<'_, bool> {
    flag.lock().unwrap_or_else(|e| e.into_inner())
}

// ── Validity enforcement ──────────────────────────────────────────────────────

/// Evaluate `session` and redirect to sign-in when it is invalid.
fn enforce(
    navigator: &dyn Navigator,
    sign_in_path: &str,
    session: &Session,
    path: &str,
    trigger: CheckTrigger,
) {
    match check_validity(session) {
        Validity::Valid => {
            tracing::trace!(path, trigger = trigger.as_str(), "session valid");
        }
        Validity::Invalid(reason) => {
            let target = reason.sign_in_target(sign_in_path);
            tracing::warn!(
                %reason,
                path,
                trigger = trigger.as_str(),
                %target,
                "session invalid; redirecting to sign-in"
            );
            navigator.redirect(&target);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
