//! Scenario replay.
//!
//! A scenario is a JSON document listing session, navigation, and render
//! events. [`Replayer`] feeds them, in order, to one liveness monitor and one
//! fault boundary, then reports what happened as a [`ReplaySummary`].
//!
//! ```json
//! {
//!   "name": "token expires on the lesson player",
//!   "steps": [
//!     { "kind": "update", "status": "authenticated",
//!       "session": { "accessToken": "abc" }, "path": "/courses/42/learn" },
//!     { "kind": "render", "components": ["LessonPlayer", "ProgressBar"], "fail": "progress out of range" },
//!     { "kind": "try_again" },
//!     { "kind": "update", "status": "authenticated", "session": {}, "path": "/courses/42/learn" },
//!     { "kind": "wait", "secs": 600 },
//!     { "kind": "unmount" }
//!   ]
//! }
//! ```

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use guard_core::error::{GuardError, Result};
use guard_core::session::{AuthStatus, MonitorInputs, Session};
use guard_core::settings::MonitorConfig;
use guard_runtime::liveness::SessionLivenessMonitor;
use guard_runtime::navigator::{RecordingNavigator, RedirectRecord};
use guard_ui::boundary::{BoundaryConfig, ComponentStack, FaultBoundary, RenderFault, RenderScope};
use guard_ui::fallback::RecoveryAction;
use guard_ui::Rendered;
use serde::{Deserialize, Serialize};

// ── Scenario model ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<Step>,
}

/// One replayed event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// New session/status/path observed by the monitor.
    Update {
        status: AuthStatus,
        #[serde(default)]
        session: Option<Session>,
        path: String,
    },
    /// Let time pass so periodic checks can fire.
    Wait { secs: u64 },
    /// Detach the monitor from the view tree.
    Unmount,
    /// Render nested views inside the boundary; the innermost one fails with
    /// `fail` when given.
    Render {
        #[serde(default)]
        components: Vec<String>,
        #[serde(default)]
        fail: Option<String>,
    },
    TryAgain,
    Reload,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| GuardError::ScenarioRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

// ── Summary ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct BoundarySummary {
    pub state: &'static str,
    pub faults_captured: u64,
    pub faults_reported: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fault: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    pub steps_run: usize,
    pub redirects: Vec<RedirectRecord>,
    /// One line per render step: what the boundary showed.
    pub renders: Vec<String>,
    pub boundary: BoundarySummary,
    pub reloads: u32,
}

// ── Replayer ──────────────────────────────────────────────────────────────────

/// Drives a monitor and a boundary through scenario steps.
pub struct Replayer {
    navigator: RecordingNavigator,
    monitor: SessionLivenessMonitor,
    boundary: FaultBoundary<String>,
    boundary_config: BoundaryConfig,
    /// Shared with the boundary's reporter so counts survive reloads.
    reported: Rc<Cell<usize>>,
    reloads: Rc<Cell<u32>>,
    /// Faults captured by boundaries discarded on reload.
    captured_before_reload: u64,
    renders: Vec<String>,
    steps_run: usize,
}

impl Replayer {
    /// Must be called inside a tokio runtime.
    pub fn new(monitor_config: MonitorConfig, boundary_config: BoundaryConfig) -> Result<Self> {
        let navigator = RecordingNavigator::new();
        let monitor = SessionLivenessMonitor::new(navigator.clone(), monitor_config)?;
        let reported = Rc::new(Cell::new(0));
        let reloads = Rc::new(Cell::new(0));
        let boundary = build_boundary(boundary_config, &reported, &reloads);

        Ok(Self {
            navigator,
            monitor,
            boundary,
            boundary_config,
            reported,
            reloads,
            captured_before_reload: 0,
            renders: Vec::new(),
            steps_run: 0,
        })
    }

    /// Replay every step of `scenario` in order.
    pub async fn run(&mut self, scenario: &Scenario) -> ReplaySummary {
        for (index, step) in scenario.steps.iter().enumerate() {
            tracing::debug!(step = index, ?step, "replaying step");
            self.apply(step).await;
            self.steps_run += 1;
        }
        self.summary(scenario.name.clone())
    }

    /// Apply a single step.
    pub async fn apply(&mut self, step: &Step) {
        match step {
            Step::Update {
                status,
                session,
                path,
            } => {
                self.monitor
                    .update(MonitorInputs::new(*status, session.clone(), path.clone()));
            }
            Step::Wait { secs } => {
                tokio::time::sleep(Duration::from_secs(*secs)).await;
            }
            Step::Unmount => self.monitor.unmount(),
            Step::Render { components, fail } => {
                let rendered = self
                    .boundary
                    .render(|scope| render_nested(scope, components, fail.as_deref()));
                let line = describe(&rendered);
                tracing::info!(outcome = %line, "render pass");
                self.renders.push(line);
            }
            Step::TryAgain => self.boundary.dispatch(RecoveryAction::TryAgain),
            Step::Reload => {
                self.boundary.dispatch(RecoveryAction::Reload);
                // A full reload discards every piece of client state.
                self.captured_before_reload += self.boundary.occurrences();
                self.boundary = build_boundary(self.boundary_config, &self.reported, &self.reloads);
                self.monitor.unmount();
            }
        }
    }

    pub fn summary(&self, scenario: Option<String>) -> ReplaySummary {
        ReplaySummary {
            scenario,
            steps_run: self.steps_run,
            redirects: self.navigator.redirects(),
            renders: self.renders.clone(),
            boundary: BoundarySummary {
                state: if self.boundary.has_fault() {
                    "faulted"
                } else {
                    "healthy"
                },
                faults_captured: self.captured_before_reload + self.boundary.occurrences(),
                faults_reported: self.reported.get(),
                last_fault: self.boundary.fault().map(|f| f.message().to_string()),
            },
            reloads: self.reloads.get(),
        }
    }

    #[cfg(test)]
    fn monitor(&self) -> &SessionLivenessMonitor {
        &self.monitor
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn build_boundary(
    config: BoundaryConfig,
    reported: &Rc<Cell<usize>>,
    reloads: &Rc<Cell<u32>>,
) -> FaultBoundary<String> {
    let reported = Rc::clone(reported);
    let reloads = Rc::clone(reloads);
    FaultBoundary::new(config)
        .with_reporter(move |fault: &RenderFault, info: &ComponentStack| {
            reported.set(reported.get() + 1);
            tracing::warn!(
                fault = %fault,
                component = info.innermost().unwrap_or("<root>"),
                "render fault reported"
            );
        })
        .with_reloader(move || {
            reloads.set(reloads.get() + 1);
            tracing::info!("full reload: discarding client state");
        })
}

/// Render `components` nested inside one another, failing in the innermost
/// one when `fail` is set.
fn render_nested(
    scope: &mut RenderScope,
    components: &[String],
    fail: Option<&str>,
) -> std::result::Result<String, RenderFault> {
    match components.split_first() {
        Some((head, rest)) => scope.within(head, |scope| {
            let inner = render_nested(scope, rest, fail)?;
            Ok(if inner.is_empty() {
                head.clone()
            } else {
                format!("{head} > {inner}")
            })
        }),
        None => match fail {
            Some(message) => Err(RenderFault::new(message)),
            None => Ok(String::new()),
        },
    }
}

fn describe(rendered: &Rendered<String>) -> String {
    match rendered {
        Rendered::Children(view) => format!("children: {view}"),
        Rendered::CustomFallback(view) => format!("fallback: {view}"),
        Rendered::DefaultFallback(view) => format!("fallback: {}", view.message),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
