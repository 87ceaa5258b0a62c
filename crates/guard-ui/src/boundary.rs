//! Render-fault boundary.
//!
//! A [`FaultBoundary`] wraps the rendering of a subtree. A fault raised while
//! the children render (an `Err` or a panic) moves the boundary from
//! Healthy to Faulted; the subtree is replaced by a fallback until the user
//! asks to try again. Faults never escape the boundary.
//!
//! Capture happens in two ordered steps, mirroring how the diagnostic payload
//! may arrive after the error itself:
//! 1. [`FaultBoundary::capture`] records the fault.
//! 2. [`FaultBoundary::record_info`] attaches the component stack and reports
//!    the fault, once per occurrence.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use thiserror::Error;

use crate::fallback::{FallbackView, RecoveryAction};

// ── Fault types ───────────────────────────────────────────────────────────────

/// A failure raised while rendering a subtree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RenderFault {
    message: String,
}

impl RenderFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Build a fault from a caught panic payload.
    fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "render panicked".to_string()
        };
        Self { message }
    }
}

/// Nested views that were rendering when a fault occurred, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComponentStack {
    frames: Vec<String>,
}

impl ComponentStack {
    pub fn new(frames: Vec<String>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The view that was rendering when the fault occurred.
    pub fn innermost(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }
}

impl fmt::Display for ComponentStack {
    /// Innermost first, one `in <View>` line per frame.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in self.frames.iter().rev() {
            write!(f, "\n    in {frame}")?;
        }
        Ok(())
    }
}

/// Tracks which nested view is rendering.
///
/// Children wrap each nested view in [`RenderScope::within`]; when a view
/// fails, its frame stays on the stack so the boundary can report where the
/// fault happened.
#[derive(Debug, Default)]
pub struct RenderScope {
    stack: Vec<String>,
}

impl RenderScope {
    pub fn within<T>(
        &mut self,
        component: &str,
        render: impl FnOnce(&mut RenderScope) -> Result<T, RenderFault>,
    ) -> Result<T, RenderFault> {
        self.stack.push(component.to_string());
        let result = render(self);
        if result.is_ok() {
            self.stack.pop();
        }
        result
    }

    pub fn component_stack(&self) -> ComponentStack {
        ComponentStack::new(self.stack.clone())
    }
}

// ── Boundary state ────────────────────────────────────────────────────────────

/// A captured fault and its diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultRecord {
    fault: RenderFault,
    info: Option<ComponentStack>,
    /// 1-based count of faults this boundary has captured.
    occurrence: u64,
    reported: bool,
}

impl FaultRecord {
    pub fn fault(&self) -> &RenderFault {
        &self.fault
    }

    pub fn info(&self) -> Option<&ComponentStack> {
        self.info.as_ref()
    }

    pub fn occurrence(&self) -> u64 {
        self.occurrence
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryState {
    Healthy,
    Faulted(FaultRecord),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundaryConfig {
    /// Show raw fault detail in the default fallback and log captured faults.
    pub dev_mode: bool,
}

/// What the boundary produced for one render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<V> {
    Children(V),
    CustomFallback(V),
    DefaultFallback(FallbackView),
}

impl<V> Rendered<V> {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, Rendered::Children(_))
    }
}

// ── Collaborator seams ────────────────────────────────────────────────────────

/// Receives each captured fault with its component stack.
pub trait FaultReporter {
    fn report(&mut self, fault: &RenderFault, info: &ComponentStack);
}

impl<F> FaultReporter for F
where
    F: FnMut(&RenderFault, &ComponentStack),
{
    fn report(&mut self, fault: &RenderFault, info: &ComponentStack) {
        self(fault, info)
    }
}

/// Performs a full reload that discards all client-side state.
pub trait Reloader {
    fn reload(&self);
}

impl<F> Reloader for F
where
    F: Fn(),
{
    fn reload(&self) {
        self()
    }
}

type CustomFallbackFn<V> = Box<dyn Fn(&RenderFault, Option<&ComponentStack>) -> V>;

// ── FaultBoundary ─────────────────────────────────────────────────────────────

/// Two-state (Healthy/Faulted) wrapper around a rendering subtree.
pub struct FaultBoundary<V> {
    config: BoundaryConfig,
    state: BoundaryState,
    occurrences: u64,
    fallback: Option<CustomFallbackFn<V>>,
    reporter: Option<Box<dyn FaultReporter>>,
    reloader: Option<Box<dyn Reloader>>,
}

impl<V> FaultBoundary<V> {
    pub fn new(config: BoundaryConfig) -> Self {
        Self {
            config,
            state: BoundaryState::Healthy,
            occurrences: 0,
            fallback: None,
            reporter: None,
            reloader: None,
        }
    }

    /// Replace the default fallback view with a caller-supplied one.
    pub fn with_fallback(
        mut self,
        fallback: impl Fn(&RenderFault, Option<&ComponentStack>) -> V + 'static,
    ) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn with_reporter(mut self, reporter: impl FaultReporter + 'static) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    pub fn with_reloader(mut self, reloader: impl Reloader + 'static) -> Self {
        self.reloader = Some(Box::new(reloader));
        self
    }

    // ── Rendering ─────────────────────────────────────────────────────────

    /// Render the children, or the fallback while faulted.
    ///
    /// Children are not invoked while the boundary is faulted. A fault they
    /// raise is captured, reported, and answered with the fallback.
    pub fn render<F>(&mut self, children: F) -> Rendered<V>
    where
        F: FnOnce(&mut RenderScope) -> Result<V, RenderFault>,
    {
        if let BoundaryState::Faulted(record) = &self.state {
            return self.fallback_for(&record.fault, record.info.as_ref());
        }

        let mut scope = RenderScope::default();
        let fault = match panic::catch_unwind(AssertUnwindSafe(|| children(&mut scope))) {
            Ok(Ok(view)) => return Rendered::Children(view),
            Ok(Err(fault)) => fault,
            Err(payload) => RenderFault::from_panic(payload.as_ref()),
        };

        let stack = scope.component_stack();
        let view = self.fallback_for(&fault, Some(&stack));
        self.capture(fault);
        self.record_info(stack);
        view
    }

    // ── State transitions ─────────────────────────────────────────────────

    /// First capture step: enter Faulted with `fault` and no diagnostics yet.
    pub fn capture(&mut self, fault: RenderFault) {
        self.occurrences += 1;
        tracing::debug!(occurrence = self.occurrences, "render fault captured");
        self.state = BoundaryState::Faulted(FaultRecord {
            fault,
            info: None,
            occurrence: self.occurrences,
            reported: false,
        });
    }

    /// Second capture step: attach the component stack and report the fault.
    ///
    /// The reporter runs at most once per occurrence. Ignored while healthy.
    pub fn record_info(&mut self, info: ComponentStack) {
        let BoundaryState::Faulted(record) = &mut self.state else {
            tracing::trace!("fault info received while healthy; ignoring");
            return;
        };

        if self.config.dev_mode {
            tracing::error!(
                fault = %record.fault,
                component = innermost_component(&info),
                component_stack = %info,
                "render fault in subtree"
            );
        }

        if !record.reported {
            record.reported = true;
            if let Some(reporter) = self.reporter.as_mut() {
                reporter.report(&record.fault, &info);
            }
        }
        record.info = Some(info);
    }

    /// Leave Faulted, clearing every fault field. The next render retries
    /// the children.
    pub fn reset(&mut self) {
        if let BoundaryState::Faulted(record) = &self.state {
            tracing::info!(occurrence = record.occurrence, "boundary reset; retrying render");
            self.state = BoundaryState::Healthy;
        }
    }

    /// Full reload, regardless of the boundary's own state.
    pub fn reload(&self) {
        match &self.reloader {
            Some(reloader) => {
                tracing::info!(has_fault = self.has_fault(), "hard reload requested");
                reloader.reload();
            }
            None => tracing::warn!("hard reload requested but no reloader is configured"),
        }
    }

    pub fn dispatch(&mut self, action: RecoveryAction) {
        match action {
            RecoveryAction::TryAgain => self.reset(),
            RecoveryAction::Reload => self.reload(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn state(&self) -> &BoundaryState {
        &self.state
    }

    pub fn has_fault(&self) -> bool {
        matches!(self.state, BoundaryState::Faulted(_))
    }

    pub fn fault(&self) -> Option<&RenderFault> {
        match &self.state {
            BoundaryState::Faulted(record) => Some(&record.fault),
            BoundaryState::Healthy => None,
        }
    }

    pub fn fault_info(&self) -> Option<&ComponentStack> {
        match &self.state {
            BoundaryState::Faulted(record) => record.info.as_ref(),
            BoundaryState::Healthy => None,
        }
    }

    /// Total faults captured over the boundary's lifetime.
    pub fn occurrences(&self) -> u64 {
        self.occurrences
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn fallback_for(&self, fault: &RenderFault, info: Option<&ComponentStack>) -> Rendered<V> {
        match &self.fallback {
            Some(custom) => Rendered::CustomFallback(custom(fault, info)),
            None => Rendered::DefaultFallback(FallbackView::new(fault, info, self.config.dev_mode)),
        }
    }
}

fn innermost_component(info: &ComponentStack) -> &str {
    info.innermost().unwrap_or("<root>")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FALLBACK_HEADING;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type ReportLog = Rc<RefCell<Vec<(String, ComponentStack)>>>;

    // ── helpers ───────────────────────────────────────────────────────────

    fn reporting_boundary(dev_mode: bool) -> (FaultBoundary<String>, ReportLog) {
        let log: ReportLog = Rc::default();
        let sink = Rc::clone(&log);
        let boundary = FaultBoundary::new(BoundaryConfig { dev_mode }).with_reporter(
            move |fault: &RenderFault, info: &ComponentStack| {
                sink.borrow_mut().push((fault.message().to_string(), info.clone()));
            },
        );
        (boundary, log)
    }

    fn course_page(scope: &mut RenderScope) -> Result<String, RenderFault> {
        scope.within("CoursePage", |scope| {
            let reviews = scope.within("ReviewList", |_| Ok("3 reviews".to_string()))?;
            Ok(format!("Intro to Rust ({reviews})"))
        })
    }

    fn broken_course_page(scope: &mut RenderScope) -> Result<String, RenderFault> {
        scope.within("CoursePage", |scope| {
            scope.within("ReviewList", |_| Err(RenderFault::new("rating is NaN")))
        })
    }

    // ── healthy rendering ─────────────────────────────────────────────────

    #[test]
    fn test_healthy_render_returns_children() {
        let (mut boundary, log) = reporting_boundary(false);
        let rendered = boundary.render(course_page);

        assert_eq!(rendered, Rendered::Children("Intro to Rust (3 reviews)".to_string()));
        assert!(!boundary.has_fault());
        assert!(log.borrow().is_empty());
    }

    // ── fault capture ─────────────────────────────────────────────────────

    #[test]
    fn test_fault_enters_faulted_and_shows_fallback() {
        let (mut boundary, log) = reporting_boundary(false);
        let rendered = boundary.render(broken_course_page);

        let Rendered::DefaultFallback(view) = rendered else {
            panic!("expected default fallback");
        };
        assert_eq!(view.heading, FALLBACK_HEADING);
        assert_eq!(view.message, "rating is NaN");
        assert!(view.detail.is_none());

        assert!(boundary.has_fault());
        assert_eq!(boundary.occurrences(), 1);
        assert_eq!(boundary.fault().map(RenderFault::message), Some("rating is NaN"));
        assert_eq!(
            boundary.fault_info().map(|s| s.frames().to_vec()),
            Some(vec!["CoursePage".to_string(), "ReviewList".to_string()])
        );
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0].0, "rating is NaN");
    }

    #[test]
    fn test_faulted_boundary_does_not_rerender_children_or_rereport() {
        let (mut boundary, log) = reporting_boundary(false);
        boundary.render(broken_course_page);

        let calls = Cell::new(0);
        let rendered = boundary.render(|_| {
            calls.set(calls.get() + 1);
            Ok("unreachable".to_string())
        });

        assert!(rendered.is_fallback());
        assert_eq!(calls.get(), 0);
        assert_eq!(boundary.occurrences(), 1);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_panic_in_children_is_captured() {
        let (mut boundary, log) = reporting_boundary(false);
        let rendered = boundary.render(|scope| {
            scope.within("CertificateCard", |_| -> Result<String, RenderFault> {
                panic!("certificate has no issue date")
            })
        });

        assert!(rendered.is_fallback());
        assert_eq!(
            boundary.fault().map(RenderFault::message),
            Some("certificate has no issue date")
        );
        assert_eq!(
            boundary.fault_info().and_then(ComponentStack::innermost),
            Some("CertificateCard")
        );
        assert_eq!(log.borrow().len(), 1);
    }

    // ── two-phase capture ─────────────────────────────────────────────────

    #[test]
    fn test_info_arrives_after_fault() {
        let (mut boundary, log) = reporting_boundary(false);

        boundary.capture(RenderFault::new("late info"));
        assert!(boundary.has_fault());
        assert!(boundary.fault_info().is_none());
        assert!(log.borrow().is_empty());

        let stack = ComponentStack::new(vec!["Dashboard".to_string()]);
        boundary.record_info(stack.clone());
        assert_eq!(boundary.fault_info(), Some(&stack));
        assert_eq!(log.borrow().len(), 1);

        // A repeated notification for the same occurrence is not re-reported.
        boundary.record_info(stack);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_record_info_while_healthy_is_ignored() {
        let (mut boundary, log) = reporting_boundary(false);
        boundary.record_info(ComponentStack::new(vec!["Tabs".to_string()]));
        assert_eq!(boundary.state(), &BoundaryState::Healthy);
        assert!(log.borrow().is_empty());
    }

    // ── recovery ──────────────────────────────────────────────────────────

    #[test]
    fn test_try_again_returns_to_healthy_and_rerenders() {
        let (mut boundary, _log) = reporting_boundary(false);
        boundary.render(broken_course_page);
        assert!(boundary.has_fault());

        boundary.dispatch(RecoveryAction::TryAgain);
        assert_eq!(boundary.state(), &BoundaryState::Healthy);
        assert!(boundary.fault().is_none());
        assert!(boundary.fault_info().is_none());

        let rendered = boundary.render(course_page);
        assert!(!rendered.is_fallback());

        // Resetting a healthy boundary is a no-op.
        boundary.reset();
        assert!(!boundary.render(course_page).is_fallback());
    }

    #[test]
    fn test_recurring_fault_is_reported_per_occurrence() {
        let (mut boundary, log) = reporting_boundary(false);
        boundary.render(broken_course_page);
        boundary.reset();
        boundary.render(broken_course_page);

        assert!(boundary.has_fault());
        assert_eq!(boundary.occurrences(), 2);
        assert_eq!(
            match boundary.state() {
                BoundaryState::Faulted(record) => record.occurrence(),
                BoundaryState::Healthy => 0,
            },
            2
        );
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_reload_runs_regardless_of_state() {
        let reloads = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&reloads);
        let mut boundary: FaultBoundary<String> = FaultBoundary::new(BoundaryConfig::default())
            .with_reloader(move || counter.set(counter.get() + 1));

        boundary.dispatch(RecoveryAction::Reload);
        boundary.render(broken_course_page);
        boundary.dispatch(RecoveryAction::Reload);

        assert_eq!(reloads.get(), 2);
        // Reload does not touch the boundary's own state.
        assert!(boundary.has_fault());
    }

    #[test]
    fn test_reload_without_reloader_is_harmless() {
        let boundary: FaultBoundary<String> = FaultBoundary::new(BoundaryConfig::default());
        boundary.reload();
        assert!(!boundary.has_fault());
    }

    // ── fallbacks ─────────────────────────────────────────────────────────

    #[test]
    fn test_custom_fallback_replaces_default() {
        let mut boundary = FaultBoundary::new(BoundaryConfig::default())
            .with_fallback(|fault: &RenderFault, _: Option<&ComponentStack>| {
                format!("reviews unavailable: {fault}")
            });

        let rendered = boundary.render(broken_course_page);
        assert_eq!(
            rendered,
            Rendered::CustomFallback("reviews unavailable: rating is NaN".to_string())
        );
    }

    #[test]
    fn test_dev_mode_includes_detail() {
        let (mut boundary, _log) = reporting_boundary(true);
        let Rendered::DefaultFallback(view) = boundary.render(broken_course_page) else {
            panic!("expected default fallback");
        };
        let detail = view.detail.expect("dev mode detail");
        assert!(detail.contains("rating is NaN"));
        assert!(detail.contains("in ReviewList"));
    }

    // ── supporting types ──────────────────────────────────────────────────

    #[test]
    fn test_component_stack_display_is_innermost_first() {
        let stack = ComponentStack::new(vec!["Layout".to_string(), "ProgressBar".to_string()]);
        assert_eq!(stack.to_string(), "\n    in ProgressBar\n    in Layout");
        assert_eq!(ComponentStack::default().to_string(), "");
    }

    #[test]
    fn test_render_scope_pops_successful_frames() {
        let mut scope = RenderScope::default();
        scope
            .within("Tabs", |s| s.within("Badge", |_| Ok(())))
            .unwrap();
        assert!(scope.component_stack().is_empty());
    }
}
