//! Protected-route matching.
//!
//! A [`RouteGuard`] decides whether the session liveness monitor applies to a
//! path. Patterns are an explicit tagged representation ([`RoutePattern`])
//! evaluated by a small matcher; nothing is compiled at runtime.

use std::fmt;
use std::str::FromStr;

use crate::error::{GuardError, Result};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Static prefixes that always require a live session.
pub const DEFAULT_PROTECTED_PREFIXES: [&str; 4] = ["/dashboard", "/profile", "/instructor", "/admin"];

/// The lesson-player route: `/courses/<course-id>/learn`.
pub const LESSON_PLAYER_BEFORE: &str = "/courses/";
pub const LESSON_PLAYER_AFTER: &str = "/learn";

/// Placeholder accepted by [`RoutePattern::from_str`] for one dynamic segment.
const WILDCARD: &str = "*";

// ── RoutePattern ──────────────────────────────────────────────────────────────

/// A single protected-route rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    /// Matches any path that starts with the value.
    Prefix(String),
    /// Matches `before` + one non-empty segment without `/` + `after`,
    /// followed by the end of the path or a `/`, `?` or `#` boundary.
    WildcardSegment { before: String, after: String },
}

impl RoutePattern {
    pub fn prefix(value: impl Into<String>) -> Self {
        RoutePattern::Prefix(value.into())
    }

    pub fn wildcard(before: impl Into<String>, after: impl Into<String>) -> Self {
        RoutePattern::WildcardSegment {
            before: before.into(),
            after: after.into(),
        }
    }

    /// Return `true` when `path` satisfies this pattern. Total and pure.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            RoutePattern::Prefix(value) => path.starts_with(value.as_str()),
            RoutePattern::WildcardSegment { before, after } => {
                let Some(remainder) = path.strip_prefix(before.as_str()) else {
                    return false;
                };
                let segment_end = remainder.find('/').unwrap_or(remainder.len());
                if segment_end == 0 {
                    return false;
                }
                let Some(tail) = remainder[segment_end..].strip_prefix(after.as_str()) else {
                    return false;
                };
                tail.is_empty() || tail.starts_with(['/', '?', '#'])
            }
        }
    }
}

impl FromStr for RoutePattern {
    type Err = GuardError;

    /// Parse a configured pattern.
    ///
    /// `"/courses/*/learn"` becomes a [`RoutePattern::WildcardSegment`]; any
    /// other absolute path becomes a [`RoutePattern::Prefix`]. The wildcard
    /// must occupy a whole segment and may appear at most once.
    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if !trimmed.starts_with('/') {
            return Err(GuardError::InvalidRoutePattern(value.to_string()));
        }

        match trimmed.matches(WILDCARD).count() {
            0 => Ok(RoutePattern::prefix(trimmed)),
            1 => {
                let (before, after) = trimmed
                    .split_once(WILDCARD)
                    .ok_or_else(|| GuardError::InvalidRoutePattern(value.to_string()))?;
                let whole_segment =
                    before.ends_with('/') && (after.is_empty() || after.starts_with('/'));
                if !whole_segment {
                    return Err(GuardError::InvalidRoutePattern(value.to_string()));
                }
                Ok(RoutePattern::wildcard(before, after))
            }
            _ => Err(GuardError::InvalidRoutePattern(value.to_string())),
        }
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutePattern::Prefix(value) => write!(f, "{value}"),
            RoutePattern::WildcardSegment { before, after } => {
                write!(f, "{before}{WILDCARD}{after}")
            }
        }
    }
}

// ── RouteGuard ────────────────────────────────────────────────────────────────

/// The set of routes on which a live session is enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    patterns: Vec<RoutePattern>,
}

impl RouteGuard {
    pub fn new(patterns: Vec<RoutePattern>) -> Self {
        Self { patterns }
    }

    /// The default guard extended with additional configured patterns.
    pub fn with_extra(extra: impl IntoIterator<Item = RoutePattern>) -> Self {
        let mut guard = Self::default();
        for pattern in extra {
            if !guard.patterns.contains(&pattern) {
                guard.patterns.push(pattern);
            }
        }
        guard
    }

    /// Return `true` when any pattern matches `path`.
    pub fn is_protected(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    pub fn patterns(&self) -> &[RoutePattern] {
        &self.patterns
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        let mut patterns: Vec<RoutePattern> = DEFAULT_PROTECTED_PREFIXES
            .iter()
            .map(|p| RoutePattern::prefix(*p))
            .collect();
        patterns.push(RoutePattern::wildcard(LESSON_PLAYER_BEFORE, LESSON_PLAYER_AFTER));
        Self { patterns }
    }
}

/// Check `path` against the default protected-route set.
pub fn is_protected(path: &str) -> bool {
    RouteGuard::default().is_protected(path)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
