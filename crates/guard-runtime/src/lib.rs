//! Runtime layer of the LearnHub client guards.
//!
//! Hosts the session liveness monitor and the navigation seam it redirects
//! through.

pub mod liveness;
pub mod navigator;

pub use guard_core as core;
