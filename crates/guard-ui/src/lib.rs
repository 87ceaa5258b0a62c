//! View-side guards for the LearnHub client.
//!
//! [`boundary::FaultBoundary`] localises rendering failures to a subtree and
//! offers manual recovery; [`fallback::FallbackView`] is what it shows by
//! default while faulted.

pub mod boundary;
pub mod fallback;

pub use boundary::{
    BoundaryConfig, BoundaryState, ComponentStack, FaultBoundary, RenderFault, RenderScope,
    Rendered,
};
pub use fallback::{FallbackView, RecoveryAction};
