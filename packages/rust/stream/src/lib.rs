//! Asynchronous value stages for Courseware screens.
//!
//! This crate provides:
//! - [`BackedStage`]: a value slot fed by the most recently bound source
//! - [`Listener`] / [`Subscription`]: owner-scoped result callbacks
//! - [`join_ordered`]: concurrent, ordered, fail-fast joins

pub mod join;
pub mod stage;

pub use join::join_ordered;
pub use stage::{BackedStage, Listener, StageResult, Subscription};
