//! Scope Module
//!
//! Per-holder object lifecycles: creation on first request, destruction when
//! the holder ends or is evicted by the registry's capacity bound.

mod child_store;
mod destroyer;
mod registry;
mod stats;

pub use child_store::ChildStore;
pub use destroyer::{DropOnly, Destroyer};
pub use registry::ScopeRegistry;
pub use stats::ScopeStats;

// == Public Constants ==
/// Default bound on concurrently active scopes per registry
pub const DEFAULT_MAX_ACTIVE_SCOPES: usize = 25;
