//! Background Tasks Module
//!
//! Optional periodic work an embedding application may run alongside the
//! caches. Nothing in the engine spawns these on its own.
//!
//! # Tasks
//! - Expired-entry purge: removes expired cache entries at a fixed interval

mod purge;

pub use purge::spawn_purge_task;
