//! # numera
//!
//! Named identifier dispensers behind a small capability surface.
//!
//! A *dispenser* is configured once with a generation algorithm (numeric
//! random with de-duplication, numeric monotonic, alphanumeric random,
//! snowflake, or UUID v4) and a durability strategy that decides how its
//! progress reaches the on-disk snapshot: nothing at all (`memory`),
//! pre-committed segments (`pre-base`), segments plus a periodic checkpoint
//! of the consumed position (`pre-checkpoint`), an immediate save per
//! identifier plus a graceful-shutdown save (`elegant_close`), or segments
//! plus checkpointing plus a graceful-shutdown save (`pre_close`).
//!
//! The [`Registry`] owns the live dispensers and is the only process-wide
//! state: load it from a [`SnapshotStore`] at boot, route `next`/`info`/
//! `delete` calls through it, and call [`Registry::shutdown`] before exit.

mod config;
mod engine;
mod error;
mod factory;
mod kernel;
mod registry;
mod store;
mod time;

pub use crate::config::*;
pub use crate::engine::*;
pub use crate::error::*;
pub use crate::factory::*;
pub use crate::kernel::*;
pub use crate::registry::*;
pub use crate::store::*;
pub use crate::time::*;
