//! The network front end for `numera`: a TCP server speaking a subset of
//! the Redis serialization protocol (RESP).
//!
//! Commands: `hset` (create or reconfigure a dispenser), `get` (next
//! identifier), `info`, `del`, `ping`, `quit`. Everything stateful lives in
//! [`numera::Registry`]; this crate only frames bytes, dispatches commands,
//! and owns the process lifecycle (startup restore, signal-driven graceful
//! shutdown, periodic snapshot flush).

pub mod commands;
pub mod config;
pub mod connection;
pub mod resp;
pub mod server;
