//! xDS control-plane management server: process entrypoint modules. The
//! core data model, caches, and watcher logic live in the `xds-model`,
//! `xds-cache`, and `xds-watch` workspace crates; this crate wires them
//! together into a runnable binary.

pub mod admin;
pub mod ads;
pub mod config;
pub mod metrics;
pub mod telemetry;
