//! # Metagraph Runtime
//!
//! Builds a ready-to-use [`MetagraphRuntime`] from a single `metagraph.yaml`:
//! tracing is initialised once, the `core` plugin and every enabled plugin
//! bundle are registered, and a lazy resolver is wired to the configured
//! scheduler.

mod bootstrap;

pub use bootstrap::{BootstrapError, MetagraphRuntime};
