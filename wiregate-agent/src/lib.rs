//! wiregate-agent library surface.
//!
//! The binary in `main.rs` is a thin wrapper; the supervisor and its
//! wiring live here so integration tests can drive the agent with
//! injected publishers and a programmatic shutdown token.

pub mod cli;
pub mod logging;
pub mod metrics_server;
pub mod supervisor;

pub use cli::AgentCli;
pub use supervisor::{Supervisor, SupervisorBuilder};
