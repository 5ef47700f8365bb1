//! Data Transfer Objects for the orchestrator HTTP API
//!
//! DTOs are the bodies returned by the orchestrator endpoints and consumed
//! by `sluice-client` and the CLI.

pub mod health;
pub mod run;
pub mod webhook;
