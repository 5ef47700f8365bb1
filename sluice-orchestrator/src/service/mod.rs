//! Service Module
//!
//! Run bookkeeping and scheduling behind the HTTP layer.

pub mod registry;
pub mod scheduler;

pub use registry::RunRegistry;
pub use scheduler::{RunHandle, RunScheduler};
