//! Core domain types
//!
//! These types describe what a pipeline is (definition and stages), what
//! triggers it (push notifications) and what happened when it ran (run
//! states, reports and captured output). They are shared between the
//! orchestrator (which schedules runs) and the runner (which executes them).

pub mod output;
pub mod pipeline;
pub mod push;
pub mod run;
