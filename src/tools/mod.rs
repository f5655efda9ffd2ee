//! Tool Registry (C4), Tool Executor (C5), and Shell Safety Gate (C6).

pub mod browser;
pub mod executor;
pub mod registry;
pub mod shell;
pub mod shell_gate;
pub mod web_search;

pub use executor::{dispatch, ToolOutcome};
pub use registry::ToolRegistry;
