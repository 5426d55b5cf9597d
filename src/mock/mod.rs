//! In-process stand-in for the external tools
//!
//! [`MockTools`] implements [`crate::tools::ExternalTools`] without spawning
//! anything. It records every call, serves download payloads from an
//! in-memory table, writes fake static archives where b2 would stage them,
//! and supports per-operation failure injection.

mod failure;
mod tools;

pub use failure::{FailureConfig, FailureInjector};
pub use tools::{MockTools, ToolCall};
