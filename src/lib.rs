//! boost-xcf - Boost XCFrameworks for Apple platforms
//!
//! Downloads a Boost release, builds the requested libraries with b2 for
//! every requested (platform, architecture) pair, and packages the static
//! archives as XCFrameworks. Repeated runs reuse what an earlier run built.

pub mod cache;
pub mod config;
pub mod host;
pub mod logging;
pub mod mock;
pub mod options;
pub mod package;
pub mod patch;
pub mod pipeline;
pub mod plan;
pub mod tools;

pub use boost_catalog::{Arch, BuildUnit, HostEnv, MinVersions, Platform, PlatformCatalog};
pub use cache::BuildStateCache;
pub use config::{CliOverrides, EffectiveConfig, Settings};
pub use options::{resolve, LibrarySet, PlatformSet, ResolveRequest, ResolvedConfig};
pub use pipeline::{BuildReport, Pipeline, PipelineConfig, PipelineError, RunStatus};
pub use plan::{BuildJob, BuildPlan, PlanSettings};
pub use tools::{ExternalTools, SystemTools};
