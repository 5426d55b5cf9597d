//! Pipeline orchestration
//!
//! One run, start to finish:
//! - resolve the request and check the build record
//! - fetch, unpack and bootstrap the Boost sources
//! - build ICU when `locale` needs it
//! - run one b2 job per build unit not covered by its marker
//! - package XCFrameworks and copy headers
//! - regenerate the CocoaPods workspace when a Podfile is present
//!
//! Any failure aborts the run. The build record is deleted before work
//! starts and written back only after everything succeeded.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use boost_catalog::{BuildUnit, PlatformCatalog};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{BuildStateCache, CacheError};
use crate::config::{ConfigError, EffectiveConfig, Settings};
use crate::options::{resolve, ResolveError, ResolveRequest, ResolvedConfig};
use crate::package::{PackageError, PackageReport, PackagedArchive, Packager};
use crate::patch::{patch_instruction_set, PatchError};
use crate::plan::{BuildPlan, PlanSettings};
use crate::tools::{ArchiveFetcher, ExternalTools, FetchError, ToolError};

/// File the effective configuration is written to inside the build directory.
pub const EFFECTIVE_CONFIG_FILE: &str = "effective_config.json";

/// CocoaPods manifest that triggers workspace regeneration.
pub const PODFILE: &str = "Podfile";

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Download(#[from] FetchError),

    #[error("preparing boost sources failed: {0}")]
    Source(#[source] ToolError),

    #[error("ICU build failed: {0}")]
    Icu(#[source] ToolError),

    #[error("build of {unit} failed: {source}")]
    BuildJob {
        unit: String,
        #[source]
        source: ToolError,
    },

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("workspace generation failed: {0}")]
    Workspace(#[source] ToolError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => 1,
            PipelineError::Resolve(ResolveError::MissingSdk { .. }) => 3,
            PipelineError::Resolve(_) => 2,
            PipelineError::Download(_) => 4,
            PipelineError::Source(_) => 4,
            PipelineError::Icu(_) => 5,
            PipelineError::BuildJob { .. } => 5,
            PipelineError::Package(_) => 6,
            PipelineError::Workspace(_) => 7,
            PipelineError::Cache(_) => 1,
            PipelineError::Patch(_) => 1,
            PipelineError::Io { .. } => 1,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding the Podfile; relative settings are anchored here.
    pub project_dir: PathBuf,
    /// Typed settings, already anchored to `project_dir`.
    pub settings: Settings,
    /// Merged configuration, persisted for each non-skipped run.
    pub effective: EffectiveConfig,
    pub request: ResolveRequest,
    /// Plan and report without side effects.
    pub dry_run: bool,
}

impl PipelineConfig {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        effective: EffectiveConfig,
        request: ResolveRequest,
    ) -> PipelineResult<Self> {
        let project_dir = project_dir.into();
        let settings = effective.settings()?.anchored(&project_dir);
        Ok(Self {
            project_dir,
            settings,
            effective,
            request,
            dry_run: false,
        })
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn build_dir(&self) -> &Path {
        &self.settings.paths.build_dir
    }

    pub fn plan_settings(&self) -> PlanSettings {
        PlanSettings {
            build_dir: self.settings.paths.build_dir.clone(),
            icu_dir: self.settings.paths.build_dir.join("icu"),
            jobs: self.settings.jobs,
        }
    }

    /// Unpacked source tree location.
    pub fn source_dir(&self) -> PathBuf {
        self.build_dir().join(self.settings.boost.source_dir_name())
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Build record matched; nothing was done.
    UpToDate,
    /// Plan computed, nothing executed.
    DryRun,
    Built,
}

/// Summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub status: RunStatus,
    pub libraries: String,
    pub platforms: String,
    /// Units b2 ran for (or would run for, in a dry run).
    pub built_units: Vec<String>,
    /// Units whose marker covered the request.
    pub reused_units: Vec<String>,
    pub packaged: Vec<PackagedArchive>,
    pub omitted: Vec<String>,
    /// Header files copied next to the frameworks.
    pub headers_copied: usize,
    pub icu_built: bool,
    pub workspace_regenerated: bool,
    pub finished_at: DateTime<Utc>,
}

impl BuildReport {
    fn new(status: RunStatus, resolved: &ResolvedConfig) -> Self {
        Self {
            status,
            libraries: resolved.libraries.canonical(),
            platforms: resolved.platforms.canonical(),
            built_units: Vec::new(),
            reused_units: Vec::new(),
            packaged: Vec::new(),
            omitted: Vec::new(),
            headers_copied: 0,
            icu_built: false,
            workspace_regenerated: false,
            finished_at: Utc::now(),
        }
    }

    /// Human-readable summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let headline = match self.status {
            RunStatus::UpToDate => "up to date, nothing to do",
            RunStatus::DryRun => "dry run",
            RunStatus::Built => "build complete",
        };
        out.push_str(&format!("boost-xcf: {headline}\n"));
        out.push_str(&format!("  libraries: {}\n", self.libraries));
        out.push_str(&format!("  platforms: {}\n", self.platforms));
        if self.status == RunStatus::UpToDate {
            return out;
        }

        let label = if self.status == RunStatus::DryRun {
            "would build"
        } else {
            "built"
        };
        out.push_str(&format!("  {label}: {}\n", list_or_none(&self.built_units)));
        out.push_str(&format!("  reused: {}\n", list_or_none(&self.reused_units)));
        for package in &self.packaged {
            out.push_str(&format!(
                "  packaged {} [{}]\n",
                package.name,
                package.families.join(",")
            ));
        }
        if !self.omitted.is_empty() {
            out.push_str(&format!("  omitted: {}\n", self.omitted.join(",")));
        }
        if self.headers_copied > 0 {
            out.push_str(&format!("  headers: {} files\n", self.headers_copied));
        }
        if self.workspace_regenerated {
            out.push_str("  workspace regenerated\n");
        }
        out
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(",")
    }
}

/// A configured run against a catalog and a tool adapter.
pub struct Pipeline<'a> {
    config: PipelineConfig,
    catalog: &'a PlatformCatalog,
    tools: &'a dyn ExternalTools,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: PipelineConfig,
        catalog: &'a PlatformCatalog,
        tools: &'a dyn ExternalTools,
    ) -> Self {
        Self {
            config,
            catalog,
            tools,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute the run.
    pub fn run(&self) -> PipelineResult<BuildReport> {
        let resolved = resolve(&self.config.request, self.catalog)?;
        let cache = BuildStateCache::new(self.config.build_dir());

        if cache.should_skip_build(&resolved) {
            info!(
                libraries = %resolved.libraries,
                platforms = %resolved.platforms,
                "build record matches request, skipping"
            );
            return Ok(BuildReport::new(RunStatus::UpToDate, &resolved));
        }

        if self.config.dry_run {
            return Ok(self.dry_run(&resolved, &cache));
        }

        cache.invalidate()?;
        if resolved.rebuild {
            info!("rebuild requested, clearing unit markers");
            cache.clear_units()?;
        }
        self.write_effective_config()?;

        let mut report = BuildReport::new(RunStatus::Built, &resolved);
        let src_dir = self.prepare_sources()?;
        let settings = self.config.plan_settings();
        let icu_units = icu_units_to_build(&resolved, &settings.icu_dir);
        self.provision_icu(&resolved, &icu_units, &settings.icu_dir)?;
        report.icu_built = !icu_units.is_empty();

        let plan = BuildPlan::generate(&resolved, self.catalog, &settings);
        info!(jobs = plan.len(), "generated build plan");

        for job in &plan.jobs {
            let force = resolved.rebuild || icu_units.contains(&job.unit);
            if cache.should_skip_unit(job.unit, &job.libraries, force) {
                info!(unit = %job.unit, "unit already built, reusing");
                report.reused_units.push(job.unit.id());
                continue;
            }

            cache.clear_unit(job.unit)?;
            if job.stage_dir.exists() {
                fs::remove_dir_all(&job.stage_dir).map_err(io_err(&job.stage_dir))?;
            }

            info!(unit = %job.unit, libraries = %job.libraries, "building");
            let patch = patch_instruction_set(&src_dir)?;
            self.tools
                .build(job, &src_dir)
                .map_err(|source| PipelineError::BuildJob {
                    unit: job.unit.id(),
                    source,
                })?;
            patch.restore()?;

            cache.mark_unit_built(job.unit, &job.libraries)?;
            report.built_units.push(job.unit.id());
        }

        let frameworks_dir = &self.config.settings.paths.frameworks_dir;
        let packager = Packager::new(self.tools, &settings, frameworks_dir);
        let PackageReport { packaged, omitted } = packager.package(&resolved)?;
        report.packaged = packaged;
        report.omitted = omitted;
        report.headers_copied = packager.copy_headers(&src_dir)?;

        report.workspace_regenerated = self.generate_workspace()?;
        cache.record_success(&resolved)?;

        report.finished_at = Utc::now();
        info!(
            built = report.built_units.len(),
            reused = report.reused_units.len(),
            packaged = report.packaged.len(),
            "run finished"
        );
        Ok(report)
    }

    fn dry_run(&self, resolved: &ResolvedConfig, cache: &BuildStateCache) -> BuildReport {
        let mut report = BuildReport::new(RunStatus::DryRun, resolved);
        let settings = self.config.plan_settings();
        let icu_units = icu_units_to_build(resolved, &settings.icu_dir);
        report.icu_built = !icu_units.is_empty();

        let plan = BuildPlan::generate(resolved, self.catalog, &settings);
        for job in &plan.jobs {
            debug!(unit = %job.unit, args = ?job.b2_args(), "planned job");
            let force = resolved.rebuild || icu_units.contains(&job.unit);
            if cache.should_skip_unit(job.unit, &job.libraries, force) {
                report.reused_units.push(job.unit.id());
            } else {
                report.built_units.push(job.unit.id());
            }
        }
        report
    }

    fn write_effective_config(&self) -> PipelineResult<()> {
        let build_dir = self.config.build_dir();
        fs::create_dir_all(build_dir).map_err(io_err(build_dir))?;
        let path = build_dir.join(EFFECTIVE_CONFIG_FILE);
        self.config
            .effective
            .write_to_file(&path)
            .map_err(io_err(&path))
    }

    /// Download, unpack and bootstrap the sources as needed.
    fn prepare_sources(&self) -> PipelineResult<PathBuf> {
        let build_dir = self.config.build_dir();
        let src_dir = self.config.source_dir();

        if !src_dir.is_dir() {
            let fetcher = ArchiveFetcher::new(&self.config.settings.boost, build_dir);
            let archive = fetcher.fetch(self.tools)?;
            info!(archive = %archive.display(), "unpacking boost sources");
            self.tools
                .extract(&archive, build_dir)
                .map_err(PipelineError::Source)?;
        } else {
            debug!(src = %src_dir.display(), "sources already unpacked");
        }

        if !src_dir.join("b2").is_file() {
            info!("bootstrapping b2");
            self.tools
                .bootstrap(&src_dir)
                .map_err(PipelineError::Source)?;
        }
        Ok(src_dir)
    }

    /// Build ICU for `units` under `icu_dir`. A forced ICU rebuild starts
    /// from an empty `icu_dir`.
    fn provision_icu(
        &self,
        resolved: &ResolvedConfig,
        units: &[BuildUnit],
        icu_dir: &Path,
    ) -> PipelineResult<()> {
        if units.is_empty() {
            if resolved.libraries.contains("locale") {
                debug!(icu = %icu_dir.display(), "reusing ICU build");
            }
            return Ok(());
        }
        if resolved.rebuild_icu && icu_dir.exists() {
            fs::remove_dir_all(icu_dir).map_err(io_err(icu_dir))?;
        }

        info!(units = units.len(), "building ICU");
        self.tools
            .build_icu(&self.config.settings.icu.script, units, icu_dir)
            .map_err(PipelineError::Icu)?;
        Ok(())
    }

    /// Run `pod install` when the project has a Podfile.
    fn generate_workspace(&self) -> PipelineResult<bool> {
        let project_dir = &self.config.project_dir;
        if !project_dir.join(PODFILE).is_file() {
            debug!(project = %project_dir.display(), "no Podfile, skipping workspace generation");
            return Ok(false);
        }
        info!("regenerating CocoaPods workspace");
        self.tools
            .generate_workspace(project_dir)
            .map_err(PipelineError::Workspace)?;
        Ok(true)
    }
}

/// Units whose ICU prefix must be built before b2 runs.
///
/// Empty unless `locale` is requested. `--rebuildicu` selects every unit,
/// otherwise only units without an `<icu_dir>/<unit>` prefix.
pub fn icu_units_to_build(resolved: &ResolvedConfig, icu_dir: &Path) -> Vec<BuildUnit> {
    if !resolved.libraries.contains("locale") {
        return Vec::new();
    }
    resolved
        .platforms
        .units()
        .filter(|unit| resolved.rebuild_icu || !icu_dir.join(unit.id()).is_dir())
        .collect()
}
