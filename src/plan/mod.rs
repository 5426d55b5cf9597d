//! Build plan generation
//!
//! One [`BuildJob`] per build unit. A job carries everything the b2 adapter
//! needs: the `user-config.jam` toolset definition, the feature flags, the
//! `--with-<lib>` selection and where to stage the results.

use std::path::{Path, PathBuf};

use boost_catalog::{physical_archives, Arch, BuildUnit, PlatformCatalog};
use serde::Serialize;

use crate::options::{LibrarySet, PythonLink, ResolvedConfig};

/// Directory layout and knobs shared by every job of a run.
#[derive(Debug, Clone)]
pub struct PlanSettings {
    /// Root of all build output (stage, intermediates, logs, markers).
    pub build_dir: PathBuf,
    /// Prebuilt ICU root, one subdirectory per unit.
    pub icu_dir: PathBuf,
    /// Parallel jobs handed to b2 (`-j`).
    pub jobs: usize,
}

impl PlanSettings {
    /// Stage directory where b2 places a unit's `lib/*.a`.
    pub fn stage_dir(&self, unit: BuildUnit) -> PathBuf {
        self.build_dir.join("stage").join(unit.id())
    }

    /// Universal (per-platform) stage directory used by the packager.
    pub fn family_dir(&self, platform: boost_catalog::Platform) -> PathBuf {
        self.build_dir.join("stage").join(platform.as_str())
    }
}

/// One b2 invocation.
#[derive(Debug, Clone, Serialize)]
pub struct BuildJob {
    pub unit: BuildUnit,
    /// Toolset version name, used as `toolset=darwin-<toolset>`.
    pub toolset: String,
    pub sysroot: PathBuf,
    pub compiler_flags: Vec<String>,
    pub linker_flags: Vec<String>,
    /// Contents of the job's `user-config.jam`.
    pub b2_config: String,
    /// Feature and option flags, before the library selection.
    pub b2_flags: Vec<String>,
    /// `--with-<lib>` per requested library.
    pub with_flags: Vec<String>,
    pub libraries: LibrarySet,
    /// Static archive names (`boost_<name>`) the job is expected to stage.
    pub archives: Vec<String>,
    pub stage_dir: PathBuf,
    pub user_config_path: PathBuf,
    pub log_path: PathBuf,
}

impl BuildJob {
    /// Full b2 argument list.
    pub fn b2_args(&self) -> Vec<String> {
        let mut args = self.b2_flags.clone();
        args.extend(self.with_flags.iter().cloned());
        args.push("stage".to_string());
        args
    }

    /// Directory holding the unit's static archives after a successful build.
    pub fn lib_dir(&self) -> PathBuf {
        self.stage_dir.join("lib")
    }
}

/// Ordered list of jobs for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildPlan {
    pub jobs: Vec<BuildJob>,
}

impl BuildPlan {
    /// Generate one job per requested unit, in canonical unit order.
    pub fn generate(
        resolved: &ResolvedConfig,
        catalog: &PlatformCatalog,
        settings: &PlanSettings,
    ) -> Self {
        let jobs = resolved
            .platforms
            .units()
            .map(|unit| job_for_unit(unit, resolved, catalog, settings))
            .collect();
        Self { jobs }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

fn job_for_unit(
    unit: BuildUnit,
    resolved: &ResolvedConfig,
    catalog: &PlatformCatalog,
    settings: &PlanSettings,
) -> BuildJob {
    let toolset = unit.id().replace('-', "_");
    let sysroot = catalog.sdk_root(unit.platform);

    let mut compiler_flags = vec![
        "-arch".to_string(),
        unit.arch.as_str().to_string(),
        "-isysroot".to_string(),
        sysroot.display().to_string(),
    ];
    compiler_flags.extend(
        catalog
            .version_flag(unit)
            .split_whitespace()
            .map(str::to_string),
    );
    compiler_flags.push("-fvisibility=hidden".to_string());
    compiler_flags.push("-fvisibility-inlines-hidden".to_string());
    compiler_flags.push(cxx_standard(&resolved.libraries).to_string());

    let mut linker_flags = Vec::new();
    if let Some(python) = &resolved.python {
        compiler_flags.push(format!("-I{}", python.include_dir.display()));
        linker_flags.push(format!("-L{}", python.lib_dir.display()));
        linker_flags.push(format!("-l{}", python.link_name));
    }

    let b2_config = user_config(&toolset, &compiler_flags, &linker_flags, resolved.python.as_ref());

    let stage_dir = settings.stage_dir(unit);
    let intermediate_dir = settings.build_dir.join("tmp").join(unit.id());
    let user_config_path = settings
        .build_dir
        .join("config")
        .join(format!("{}.jam", unit.id()));

    let mut b2_flags = vec![
        format!("-j{}", settings.jobs),
        format!("--stagedir={}", stage_dir.display()),
        format!("--build-dir={}", intermediate_dir.display()),
        format!("--user-config={}", user_config_path.display()),
        format!("toolset=darwin-{toolset}"),
        "address-model=64".to_string(),
        format!("architecture={}", unit.arch.b2_architecture()),
        format!("abi={}", unit.arch.b2_abi()),
    ];
    if unit.arch == Arch::Arm64 {
        b2_flags.push("instruction-set=arm64".to_string());
    }
    b2_flags.extend(
        ["binary-format=mach-o", "threading=multi", "link=static", "variant=release"]
            .iter()
            .map(|f| f.to_string()),
    );
    if let Some(python) = resolved.python.as_ref().filter(|p| !p.version.is_empty()) {
        b2_flags.push(format!("python={}", python.version));
    }
    if resolved.libraries.contains("locale") {
        b2_flags.push("boost.locale.icu=on".to_string());
        b2_flags.push("boost.locale.iconv=off".to_string());
        b2_flags.push(format!(
            "-sICU_PATH={}",
            settings.icu_dir.join(unit.id()).display()
        ));
    }

    let with_flags = resolved
        .libraries
        .iter()
        .map(|lib| format!("--with-{lib}"))
        .collect();
    let archives = expected_archives(resolved);

    BuildJob {
        unit,
        toolset,
        sysroot,
        compiler_flags,
        linker_flags,
        b2_config,
        b2_flags,
        with_flags,
        libraries: resolved.libraries.clone(),
        archives,
        stage_dir,
        user_config_path,
        log_path: settings.build_dir.join("logs").join(format!("{}.log", unit.id())),
    }
}

/// Physical archives for every requested library, in library order.
pub fn expected_archives(resolved: &ResolvedConfig) -> Vec<String> {
    resolved
        .libraries
        .iter()
        .flat_map(|lib| physical_archives(lib, resolved.python_suffix()))
        .collect()
}

/// cobalt needs C++20 coroutines; everything else builds as C++17.
fn cxx_standard(libraries: &LibrarySet) -> &'static str {
    if libraries.contains("cobalt") {
        "-std=c++20"
    } else {
        "-std=c++17"
    }
}

/// Quote a jam token if it contains whitespace.
fn jam_token(s: &str) -> String {
    if s.chars().any(char::is_whitespace) {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        s.to_string()
    }
}

fn jam_path(p: &Path) -> String {
    jam_token(&p.display().to_string())
}

/// Render the `user-config.jam` toolset definition for a job.
fn user_config(
    toolset: &str,
    compiler_flags: &[String],
    linker_flags: &[String],
    python: Option<&PythonLink>,
) -> String {
    let command: Vec<String> = std::iter::once("clang++".to_string())
        .chain(compiler_flags.iter().map(|f| jam_token(f)))
        .collect();
    let mut options = vec!["<striper>".to_string()];
    options.extend(linker_flags.iter().map(|f| format!("<linkflags>{}", jam_token(f))));

    let mut config = format!(
        "using darwin : {toolset}\n    : {}\n    : {}\n    ;\n",
        command.join(" "),
        options.join(" ")
    );
    if let Some(python) = python {
        config.push_str(&format!(
            "using python : {} : : {} : {} ;\n",
            python.version,
            jam_path(&python.include_dir),
            jam_path(&python.lib_dir)
        ));
    }
    config
}
