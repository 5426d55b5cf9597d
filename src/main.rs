//! boost-xcf CLI
//!
//! Entry point for the `boost-xcf` command-line tool.

use std::error::Error;
use std::path::PathBuf;
use std::process;

use boost_xcf::config::REPO_CONFIG_FILE;
use boost_xcf::{
    host, logging, BuildReport, CliOverrides, EffectiveConfig, Pipeline, PipelineConfig,
    PipelineError, PlatformCatalog, ResolveRequest, SystemTools,
};
use clap::Parser;

#[derive(Parser)]
#[command(name = "boost-xcf")]
#[command(about = "Build Boost as XCFrameworks for Apple platforms", version)]
struct Cli {
    /// Python headers directory (required when building python)
    #[arg(long, value_name = "DIR")]
    python_include: Option<PathBuf>,

    /// Python static library, e.g. libpython3.11.a (required when building python)
    #[arg(long, value_name = "FILE")]
    python_lib: Option<PathBuf>,

    /// Comma-separated libraries to build (default: all)
    #[arg(short = 'l', long = "libs", value_name = "LIBS")]
    libs: Option<String>,

    /// Comma-separated platforms, e.g. "ios,macosx-both,iossim-x86_64"
    #[arg(short = 'p', long = "platforms", value_name = "PLATFORMS")]
    platforms: Option<String>,

    /// Rebuild everything, ignoring previous build state
    #[arg(long)]
    rebuild: bool,

    /// Rebuild ICU (used by locale)
    #[arg(long = "rebuildicu")]
    rebuild_icu: bool,

    /// Config file (default: <project-dir>/boost-xcf.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Project directory holding the Podfile (default: current directory)
    #[arg(long, value_name = "DIR")]
    project_dir: Option<PathBuf>,

    /// Build directory
    #[arg(long, value_name = "DIR")]
    build_dir: Option<PathBuf>,

    /// Parallel b2 jobs
    #[arg(long, short = 'j')]
    jobs: Option<usize>,

    /// Boost release to build, e.g. 1.87.0 (its checksum must be configured)
    #[arg(long, value_name = "VERSION")]
    boost_version: Option<String>,

    /// Print the plan without building
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Also write a debug log to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("error: cannot open log file: {}", e);
        process::exit(1);
    }

    let json = cli.json;
    match run(cli) {
        Ok(report) => match report_output(&report, json) {
            Ok(text) => print!("{}", text),
            Err(e) => {
                eprintln!("error: cannot serialize report: {}", e);
                process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("error: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            process::exit(e.exit_code());
        }
    }
}

fn run(cli: Cli) -> Result<BuildReport, PipelineError> {
    let project_dir = match cli.project_dir {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(|source| PipelineError::Io {
            path: PathBuf::from("."),
            source,
        })?,
    };
    let config_path = cli
        .config
        .unwrap_or_else(|| project_dir.join(REPO_CONFIG_FILE));

    let overrides = CliOverrides {
        build_dir: cli.build_dir,
        jobs: cli.jobs,
        boost_version: cli.boost_version,
    };
    let effective = EffectiveConfig::build(Some(config_path.as_path()), overrides.to_value())?;

    let request = ResolveRequest {
        libraries: cli.libs,
        platforms: cli.platforms,
        python_include: cli.python_include,
        python_lib: cli.python_lib,
        rebuild: cli.rebuild,
        rebuild_icu: cli.rebuild_icu,
    };
    let config = PipelineConfig::new(project_dir, effective, request)?.with_dry_run(cli.dry_run);

    let host = host::detect();
    let tools = SystemTools::with_developer_dir(host.developer_dir.clone());
    let catalog = PlatformCatalog::new(host, config.settings.min_versions.clone());

    Pipeline::new(config, &catalog, &tools).run()
}

/// Report text for stdout: pretty JSON with `--json`, else the rendered summary.
fn report_output(report: &BuildReport, json: bool) -> Result<String, serde_json::Error> {
    if json {
        serde_json::to_string_pretty(report).map(|text| format!("{}\n", text))
    } else {
        Ok(report.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boost_xcf::RunStatus;

    #[test]
    fn test_parse_short_flags() {
        let cli = Cli::try_parse_from(["boost-xcf", "-l", "atomic,filesystem", "-p", "ios"]).unwrap();
        assert_eq!(cli.libs.as_deref(), Some("atomic,filesystem"));
        assert_eq!(cli.platforms.as_deref(), Some("ios"));
        assert!(!cli.rebuild);
    }

    #[test]
    fn test_parse_long_flags() {
        let cli = Cli::try_parse_from([
            "boost-xcf",
            "--libs=python",
            "--platforms=macosx-both",
            "--python-include",
            "/py/include",
            "--python-lib",
            "/py/lib/libpython3.11.a",
            "--rebuild",
            "--rebuildicu",
        ])
        .unwrap();
        assert_eq!(cli.python_lib, Some(PathBuf::from("/py/lib/libpython3.11.a")));
        assert!(cli.rebuild);
        assert!(cli.rebuild_icu);
    }

    fn up_to_date_report() -> BuildReport {
        BuildReport {
            status: RunStatus::UpToDate,
            libraries: "atomic".into(),
            platforms: "ios-arm64".into(),
            built_units: vec![],
            reused_units: vec![],
            packaged: vec![],
            omitted: vec![],
            headers_copied: 0,
            icu_built: false,
            workspace_regenerated: false,
            finished_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_report_output_json() {
        let text = report_output(&up_to_date_report(), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["status"], "up_to_date");
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_report_output_text() {
        let text = report_output(&up_to_date_report(), false).unwrap();
        assert!(text.starts_with("boost-xcf: up to date"));
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["boost-xcf", "--frobnicate"]).is_err());
        assert!(Cli::try_parse_from(["boost-xcf", "--rebuild-icu"]).is_err());
    }
}
