//! permguard - CI gate for workflow token permissions
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`PERMGUARD_*`)
//! 3. Usage hint file (`--usage`)
//! 4. Config file (`permguard.toml`, or `--config`)
//! 5. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `PERMGUARD_ORG_DEFAULT`: Organization default permissions
//!   (`read-all`, `write-all`, or `contents=read,issues=write`)
//! - `PERMGUARD_THRESHOLD`: Gate threshold (`info`/`warning`/`critical`)
//! - `PERMGUARD_ASSUME_FALLBACK`: Assume the platform's write-all fallback
//!   for undeclared workflows (`true`/`false`)
//! - `PERMGUARD_FORK_APPROVAL`: Fork pull requests need approval (`true`/`false`)
//!
//! # Exit Status
//!
//! 0 when no finding reaches the threshold, 1 otherwise or on a fatal error.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use permguard_engine::config::{PermissionSpec, DEFAULT_CONFIG_FILE};
use permguard_engine::rules::ALL_RULES;
use permguard_engine::{
    load_organization, load_repository, Analysis, AnalysisInput, ConfigLoader, Engine, Gate,
};
use permguard_types::Severity;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// permguard - CI gate for workflow token permissions
#[derive(Parser, Debug)]
#[command(name = "permguard")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze repositories and gate on the findings.
    Check(CheckArgs),

    /// List all available rules.
    ListRules,

    /// Generate a default permguard.toml.
    Init {
        /// Where to write the file.
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct CheckArgs {
    /// Repository roots (default: current directory).
    repos: Vec<PathBuf>,

    /// Treat every sub-directory with workflows as a repository.
    #[arg(long, value_name = "DIR")]
    org: Option<PathBuf>,

    /// Config file path.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Usage hint file, merged into the config's [usage] table.
    #[arg(long, value_name = "FILE")]
    usage: Option<PathBuf>,

    /// Fail on findings at or above this severity.
    #[arg(long)]
    threshold: Option<Severity>,

    /// Organization default permissions, e.g. `read-all` or `contents=read`.
    #[arg(long, value_name = "SPEC")]
    org_default: Option<String>,

    /// Only run a specific rule.
    #[arg(long)]
    rule: Option<String>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Analyze repositories in parallel.
    #[arg(long)]
    concurrent: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Findings by repository, then the matrix, then the summary.
    Text,
    /// The audit matrix and the summary.
    Matrix,
    /// Summary, findings and matrix as one JSON document.
    Json,
    /// The audit matrix as CSV.
    Csv,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.verbose);

    let result = match cli.command {
        Command::Check(args) => run_check(args).await,
        Command::ListRules => {
            run_list_rules();
            Ok(ExitCode::SUCCESS)
        }
        Command::Init { path } => run_init(&path),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

// Logs go to stderr so stdout stays machine-readable.
// Filter: --debug > --verbose > RUST_LOG env > default "warn"
fn init_tracing(debug: bool, verbose: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .init();
}

async fn run_check(args: CheckArgs) -> Result<ExitCode> {
    let mut loader = ConfigLoader::new().with_file(&args.config);
    if let Some(ref usage) = args.usage {
        loader = loader.with_usage_file(usage);
    }
    let mut config = loader.load().context("failed to load configuration")?;

    if let Some(ref spec) = args.org_default {
        config.organization.default_permissions = Some(PermissionSpec::from_compact(spec));
    }
    if let Some(threshold) = args.threshold {
        config.gate.threshold = threshold;
    }
    let gate = Gate::new(config.gate.threshold);

    let engine = Engine::from_config(&config, args.rule.as_deref())?;
    info!(rules = ?engine.rules().names(), threshold = %gate.threshold, "Engine ready");

    let input = collect_input(&args)?;
    let analysis = if args.concurrent {
        engine.analyze_concurrent(input).await
    } else {
        engine.analyze(&input)
    };

    print!("{}", render(&analysis, &gate, args.format)?);
    Ok(ExitCode::from(gate.exit_code(&analysis.report)))
}

fn collect_input(args: &CheckArgs) -> Result<AnalysisInput> {
    let mut input = match args.org {
        Some(ref dir) => load_organization(dir)
            .with_context(|| format!("failed to read organization directory {}", dir.display()))?,
        None => AnalysisInput::new(),
    };

    let repos: Vec<&Path> = if args.repos.is_empty() && args.org.is_none() {
        vec![Path::new(".")]
    } else {
        args.repos.iter().map(PathBuf::as_path).collect()
    };
    for root in repos {
        let (id, docs) = load_repository(root, None)
            .with_context(|| format!("failed to read repository {}", root.display()))?;
        debug!(repository = %id, documents = docs.len(), "Loaded repository");
        input.add_repository(id, docs);
    }
    Ok(input)
}

fn render(analysis: &Analysis, gate: &Gate, format: Format) -> Result<String> {
    let summary = analysis.report.summary(gate);
    let out = match format {
        Format::Text => {
            let mut out = analysis.report.render_text();
            if !analysis.matrix.is_empty() {
                out.push_str(&analysis.matrix.render_text());
                out.push('\n');
            }
            out.push_str(&format!("{summary}\n"));
            out
        }
        Format::Matrix => format!("{}\n{summary}\n", analysis.matrix.render_text()),
        Format::Json => {
            let mut out = analysis.to_json(gate)?;
            out.push('\n');
            out
        }
        Format::Csv => analysis.matrix.render_csv(),
    };
    Ok(out)
}

fn run_list_rules() {
    println!("Available rules:\n");
    for (name, desc) in ALL_RULES {
        println!("  {name}");
        println!("    {desc}\n");
    }
}

const DEFAULT_CONFIG: &str = r#"[organization]
# Baseline token permissions; required.
default_permissions = "read-all"
# Assume the platform's write-all token for undeclared push/pull_request workflows.
assume_platform_fallback = true
fork_approval_required = true

# [fallback]
# workflow_dispatch = "write-all"

# [repositories.my-repo]
# default_permissions = { contents = "read" }

# [usage."my-repo/release/publish"]
# contents = "write"
# id-token = "write"

[rules.UnpinnedAction]
enabled = true
trusted_owners = ["actions", "github"]

[gate]
threshold = "critical"
"#;

fn run_init(path: &Path) -> Result<ExitCode> {
    if path.exists() {
        eprintln!("{} already exists", path.display());
        return Ok(ExitCode::FAILURE);
    }
    std::fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    eprintln!("Created {}", path.display());
    Ok(ExitCode::SUCCESS)
}
