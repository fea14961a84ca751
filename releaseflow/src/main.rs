use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use releaseflow::config::{PipelineConfig, DEFAULT_CONFIG_FILE};
use releaseflow::core::{BumpLevel, RunResult, RunStatus};
use releaseflow::pipeline::{ReleasePipeline, RunRequest};
use releaseflow::stages::should_release;
use releaseflow::tools::PinnedTools;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build, sign and publish a native tool for every supported platform.
#[derive(Parser, Debug)]
#[command(
    name = "releaseflow",
    version,
    about,
    after_help = "Examples:\n  releaseflow run --branch main --bump minor\n  releaseflow run --branch main --bump patch --dry-run\n  releaseflow gate --branch feature/x --result success\n  releaseflow targets\n  releaseflow pins"
)]
struct Cli {
    /// Pipeline configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE, env = "RELEASEFLOW_CONFIG")]
    config: PathBuf,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// More logging; repeat for trace output.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build every target, sign, and publish if the gate opens.
    Run {
        /// Branch the revision was built from.
        #[arg(long)]
        branch: String,
        /// Version increment for the release.
        #[arg(long, value_enum)]
        bump: BumpLevel,
        /// Do everything except invoking the release tool.
        #[arg(long)]
        dry_run: bool,
    },

    /// List the registered targets and their asset names.
    Targets,

    /// Evaluate the release gate; exits 0 when a release would be published.
    Gate {
        /// Branch the run is on.
        #[arg(long)]
        branch: String,
        /// Overall result of the run.
        #[arg(long, default_value = "pending")]
        result: RunResult,
    },

    /// Show the pinned signer and release tool.
    Pins,
}

fn init_tracing(format: LogFormat, verbose: u8) {
    let fallback = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("RELEASEFLOW_LOG").unwrap_or_else(|_| fallback.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

async fn run_release(config: PipelineConfig, request: RunRequest) -> Result<bool> {
    let pipeline = ReleasePipeline::new(config)?;
    let report = pipeline.run(&request).await?;
    println!("{}", report.summary());
    Ok(report.is_success())
}

fn run_targets(config: &PipelineConfig) -> Result<bool> {
    let registry = config.registry()?;
    let agents = config.agent_pool();

    for target in registry.list_targets() {
        let availability = if agents.is_available(&target.agent) {
            ""
        } else {
            " (unavailable)"
        };
        let signing = if target.requires_signing { "signed" } else { "unsigned" };
        println!(
            "{:<28} {:<12} {:<9} {}{availability}",
            target.triple,
            target.agent,
            signing,
            target.canonical_name(&config.tool_name),
        );
    }
    Ok(true)
}

fn run_gate(config: &PipelineConfig, branch: String, result: RunResult) -> bool {
    let status = RunStatus::pending(branch).with_result(result);
    let open = should_release(&status, &config.release_branch);
    println!(
        "gate {} for '{}' ({}; release branch '{}')",
        if open { "open" } else { "closed" },
        status.branch,
        status.overall,
        config.release_branch,
    );
    open
}

fn run_pins(config: &PipelineConfig) -> Result<bool> {
    let pins = PinnedTools::load(config)?;
    for tool in [&pins.signer, &pins.releaser] {
        let source = tool
            .download_url
            .clone()
            .unwrap_or_else(|| format!("{} (pre-installed)", tool.executable.display()));
        println!("{:<16} v{:<10} {source}", tool.name, tool.version);
    }
    Ok(true)
}

async fn dispatch(cli: Cli) -> Result<bool> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Run {
            branch,
            bump,
            dry_run,
        } => {
            let mut request = RunRequest::new(branch, bump);
            if dry_run {
                request = request.dry_run();
            }
            run_release(config, request).await
        }
        Command::Targets => run_targets(&config),
        Command::Gate { branch, result } => Ok(run_gate(&config, branch, result)),
        Command::Pins => run_pins(&config),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.verbose);

    match dispatch(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("[releaseflow] error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
