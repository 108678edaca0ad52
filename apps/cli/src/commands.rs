//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use geofill_core::engine::{ProgressReporter, RunReport};
use geofill_core::pipeline::{self, RunOptions, RunOutcome};
use geofill_shared::{
    AppConfig, EnrichmentConfig, NetworkErrorPolicy, init_config, load_config, resolve_api_key,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// geofill: fill in missing coordinates on license records.
#[derive(Parser)]
#[command(
    name = "geofill",
    version,
    about = "Batch-geocode license records, filling unset locations from a provider.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Enrich a CSV of license records, writing coordinates to a JSON file.
    Run {
        /// CSV file of license records.
        input: PathBuf,

        /// Results file to write (defaults to the configured output).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Seed from an existing results file and skip resolved addresses.
        #[arg(long)]
        resume: bool,

        /// Override the configured rate limit (lookups per window).
        #[arg(long)]
        max_calls: Option<u32>,

        /// Transport failure policy: retry or abort.
        #[arg(long)]
        on_network_error: Option<String>,
    },

    /// Summarize an existing results file.
    Inspect {
        /// Results file to summarize.
        file: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "geofill=info",
        1 => "geofill=debug",
        _ => "geofill=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            input,
            output,
            resume,
            max_calls,
            on_network_error,
        } => cmd_run(input, output, resume, max_calls, on_network_error.as_deref()).await,
        Command::Inspect { file } => cmd_inspect(&file).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    input: PathBuf,
    output: Option<PathBuf>,
    resume: bool,
    max_calls: Option<u32>,
    on_network_error: Option<&str>,
) -> Result<()> {
    // Resolve the credential before touching any records
    let config = load_config()?;
    let api_key = resolve_api_key(&config)?;

    let mut enrichment = EnrichmentConfig::from(&config);
    if let Some(max) = max_calls {
        enrichment.max_calls = max;
    }
    if let Some(policy) = on_network_error {
        enrichment.on_network_error = policy.parse::<NetworkErrorPolicy>()?;
    }

    let output = output.unwrap_or_else(|| PathBuf::from(&config.defaults.output));

    let options = RunOptions {
        input: input.clone(),
        output,
        resume,
        api_key,
        config: enrichment,
    };

    info!(input = %input.display(), resume, "enriching license records");

    // Ctrl-C flips the shutdown flag; the run stops dispatching, lets the
    // in-flight lookup finish, and flushes before returning.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let reporter = CliProgress::new();
    let outcome = pipeline::run(&options, &reporter, shutdown_rx).await?;

    print_summary(&outcome);
    Ok(())
}

fn summary_lines(outcome: &RunOutcome) -> Vec<String> {
    let report = &outcome.report;
    let mut lines = Vec::new();

    if report.interrupted {
        lines.push("Run interrupted; partial results were flushed.".to_string());
    } else {
        lines.push("Enrichment complete!".to_string());
    }
    lines.push(format!("Run ID:          {}", outcome.run_id));
    lines.push(format!("Records:         {}", report.records_seen));
    lines.push(format!("Already located: {}", report.already_located));
    if report.malformed > 0 {
        lines.push(format!("Malformed:       {}", report.malformed));
    }
    lines.push(format!("Lookups:         {}", report.lookups));
    lines.push(format!("Found:           {}", report.found));
    lines.push(format!("No match:        {}", report.no_match));
    lines.push(format!(
        "Unresolved:      {}",
        report.provider_errors + report.network_failures
    ));
    if outcome.resumed > 0 {
        lines.push(format!("Resumed:         {}", outcome.resumed));
    }
    lines.push(format!("Output:          {}", outcome.output.display()));
    lines.push(format!("Time:            {:.1}s", report.elapsed.as_secs_f64()));
    lines
}

fn print_summary(outcome: &RunOutcome) {
    println!();
    for line in summary_lines(outcome) {
        println!("  {line}");
    }
    println!();
}

async fn cmd_inspect(file: &Path) -> Result<()> {
    let summary = geofill_store::inspect_file(file)?;

    println!();
    println!("  Results file: {}", file.display());
    println!("  Entries:      {}", summary.total);
    println!("  Resolved:     {}", summary.resolved);
    println!("  Unresolved:   {}", summary.unresolved);
    println!();

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn records_processed(&self, seen: usize, resolved: usize) {
        self.spinner
            .set_message(format!("Enriching records [{seen} seen, {resolved} resolved]"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}
