//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use docgraph_collector::{CancellationToken, CollectorRegistry, FileCollector};
use docgraph_core::{Assembler, CollectionSummary, Coordinator, Pipeline, ProgressReporter};
use docgraph_ingestor::DocumentIngestor;
use docgraph_processor::DocumentProcessor;
use docgraph_shared::{AppConfig, Options, RawFlags, init_config, load_config, validate_flags};
use docgraph_storage::{create_auth_token, new_client};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docgraph: turn folders of SBOMs into a supply-chain graph.
#[derive(Parser)]
#[command(
    name = "docgraph",
    version,
    about = "Collect SPDX and CycloneDX documents and store their facts in a graph database.",
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
    /// Take a folder of files and create a graph.
    Files(FilesArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `files`. Unset flags fall back to the config file.
#[derive(Args, Debug)]
pub(crate) struct FilesArgs {
    /// Graph store address: neo4j://, bolt://, or libsql:<path>.
    #[arg(long)]
    pub db_addr: Option<String>,

    /// Credentials for the graph store in `user:pass` format.
    #[arg(long, env = "DOCGRAPH_CREDS", default_value = "", hide_env_values = true)]
    pub creds: String,

    /// Realm (database name) to write into.
    #[arg(long)]
    pub realm: Option<String>,

    /// Keep watching the folder for new or changed files until Ctrl-C.
    #[arg(long)]
    pub poll: bool,

    /// Poll interval in milliseconds.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Store writes: per-document or per-run.
    #[arg(long)]
    pub merge_mode: Option<String>,

    /// Capacity of the collector channel.
    #[arg(long)]
    pub channel_capacity: Option<usize>,

    /// Folder with documents to collect.
    #[arg(value_name = "FILE_PATH")]
    pub file_path: Vec<String>,
}

impl FilesArgs {
    /// Overlay the flags that were given on top of config values.
    fn raw_flags(&self, config: &AppConfig) -> RawFlags {
        let mut raw = RawFlags::from_config(config);
        raw.creds = self.creds.clone();
        raw.poll = self.poll;
        if let Some(addr) = &self.db_addr {
            raw.db_addr = addr.clone();
        }
        if let Some(realm) = &self.realm {
            raw.realm = realm.clone();
        }
        if let Some(ms) = self.poll_interval_ms {
            raw.poll_interval_ms = ms;
        }
        if let Some(mode) = &self.merge_mode {
            raw.merge_mode = mode.clone();
        }
        if let Some(capacity) = self.channel_capacity {
            raw.channel_capacity = capacity;
        }
        raw
    }
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
        0 => "docgraph=info",
        1 => "docgraph=debug",
        _ => "docgraph=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
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
        Command::Files(args) => cmd_files(&args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

async fn cmd_files(args: &FilesArgs) -> Result<()> {
    let config = load_config()?;
    let opts = match validate_flags(&args.raw_flags(&config), &args.file_path) {
        Ok(opts) => opts,
        Err(e) => {
            println!("unable to validate flags: {e}");
            print_files_help();
            std::process::exit(1);
        }
    };
    info!(?opts, "starting file collection");

    // A registration failure is logged; collect() then fails if nothing is left.
    let mut registry = CollectorRegistry::new();
    let file_collector = FileCollector::new(&opts.path, opts.poll, opts.poll_interval);
    if let Err(e) = registry.register(Arc::new(file_collector)) {
        error!(error = %e, "unable to register file collector");
    }

    let pipeline = build_pipeline(&opts).await?;

    let cancel = CancellationToken::new();
    let stream = registry
        .collect(&cancel, opts.channel_capacity)
        .wrap_err("unable to start collection")?;

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    let reporter = Arc::new(CliProgress::new());
    let summary = Coordinator::new(pipeline)
        .with_progress(reporter)
        .run(stream, cancel)
        .await;

    print_summary(&summary);
    Ok(())
}

/// Processor, ingestor and store client. Any failure here is fatal.
async fn build_pipeline(opts: &Options) -> Result<Pipeline> {
    let token = create_auth_token(&opts.user, &opts.pass, &opts.realm);
    let store = new_client(&opts.db_addr, &token)
        .await
        .wrap_err_with(|| format!("unable to connect to graph store at {}", opts.db_addr))?;
    info!(backend = store.backend(), addr = %opts.db_addr, "graph store ready");

    Ok(Pipeline::new(
        Arc::new(DocumentProcessor::new()),
        Arc::new(DocumentIngestor::new()),
        Assembler::new(store),
        opts.merge_mode,
    ))
}

fn print_files_help() {
    let mut cmd = Cli::command();
    if let Some(files) = cmd.find_subcommand_mut("files") {
        let _ = files.print_help();
    }
}

fn print_summary(summary: &CollectionSummary) {
    println!();
    if summary.cancelled {
        println!("  Collection cancelled.");
    } else {
        println!("  Collection finished.");
    }
    println!("  Run:        {}", summary.run_id);
    println!(
        "  Collectors: {} ({} failed)",
        summary.collectors_total, summary.collectors_failed
    );
    println!(
        "  Documents:  {} received, {} stored, {} failed",
        summary.documents_received, summary.documents_stored, summary.documents_failed
    );
    println!(
        "  Graph:      {} nodes, {} edges written",
        summary.nodes_written, summary.edges_written
    );
    println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "unable to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C, stopping collection"),
        _ = terminate => info!("received SIGTERM, stopping collection"),
    }
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        spinner.set_message("Waiting for documents");
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn document(&self, source: &str, received: usize) {
        self.spinner
            .set_message(format!("Processing [{received}] {source}"));
    }

    fn collector_done(&self, name: &str, ok: bool) {
        let outcome = if ok { "finished" } else { "failed" };
        self.spinner.println(format!("  {name} {outcome}"));
    }

    fn done(&self, _summary: &CollectionSummary) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

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
