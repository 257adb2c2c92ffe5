use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wfcost::config::{self, Config};
use wfcost::error::Result;
use wfcost::exit_codes::exit_with_code;
use wfcost::output::{render_report, OutputFormat};
use wfcost::sources::{
    build_http_client, FileMetadataSource, FilePriceListSource, FireCloudMetadataSource,
    HttpPriceListSource, MetadataSource, PriceListSource, WorkflowRef,
};
use wfcost::{estimate, PricingResolver};

#[derive(Parser)]
#[command(name = "wfcost")]
#[command(
    about = "Estimate the cloud cost of a workflow run",
    long_about = "wfcost prices a Cromwell/Terra workflow run from its execution metadata and the public GCP price list.\n\nEvery task attempt and scatter shard is priced from its machine type, disks, GPUs and runtime;\nsub-workflows are included. The total is rounded up to the cent."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON (stderr)
    #[arg(long, global = true)]
    log_json: bool,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    output: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the cost of a workflow run
    Estimate {
        /// Metadata JSON file instead of the API ('-' reads stdin)
        #[arg(
            long,
            conflicts_with_all = ["namespace", "workspace", "submission_id", "workflow_id"]
        )]
        metadata: Option<PathBuf>,
        #[command(flatten)]
        workflow: WorkflowArgs,
        /// Price list JSON file instead of the public price list
        #[arg(long)]
        pricelist: Option<PathBuf>,
        /// Show the cost of every priced task attempt
        #[arg(long)]
        breakdown: bool,
    },
    /// Download a workflow run's metadata document
    FetchMetadata {
        #[command(flatten)]
        workflow: WorkflowArgs,
        /// Where to write the document
        #[arg(long, default_value = "metadata.json")]
        out: PathBuf,
    },
    /// Initialize configuration
    Init {
        /// Where to write the config file
        #[arg(short = 'o', long = "path", default_value = ".wfcost.toml")]
        path: PathBuf,
    },
}

#[derive(Args, Clone)]
struct WorkflowArgs {
    /// Workspace namespace (billing project)
    #[arg(long)]
    namespace: Option<String>,
    /// Workspace name
    #[arg(long)]
    workspace: Option<String>,
    /// Submission id (UUID)
    #[arg(long)]
    submission_id: Option<String>,
    /// Workflow id (UUID)
    #[arg(long)]
    workflow_id: Option<String>,
    /// OAuth access token for the orchestration API
    #[arg(long, env = "WFCOST_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

impl WorkflowArgs {
    fn into_source(self, client: reqwest::Client, config: &Config) -> Result<FireCloudMetadataSource> {
        let workflow = WorkflowRef::from_parts(
            self.namespace,
            self.workspace,
            self.submission_id,
            self.workflow_id,
        )?;
        Ok(FireCloudMetadataSource::new(
            client,
            &config.metadata.api_root,
            workflow,
            self.token,
            config.fetch.max_attempts,
        ))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        exit_with_code(&e);
    }
}

fn init_logging(verbose: bool, json: bool) {
    // Warnings only by default; stdout is reserved for the result
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let format: OutputFormat = cli.output.parse()?;

    if let Commands::Init { path } = &cli.command {
        return config::init_config(path);
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Estimate {
            metadata,
            workflow,
            pricelist,
            breakdown,
        } => estimate_command(metadata, workflow, pricelist, breakdown, &config, format).await,
        Commands::FetchMetadata { workflow, out } => {
            fetch_metadata_command(workflow, out, &config).await
        }
        Commands::Init { .. } => Ok(()),
    }
}

fn spinner(enabled: bool, message: &str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn estimate_command(
    metadata: Option<PathBuf>,
    workflow: WorkflowArgs,
    pricelist: Option<PathBuf>,
    breakdown: bool,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let client = build_http_client(&config.fetch)?;

    let metadata_source: Box<dyn MetadataSource> = match metadata {
        Some(path) => Box::new(FileMetadataSource::new(path)),
        None => Box::new(workflow.into_source(client.clone(), config)?),
    };
    let price_source: Box<dyn PriceListSource> = match pricelist {
        Some(path) => Box::new(FilePriceListSource::new(path)),
        None => Box::new(HttpPriceListSource::new(
            client,
            &config.pricing.url,
            config.fetch.max_attempts,
        )),
    };
    info!(
        "Pricing {} against {}",
        metadata_source.describe(),
        price_source.describe()
    );

    let progress = spinner(
        format == OutputFormat::Text,
        "Loading price list and workflow metadata...",
    );
    let fetched = tokio::try_join!(price_source.fetch(), metadata_source.fetch());
    progress.finish_and_clear();
    let (table, metadata) = fetched?;

    let resolver =
        PricingResolver::new(table, config.gpu.clone()).with_key_prefix(&config.pricing.key_prefix);
    let report = estimate(&metadata, &resolver, Utc::now())?;

    println!("{}", render_report(&report, format, breakdown)?);
    Ok(())
}

async fn fetch_metadata_command(workflow: WorkflowArgs, out: PathBuf, config: &Config) -> Result<()> {
    let client = build_http_client(&config.fetch)?;
    let source = workflow.into_source(client, config)?;

    let progress = spinner(true, "Fetching workflow metadata...");
    let fetched = source.fetch_raw().await;
    progress.finish_and_clear();
    let raw = fetched?;

    tokio::fs::write(&out, raw).await?;
    println!("Saved workflow metadata to {}", out.display());
    Ok(())
}
