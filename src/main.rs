//! # Targeting Harness CLI (`tgt`)
//!
//! ## Usage
//!
//! ```bash
//! tgt --config ./config/tgt.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tgt catalog` | Print the synthesized feature catalog |
//! | `tgt features` | Rank and justify features for a campaign |
//! | `tgt plan` | Rank features, then split the audience into send segments |
//! | `tgt serve` | Start the JSON HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! tgt features --product "갤럭시 S26 사전예약" --metric 전환율 --limit 10
//! tgt plan --product TestPhone --target 100만명 --frequency 4
//! tgt plan --request ./request.json --json
//! ```
//!
//! Without a config file the CLI runs fully offline: hashing embeddings and
//! deterministic fallback segments.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use targeting_harness::{catalog, config, models::CampaignRequest, retrieval, server, session};

/// Targeting Harness: feature discovery and audience segmentation for
/// marketing campaigns.
#[derive(Parser)]
#[command(name = "tgt", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means offline defaults.
    #[arg(long, global = true, default_value = "./config/tgt.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the feature catalog.
    Catalog {
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Rank and justify catalog features for a campaign.
    Features {
        #[command(flatten)]
        request: RequestArgs,

        /// Number of features to return (defaults to `[retrieval].top_k`).
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Run the full planning session: features, then segments.
    Plan {
        #[command(flatten)]
        request: RequestArgs,

        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

/// Campaign request, either inline flags or a JSON file.
#[derive(clap::Args)]
struct RequestArgs {
    /// Read the request from a JSON file instead of flags.
    #[arg(long, conflicts_with_all = ["product", "metric", "target", "frequency"])]
    request: Option<PathBuf>,

    /// Product or campaign name.
    #[arg(long)]
    product: Option<String>,

    /// Success metric. Empty or `N/A` falls back to the default metric.
    #[arg(long, default_value = "")]
    metric: String,

    /// Free-form audience size, e.g. `100만명` or `50,000`.
    #[arg(long, default_value = "")]
    target: String,

    /// Number of sends; also the number of segments.
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    frequency: i64,

    /// Days from today until the campaign starts.
    #[arg(long, default_value_t = 7)]
    start_days: i64,

    /// Campaign length in days.
    #[arg(long, default_value_t = 1)]
    duration_days: i64,
}

impl RequestArgs {
    fn into_request(self) -> anyhow::Result<CampaignRequest> {
        if let Some(path) = self.request {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read request file: {}", path.display()))?;
            let request = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid request file: {}", path.display()))?;
            return Ok(request);
        }

        let Some(product) = self.product else {
            anyhow::bail!("either --product or --request is required");
        };
        let request = CampaignRequest::new(&product, &self.metric, &self.target, self.frequency)?
            .with_schedule(self.start_days, self.duration_days)?;
        Ok(request)
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => anyhow::bail!("unknown log level: {}", other),
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let cfg = config::load_or_minimal(&cli.config)?;

    match cli.command {
        Commands::Catalog { json } => {
            catalog::run_catalog(&cfg, json)?;
        }
        Commands::Features {
            request,
            limit,
            json,
        } => {
            let request = request.into_request()?;
            retrieval::run_features(&cfg, &request, limit, json).await?;
        }
        Commands::Plan { request, json } => {
            let request = request.into_request()?;
            session::run_plan(&cfg, request, json).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
