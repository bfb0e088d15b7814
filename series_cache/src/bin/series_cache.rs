use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use esett_ingestor::{
    models::{
        series::{Series, SeriesKey},
        zone::Zone,
    },
    providers::esett_rest::EsettProvider,
};
use series_cache::{
    CacheSynchronizer, QueryRequest,
    config::Config,
    db::migrate,
    store::{SeriesStore, SqliteStore},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Read-through cache for eSett energy series")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply embedded migrations to the configured database.
    Migrate,
    /// Run one synchronized query and print the page as JSON.
    Query(QueryArgs),
    /// Print the persisted covered intervals of a series-key.
    Coverage {
        /// production, consumption or prices.
        series: String,
        #[arg(long)]
        zone: String,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// production, consumption or prices.
    series: String,
    #[arg(long)]
    zone: String,
    /// RFC 3339, `YYYY-MM-DDTHH:MM:SS` (UTC) or `YYYY-MM-DD`.
    #[arg(long)]
    start: String,
    #[arg(long)]
    end: String,
    #[arg(long)]
    page_size: Option<usize>,
    #[arg(long)]
    page_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.cmd {
        Cmd::Migrate => {
            let applied = migrate::run_sqlite(&config.database_url)?;
            info!(database_url = %config.database_url, applied, "migrations applied");
        }
        Cmd::Query(args) => {
            let store = Arc::new(SqliteStore::open(&config.database_url)?);
            let upstream = Arc::new(EsettProvider::new(config.upstream.to_settings())?);
            let sync = CacheSynchronizer::new(upstream, store, config.sync.to_settings());

            let mut request = QueryRequest::parse(&args.series, &args.zone, &args.start, &args.end)?;
            request.page_size = args.page_size;
            request.page_token = args.page_token;

            let page = sync.query(request).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Cmd::Coverage { series, zone } => {
            let series: Series = series.parse().map_err(anyhow::Error::from)?;
            let zone: Zone = zone.parse().map_err(anyhow::Error::from)?;
            let store = SqliteStore::open(&config.database_url)?;
            let intervals = store.coverage(SeriesKey::new(series, zone)).await?;
            println!("{}", serde_json::to_string_pretty(&intervals)?);
        }
    }

    Ok(())
}
