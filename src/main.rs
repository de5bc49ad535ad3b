//! OpenSASE Catalog - product catalog service

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use opensase_catalog::api::{build_app, AppState};
use opensase_catalog::catalog::{migrate, PipelineSettings, ProductPipeline};
use opensase_catalog::config::load_app_config;
use opensase_catalog::media::CloudinaryClient;
use opensase_catalog::store::PgCatalogStore;

#[derive(Parser)]
#[command(name = "opensase-catalog", about = "Product catalog service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default).
    Serve,
    /// Rewrite stored legacy variations into the canonical form.
    MigrateVariations {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
        /// Report what would change without writing.
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::MigrateVariations { database_url, dry_run } => {
            init_tracing(&std::env::var("CATALOG_LOG_LEVEL").unwrap_or_else(|_| "info".into()));
            let store = PgCatalogStore::connect(&database_url, 2).await?;
            let report = migrate::migrate_variations(store.pool(), dry_run).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn serve() -> Result<()> {
    let config = load_app_config()?;
    init_tracing(&config.log_level);

    let store = PgCatalogStore::connect(&config.database_url, config.db_max_connections)
        .await
        .context("connecting to Postgres")?;
    store.run_migrations().await?;

    let events = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, catalog events disabled");
                None
            }
        },
        None => None,
    };

    let images = Arc::new(CloudinaryClient::new(config.cloudinary.clone())?);
    let store = Arc::new(store);
    let settings = PipelineSettings { folder: config.upload_folder.clone(), max_image_kb: config.max_image_kb };
    let pipeline = Arc::new(ProductPipeline::new(images, store.clone(), settings));

    let app = build_app(AppState { store, pipeline, events, products_per_page: config.products_per_page });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "OpenSASE catalog listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutting down");
}
