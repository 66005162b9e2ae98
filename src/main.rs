mod config;
mod db;
mod error;
mod handlers;
mod models;
mod services;
mod storage;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::services::{FileService, MetadataStore, ReconcileOptions, Reconciler, SqliteMetadataStore};

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub files: FileService,
}

#[derive(Parser)]
#[command(name = "drivebox", version, about = "File storage server backed by S3 and SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Compare blob store and metadata, report or repair mismatches
    Reconcile {
        /// Delete blobs that have no metadata record
        #[arg(long)]
        delete_orphans: bool,
        /// Delete records whose blob is missing
        #[arg(long)]
        prune_dangling: bool,
        /// Ignore unmatched blobs younger than this many minutes
        #[arg(long, default_value_t = 15)]
        grace_minutes: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drivebox=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Arc::new(Config::load()?);
    tracing::info!("Configuration loaded");

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized at {}", config.database.path);

    let metadata: Arc<dyn MetadataStore> = Arc::new(SqliteMetadataStore::new(db));
    let blobs = storage::build_blob_store(&config.storage).await;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, blobs, metadata).await,
        Command::Reconcile {
            delete_orphans,
            prune_dangling,
            grace_minutes,
        } => {
            let options = ReconcileOptions {
                delete_orphans,
                prune_dangling,
                grace: Duration::from_secs(grace_minutes * 60),
            };
            let reconciler = Reconciler::new(blobs, metadata, config.storage.container.clone());
            let report = reconciler.sweep(&options).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn serve(
    config: Arc<Config>,
    blobs: Arc<dyn storage::BlobStore>,
    metadata: Arc<dyn MetadataStore>,
) -> anyhow::Result<()> {
    tracing::info!("Starting drivebox with {} blob store", blobs.backend_name());

    let state = AppState {
        files: FileService::new(blobs, metadata, &config.storage),
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("API listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.files.max_upload_bytes().saturating_add(MULTIPART_OVERHEAD);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/files", get(handlers::file::list_files))
        .route(
            "/files/:id",
            get(handlers::file::get_file).delete(handlers::file::delete_file),
        )
        .route("/files/:id/download", get(handlers::file::download_file))
        .route(
            "/upload",
            post(handlers::file::upload_file).layer(DefaultBodyLimit::max(body_limit)),
        );

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
