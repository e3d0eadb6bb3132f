// Carte Server - Main Entry Point
//
// Bootstrap only: environment, tracing, CLI commands. Handlers, routes and
// menu logic live in the library crate.

use std::path::{Path, PathBuf};

use anyhow::Context;
use carte_core::{
    config::{AppConfig, DocumentStoreBackend, ImageStoreBackend},
    store::{images::FsImageStore, local::LocalFileDocumentStore},
};
use carte_server::{build_router, build_state};
use clap::{Parser, Subcommand};
use dotenvy::{Error as DotenvError, dotenv, from_filename};
use once_cell::sync::OnceCell;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_appender::non_blocking;
use tracing_subscriber::EnvFilter;

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

static TRACING_FALLBACK_GUARD: OnceCell<non_blocking::WorkerGuard> = OnceCell::new();

#[derive(Parser, Debug)]
#[command(author, version, about = "Carte restaurant menu server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Create the image directory and an empty menu document if absent
    Init,
    /// Create a restaurant without starting the server
    CreateRestaurant {
        /// Display name of the restaurant
        #[arg(long, value_name = "NAME")]
        name: String,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_status = load_env_file();
    init_tracing();
    report_env_status(&env_status);

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_serve(config).await,
        Command::Init => run_init(config).await,
        Command::CreateRestaurant { name } => run_create_restaurant(config, name).await,
        Command::ShowConfig => {
            println!("{config:#?}");
            Ok(())
        }
    }
}

async fn run_serve(config: AppConfig) -> anyhow::Result<()> {
    info!(
        bind_address = %config.bind_address,
        document_store_backend = ?config.document_store_backend,
        menu_file_path = %config.menu_file_path.display(),
        image_store_backend = ?config.image_store_backend,
        image_dir = %config.image_dir.display(),
        "Starting server with store configuration"
    );
    let state = build_state(&config)?;
    info!(
        name = state.metadata.name,
        version = state.metadata.version,
        document_store = state.metadata.document_store,
        "Loaded server metadata"
    );

    let app = build_router(state);

    let listener = TcpListener::bind(config.bind_address)
        .await
        .context("failed to bind socket")?;
    let actual_addr = listener
        .local_addr()
        .context("failed to read local address")?;

    info!("listening on {actual_addr}");

    if let Err(error) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(?error, "server terminated with error");
    }

    Ok(())
}

async fn run_init(config: AppConfig) -> anyhow::Result<()> {
    match config.document_store_backend {
        DocumentStoreBackend::Local => {
            let store = LocalFileDocumentStore::new(&config.menu_file_path);
            if store.ensure_initialized().await? {
                info!(path = %store.path().display(), "created empty menu document");
            } else {
                info!(path = %store.path().display(), "menu document already present");
            }
        }
        backend => info!(?backend, "document store needs no local initialization"),
    }

    if config.image_store_backend == ImageStoreBackend::Filesystem {
        let images = FsImageStore::new(&config.image_dir);
        images.ensure_initialized().await?;
        info!(path = %images.root().display(), "image directory ready");
    }

    Ok(())
}

async fn run_create_restaurant(config: AppConfig, name: String) -> anyhow::Result<()> {
    let state = build_state(&config)?;
    let created = state
        .menu_service
        .create_restaurant(&name)
        .await
        .map_err(|err| anyhow::anyhow!("failed to create restaurant: {err}"))?;
    info!(restaurant_id = %created.restaurant_id, "created restaurant {}", created.name);
    println!("{}", serde_json::to_string_pretty(&created)?);
    Ok(())
}

fn init_tracing() {
    // JSON to a rolling file by default; RUST_LOG controls the level.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_to_stdout = std::env::var("CARTE_LOG_TO_STDOUT")
        .map(|v| !v.trim().is_empty() && v.trim() != "0")
        .unwrap_or(false);

    if log_to_stdout {
        if tracing_subscriber::fmt()
            .with_env_filter(env_filter.clone())
            .with_ansi(false)
            .json()
            .with_writer(std::io::stdout)
            .try_init()
            .is_ok()
        {
            return;
        }
    }

    let log_dir = std::env::var("CARTE_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    if let Err(err) = std::fs::create_dir_all(&log_dir) {
        eprintln!("failed to create log dir '{log_dir}': {err}");
        std::process::exit(1);
    }
    let file_appender = tracing_appender::rolling::daily(&log_dir, "server.log");
    let (writer, guard) = non_blocking(file_appender);

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .json()
        .with_writer(writer)
        .try_init()
        .is_ok()
    {
        let _ = TRACING_FALLBACK_GUARD.set(guard);
    }
}

enum EnvLoadStatus {
    Loaded(PathBuf),
    NotFound,
    Failed(DotenvError),
}

fn load_env_file() -> EnvLoadStatus {
    if let Ok(env_file) = std::env::var("CARTE_ENV_FILE") {
        let trimmed = env_file.trim();
        if !trimmed.is_empty() {
            let path = PathBuf::from(trimmed);
            return match from_filename(&path) {
                Ok(_) => {
                    let display_path = make_relative(&path).unwrap_or_else(|| path.clone());
                    EnvLoadStatus::Loaded(display_path)
                }
                Err(err) => EnvLoadStatus::Failed(err),
            };
        }
    }

    match dotenv() {
        Ok(path) => {
            let display_path = make_relative(&path).unwrap_or_else(|| path.clone());
            EnvLoadStatus::Loaded(display_path)
        }
        Err(DotenvError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            EnvLoadStatus::NotFound
        }
        Err(err) => EnvLoadStatus::Failed(err),
    }
}

fn report_env_status(status: &EnvLoadStatus) {
    match status {
        EnvLoadStatus::Loaded(path) => {
            info!("Loaded environment variables from {}", path.display());
        }
        EnvLoadStatus::NotFound => {
            info!("No .env file found; using process environment only");
        }
        EnvLoadStatus::Failed(err) => {
            warn!("Failed to load .env file: {err:?}");
        }
    }
}

fn make_relative(path: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    path.strip_prefix(&cwd).map(|p| p.to_path_buf()).ok()
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (Ok(mut term), Ok(mut int)) = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) else {
            warn!("failed to install signal handlers; falling back to ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
            return;
        };

        tokio::select! {
            _ = term.recv() => {},
            _ = int.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
