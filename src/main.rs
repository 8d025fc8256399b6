use std::sync::Arc;

use archiver::config::{Cli, Command, Config, default_config_dir, default_config_path};
use archiver::db::Database;
use archiver::handler::AppState;
use archiver::routes::routes;
use archiver::store::Store;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    // With --config, data (the database file) lives next to the config file.
    // Otherwise both live in ~/.archiver/
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            (path, dir)
        }
        None => (default_config_path(), default_config_dir()),
    };

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data directory {:?}: {}", data_dir, e);
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Config::new(&config_path.to_string_lossy()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });
    let db = Arc::new(Database::new(&cfg.app, &data_dir).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup database");
        std::process::exit(1);
    }));

    match args.command.unwrap_or(Command::Serve) {
        Command::AddKey { key } => add_key(&db, &key).await,
        Command::Serve => serve(cfg, db).await,
    }
}

async fn add_key(db: &Database, key: &str) {
    match db.add_api_key(key).await {
        Ok(true) => tracing::info!("api key added"),
        Ok(false) => tracing::info!("api key already present"),
        Err(e) => {
            tracing::error!(error = %e, "failed to add api key");
            std::process::exit(1);
        }
    }
    if let Err(e) = db.sync().await {
        tracing::warn!(error = %e, "failed to sync replica");
    }
}

async fn serve(cfg: Config, db: Arc<Database>) {
    tracing::info!("archiver.svc starting");

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let cancellation_token = CancellationToken::new();

    let store: Arc<dyn Store> = db.clone();
    let app = routes(AppState::new(store, &cfg.queue), cfg.app.is_production());

    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    let ctrl_c_token = cancellation_token.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl+c signal received, preparing to shutdown");
        }
        ctrl_c_token.cancel();
    });

    tracing::info!("archiver.svc running on {}", &address);
    let shutdown = cancellation_token.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    if let Err(err) = result {
        tracing::error!(error = %err, "server stopped with error");
        std::process::exit(1);
    }

    if let Err(e) = db.sync().await {
        tracing::warn!(error = %e, "final replica sync failed");
    }
    tracing::info!("archiver.svc going off, graceful shutdown complete");
}
