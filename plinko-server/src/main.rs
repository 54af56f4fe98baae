use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};

use plinko::db::Database;
use plinko::engine::QueryEngine;
use plinko_server::{build_router, config::Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    config
        .validate()
        .wrap_err("invalid configuration")?;

    let filter = config
        .log_level_parsed()
        .wrap_err("invalid log level")?
        .as_tracing_filter();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    tracing::info!(
        port = config.port,
        database_path = %config.database_path.display(),
        "starting plinko-server"
    );

    let db = Database::load(&config.database_path, config.database_wait_timeout())
        .wrap_err("failed to load database")?;
    let params = db.params();
    tracing::info!(
        database_size = db.size(),
        chunk_size = params.chunk_size,
        set_size = params.set_size,
        "database loaded"
    );

    let engine = Arc::new(QueryEngine::new(Arc::new(db)));
    let app = build_router(engine);

    let listener = tokio::net::TcpListener::bind(config.listen_address())
        .await
        .wrap_err("failed to bind listen address")?;
    tracing::info!(address = %config.listen_address(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
