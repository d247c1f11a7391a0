use std::{net::SocketAddr, sync::Arc};

use axum_todo_api::{create_router, db, init_tracing, AppState, Config};
use dotenv::dotenv;
use tracing::{info, warn};

// Entry point of the application
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;

    // Tables come from the one-shot `init_db` binary, not from every start
    let pool = db::connect(&config.database_url).await?;

    let app_state = Arc::new(AppState::new(pool.clone(), &config));
    let app = create_router(app_state);

    let addr = SocketAddr::from((config.host, config.port));
    info!(%addr, "🚀 Server started successfully");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("server stopped, database pool closed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
