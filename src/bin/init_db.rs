//! Creates the database tables. Run once after deployment.

use axum_todo_api::{db, init_tracing, Config};
use dotenv::dotenv;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    info!(database_url = %config.database_url, "creating database tables");

    let pool = db::connect(&config.database_url).await?;
    db::create_schema(&pool).await?;
    pool.close().await;

    info!("database tables created successfully");
    Ok(())
}
