//! Single-invocation entry point for function hosts: reads one proxy event as JSON from
//! stdin, runs it through the router, and prints the response JSON to stdout.

use std::sync::Arc;

use anyhow::Context;
use axum_todo_api::{
    create_router, db, init_tracing,
    serverless::{handle_event, ServerlessRequest},
    AppState, Config,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    let event: ServerlessRequest =
        serde_json::from_str(&input).context("stdin is not a valid proxy event")?;

    let config = Config::from_env()?;
    let pool = db::connect(&config.database_url).await?;
    let app = create_router(Arc::new(AppState::new(pool.clone(), &config)));

    let response = handle_event(app, event).await;
    pool.close().await;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(serde_json::to_string(&response)?.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}
