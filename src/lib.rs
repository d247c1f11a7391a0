//! Todo list API: username/password accounts, bearer tokens, and owner-scoped Todo CRUD
//! over SQLite. The same router is served over HTTP (`main.rs`) or fed one event at a
//! time by a function host (`bin/serverless.rs`).

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod route;
pub mod schema;
pub mod serverless;
pub mod todos;

use sqlx::SqlitePool;
use tracing_subscriber::EnvFilter;

pub use config::Config;
pub use error::ApiError;
pub use route::create_router;

// Struct representing the application state
pub struct AppState {
    pub db: SqlitePool,
    pub tokens: auth::TokenKeys,
}

impl AppState {
    pub fn new(db: SqlitePool, config: &Config) -> Self {
        Self {
            db,
            tokens: auth::TokenKeys::new(
                config.secret_key.as_bytes(),
                chrono::Duration::minutes(config.token_expire_minutes),
            ),
        }
    }
}

/// Logs go to stderr so stdout stays free for the serverless response.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
