use std::sync::Arc;

use axum::{
    extract::State,
    http::{self, Request},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{auth, error::ApiError, model::CurrentUser, AppState};

/// Rejects requests without a valid bearer token and hands the caller's id to the handler.
pub async fn mw_require_auth<B>(
    State(data): State<Arc<AppState>>,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok());

    let user_id = auth::authenticate(&data.tokens, auth_header).map_err(|e| {
        warn!(path = %request.uri().path(), error = %e, "rejected unauthenticated request");
        e
    })?;

    request.extensions_mut().insert(CurrentUser { id: user_id });

    Ok(next.run(request).await)
}
