use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{handler::*, middleware::mw_require_auth, AppState};

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/me", get(me))
        .route_layer(from_fn_with_state(app_state.clone(), mw_require_auth))
        .route("/register", post(register))
        .route("/login", post(login));

    let todo_routes = Router::new()
        .route("/", get(get_todos).post(create_todo))
        .route(
            "/:id",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
        .route("/:id/complete", patch(complete_todo))
        .route_layer(from_fn_with_state(app_state.clone(), mw_require_auth));

    // Any origin may call the API; credentials are not allowed.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_checker_handler))
        .nest("/api/auth", auth_routes)
        .nest("/api/todos", todo_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
