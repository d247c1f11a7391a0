use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;
use tracing::info;

use crate::{
    auth,
    error::ApiError,
    extract::{ValidPath, ValidatedJson},
    model::CurrentUser,
    schema::{CompleteTodoSchema, CreateTodoSchema, LoginSchema, RegisterSchema, UpdateTodoSchema},
    todos, AppState,
};

pub async fn root_handler() -> impl IntoResponse {
    info!("root endpoint accessed");
    Json(json!({ "message": "Todo API is running!" }))
}

pub async fn health_checker_handler() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

pub async fn register(
    State(data): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> Result<impl IntoResponse, ApiError> {
    let user = auth::register(&data.db, body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(data): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> Result<impl IntoResponse, ApiError> {
    let token = auth::login(&data.db, &data.tokens, body).await?;
    Ok(Json(token))
}

pub async fn me(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    // the token can outlive its account
    let user = auth::find_user_by_id(&data.db, user.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Could not validate credentials".to_string()))?;
    Ok(Json(user))
}

pub async fn get_todos(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let todos = todos::list_todos(&data.db, user.id).await?;
    Ok(Json(todos))
}

pub async fn create_todo(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    ValidatedJson(body): ValidatedJson<CreateTodoSchema>,
) -> Result<impl IntoResponse, ApiError> {
    let todo = todos::create_todo(&data.db, user.id, body).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn get_todo(
    ValidPath(id): ValidPath<i64>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let todo = todos::get_todo(&data.db, user.id, id).await?;
    Ok(Json(todo))
}

pub async fn update_todo(
    ValidPath(id): ValidPath<i64>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    ValidatedJson(body): ValidatedJson<UpdateTodoSchema>,
) -> Result<impl IntoResponse, ApiError> {
    let todo = todos::update_todo(&data.db, user.id, id, body).await?;
    Ok(Json(todo))
}

pub async fn complete_todo(
    ValidPath(id): ValidPath<i64>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    ValidatedJson(body): ValidatedJson<CompleteTodoSchema>,
) -> Result<impl IntoResponse, ApiError> {
    let todo = todos::set_completed(&data.db, user.id, id, body.completed).await?;
    Ok(Json(todo))
}

pub async fn delete_todo(
    ValidPath(id): ValidPath<i64>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    todos::delete_todo(&data.db, user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
