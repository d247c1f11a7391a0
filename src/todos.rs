//! Owner-scoped Todo persistence. Every query filters on `user_id`, so a Todo that
//! belongs to someone else is indistinguishable from one that does not exist.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    error::ApiError,
    model::Todo,
    schema::{CreateTodoSchema, UpdateTodoSchema},
};

const TODO_COLUMNS: &str =
    "id, user_id, title, description, completed, due_date, created_at, updated_at";

/// Caller's Todos in creation order.
pub async fn list_todos(pool: &SqlitePool, owner: i64) -> Result<Vec<Todo>, ApiError> {
    let todos = sqlx::query_as::<_, Todo>(&format!(
        "SELECT {} FROM todos WHERE user_id = ? ORDER BY id ASC",
        TODO_COLUMNS
    ))
    .bind(owner)
    .fetch_all(pool)
    .await?;
    Ok(todos)
}

pub async fn create_todo(
    pool: &SqlitePool,
    owner: i64,
    body: CreateTodoSchema,
) -> Result<Todo, ApiError> {
    let now = Utc::now();
    let todo = sqlx::query_as::<_, Todo>(&format!(
        "INSERT INTO todos (user_id, title, description, completed, due_date, created_at, updated_at) \
         VALUES (?, ?, ?, 0, ?, ?, ?) RETURNING {}",
        TODO_COLUMNS
    ))
    .bind(owner)
    .bind(body.title)
    .bind(body.description)
    .bind(body.due_date)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    info!(todo_id = todo.id, user_id = owner, "todo created");
    Ok(todo)
}

pub async fn get_todo(pool: &SqlitePool, owner: i64, id: i64) -> Result<Todo, ApiError> {
    let todo = sqlx::query_as::<_, Todo>(&format!(
        "SELECT {} FROM todos WHERE id = ? AND user_id = ?",
        TODO_COLUMNS
    ))
    .bind(id)
    .bind(owner)
    .fetch_optional(pool)
    .await?;

    todo.ok_or_else(|| ApiError::todo_not_found(id))
}

pub async fn update_todo(
    pool: &SqlitePool,
    owner: i64,
    id: i64,
    changes: UpdateTodoSchema,
) -> Result<Todo, ApiError> {
    let mut todo = get_todo(pool, owner, id).await?;
    apply_changes(&mut todo, changes);
    save(pool, owner, todo).await
}

/// Marks a Todo done or not done.
pub async fn set_completed(
    pool: &SqlitePool,
    owner: i64,
    id: i64,
    completed: bool,
) -> Result<Todo, ApiError> {
    let mut todo = get_todo(pool, owner, id).await?;
    todo.completed = completed;
    save(pool, owner, todo).await
}

pub async fn delete_todo(pool: &SqlitePool, owner: i64, id: i64) -> Result<(), ApiError> {
    let rows_affected = sqlx::query("DELETE FROM todos WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(owner)
        .execute(pool)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        return Err(ApiError::todo_not_found(id));
    }

    info!(todo_id = id, user_id = owner, "todo deleted");
    Ok(())
}

fn apply_changes(todo: &mut Todo, changes: UpdateTodoSchema) {
    if let Some(title) = changes.title {
        todo.title = title;
    }
    if let Some(description) = changes.description {
        todo.description = description;
    }
    if let Some(completed) = changes.completed {
        todo.completed = completed;
    }
    if let Some(due_date) = changes.due_date {
        todo.due_date = due_date;
    }
}

async fn save(pool: &SqlitePool, owner: i64, todo: Todo) -> Result<Todo, ApiError> {
    let saved = sqlx::query_as::<_, Todo>(&format!(
        "UPDATE todos SET title = ?, description = ?, completed = ?, due_date = ?, updated_at = ? \
         WHERE id = ? AND user_id = ? RETURNING {}",
        TODO_COLUMNS
    ))
    .bind(&todo.title)
    .bind(&todo.description)
    .bind(todo.completed)
    .bind(todo.due_date)
    .bind(Utc::now())
    .bind(todo.id)
    .bind(owner)
    .fetch_optional(pool)
    .await?;

    saved.ok_or_else(|| ApiError::todo_not_found(todo.id))
}
