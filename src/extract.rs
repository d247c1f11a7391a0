//! Extractors that turn framework rejections into 422 responses with field-level detail.

use async_trait::async_trait;
use axum::{
    body::HttpBody,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path},
    http::{request::Parts, Request},
    BoxError, Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{ApiError, FieldError},
    schema::{check_shape, Validate},
};

/// JSON body that has passed the shape check, deserialized, and passed [`Validate`].
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S, B> FromRequest<S, B> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    B: HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(raw) = Json::<Value>::from_request(req, state).await.map_err(|rejection| {
            debug!(error = %rejection.body_text(), "rejected request body");
            ApiError::Validation(vec![json_rejection_error(&rejection)])
        })?;

        check_shape(T::FIELDS, &raw)?;
        let value: T = serde_json::from_value(raw).map_err(|e| {
            ApiError::Validation(vec![FieldError::new(&["body"], e.to_string(), "type_error")])
        })?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Path parameters; a value that does not parse is a validation failure rather than a 400.
#[derive(Debug)]
pub struct ValidPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::Validation(vec![FieldError::new(
                &["path"],
                rejection.body_text(),
                "type_error",
            )])),
        }
    }
}

fn json_rejection_error(rejection: &JsonRejection) -> FieldError {
    match rejection {
        JsonRejection::JsonSyntaxError(e) => {
            FieldError::new(&["body"], strip_prefix(&e.body_text()), "value_error.jsondecode")
        }
        JsonRejection::MissingJsonContentType(e) => {
            FieldError::new(&["body"], e.body_text(), "value_error.content_type")
        }
        other => FieldError::new(&["body"], strip_prefix(&other.body_text()), "value_error"),
    }
}

// "Failed to parse the request body as JSON: expected value at line 1 column 1"
fn strip_prefix(text: &str) -> &str {
    text.split_once(": ").map(|(_, rest)| rest).unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RegisterSchema, UpdateTodoSchema};
    use axum::{body::Body, http::header::CONTENT_TYPE};

    async fn extract<T>(body: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Validate,
    {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        ValidatedJson::<T>::from_request(req, &()).await.map(|v| v.0)
    }

    fn locs(result: Result<impl std::fmt::Debug, ApiError>) -> Vec<Vec<String>> {
        match result {
            Err(ApiError::Validation(errors)) => errors.into_iter().map(|e| e.loc).collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn every_missing_field_is_reported() {
        let result = extract::<RegisterSchema>("{}").await;
        assert_eq!(locs(result), vec![vec!["body", "username"], vec!["body", "password"]]);
    }

    #[tokio::test]
    async fn mistyped_field_is_located() {
        let result = extract::<UpdateTodoSchema>(r#"{"completed": "yes"}"#).await;
        assert_eq!(locs(result), vec![vec!["body", "completed"]]);
    }

    #[tokio::test]
    async fn malformed_json_points_at_the_body() {
        let result = extract::<RegisterSchema>(r#"{"username": "#).await;
        assert_eq!(locs(result), vec![vec!["body"]]);
    }

    #[tokio::test]
    async fn boundary_rules_still_apply_after_the_shape_check() {
        let result = extract::<RegisterSchema>(r#"{"username": "", "password": "pw1"}"#).await;
        assert_eq!(locs(result), vec![vec!["body", "username"]]);

        let ok = extract::<RegisterSchema>(r#"{"username": "alice", "password": "pw1"}"#)
            .await
            .unwrap();
        assert_eq!(ok.username, "alice");
    }
}
