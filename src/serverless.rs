//! Translation between a function host's invocation event and the HTTP types the router speaks.
//!
//! The event shape follows the common API-gateway proxy format (`httpMethod`, `path`,
//! `headers`, `queryStringParameters`, `body`, `isBase64Encoded`). Nothing outside this
//! module knows about it.

use std::collections::{BTreeMap, HashMap};

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, Request, StatusCode},
    response::Response,
    Router,
};
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tower::ServiceExt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerlessRequest {
    pub http_method: String,
    pub path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub multi_value_headers: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub query_string_parameters: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_base64_encoded: bool,
}

// Hosts send `null` rather than omitting a field when there is nothing to report.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerlessResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerlessError {
    #[error("invalid HTTP method {0:?}")]
    Method(String),
    #[error("invalid header {0:?}")]
    Header(String),
    #[error("body is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("could not build request: {0}")]
    Http(#[from] axum::http::Error),
    #[error("could not read response body: {0}")]
    Body(#[from] axum::Error),
    #[error("could not read response body: {0}")]
    Hyper(#[from] hyper::Error),
}

pub fn into_http_request(event: ServerlessRequest) -> Result<Request<Body>, ServerlessError> {
    let method = Method::from_bytes(event.http_method.as_bytes())
        .map_err(|_| ServerlessError::Method(event.http_method.clone()))?;

    let mut uri = if event.path.starts_with('/') {
        event.path.clone()
    } else {
        format!("/{}", event.path)
    };
    if let Some(query) = event.query_string_parameters.filter(|q| !q.is_empty()) {
        let encoded: Vec<String> = query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        uri.push('?');
        uri.push_str(&encoded.join("&"));
    }

    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in &event.headers {
        builder = builder.header(header_name(name)?, header_value(name, value)?);
    }
    // Multi-value entries only fill in names the single-value map does not carry.
    for (name, values) in &event.multi_value_headers {
        let header = header_name(name)?;
        if event
            .headers
            .keys()
            .any(|single| single.eq_ignore_ascii_case(header.as_str()))
        {
            continue;
        }
        for value in values {
            builder = builder.header(header.clone(), header_value(name, value)?);
        }
    }

    let body = match event.body {
        Some(body) if event.is_base64_encoded => Body::from(general_purpose::STANDARD.decode(body)?),
        Some(body) => Body::from(body),
        None => Body::empty(),
    };

    Ok(builder.body(body)?)
}

fn header_name(name: &str) -> Result<HeaderName, ServerlessError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| ServerlessError::Header(name.to_string()))
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ServerlessError> {
    HeaderValue::from_str(value).map_err(|_| ServerlessError::Header(name.to_string()))
}

/// Text bodies are passed through; anything that is not UTF-8 is base64-encoded.
pub async fn into_serverless_response<B>(
    response: Response<B>,
) -> Result<ServerlessResponse, ServerlessError>
where
    B: hyper::body::HttpBody,
    B::Error: Into<ServerlessError>,
{
    let (parts, body) = response.into_parts();

    let mut headers = BTreeMap::new();
    for name in parts.headers.keys() {
        let values: Vec<&str> = parts
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        headers.insert(name.as_str().to_string(), values.join(", "));
    }

    let bytes = hyper::body::to_bytes(body).await.map_err(Into::into)?;
    let (body, is_base64_encoded) = match String::from_utf8(bytes.to_vec()) {
        Ok(text) => (text, false),
        Err(_) => (general_purpose::STANDARD.encode(&bytes), true),
    };

    Ok(ServerlessResponse {
        status_code: parts.status.as_u16(),
        headers,
        body,
        is_base64_encoded,
    })
}

/// Runs one invocation event through the router.
pub async fn handle_event(app: Router, event: ServerlessRequest) -> ServerlessResponse {
    debug!(method = %event.http_method, path = %event.path, "handling serverless event");

    let request = match into_http_request(event) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "malformed serverless event");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    let response = match app.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    match into_serverless_response(response).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "failed to translate response");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> ServerlessResponse {
    let mut headers = BTreeMap::new();
    headers.insert(CONTENT_TYPE.as_str().to_string(), "application/json".to_string());
    ServerlessResponse {
        status_code: status.as_u16(),
        headers,
        body: json!({ "status": "fail", "message": message }).to_string(),
        is_base64_encoded: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(method: &str, path: &str) -> ServerlessRequest {
        ServerlessRequest {
            http_method: method.to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn request_translation_keeps_method_path_query_and_body() {
        let mut e = event("POST", "/api/todos");
        e.headers.insert("content-type".into(), "application/json".into());
        e.headers.insert("authorization".into(), "Bearer abc".into());
        let mut query = BTreeMap::new();
        query.insert("q".to_string(), "buy milk".to_string());
        query.insert("page".to_string(), "2".to_string());
        e.query_string_parameters = Some(query);
        e.body = Some(r#"{"title":"x"}"#.to_string());

        let request = into_http_request(e).unwrap();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri().path(), "/api/todos");
        assert_eq!(request.uri().query(), Some("page=2&q=buy%20milk"));
        assert_eq!(request.headers()["authorization"], "Bearer abc");

        let body = hyper::body::to_bytes(request.into_body()).await.unwrap();
        assert_eq!(&body[..], br#"{"title":"x"}"#);
    }

    #[tokio::test]
    async fn base64_bodies_are_decoded() {
        let mut e = event("PUT", "api/todos/1");
        e.body = Some(general_purpose::STANDARD.encode(b"{}"));
        e.is_base64_encoded = true;

        let request = into_http_request(e).unwrap();
        assert_eq!(request.uri().path(), "/api/todos/1");
        let body = hyper::body::to_bytes(request.into_body()).await.unwrap();
        assert_eq!(&body[..], b"{}");
    }

    #[test]
    fn bad_events_are_rejected() {
        assert!(matches!(
            into_http_request(event("GE T", "/")),
            Err(ServerlessError::Method(_))
        ));

        let mut e = event("GET", "/");
        e.headers.insert("bad header".into(), "x".into());
        assert!(matches!(into_http_request(e), Err(ServerlessError::Header(_))));

        let mut e = event("POST", "/");
        e.body = Some("%%%".into());
        e.is_base64_encoded = true;
        assert!(matches!(into_http_request(e), Err(ServerlessError::Base64(_))));
    }

    #[tokio::test]
    async fn binary_response_bodies_are_base64_encoded() {
        let response = Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/octet-stream")
            .body(Body::from(vec![0xff, 0xfe, 0x00]))
            .unwrap();

        let translated = into_serverless_response(response).await.unwrap();
        assert_eq!(translated.status_code, 200);
        assert!(translated.is_base64_encoded);
        assert_eq!(general_purpose::STANDARD.decode(&translated.body).unwrap(), vec![0xff, 0xfe, 0x00]);
        assert_eq!(translated.headers["content-type"], "application/octet-stream");
    }

    #[test]
    fn event_json_uses_camel_case() {
        let e: ServerlessRequest = serde_json::from_str(
            r#"{"httpMethod":"GET","path":"/health","headers":{"accept":"*/*"},"isBase64Encoded":false}"#,
        )
        .unwrap();
        assert_eq!(e.http_method, "GET");
        assert!(e.body.is_none());
        assert!(e.query_string_parameters.is_none());
    }

    #[test]
    fn null_fields_from_the_host_are_treated_as_absent() {
        let e: ServerlessRequest = serde_json::from_str(
            r#"{"httpMethod":"GET","path":"/health","headers":null,"multiValueHeaders":null,
                "queryStringParameters":null,"body":null,"isBase64Encoded":null}"#,
        )
        .unwrap();
        assert!(e.headers.is_empty());
        assert!(e.multi_value_headers.is_empty());
        assert!(!e.is_base64_encoded);

        let request = into_http_request(e).unwrap();
        assert_eq!(request.uri(), "/health");
    }

    #[test]
    fn multi_value_headers_fill_in_missing_names() {
        let e: ServerlessRequest = serde_json::from_str(
            r#"{"httpMethod":"GET","path":"/api/todos",
                "headers":{"Accept":"application/json"},
                "multiValueHeaders":{"accept":["text/html"],"Authorization":["Bearer abc"],"x-tag":["a","b"]}}"#,
        )
        .unwrap();

        let request = into_http_request(e).unwrap();
        let headers = request.headers();
        let accept: Vec<_> = headers.get_all("accept").iter().collect();
        assert_eq!(accept, vec!["application/json"]);
        assert_eq!(headers["authorization"], "Bearer abc");
        let tags: Vec<_> = headers.get_all("x-tag").iter().collect();
        assert_eq!(tags, vec!["a", "b"]);
    }
}
