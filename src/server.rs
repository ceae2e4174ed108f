use crate::errors::{ErrorDetails, ErrorKind, InvalidParamsError, ServiceError};
use crate::state::{AppState, Session};
use crate::tools;
use anyhow::{Context, Result};
use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// Every boundary operation as a JSON POST endpoint.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = match state.config().max_body_bytes() {
        Some(bytes) => DefaultBodyLimit::max(bytes),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/schema", get(schemas))
        .route("/api/load-and-validate", post(load_and_validate))
        .route("/api/get-spreadsheet", post(get_spreadsheet))
        .route("/api/add-row", post(add_row))
        .route("/api/update-row", post(update_row))
        .route("/api/save-row", post(save_row))
        .route("/api/sync", post(sync_spreadsheet))
        .route("/api/add-sheet", post(add_sheet))
        .route("/api/add-language", post(add_language_column))
        .route("/api/apply-fix", post(apply_fix))
        .route("/api/batch-apply-fix", post(batch_apply_fix))
        .route("/api/export", post(export_to_i18n))
        .layer(body_limit)
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = state.config().http_bind_address;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    serve_listener(state, listener).await
}

/// Serve on an already bound listener; tests bind port 0 and read the address back.
pub async fn serve_listener(state: Arc<AppState>, listener: tokio::net::TcpListener) -> Result<()> {
    let addr: SocketAddr = listener.local_addr().context("listener has no local address")?;
    tracing::info!(%addr, "http server listening");
    axum::serve(listener, router(state))
        .await
        .inspect_err(|error| tracing::error!("serving error: {:?}", error))
        .context("http server failed")
}

async fn healthz() -> &'static str {
    "ok"
}

async fn schemas() -> axum::Json<serde_json::Value> {
    axum::Json(tools::operation_schemas())
}

async fn load_and_validate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = session_for(&state, &headers);
    run_operation(&state, "load_and_validate", async {
        tools::load_and_validate(&session, parse_params("load_and_validate", &body)?).await
    })
    .await
}

async fn get_spreadsheet(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = session_for(&state, &headers);
    run_operation(&state, "get_spreadsheet", async {
        tools::get_spreadsheet(&session, parse_params("get_spreadsheet", &body)?).await
    })
    .await
}

async fn add_row(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let session = session_for(&state, &headers);
    run_operation(&state, "add_row", async {
        tools::add_row(&session, parse_params("add_row", &body)?).await
    })
    .await
}

async fn update_row(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = session_for(&state, &headers);
    run_operation(&state, "update_row", async {
        tools::update_row(&session, parse_params("update_row", &body)?).await?;
        Ok::<_, ServiceError>(tools::UpdateRowResponse { updated: true })
    })
    .await
}

async fn save_row(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let session = session_for(&state, &headers);
    run_operation(&state, "save_row", async {
        tools::save_row(&session, parse_params("save_row", &body)?).await
    })
    .await
}

async fn sync_spreadsheet(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = session_for(&state, &headers);
    run_operation(&state, "sync_spreadsheet", async {
        tools::sync_spreadsheet(&session, parse_params("sync_spreadsheet", &body)?).await
    })
    .await
}

async fn add_sheet(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let session = session_for(&state, &headers);
    run_operation(&state, "add_sheet", async {
        tools::add_sheet(&session, parse_params("add_sheet", &body)?).await
    })
    .await
}

async fn add_language_column(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = session_for(&state, &headers);
    run_operation(&state, "add_language_column", async {
        tools::add_language_column(&session, parse_params("add_language_column", &body)?).await
    })
    .await
}

async fn apply_fix(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let session = session_for(&state, &headers);
    run_operation(&state, "apply_fix", async {
        tools::apply_fix(&session, parse_params("apply_fix", &body)?).await
    })
    .await
}

async fn batch_apply_fix(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = session_for(&state, &headers);
    run_operation(&state, "batch_apply_fix", async {
        tools::batch_apply_fix(&session, parse_params("batch_apply_fix", &body)?).await
    })
    .await
}

async fn export_to_i18n(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    run_operation(&state, "export_to_i18n", async {
        tools::export_to_i18n(parse_params("export_to_i18n", &body)?)
    })
    .await
}

fn session_for(state: &AppState, headers: &HeaderMap) -> Session {
    state.session(bearer_token(headers))
}

/// Token from `Authorization: Bearer <token>`. Any other scheme counts as no user.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn parse_params<P: DeserializeOwned>(
    operation: &'static str,
    body: &[u8],
) -> Result<P, ServiceError> {
    serde_json::from_slice(body).map_err(|err| {
        let problem = err.to_string();
        let mut error = InvalidParamsError::new(operation, format!("invalid request body: {problem}"));
        if let Some(path) = missing_field(&problem) {
            error = error.with_path(path);
        }
        ServiceError::from(error)
    })
}

fn missing_field(problem: &str) -> Option<String> {
    let rest = problem.strip_prefix("missing field `")?;
    rest.split('`').next().map(str::to_string)
}

async fn run_operation<T, F>(state: &AppState, operation: &'static str, fut: F) -> Response
where
    F: Future<Output = Result<T, ServiceError>>,
    T: Serialize,
{
    tracing::info!(operation, "operation requested");
    let result = match state.config().request_timeout() {
        Some(timeout) => match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::internal(format!(
                "operation '{operation}' timed out after {}ms",
                timeout.as_millis()
            ))),
        },
        None => fut.await,
    };

    match result {
        Ok(payload) => (StatusCode::OK, axum::Json(payload)).into_response(),
        Err(error) => {
            if error.kind == ErrorKind::Internal {
                tracing::error!(operation, error = %error, "operation failed");
            } else {
                tracing::warn!(operation, kind = error.kind.as_str(), error = %error, "operation rejected");
            }
            error_response(error)
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorPayload,
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    kind: ErrorKind,
    message: String,
    details: ErrorDetails,
}

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::FormatError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: ServiceError) -> Response {
    let ServiceError {
        kind,
        message,
        details,
    } = error;
    let body = ErrorBody {
        error: ErrorPayload {
            kind,
            message,
            details,
        },
    };
    (status_for(kind), axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(
            bearer_token(&headers_with("Bearer ya29.abc")).as_deref(),
            Some("ya29.abc")
        );
        assert_eq!(
            bearer_token(&headers_with("bearer   ya29.abc ")).as_deref(),
            Some("ya29.abc")
        );
    }

    #[test]
    fn other_schemes_and_blank_tokens_are_ignored() {
        assert_eq!(bearer_token(&headers_with("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn error_kinds_map_to_statuses() {
        assert_eq!(status_for(ErrorKind::FormatError), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::PermissionDenied), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::RateLimited), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn malformed_body_reports_missing_field_path() {
        let err = parse_params::<tools::DocumentParams>("load_and_validate", b"{}").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.details.path.as_deref(), Some("documentId"));
    }
}
