use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, TypedHeader};
use headers::{ContentType, Host};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::error::ShortUrlError;
use crate::service::{ShortUrlService, MAX_TTL_SECONDS};

/// Longest target URL the shorten endpoint accepts.
pub const MAX_TARGET_URL_LEN: usize = 4000;

#[derive(Clone)]
pub struct AppState {
    pub service: ShortUrlService,
    /// Configured link base; when `None` the base is derived per-request
    /// from the `Host` header.
    pub base_url: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/shorten", post(shorten))
        .route("/s/:code", get(resolve))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    InvalidTarget(&'static str),
    JsonError(serde_json::Error),
    NotFound,
    Internal,
}

impl ApiError {
    /// Core failures are logged in full and surfaced as an opaque 500.
    fn internal(err: ShortUrlError) -> Self {
        tracing::error!(error = %err, "short url service failure");
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (message, status) = match self {
            ApiError::InvalidTarget(reason) => (reason.to_string(), StatusCode::BAD_REQUEST),
            ApiError::JsonError(err) => (
                format!("Error parsing json: {}", err),
                StatusCode::BAD_REQUEST,
            ),
            ApiError::NotFound => ("Not Found".to_string(), StatusCode::NOT_FOUND),
            ApiError::Internal => ("Server Error".to_string(), StatusCode::INTERNAL_SERVER_ERROR),
        };

        #[derive(Debug, Serialize)]
        struct ErrorBody {
            message: String,
        }

        let mut res = Json(ErrorBody { message }).into_response();
        *res.status_mut() = status;
        res
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ShortenRequest {
    url: String,
    ttl_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ShortenResponse {
    short_url: String,
    code: String,
    expires_at: i64,
}

async fn shorten(
    State(state): State<AppState>,
    host: Option<TypedHeader<Host>>,
    content_type: Option<TypedHeader<ContentType>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<ShortenResponse>, ApiError> {
    let request = match content_type {
        Some(TypedHeader(ct)) if ct == ContentType::json() => {
            serde_json::from_str::<ShortenRequest>(&body).map_err(ApiError::JsonError)?
        }
        _ => ShortenRequest {
            url: body,
            ttl_seconds: None,
        },
    };

    validate_target_url(&request.url)?;

    let ttl = request.ttl_seconds.unwrap_or(MAX_TTL_SECONDS);
    let record = state
        .service
        .create(request.url, ttl)
        .await
        .map_err(ApiError::internal)?;

    let base = base_url(&state, host.as_ref().map(|TypedHeader(h)| h), &headers);
    Ok(Json(ShortenResponse {
        short_url: format!("{}/s/{}", base, record.code),
        code: record.code,
        expires_at: record.expires_at,
    }))
}

async fn resolve(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    if !is_well_formed_code(&code) {
        return Err(ApiError::NotFound);
    }

    match state
        .service
        .resolve(code)
        .await
        .map_err(ApiError::internal)?
    {
        // 302 with an explicit Location header; axum's Redirect::to emits 303.
        Some(entry) => {
            Ok((StatusCode::FOUND, [(header::LOCATION, entry.target_url)]).into_response())
        }
        None => Err(ApiError::NotFound),
    }
}

/// Codes handed to the resolve endpoint must look like ours before the store
/// is consulted: 6-8 alphanumeric characters.
fn is_well_formed_code(code: &str) -> bool {
    (6..=8).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Validation happens here, upstream of the core; the service itself never
/// re-checks URL shape.
fn validate_target_url(target: &str) -> Result<(), ApiError> {
    if target.is_empty() {
        return Err(ApiError::InvalidTarget("target URL is missing"));
    }
    if target.len() > MAX_TARGET_URL_LEN {
        return Err(ApiError::InvalidTarget("target URL is too long"));
    }

    let parsed =
        Url::parse(target).map_err(|_| ApiError::InvalidTarget("target URL is not a valid URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::InvalidTarget(
            "target URL scheme must be http or https",
        ));
    }
    if parsed.host().is_none() {
        return Err(ApiError::InvalidTarget("target URL has no host"));
    }

    Ok(())
}

fn base_url(state: &AppState, host: Option<&Host>, headers: &HeaderMap) -> String {
    if let Some(base) = &state.base_url {
        return base.clone();
    }

    let scheme = match headers.get("x-forwarded-proto") {
        Some(proto) if proto.as_bytes() == b"https" => "https",
        _ => "http",
    };
    let host = host
        .map(|h| h.to_string())
        .unwrap_or_else(|| "localhost".to_string());
    format!("{}://{}", scheme, host)
}

#[cfg(test)]
mod tests {
    use super::{is_well_formed_code, validate_target_url};

    #[test]
    fn accepts_https_targets() {
        assert!(validate_target_url("https://www.youtube.com/playlist?list=PLabc123").is_ok());
        assert!(validate_target_url("http://example.com").is_ok());
    }

    #[test]
    fn rejects_javascript_urls() {
        assert!(validate_target_url("javascript:alert(1)").is_err());
        assert!(validate_target_url("ftp://example.com/file").is_err());
    }

    #[test]
    fn rejects_empty_targets() {
        assert!(validate_target_url("").is_err());
        assert!(validate_target_url("not a url").is_err());
    }

    #[test]
    fn rejects_oversized_targets() {
        let url = format!("https://example.com/{}", "a".repeat(4000));
        assert!(validate_target_url(&url).is_err());
    }

    #[test]
    fn code_shape_is_checked_before_lookup() {
        assert!(is_well_formed_code("abc123"));
        assert!(is_well_formed_code("AbC1234z"));
        assert!(!is_well_formed_code("abc12"));
        assert!(!is_well_formed_code("abc123456"));
        assert!(!is_well_formed_code("abc 12"));
        assert!(!is_well_formed_code("abc-12"));
    }
}
