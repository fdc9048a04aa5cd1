use crate::error::{AppError, Result};
use crate::model::{CreateUrlRequest, CreateUrlResponse};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use snip_core::{ShortCode, ShortenParams};
use tracing::debug;

/// Validates that the URL has a valid format (http or https scheme and a host).
fn validate_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(AppError::InvalidRequest(
            "original_url cannot be empty".to_string(),
        ));
    }

    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(AppError::InvalidRequest(format!(
            "original_url must have a scheme and host: {url}"
        )));
    };

    let scheme = scheme.to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(AppError::InvalidRequest(format!(
            "original_url scheme must be http or https: {scheme}"
        )));
    }

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || url.chars().any(char::is_whitespace) {
        return Err(AppError::InvalidRequest(format!(
            "original_url must have a scheme and host: {url}"
        )));
    }

    Ok(())
}

fn parse_custom_code(custom_code: Option<String>) -> Result<Option<ShortCode>> {
    match custom_code.as_deref() {
        None | Some("") => Ok(None),
        Some(code) => ShortCode::new(code)
            .map(Some)
            .map_err(|e| AppError::InvalidRequest(e.to_string())),
    }
}

pub async fn create_url_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateUrlRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUrlResponse>)> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    validate_url(&request.original_url)?;
    let custom_code = parse_custom_code(request.custom_code)?;

    let mut params = ShortenParams::new(request.original_url).with_expiration(request.duration);
    if let Some(code) = custom_code {
        params = params.with_custom_code(code);
    }

    let record = state.shortener().shorten(params).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUrlResponse {
            short_url: record.short_code.to_url(state.base_url()),
            expires_at: record.expires_at,
        }),
    ))
}

pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response> {
    // A code that could never have been issued cannot resolve.
    let Ok(code) = ShortCode::new(&code) else {
        debug!(code = %code, "Rejected malformed short code");
        return Err(AppError::NotFound);
    };

    let record = state
        .shortener()
        .resolve(&code)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok((StatusCode::FOUND, [(header::LOCATION, record.original_url)]).into_response())
}
