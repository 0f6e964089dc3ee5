use crate::error::{AppError, Result};
use crate::model::{BatchItem, BatchResult, ShortenRequest, ShortenResponse};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::Json;
use shorturl_core::Shortened;

fn status_of(shortened: &Shortened) -> StatusCode {
    if shortened.is_conflict() {
        StatusCode::CONFLICT
    } else {
        StatusCode::CREATED
    }
}

/// `POST /` with the original URL as a plain text body.
pub async fn create_short_url_handler(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, String)> {
    let shortened = state.shortener().shorten(body.trim()).await?;
    let status = status_of(&shortened);
    let short_url = match shortened {
        Shortened::Created(url) | Shortened::Conflict(url) => url,
    };
    Ok((status, short_url))
}

pub async fn shorten_handler(
    State(state): State<AppState>,
    request: std::result::Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ShortenResponse>)> {
    let Json(request) = request?;
    let shortened = state.shortener().shorten(&request.url).await?;
    let status = status_of(&shortened);
    let result = shortened.short_url().to_string();
    Ok((status, Json(ShortenResponse { result })))
}

pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    request: std::result::Result<Json<Vec<BatchItem>>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<BatchResult>>)> {
    let Json(items) = request?;
    let results = state.shortener().shorten_batch(items).await?;
    Ok((StatusCode::CREATED, Json(results)))
}

pub async fn redirect_handler(
    Path(key): Path<String>,
    State(state): State<AppState>,
) -> Result<Redirect> {
    let original_url = state.shortener().resolve(&key).await?;
    Ok(Redirect::temporary(&original_url))
}

pub async fn unsupported_handler() -> AppError {
    AppError::Unsupported
}
