// Uploaded image downloads

use anyhow::Error as AnyError;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::Response,
};

use crate::{AppError, state::AppState};

const IMAGE_CACHE_CONTROL: &str = "public, max-age=2592000, immutable";

pub(crate) async fn get_image_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let image = state.menu_service.image(&filename).await?;
    let byte_len = image.bytes.len();

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .body(Body::from(image.bytes))
        .map_err(|err| AppError::internal(AnyError::new(err)))?;

    let headers = response.headers_mut();
    let content_type = HeaderValue::from_str(&image.content_type)
        .map_err(|err| AppError::internal(AnyError::new(err)))?;
    headers.insert(HeaderName::from_static("content-type"), content_type);
    headers.insert(
        HeaderName::from_static("content-length"),
        HeaderValue::from(byte_len),
    );
    headers.insert(
        HeaderName::from_static("cache-control"),
        HeaderValue::from_static(IMAGE_CACHE_CONTROL),
    );

    Ok(response)
}
