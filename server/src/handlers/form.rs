// Form bodies accepted in either urlencoded or multipart encoding

use axum::{
    Form,
    extract::{FromRequest, Multipart, Request, multipart::MultipartError},
    http::header::CONTENT_TYPE,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::AppError;

/// Deserializes text form fields from `application/x-www-form-urlencoded` or
/// `multipart/form-data`, whichever the request declares.
pub(crate) struct FormFields<T>(pub(crate) T);

impl<S, T> FromRequest<S> for FormFields<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&request) {
            let Form(value) = Form::<T>::from_request(request, state)
                .await
                .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
            return Ok(Self(value));
        }

        let mut multipart = Multipart::from_request(request, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

        let mut fields = Map::new();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let text = field.text().await.map_err(multipart_error)?;
            fields.insert(name, JsonValue::String(text));
        }

        serde_json::from_value(JsonValue::Object(fields))
            .map(Self)
            .map_err(|err| AppError::bad_request(format!("invalid form body: {err}")))
    }
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        })
}

pub(crate) fn multipart_error(err: MultipartError) -> AppError {
    AppError::bad_request(format!("invalid multipart body: {}", err.body_text()))
}
