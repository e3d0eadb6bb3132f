use std::fmt;

use anyhow::Error as AnyError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use carte_core::{MenuError, is_version_conflict};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use tracing::{error, warn};

#[derive(Debug, Clone, Copy)]
struct ErrorDescriptor {
    status: StatusCode,
    name: &'static str,
    error_type: &'static str,
    default_message: &'static str,
}

const BAD_REQUEST_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::BAD_REQUEST,
    name: "BAD_REQUEST",
    error_type: "BAD_REQUEST",
    default_message: "Bad request.",
};

const CONFLICT_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::CONFLICT,
    name: "RESOURCE_CONFLICT",
    error_type: "RESOURCE_CONFLICT",
    default_message: "Resource changed concurrently.",
};

const NOT_FOUND_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::NOT_FOUND,
    name: "NOT_FOUND",
    error_type: "RESOURCE_NOT_FOUND",
    default_message: "Resource not found.",
};

const INTERNAL_SERVER_ERROR_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::INTERNAL_SERVER_ERROR,
    name: "INTERNAL_SERVER_ERROR",
    error_type: "INTERNAL_SERVER_ERROR",
    default_message: "An internal error occurred.",
};

#[derive(Debug)]
pub struct AppError {
    descriptor: &'static ErrorDescriptor,
    name: String,
    error_type: String,
    message: String,
    data: Option<JsonValue>,
    source: Option<AnyError>,
}

impl AppError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::from_descriptor(&BAD_REQUEST_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::from_descriptor(&NOT_FOUND_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn internal(error: AnyError) -> Self {
        error!(?error, "internal server error");
        Self::from_descriptor(&INTERNAL_SERVER_ERROR_DESCRIPTOR, None).with_source(error)
    }

    /// Store failures keep their full cause chain in the message so callers
    /// see what the backend reported.
    pub(crate) fn backend(error: AnyError) -> Self {
        let message = format!("{error:#}");
        error!(?error, "menu backend failure");
        Self::from_descriptor(&INTERNAL_SERVER_ERROR_DESCRIPTOR, Some(message))
            .with_name("BACKEND_ERROR")
            .with_source(error)
    }

    pub(crate) fn version_conflict(error: AnyError) -> Self {
        let message = format!("{error:#}");
        warn!(?error, "menu document changed concurrently");
        Self::from_descriptor(&CONFLICT_DESCRIPTOR, Some(message))
            .with_name("DOCUMENT_VERSION_CONFLICT")
            .with_source(error)
    }

    pub(crate) fn from_anyhow(error: AnyError) -> Self {
        if is_version_conflict(&error) {
            Self::version_conflict(error)
        } else {
            Self::backend(error)
        }
    }

    pub(crate) fn restaurant_not_found(restaurant_id: &str) -> Self {
        let restaurant_id = restaurant_id.to_owned();
        let message = format!("Restaurant {restaurant_id} not found.");

        Self::not_found(message)
            .with_name("RESTAURANT_NOT_FOUND")
            .with_data(json!({ "restaurantId": restaurant_id }))
    }

    pub(crate) fn category_not_found(restaurant_id: &str, category_id: &str) -> Self {
        let restaurant_id = restaurant_id.to_owned();
        let category_id = category_id.to_owned();
        let message = format!("Category {category_id} not found in Restaurant {restaurant_id}.");

        Self::not_found(message)
            .with_name("CATEGORY_NOT_FOUND")
            .with_data(json!({ "restaurantId": restaurant_id, "categoryId": category_id }))
    }

    pub(crate) fn category_exists(restaurant_id: &str, category_id: &str) -> Self {
        let restaurant_id = restaurant_id.to_owned();
        let category_id = category_id.to_owned();
        let message =
            format!("Category {category_id} already exists in Restaurant {restaurant_id}.");

        Self::bad_request(message)
            .with_name("CATEGORY_ALREADY_EXISTS")
            .with_error_type("RESOURCE_ALREADY_EXISTS")
            .with_data(json!({ "restaurantId": restaurant_id, "categoryId": category_id }))
    }

    pub(crate) fn image_not_found(filename: &str) -> Self {
        let filename = filename.to_owned();
        let message = format!("Image {filename} not found.");

        Self::not_found(message)
            .with_name("IMAGE_NOT_FOUND")
            .with_data(json!({ "filename": filename }))
    }

    pub(crate) fn status(&self) -> StatusCode {
        self.descriptor.status
    }

    pub(crate) fn into_payload(self) -> (StatusCode, UserFriendlyPayload) {
        let AppError {
            descriptor,
            name,
            error_type,
            message,
            data,
            source: _,
        } = self;

        let status = descriptor.status;
        let (code, reason) = code_and_reason(status);
        let payload = UserFriendlyPayload {
            status: status.as_u16(),
            code,
            reason,
            error_type,
            name,
            message,
            data,
        };

        (status, payload)
    }

    fn from_descriptor(descriptor: &'static ErrorDescriptor, message: Option<String>) -> Self {
        Self {
            descriptor,
            name: descriptor.name.to_owned(),
            error_type: descriptor.error_type.to_owned(),
            message: message.unwrap_or_else(|| descriptor.default_message.to_owned()),
            data: None,
            source: None,
        }
    }

    fn with_source(mut self, error: AnyError) -> Self {
        self.source = Some(error);
        self
    }

    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = error_type.into();
        self
    }

    pub(crate) fn with_data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<MenuError> for AppError {
    fn from(error: MenuError) -> Self {
        match error {
            MenuError::RestaurantNotFound { restaurant_id } => {
                Self::restaurant_not_found(&restaurant_id)
            }
            MenuError::CategoryNotFound {
                restaurant_id,
                category_id,
            } => Self::category_not_found(&restaurant_id, &category_id),
            MenuError::CategoryExists {
                restaurant_id,
                category_id,
            } => Self::category_exists(&restaurant_id, &category_id),
            MenuError::IdSpaceExhausted => {
                Self::internal(AnyError::new(MenuError::IdSpaceExhausted))
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = self.into_payload();
        (status, Json(payload)).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UserFriendlyPayload {
    pub(crate) status: u16,
    pub(crate) code: String,
    pub(crate) reason: String,
    #[serde(rename = "type")]
    pub(crate) error_type: String,
    pub(crate) name: String,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data: Option<JsonValue>,
}

fn code_and_reason(status: StatusCode) -> (String, String) {
    let reason = status
        .canonical_reason()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("Status {}", status.as_u16()));

    let code = reason
        .chars()
        .map(|ch| match ch {
            'a'..='z' => ch.to_ascii_uppercase(),
            'A'..='Z' | '0'..='9' => ch,
            _ => '_',
        })
        .collect::<String>();

    (code, reason)
}
