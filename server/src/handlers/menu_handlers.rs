// Restaurant, category and item endpoints

use axum::{
    Json,
    extract::{Multipart, Path, State},
    response::IntoResponse,
};

use super::form::{FormFields, multipart_error};
use crate::{
    AppError,
    state::AppState,
    types::{
        CreateCategoryForm, CreateRestaurantForm, ImageUpload, ItemCreated, ItemUpload,
        MenuResponse,
    },
};

pub(crate) async fn create_restaurant_handler(
    State(state): State<AppState>,
    FormFields(form): FormFields<CreateRestaurantForm>,
) -> Result<impl IntoResponse, AppError> {
    let created = state.menu_service.create_restaurant(&form.name).await?;
    Ok(Json(created))
}

pub(crate) async fn get_menu_handler(
    State(state): State<AppState>,
    Path(restaurant_id): Path<String>,
) -> Result<Json<MenuResponse>, AppError> {
    let menu = state.menu_service.menu(&restaurant_id).await?;
    Ok(Json(menu))
}

pub(crate) async fn create_category_handler(
    State(state): State<AppState>,
    Path(restaurant_id): Path<String>,
    FormFields(form): FormFields<CreateCategoryForm>,
) -> Result<impl IntoResponse, AppError> {
    let created = state
        .menu_service
        .create_category(&restaurant_id, &form.category_name)
        .await?;
    Ok(Json(created))
}

pub(crate) async fn add_item_handler(
    State(state): State<AppState>,
    Path((restaurant_id, category_id)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<Json<ItemCreated>, AppError> {
    let upload = read_item_upload(multipart).await?;
    let item = state
        .menu_service
        .add_item(
            &restaurant_id,
            &category_id,
            &upload.name,
            upload.price,
            &upload.image.bytes,
            &upload.image.filename,
        )
        .await?;
    Ok(Json(item))
}

// Multipart parsing

async fn read_item_upload(mut multipart: Multipart) -> Result<ItemUpload, AppError> {
    let mut name = None;
    let mut price = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("name") => name = Some(field.text().await.map_err(multipart_error)?),
            Some("price") => {
                let raw = field.text().await.map_err(multipart_error)?;
                price = Some(parse_price(&raw)?);
            }
            Some("image") => {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                image = Some(ImageUpload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    Ok(ItemUpload {
        name: name.ok_or_else(|| missing_field("name"))?,
        price: price.ok_or_else(|| missing_field("price"))?,
        image: image.ok_or_else(|| missing_field("image"))?,
    })
}

fn parse_price(raw: &str) -> Result<f64, AppError> {
    match raw.trim().parse::<f64>() {
        Ok(price) if price.is_finite() => Ok(price),
        _ => Err(AppError::bad_request(format!("invalid price: {raw}"))
            .with_name("INVALID_PRICE")),
    }
}

fn missing_field(field: &str) -> AppError {
    AppError::bad_request(format!("missing form field: {field}")).with_name("MISSING_FIELD")
}
