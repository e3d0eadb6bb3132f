// Request and response types for REST API handlers

use carte_core::{
    ids::{CategoryId, RestaurantId},
    menu::{Item, Restaurant},
};
use serde::{Deserialize, Serialize};

// ========== Request Types ==========

#[derive(Deserialize)]
pub(crate) struct CreateRestaurantForm {
    pub(crate) name: String,
}

#[derive(Deserialize)]
pub(crate) struct CreateCategoryForm {
    pub(crate) category_name: String,
}

/// Multipart fields of an item upload, collected before validation.
pub(crate) struct ItemUpload {
    pub(crate) name: String,
    pub(crate) price: f64,
    pub(crate) image: ImageUpload,
}

pub(crate) struct ImageUpload {
    pub(crate) filename: String,
    pub(crate) bytes: Vec<u8>,
}

// ========== Response Types ==========

#[derive(Serialize)]
pub(crate) struct StatusResponse {
    pub(crate) status: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestaurantCreated {
    pub restaurant_id: RestaurantId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryCreated {
    pub category_id: CategoryId,
    pub name: String,
}

/// Full restaurant subtree as stored in the menu document.
pub type MenuResponse = Restaurant;

pub type ItemCreated = Item;
