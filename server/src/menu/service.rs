use std::sync::Arc;

use carte_core::{
    DocumentStore, ImageStore, MenuDocument, NewItem, StoredImage,
    menu::{Item, Restaurant},
};
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    AppError,
    types::{CategoryCreated, RestaurantCreated},
};

/// Restaurant, category and item operations over the menu document.
///
/// Every mutation runs load → mutate → save while holding `write_lock`, so two
/// requests served by this process never overwrite each other's changes.
/// Reads go straight to the store.
pub struct MenuService {
    documents: Arc<dyn DocumentStore>,
    images: Arc<dyn ImageStore>,
    write_lock: Mutex<()>,
}

impl MenuService {
    pub fn new(documents: Arc<dyn DocumentStore>, images: Arc<dyn ImageStore>) -> Self {
        Self {
            documents,
            images,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<MenuDocument, AppError> {
        self.documents.load().await.map_err(AppError::from_anyhow)
    }

    async fn save(&self, document: &MenuDocument, change: &str) -> Result<(), AppError> {
        self.documents
            .save(document, change)
            .await
            .map_err(AppError::from_anyhow)
    }

    pub async fn create_restaurant(&self, name: &str) -> Result<RestaurantCreated, AppError> {
        let name = required("name", name)?;

        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        let restaurant_id = document.create_restaurant(name)?;
        self.save(
            &document,
            &format!("Create restaurant {name} ({restaurant_id})"),
        )
        .await?;

        info!(%restaurant_id, name, "restaurant created");
        Ok(RestaurantCreated {
            restaurant_id,
            name: name.to_owned(),
        })
    }

    pub async fn menu(&self, restaurant_id: &str) -> Result<Restaurant, AppError> {
        let document = self.load().await?;
        Ok(document.restaurant(restaurant_id)?.clone())
    }

    pub async fn create_category(
        &self,
        restaurant_id: &str,
        name: &str,
    ) -> Result<CategoryCreated, AppError> {
        let name = required("category_name", name)?;

        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        let category_id = document.create_category(restaurant_id, name)?;
        self.save(
            &document,
            &format!("Add category {name} to {restaurant_id}"),
        )
        .await?;

        info!(%restaurant_id, %category_id, "category created");
        Ok(CategoryCreated {
            category_id,
            name: name.to_owned(),
        })
    }

    /// Stores the image and appends the item.
    ///
    /// Parents are checked before the image is written. If the final save
    /// fails the image stays behind unreferenced.
    pub async fn add_item(
        &self,
        restaurant_id: &str,
        category_id: &str,
        name: &str,
        price: f64,
        image: &[u8],
        image_filename: &str,
    ) -> Result<Item, AppError> {
        let name = required("name", name)?;

        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        document.category(restaurant_id, category_id)?;

        let image_path = self
            .images
            .save(image, image_filename)
            .await
            .map_err(AppError::from_anyhow)?;

        let item = document.add_item(
            restaurant_id,
            category_id,
            NewItem {
                name: name.to_owned(),
                price,
                image: image_path,
            },
        )?;
        self.save(
            &document,
            &format!("Add item {name} to {restaurant_id}/{category_id}"),
        )
        .await?;

        info!(%restaurant_id, %category_id, item_id = %item.id, "item added");
        Ok(item)
    }

    pub async fn image(&self, filename: &str) -> Result<StoredImage, AppError> {
        self.images
            .get(filename)
            .await
            .map_err(AppError::from_anyhow)?
            .ok_or_else(|| AppError::image_not_found(filename))
    }
}

/// Rejects blank input; anything else is stored exactly as submitted.
fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, AppError> {
    if value.trim().is_empty() {
        Err(AppError::bad_request(format!("{field} must not be empty")))
    } else {
        Ok(value)
    }
}
