use std::{error::Error as StdError, fmt};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ids::{CategoryId, ItemId, RestaurantId};

/// Upper bound on regenerating a short id that clashes with one already in
/// the loaded document.
const MAX_ID_ATTEMPTS: usize = 16;

/// The whole persisted menu: every restaurant keyed by its short id.
///
/// Key order is insertion order and survives a save/load round-trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuDocument {
    restaurants: IndexMap<RestaurantId, Restaurant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub name: String,
    #[serde(default)]
    pub categories: IndexMap<CategoryId, Category>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub price: f64,
    pub image: String,
}

/// Fields supplied by the caller when adding an item; the id is assigned by
/// the document.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub price: f64,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuError {
    RestaurantNotFound {
        restaurant_id: String,
    },
    CategoryNotFound {
        restaurant_id: String,
        category_id: String,
    },
    CategoryExists {
        restaurant_id: String,
        category_id: String,
    },
    IdSpaceExhausted,
}

impl fmt::Display for MenuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RestaurantNotFound { restaurant_id } => {
                write!(f, "Restaurant {restaurant_id} not found.")
            }
            Self::CategoryNotFound {
                restaurant_id,
                category_id,
            } => write!(
                f,
                "Category {category_id} not found in Restaurant {restaurant_id}."
            ),
            Self::CategoryExists {
                restaurant_id,
                category_id,
            } => write!(
                f,
                "Category {category_id} already exists in Restaurant {restaurant_id}."
            ),
            Self::IdSpaceExhausted => write!(f, "failed to generate an unused identifier"),
        }
    }
}

impl StdError for MenuError {}

impl MenuDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.restaurants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.restaurants.is_empty()
    }

    pub fn restaurants(&self) -> impl Iterator<Item = (&RestaurantId, &Restaurant)> {
        self.restaurants.iter()
    }

    pub fn restaurant(&self, restaurant_id: &str) -> Result<&Restaurant, MenuError> {
        self.restaurants
            .get(restaurant_id)
            .ok_or_else(|| MenuError::RestaurantNotFound {
                restaurant_id: restaurant_id.to_owned(),
            })
    }

    fn restaurant_mut(&mut self, restaurant_id: &str) -> Result<&mut Restaurant, MenuError> {
        self.restaurants
            .get_mut(restaurant_id)
            .ok_or_else(|| MenuError::RestaurantNotFound {
                restaurant_id: restaurant_id.to_owned(),
            })
    }

    pub fn category(&self, restaurant_id: &str, category_id: &str) -> Result<&Category, MenuError> {
        self.restaurant(restaurant_id)?
            .categories
            .get(category_id)
            .ok_or_else(|| MenuError::CategoryNotFound {
                restaurant_id: restaurant_id.to_owned(),
                category_id: category_id.to_owned(),
            })
    }

    /// Inserts a restaurant with no categories under a freshly generated id.
    pub fn create_restaurant(&mut self, name: &str) -> Result<RestaurantId, MenuError> {
        let restaurant_id = unused_id(RestaurantId::generate, |id| {
            self.restaurants.contains_key(id)
        })?;

        self.restaurants.insert(
            restaurant_id.clone(),
            Restaurant {
                name: name.to_owned(),
                categories: IndexMap::new(),
            },
        );

        Ok(restaurant_id)
    }

    pub fn create_category(
        &mut self,
        restaurant_id: &str,
        name: &str,
    ) -> Result<CategoryId, MenuError> {
        let restaurant = self.restaurant_mut(restaurant_id)?;
        let category_id = CategoryId::from_name(name);

        if restaurant.categories.contains_key(&category_id) {
            return Err(MenuError::CategoryExists {
                restaurant_id: restaurant_id.to_owned(),
                category_id: category_id.into_inner(),
            });
        }

        restaurant.categories.insert(
            category_id.clone(),
            Category {
                name: name.to_owned(),
                items: Vec::new(),
            },
        );

        Ok(category_id)
    }

    /// Appends an item to the end of a category, keeping existing items in
    /// place.
    pub fn add_item(
        &mut self,
        restaurant_id: &str,
        category_id: &str,
        item: NewItem,
    ) -> Result<Item, MenuError> {
        let category = self
            .restaurant_mut(restaurant_id)?
            .categories
            .get_mut(category_id)
            .ok_or_else(|| MenuError::CategoryNotFound {
                restaurant_id: restaurant_id.to_owned(),
                category_id: category_id.to_owned(),
            })?;

        let id = unused_id(ItemId::generate, |id| {
            category.items.iter().any(|existing| &existing.id == id)
        })?;

        let item = Item {
            id,
            name: item.name,
            price: item.price,
            image: item.image,
        };
        category.items.push(item.clone());

        Ok(item)
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

fn unused_id<T>(
    mut generate: impl FnMut() -> T,
    taken: impl Fn(&T) -> bool,
) -> Result<T, MenuError> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let candidate = generate();
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }

    Err(MenuError::IdSpaceExhausted)
}
