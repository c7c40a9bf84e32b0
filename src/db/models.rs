use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemImage {
    pub id: i64,
    pub url: String,
}

/// An item with its gallery (id order) and categories (name order).
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price_per_h: f64,
    pub owner_id: i64,
    pub available: bool,
    pub images: Vec<ItemImage>,
    pub categories: Vec<Category>,
}

impl Item {
    /// Legacy single-image field: always the first gallery entry.
    pub fn image_url(&self) -> Option<&str> {
        self.images.first().map(|img| img.url.as_str())
    }

    pub fn image_urls(&self) -> Vec<&str> {
        self.images.iter().map(|img| img.url.as_str()).collect()
    }
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Item", 10)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("description", &self.description)?;
        s.serialize_field("price_per_h", &self.price_per_h)?;
        s.serialize_field("image_url", &self.image_url())?;
        s.serialize_field("image_urls", &self.image_urls())?;
        s.serialize_field("images", &self.images)?;
        s.serialize_field("owner_id", &self.owner_id)?;
        s.serialize_field("available", &self.available)?;
        s.serialize_field("categories", &self.categories)?;
        s.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rental {
    pub id: i64,
    /// `None` once the item has been deleted.
    pub item_id: Option<i64>,
    pub renter_id: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub deposit: Money,
    pub returned: bool,
}
