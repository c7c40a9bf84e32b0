// Item write payloads - pure values, validated before reaching the repository
use serde::{Deserialize, Deserializer};

use crate::validation::{
    validate_image_urls, validate_price, validate_text, Errors, ValidationError, MAX_ITEM_NAME,
};

/// A field in a partial update.
///
/// `Absent` (key missing from the payload) and `Null` (key present with a
/// JSON `null`) are different requests: the first leaves the stored value
/// alone, the second asks to clear it.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Absent
    }
}

impl<T> Patch<T> {
    /// `None` maps to `Absent`: used where omission means "no change".
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Patch::Absent, Patch::Value)
    }

    /// `None` maps to `Null`: used where omission means "clear".
    pub fn or_null(value: Option<T>) -> Self {
        value.map_or(Patch::Null, Patch::Value)
    }
}

// Only reached when the key is present; missing keys fall back to `Default`
// through `#[serde(default)]`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Patch::or_null)
    }
}

/// Body of `POST /api/items`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_per_h: f64,
    /// Gallery in display order; the first entry is the legacy `image_url`.
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub categories: Option<Vec<i64>>,
}

impl NewItem {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Errors::new();
        errors.check(validate_text("name", &self.name, MAX_ITEM_NAME));
        errors.check(validate_price("price_per_h", self.price_per_h));
        errors.check(validate_image_urls(&self.image_urls));
        errors.finish(())
    }
}

/// Body of `PATCH /api/items/{id}`: only present keys change.
///
/// `categories` and `image_urls` replace the whole collection when present.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemPatch {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub description: Patch<String>,
    #[serde(default)]
    pub price_per_h: Patch<f64>,
    #[serde(default)]
    pub image_urls: Patch<Vec<String>>,
    #[serde(default)]
    pub categories: Patch<Vec<i64>>,
}

fn not_nullable(field: &str) -> ValidationError {
    ValidationError::NotNullable {
        field: field.to_string(),
    }
}

impl ItemPatch {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Errors::new();

        match &self.name {
            Patch::Value(name) => {
                errors.check(validate_text("name", name, MAX_ITEM_NAME));
            }
            Patch::Null => errors.push(not_nullable("name")),
            Patch::Absent => {}
        }
        match &self.price_per_h {
            Patch::Value(price) => {
                errors.check(validate_price("price_per_h", *price));
            }
            Patch::Null => errors.push(not_nullable("price_per_h")),
            Patch::Absent => {}
        }
        match &self.image_urls {
            Patch::Value(urls) => {
                errors.check(validate_image_urls(urls));
            }
            Patch::Null => errors.push(not_nullable("image_urls")),
            Patch::Absent => {}
        }
        if let Patch::Null = self.categories {
            errors.push(not_nullable("categories"));
        }

        errors.finish(())
    }
}

/// Body of `PUT /api/items/{id}`: every base field is replaced.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemReplacement {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_per_h: f64,
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
    #[serde(default)]
    pub categories: Option<Vec<i64>>,
}

impl From<ItemReplacement> for ItemPatch {
    fn from(r: ItemReplacement) -> Self {
        ItemPatch {
            name: Patch::Value(r.name),
            // omitted description clears it; omitted collections stay as they are
            description: Patch::or_null(r.description),
            price_per_h: Patch::Value(r.price_per_h),
            image_urls: Patch::from_option(r.image_urls),
            categories: Patch::from_option(r.categories),
        }
    }
}
