//! Item listing queries.
//!
//! An [`ItemQuery`] is parsed from the request query string, turned into a
//! `WHERE` clause plus bound arguments, and always ordered with `id` as the
//! final tie-breaker so consecutive pages never overlap or skip rows.

use rusqlite::types::Value;
use url::form_urlencoded;

use crate::validation::{validate_non_negative, Errors, ValidationError};

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Price,
    Name,
    Id,
}

impl SortField {
    /// Strict parse used at the HTTP boundary.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "price" => Some(Self::Price),
            "name" => Some(Self::Name),
            "id" => Some(Self::Id),
            _ => None,
        }
    }

    /// Lenient parse: anything unrecognised sorts by id.
    pub fn from_param(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Id)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Name => "name",
            Self::Id => "id",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::Price => "i.price_per_h",
            Self::Name => "i.name",
            Self::Id => "i.id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFilter {
    /// Case-insensitive substring of name or description.
    pub text: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub available: Option<bool>,
    /// Matches items having at least one of these categories.
    pub categories: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemQuery {
    pub filter: ItemFilter,
    pub order_by: Option<SortField>,
    pub order_dir: Option<SortDir>,
    pub skip: u32,
    pub limit: u32,
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            filter: ItemFilter::default(),
            order_by: None,
            order_dir: None,
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// A `WHERE` clause (empty or starting with a space) and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SqlFilter {
    pub clause: String,
    pub args: Vec<Value>,
}

fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

impl ItemFilter {
    pub(crate) fn to_sql(&self) -> SqlFilter {
        let mut conditions: Vec<String> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            let pattern = escape_like(text);
            conditions.push(
                "(casefold(i.name) LIKE casefold(?) ESCAPE '\\' \
                 OR casefold(i.description) LIKE casefold(?) ESCAPE '\\')"
                    .to_string(),
            );
            args.push(Value::Text(pattern.clone()));
            args.push(Value::Text(pattern));
        }
        if let Some(min) = self.min_price {
            conditions.push("i.price_per_h >= ?".to_string());
            args.push(Value::Real(min));
        }
        if let Some(max) = self.max_price {
            conditions.push("i.price_per_h <= ?".to_string());
            args.push(Value::Real(max));
        }
        if let Some(available) = self.available {
            conditions.push("i.available = ?".to_string());
            args.push(Value::Integer(i64::from(available)));
        }
        if !self.categories.is_empty() {
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM item_categories ic \
                 WHERE ic.item_id = i.id AND ic.category_id IN ({}))",
                crate::repository::placeholders(self.categories.len())
            ));
            args.extend(self.categories.iter().map(|id| Value::Integer(*id)));
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        SqlFilter { clause, args }
    }
}

impl ItemQuery {
    pub fn sort_dir(&self) -> SortDir {
        self.order_dir.unwrap_or_default()
    }

    pub(crate) fn order_clause(&self) -> String {
        match self.order_by {
            None | Some(SortField::Id) => format!("i.id {}", self.sort_dir().sql()),
            Some(field) => format!("{} {}, i.id ASC", field.column(), self.sort_dir().sql()),
        }
    }

    /// Filter and sort parameters as they would appear in a query string,
    /// with absent values dropped and categories repeated.
    pub fn filter_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let f = &self.filter;
        if let Some(text) = f.text.as_deref().filter(|t| !t.is_empty()) {
            params.push(("name", text.to_string()));
        }
        if let Some(min) = f.min_price {
            params.push(("min_price", min.to_string()));
        }
        if let Some(max) = f.max_price {
            params.push(("max_price", max.to_string()));
        }
        if let Some(available) = f.available {
            params.push(("available", available.to_string()));
        }
        for id in &f.categories {
            params.push(("categories", id.to_string()));
        }
        if let Some(order_by) = self.order_by {
            params.push(("order_by", order_by.as_str().to_string()));
        }
        if let Some(order_dir) = self.order_dir {
            params.push(("order_dir", order_dir.as_str().to_string()));
        }
        params
    }

    /// Parses `skip`, `limit`, filters and ordering from a raw query string.
    ///
    /// Empty values count as absent; unknown keys are ignored; for a repeated
    /// scalar key the last value wins.
    pub fn from_query_str(raw: &str) -> Result<Self, Vec<ValidationError>> {
        let mut query = ItemQuery::default();
        let mut errors = Errors::new();

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "skip" => {
                    if let Some(skip) = errors.check(parse_skip(&value)) {
                        query.skip = skip;
                    }
                }
                "limit" => {
                    if let Some(limit) = errors.check(parse_limit(&value)) {
                        query.limit = limit;
                    }
                }
                "name" => query.filter.text = Some(value.into_owned()),
                "min_price" => {
                    query.filter.min_price = errors.check(parse_price_bound("min_price", &value));
                }
                "max_price" => {
                    query.filter.max_price = errors.check(parse_price_bound("max_price", &value));
                }
                "available" => {
                    query.filter.available = errors.check(parse_bool("available", &value));
                }
                "categories" => match value.parse::<i64>() {
                    Ok(id) => query.filter.categories.push(id),
                    Err(_) => errors.push(ValidationError::invalid(
                        "categories",
                        format!("'{value}' is not an integer"),
                    )),
                },
                "order_by" => match SortField::parse(&value) {
                    Some(field) => query.order_by = Some(field),
                    None => errors.push(ValidationError::invalid(
                        "order_by",
                        "must be one of price, name, id",
                    )),
                },
                "order_dir" => match SortDir::parse(&value) {
                    Some(dir) => query.order_dir = Some(dir),
                    None => errors.push(ValidationError::invalid(
                        "order_dir",
                        "must be one of asc, desc",
                    )),
                },
                _ => {}
            }
        }

        errors.finish(query)
    }
}

fn parse_skip(value: &str) -> Result<u32, ValidationError> {
    let n: i64 = value
        .parse()
        .map_err(|_| ValidationError::invalid("skip", "must be an integer"))?;
    if n < 0 {
        return Err(ValidationError::out_of_range(
            "skip",
            "must be greater than or equal to 0",
        ));
    }
    u32::try_from(n).map_err(|_| ValidationError::out_of_range("skip", "is too large"))
}

fn parse_limit(value: &str) -> Result<u32, ValidationError> {
    let n: i64 = value
        .parse()
        .map_err(|_| ValidationError::invalid("limit", "must be an integer"))?;
    if !(1..=i64::from(MAX_LIMIT)).contains(&n) {
        return Err(ValidationError::out_of_range(
            "limit",
            format!("must be between 1 and {MAX_LIMIT}"),
        ));
    }
    Ok(n as u32)
}

fn parse_price_bound(field: &str, value: &str) -> Result<f64, ValidationError> {
    let price: f64 = value
        .parse()
        .map_err(|_| ValidationError::invalid(field, "must be a number"))?;
    validate_non_negative(field, price)?;
    Ok(price)
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ValidationError::invalid(field, "must be a boolean")),
    }
}
