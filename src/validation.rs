//! Input validation shared by the request types.
//!
//! Validators check one field each and report the field by name, so the HTTP
//! layer can return field-level detail. Nothing here touches the database.

use thiserror::Error;
use url::Url;

use crate::money;

pub const MAX_ITEM_NAME: usize = 80;
pub const MAX_CATEGORY_NAME: usize = 50;
pub const MIN_USERNAME: usize = 3;
pub const MAX_USERNAME: usize = 50;
pub const MAX_IMAGES: usize = 6;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} {reason}")]
    OutOfRange { field: String, reason: String },

    #[error("{field} is invalid: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} accepts at most {max} entries")]
    TooMany { field: String, max: usize },

    #[error("{field} requires at least {min} entries")]
    TooFew { field: String, min: usize },

    #[error("{field} cannot be null")]
    NotNullable { field: String },

    #[error("end_at must be after start_at")]
    InvalidPeriod,
}

impl ValidationError {
    /// Name of the offending input field.
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field }
            | Self::TooShort { field, .. }
            | Self::TooLong { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::InvalidFormat { field, .. }
            | Self::TooMany { field, .. }
            | Self::TooFew { field, .. }
            | Self::NotNullable { field } => field,
            Self::InvalidPeriod => "end_at",
        }
    }

    pub fn out_of_range(field: &str, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Accumulates errors across several fields.
#[derive(Debug, Default)]
pub struct Errors(Vec<ValidationError>);

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: ValidationError) {
        self.0.push(err);
    }

    /// Keeps the value on success, records the error otherwise.
    pub fn check<T>(&mut self, result: ValidationResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.0.push(err);
                None
            }
        }
    }

    pub fn finish<T>(self, value: T) -> Result<T, Vec<ValidationError>> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self.0)
        }
    }

}

/// Non-blank text of at most `max` characters.
pub fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

pub fn validate_username(username: &str) -> ValidationResult<()> {
    validate_text("username", username, MAX_USERNAME)?;
    if username.chars().count() < MIN_USERNAME {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: MIN_USERNAME,
        });
    }
    Ok(())
}

pub fn validate_email(email: &str) -> ValidationResult<()> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::invalid("email", "missing '@'"));
    };
    if local.is_empty() || domain.is_empty() || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::invalid("email", "not an email address"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }
    Ok(())
}

/// Strictly positive price that a deposit can be computed for.
pub fn validate_price(field: &str, price: f64) -> ValidationResult<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(ValidationError::out_of_range(field, "must be greater than 0"));
    }
    if !money::is_billable_price(price) {
        return Err(ValidationError::out_of_range(
            field,
            format!(
                "must be at most {} with at most {} decimals",
                money::MAX_PRICE,
                money::MAX_PRICE_SCALE
            ),
        ));
    }
    Ok(())
}

/// Finite and `>= 0`; used by the price range filter.
pub fn validate_non_negative(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::out_of_range(
            field,
            "must be greater than or equal to 0",
        ));
    }
    Ok(())
}

/// Absolute `http`/`https` URL with a host.
pub fn validate_public_url(field: &str, raw: &str) -> ValidationResult<()> {
    let url = Url::parse(raw).map_err(|e| ValidationError::invalid(field, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::invalid(field, "scheme must be http or https"));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::invalid(field, "missing host"));
    }
    Ok(())
}

/// Gallery of 1 to 6 public URLs.
pub fn validate_image_urls(urls: &[String]) -> ValidationResult<()> {
    if urls.is_empty() {
        return Err(ValidationError::TooFew {
            field: "image_urls".to_string(),
            min: 1,
        });
    }
    if urls.len() > MAX_IMAGES {
        return Err(ValidationError::TooMany {
            field: "image_urls".to_string(),
            max: MAX_IMAGES,
        });
    }
    for (i, url) in urls.iter().enumerate() {
        validate_public_url(&format!("image_urls[{i}]"), url)?;
    }
    Ok(())
}
