// Storage-layer outcomes shared by the item, category and rental repositories
use std::collections::BTreeSet;
use std::fmt::Write;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Item {0} is not available")]
    NotAvailable(i64),

    #[error("Unknown categories: {}", join_ids(.0))]
    MissingCategories(BTreeSet<i64>),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Amount out of range")]
    InvalidAmount,
}

pub(crate) fn join_ids(ids: &BTreeSet<i64>) -> String {
    let mut out = String::new();
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{id}");
    }
    out
}

/// Repeats `?` placeholders for an `IN (...)` list.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
