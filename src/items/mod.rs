pub mod domain;
pub mod query;
pub mod repository;

pub use domain::{ItemPatch, ItemReplacement, NewItem, Patch};
pub use query::{ItemFilter, ItemQuery, SortDir, SortField};
pub use repository::{Page, SqliteItemRepository};
