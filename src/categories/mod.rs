pub mod repository;

pub use repository::{resolve, SqliteCategoryRepository};
