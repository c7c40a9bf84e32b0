pub mod domain;
pub mod repository;

pub use domain::NewRental;
pub use repository::SqliteRentalRepository;
