// Library exports for rentshare
// This allows integration tests and external code to use rentshare modules

pub mod auth;
pub mod categories;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod items;
pub mod money;
pub mod pagination;
pub mod rentals;
pub mod repository;
pub mod routes;
pub mod state;
pub mod validation;
