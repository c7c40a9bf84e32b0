use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::{DynAuthService, SqliteAuthService};
use crate::categories::SqliteCategoryRepository;
use crate::config::Config;
use crate::items::SqliteItemRepository;
use crate::rentals::SqliteRentalRepository;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub auth: DynAuthService,
    pub items: SqliteItemRepository,
    pub categories: SqliteCategoryRepository,
    pub rentals: SqliteRentalRepository,
}

impl AppState {
    /// Wires the SQLite-backed services onto one pool.
    pub fn new(db: DbPool, config: Config) -> Self {
        let auth = SqliteAuthService::new(
            db.clone(),
            config.auth.token_hours,
            config.auth.bcrypt_cost,
        );
        Self {
            auth: Arc::new(auth),
            items: SqliteItemRepository::new(db.clone()),
            categories: SqliteCategoryRepository::new(db.clone()),
            rentals: SqliteRentalRepository::new(db),
            config,
        }
    }
}
