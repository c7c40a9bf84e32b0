pub mod handlers;
pub mod service;
pub mod session;

pub use service::{AuthError, AuthService, DynAuthService, NewUser, SqliteAuthService};
