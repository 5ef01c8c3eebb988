//! Storefront REST backend
//!
//! # Modules
//!
//! - **auth**: JWT access/refresh lifecycle, argon2 passwords, guards
//! - **orders**: transactional order placement
//! - **accounts** / **products**: account and catalog services
//! - **db**: store traits with PostgreSQL and in-memory implementations
//! - **uploads**: image files on disk
//! - **api**: axum router under `/api/v1`
//!
//! ```text
//! shop-server/src/
//! ├── api/        # routes, extractors, cookie and multipart handling
//! ├── auth/       # expiry, jwt, session, password, middleware
//! ├── db/         # Store / StoreTx, PgStore, MemoryStore
//! ├── orders/     # OrderEngine
//! ├── accounts/   # AccountService
//! ├── products/   # ProductService
//! └── config.rs, state.rs, logger.rs, seed.rs, uploads.rs, error.rs
//! ```

pub mod accounts;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logger;
pub mod orders;
pub mod products;
pub mod seed;
pub mod state;
pub mod uploads;

pub use api::build_router;
pub use config::Config;
pub use error::{ServiceError, ServiceResult};
pub use state::AppState;

// Security logging macro
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}
