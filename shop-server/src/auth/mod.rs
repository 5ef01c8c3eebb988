//! Authentication
//!
//! - [`expiry`]: token lifetime strings (`"15m"`, `"7d"`)
//! - [`jwt`]: HS256 codec and claims
//! - [`session`]: access/refresh lifecycle over the store
//! - [`password`]: argon2 hashing
//! - [`middleware`]: bearer auth and role guards

pub mod expiry;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod session;

pub use expiry::{Expiry, ExpiryError};
pub use jwt::{AccessClaims, RefreshClaims, TokenCodec, TokenVerdict};
pub use middleware::{CurrentUser, require_auth, require_role};
pub use password::{hash_password, verify_password};
pub use session::{SessionConfig, SessionConfigError, SessionManager, TokenPair};
