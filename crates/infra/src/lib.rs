//! Bulkbuy Infrastructure Library
//!
//! Process-level services around the HTTP layer: logger setup, the optional
//! PostgreSQL catalog, password hashing and super-admin provisioning.

pub mod bootstrap;
pub mod database;
pub mod logger;
pub mod password;

pub use bootstrap::{bootstrap, ensure_super_admin, BootstrapOutcome};
pub use database::{integrate, PgProductStore};
pub use logger::{init_logger, init_test_logger, LoggerConfig};
pub use password::{hash_password, hash_password_blocking, verify_password, MIN_PASSWORD_LEN};

/// Infrastructure version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
