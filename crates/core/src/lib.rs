//! Bulkbuy Core Library
//!
//! Domain types, layered configuration and the storage traits shared by the
//! HTTP service and the infrastructure crate.

pub mod config;
pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{BulkbuyConfig, RunMode};
pub use error::{BulkbuyError, Result};
pub use store::{
    CartBook, InMemoryProductStore, InMemoryUserStore, OrderBook, ProductStore, UserStore,
};
pub use types::{
    Cart, LineItem, Order, OrderStatus, Product, ProductId, Role, User, UserId,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get version info as a formatted string
pub fn version_info() -> String {
    format!("{} v{} - {}", NAME, VERSION, DESCRIPTION)
}
