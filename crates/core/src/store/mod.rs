//! Catalog and account storage
//!
//! Handlers talk to persistence only through the traits defined here, so the
//! in-memory stores used by tests and single-node deployments can be swapped
//! for a database-backed implementation without touching the HTTP layer.

pub mod memory;

use crate::types::{Product, ProductId, User, UserId};
use crate::Result;
use async_trait::async_trait;

pub use memory::{CartBook, InMemoryProductStore, InMemoryUserStore, OrderBook};

/// Read and write access to the product collection
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// All products in collection order
    async fn list(&self) -> Result<Vec<Product>>;

    /// A single product by identifier
    async fn get(&self, id: ProductId) -> Result<Option<Product>>;

    /// Persist a new product
    async fn insert(&self, product: Product) -> Result<Product>;

    /// Products whose name contains `keyword`, ignoring letter case.
    ///
    /// The keyword is matched literally; pattern metacharacters carry no
    /// special meaning. Results come back in collection order.
    async fn find_by_name(&self, keyword: &str) -> Result<Vec<Product>>;
}

/// Read and write access to registered accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list(&self) -> Result<Vec<User>>;

    async fn get(&self, id: UserId) -> Result<Option<User>>;

    /// Lookup by email, ignoring letter case
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist a new user.
    ///
    /// # Errors
    ///
    /// Returns `BulkbuyError::Conflict` when the email is already registered.
    async fn insert(&self, user: User) -> Result<User>;
}
