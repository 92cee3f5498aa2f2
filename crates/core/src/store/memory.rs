//! In-process stores
//!
//! State lives only as long as the process. Collections keep insertion
//! order so listings and searches are deterministic within one process.

use super::{ProductStore, UserStore};
use crate::types::{Cart, LineItem, Order, Product, ProductId, User, UserId};
use crate::{BulkbuyError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Product collection held in memory
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    products: RwLock<Vec<Product>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `products`
    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            products: RwLock::new(products),
        }
    }

    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn list(&self) -> Result<Vec<Product>> {
        Ok(self.products.read().clone())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().iter().find(|p| p.id == id).cloned())
    }

    async fn insert(&self, product: Product) -> Result<Product> {
        let mut products = self.products.write();
        if products.iter().any(|p| p.id == product.id) {
            return Err(BulkbuyError::conflict(format!(
                "product {} already exists",
                product.id
            )));
        }
        products.push(product.clone());
        Ok(product)
    }

    async fn find_by_name(&self, keyword: &str) -> Result<Vec<Product>> {
        Ok(self
            .products
            .read()
            .iter()
            .filter(|p| p.name_contains(keyword))
            .cloned()
            .collect())
    }
}

/// Registered accounts held in memory
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn list(&self) -> Result<Vec<User>> {
        Ok(self.users.read().clone())
    }

    async fn get(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.read().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_lowercase();
        Ok(self
            .users
            .read()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert(&self, user: User) -> Result<User> {
        let mut users = self.users.write();
        if users.iter().any(|u| u.email == user.email) {
            return Err(BulkbuyError::conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        users.push(user.clone());
        Ok(user)
    }
}

/// Shopping carts keyed by owner
#[derive(Debug, Default)]
pub struct CartBook {
    carts: RwLock<HashMap<UserId, Cart>>,
}

impl CartBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// The user's cart; an empty cart when none exists yet
    pub fn get(&self, user_id: UserId) -> Cart {
        self.carts.read().get(&user_id).cloned().unwrap_or_default()
    }

    /// Add a line item and return the updated cart
    pub fn add(&self, user_id: UserId, item: LineItem) -> Cart {
        let mut carts = self.carts.write();
        let cart = carts.entry(user_id).or_default();
        cart.add(item);
        cart.clone()
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// Returns `BulkbuyError::NotFound` if the product is not in the cart.
    pub fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<Cart> {
        let mut carts = self.carts.write();
        let cart = carts.entry(user_id).or_default();
        if !cart.remove(product_id) {
            return Err(BulkbuyError::not_found(format!(
                "product {} in cart",
                product_id
            )));
        }
        Ok(cart.clone())
    }

    /// Empty the cart, returning what it held
    pub fn take(&self, user_id: UserId) -> Cart {
        self.carts.write().remove(&user_id).unwrap_or_default()
    }
}

/// Placed orders keyed by owner
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: RwLock<HashMap<UserId, Vec<Order>>>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, user_id: UserId) -> Vec<Order> {
        self.orders
            .read()
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn place(&self, order: Order) -> Order {
        self.orders
            .write()
            .entry(order.user_id)
            .or_default()
            .push(order.clone());
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn catalog() -> InMemoryProductStore {
        InMemoryProductStore::with_products(vec![
            Product::new("Red SHIRT", "cotton", 1500),
            Product::new("Blue jeans", "denim", 4000),
            Product::new("shirt-blue", "linen", 1800),
        ])
    }

    #[tokio::test]
    async fn test_find_by_name_is_case_insensitive() {
        let store = catalog();
        let found = store.find_by_name("Shirt").await.unwrap();
        let names: Vec<_> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Red SHIRT", "shirt-blue"]);
    }

    #[tokio::test]
    async fn test_find_by_name_treats_keyword_literally() {
        let store = catalog();
        assert!(store.find_by_name(".*").await.unwrap().is_empty());
        assert!(store.find_by_name("xyz123notfound").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_product_insert_and_get() {
        let store = InMemoryProductStore::new();
        assert!(store.is_empty());

        let product = store
            .insert(Product::new("Sugar 50kg", "", 9000))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(product.id).await.unwrap(), Some(product.clone()));

        let duplicate = store.insert(product).await;
        assert!(matches!(duplicate, Err(BulkbuyError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_user_email_uniqueness() {
        let store = InMemoryUserStore::new();
        store
            .insert(User::new("Ada", "ada@example.com", Role::User, "hash"))
            .await
            .unwrap();

        let result = store
            .insert(User::new("Other Ada", "ADA@example.com", Role::User, "hash"))
            .await;
        assert!(matches!(result, Err(BulkbuyError::Conflict { .. })));

        let found = store.find_by_email("Ada@Example.com").await.unwrap();
        assert_eq!(found.map(|u| u.name), Some("Ada".to_string()));
    }

    #[test]
    fn test_cart_book_lifecycle() {
        let carts = CartBook::new();
        let user = UserId::new();
        let product = Product::new("Oil 5L", "", 1200);
        let item = LineItem {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity: 1,
        };

        assert!(carts.get(user).is_empty());
        carts.add(user, item);
        assert_eq!(carts.get(user).items.len(), 1);

        assert!(carts.remove(user, ProductId::new()).is_err());
        let cart = carts.take(user);
        assert_eq!(cart.total(), 1200);
        assert!(carts.get(user).is_empty());
    }

    #[test]
    fn test_order_book() {
        let orders = OrderBook::new();
        let user = UserId::new();
        assert!(orders.list(user).is_empty());

        orders.place(Order::from_cart(user, Cart::default()));
        assert_eq!(orders.list(user).len(), 1);
        assert!(orders.list(UserId::new()).is_empty());
    }
}
