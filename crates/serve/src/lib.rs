//! Bulkbuy Serve Library
//!
//! HTTP layer of the Bulkbuy API: the fixed request pipeline, its stages,
//! the error funnel, the route groups and product search.

pub mod api;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod funnel;
pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod search;
pub mod server;

pub use error::{AppError, ErrorKind};
pub use funnel::ErrorFunnel;
pub use handlers::AppState;
pub use pipeline::{Pipeline, Stage, StageOutcome};
pub use server::{create_app, BulkbuyServer, ServerBuilder};

/// Server version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_present() {
        assert!(!VERSION.is_empty());
    }
}
