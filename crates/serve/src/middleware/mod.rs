//! Pipeline stages for the Bulkbuy API
//!
//! Each module provides one [`Stage`](crate::pipeline::Stage) of the fixed
//! request pipeline, plus the query-string codec the sanitizers share.

pub mod body;
pub mod compression;
pub mod logging;
pub mod pollution;
pub mod query;
pub mod rate_limit;
pub mod sanitize;
pub mod security;
pub mod static_files;
pub mod timestamp;

pub use body::BodyParser;
pub use compression::Compression;
pub use logging::DevLogger;
pub use pollution::PollutionGuard;
pub use rate_limit::{InMemoryRateLimitStore, RateLimitStore, RateLimiter, RateWindow};
pub use sanitize::{NoSqlSanitizer, XssSanitizer};
pub use security::{CorsConfig, CorsStage, SecurityHeaders};
pub use static_files::StaticFiles;
pub use timestamp::RequestTimestamp;
