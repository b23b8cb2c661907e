//! Redis cache backend implementation.
//!
//! Shared cache for multi-instance deployments. Pattern sweeps use
//! `SCAN MATCH` followed by `DEL`.

mod cache;
mod error;

pub use cache::RedisCache;
