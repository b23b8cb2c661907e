//! Cache backend implementations.
//!
//! Concrete implementations of [`newsagg_core::cache::Cache`]. The
//! in-process [`MemoryCache`] is always built; [`RedisCache`] is behind the
//! `redis` feature. The backend in use is picked at startup from
//! `CACHE_URL` (see [`crate::config::CacheBackend`]).

pub mod memory;

#[cfg(feature = "redis")]
pub mod redis_impl;

pub use memory::MemoryCache;

#[cfg(feature = "redis")]
pub use redis_impl::RedisCache;
