//! Pure core of the newsagg cache coordinator.
//!
//! Everything in this crate is free of I/O: cache key derivation, glob
//! pattern matching, TTL descriptors, the `Cache` and `DocumentStore`
//! contracts, filter/pipeline evaluation and the news domain types.

pub mod cache;
pub mod news;
pub mod storage;
