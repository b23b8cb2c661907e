//! Entity cache coordinator for the newsagg backend.
//!
//! Read-through, write-invalidate caching of articles, users, comments,
//! interactions and dashboard aggregates over a document store, with a
//! pluggable cache backend (in-process LRU or Redis).

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod state;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
mod testing;
