//! Aggregates new videos from hosting sites and link-collection sites into
//! one deduplicated feed.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod http;
pub mod resolver;
pub mod scheduler;
pub mod sources;
pub mod storage;
pub mod video;

#[cfg(test)]
pub(crate) mod testing;
