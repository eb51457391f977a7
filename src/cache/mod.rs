//! # Cache Module
//!
//! Bounded, insertion-ordered caches shared by the whole aggregation
//! pipeline.
//!
//! Three independent instances exist at runtime:
//!
//! - **Video metadata**: canonical URL → [`VideoRecord`], with a TTL, so the
//!   many per-item lookups of a cycle rarely hit the network
//! - **Shortened URLs**: short URL → expanded URL, used by the resolver
//! - **Watched list**: key-only cache of URLs the user has already seen
//!
//! Hosting adapters additionally keep a private TTL cache for their own
//! single-video lookups.
//!
//! ## Eviction
//!
//! Eviction is FIFO by push order, not LRU: reads never change an entry's
//! position. Re-pushing a key moves it to the newest position unless the
//! caller asks for `no_reorder`.
//!
//! ## Persistence
//!
//! A cache opened against a [`KeyValueStore`](crate::storage::KeyValueStore)
//! writes itself back about one second after the last push, so a burst of
//! pushes costs a single write. Call [`BoundedCache::flush`] on shutdown to
//! write out anything still pending.
//!
//! ## Example Usage
//!
//! ```rust
//! use vidfeed::cache::BoundedCache;
//! use std::time::Duration;
//!
//! let cache = BoundedCache::with_ttl(2, Duration::from_secs(60));
//! cache.push("a", 1, false);
//! cache.push("b", 2, false);
//! cache.push("c", 3, false);
//!
//! assert!(!cache.has("a"));
//! assert_eq!(cache.get("c"), Some(3));
//! ```

pub mod bounded;
mod persist;

pub use bounded::{BoundedCache, DEFAULT_FLUSH_DELAY};
pub use persist::PersistMode;

use crate::video::VideoRecord;

/// Canonical URL → full video metadata.
pub type MetadataCache = BoundedCache<VideoRecord>;
