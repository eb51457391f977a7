use std::sync::Arc;
use tracing::{debug, error};

use crate::cache::BoundedCache;
use crate::error::StoreError;
use crate::storage::KeyValueStore;
use crate::video::VideoRecord;

/// Store key the rendered feed is written under.
pub const FEED_KEY: &str = "feed";

/// Flags every record whose URL is in the watched list.
pub fn mark_watched(videos: &mut [VideoRecord], watched: &BoundedCache<bool>) {
    for video in videos.iter_mut() {
        video.watched = watched.has(&video.url);
    }
}

/// Hands each cycle's feed to the presentation layer through the store.
pub struct FeedWriter {
    store: Arc<dyn KeyValueStore>,
    watched: BoundedCache<bool>,
}

impl FeedWriter {
    pub fn new(store: Arc<dyn KeyValueStore>, watched: BoundedCache<bool>) -> Self {
        Self { store, watched }
    }

    pub fn watched(&self) -> &BoundedCache<bool> {
        &self.watched
    }

    pub async fn write(&self, mut videos: Vec<VideoRecord>) -> Result<(), StoreError> {
        mark_watched(&mut videos, &self.watched);
        let bytes = serde_json::to_vec(&videos)?;

        if let Err(e) = self.store.save(FEED_KEY, &bytes).await {
            error!("❌ Could not write feed: {}", e);
            return Err(e);
        }

        debug!("📰 Feed written: {} videos", videos.len());
        Ok(())
    }
}
