use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::MetadataCache;
use crate::resolver::UrlResolver;
use crate::sources::SourceRegistry;
use crate::video::VideoRecord;

/// Shortener chains longer than this are abandoned.
pub const MAX_SHORTENER_DEPTH: usize = 3;

/// Finds full metadata for any video URL: shortener expansion, then the
/// metadata cache, then the hosting adapter that owns the URL.
pub struct MetadataResolver {
    registry: Arc<SourceRegistry>,
    resolver: Arc<UrlResolver>,
    cache: MetadataCache,
}

impl MetadataResolver {
    pub fn new(registry: Arc<SourceRegistry>, resolver: Arc<UrlResolver>, cache: MetadataCache) -> Self {
        Self {
            registry,
            resolver,
            cache,
        }
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Remembers a record produced by a hosting feed so later lookups of the
    /// same URL skip the network.
    pub fn remember(&self, video: &VideoRecord) {
        self.cache.push(video.url.clone(), video.clone(), false);
    }

    pub async fn get_meta_for_video(&self, url: &str) -> Option<VideoRecord> {
        let mut current = url.to_string();
        let mut hops = 0;

        while self.resolver.is_shortened(&current) {
            if hops == MAX_SHORTENER_DEPTH {
                warn!("⚠️ Giving up on {} after {} shortener hops", url, hops);
                return None;
            }
            current = self.resolver.get_real_url(&current).await?;
            hops += 1;
        }

        if let Some(cached) = self.cache.get(&current) {
            debug!("📦 Metadata cache hit: {}", current);
            return Some(cached);
        }

        let Some(name) = self.registry.source_from_url(&current) else {
            warn!("⚠️ No source handles {}", current);
            return None;
        };
        let source = self.registry.hosting(name)?;

        match source.get_video(&current).await {
            Ok(Some(video)) => {
                self.cache.push(current, video.clone(), false);
                Some(video)
            }
            Ok(None) => {
                debug!("{} has no metadata for {}", name, current);
                None
            }
            Err(e) => {
                warn!("⚠️ {} failed to describe {}: {}", name, current, e);
                None
            }
        }
    }

    /// Completes `video` with looked-up metadata.
    ///
    /// Returns `false` and leaves `video` untouched when nothing is found.
    /// URL, thumbnail and length always come from the metadata; the other
    /// fields are only filled where the video has nothing yet, since a
    /// collection may already have supplied fresher values.
    pub async fn add_meta_to_video(&self, video: &mut VideoRecord) -> bool {
        let Some(meta) = self.get_meta_for_video(&video.url).await else {
            return false;
        };
        apply_meta(video, meta);
        true
    }
}

fn apply_meta(video: &mut VideoRecord, meta: VideoRecord) {
    video.url = meta.url;
    video.thumbnail = meta.thumbnail;
    video.length = meta.length;

    if video.game.is_none() {
        video.game = meta.game;
    }
    if video.title_text().is_none() {
        video.title = meta.title;
    }
    if video.views.unwrap_or(0) == 0 {
        video.views = meta.views;
    }
    if video.user.is_none() {
        video.user = meta.user;
    }
    if video.timestamp.is_none() {
        video.timestamp = meta.timestamp;
    }
    if video.is_live.is_none() {
        video.is_live = meta.is_live;
    }
}
