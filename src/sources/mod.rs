pub mod reddit;
pub mod registry;
pub mod vimeo;
pub mod youtube;

use async_trait::async_trait;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use crate::error::SourceError;
use crate::video::{CollectionItem, VideoRecord};

pub use reddit::RedditSource;
pub use registry::{SourceRegistry, UrlPattern};
pub use vimeo::VimeoSource;
pub use youtube::YouTubeSource;

/// A site that hosts videos and can describe them fully.
#[async_trait]
pub trait HostingSource: Send + Sync {
    /// Registry name, also used as `VideoRecord::source`
    fn name(&self) -> &'static str;

    /// Glob patterns (`*` wildcard) matching this site's video pages
    fn patterns(&self) -> &[&'static str];

    /// Full metadata for one video page, `None` if the site does not know it
    async fn get_video(&self, url: &str) -> Result<Option<VideoRecord>, SourceError>;

    /// Every new video for the configured user
    async fn get_all_videos(&self) -> Result<Vec<VideoRecord>, SourceError>;
}

/// A site that only links to videos hosted elsewhere.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_items(&self) -> Result<Vec<CollectionItem>, SourceError>;
}

/// A registered source, dispatched by capability.
#[derive(Clone)]
pub enum Adapter {
    Hosting(Arc<dyn HostingSource>),
    Collection(Arc<dyn CollectionSource>),
}

impl Adapter {
    pub fn name(&self) -> &'static str {
        match self {
            Adapter::Hosting(source) => source.name(),
            Adapter::Collection(source) => source.name(),
        }
    }

    pub fn is_hosting(&self) -> bool {
        matches!(self, Adapter::Hosting(_))
    }
}

/// Fetches several feeds of one source concurrently and concatenates them.
///
/// Feeds that fail are logged and skipped; the whole call only fails when
/// every feed failed, so one dead channel does not hide the others.
pub(crate) async fn fetch_feeds<T, F, Fut>(
    source: &str,
    feeds: &[String],
    fetch: F,
) -> Result<Vec<T>, SourceError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<T>, SourceError>>,
{
    let results = join_all(feeds.iter().cloned().map(&fetch)).await;

    let mut items = Vec::new();
    let mut last_error = None;
    let mut succeeded = 0;
    for (feed, result) in feeds.iter().zip(results) {
        match result {
            Ok(mut batch) => {
                succeeded += 1;
                items.append(&mut batch);
            }
            Err(e) => {
                warn!("⚠️ {} feed '{}' failed: {}", source, feed, e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if succeeded == 0 => Err(e),
        _ => Ok(items),
    }
}
