//! One aggregation cycle: fetch every enabled source at once, enrich what
//! the collection sites link to, and merge everything into a single feed.
//!
//! ```text
//!  hosting adapters ──────────────┐
//!                                 ├─► FeedMerger ─► Vec<VideoRecord>
//!  collection adapters ─► enrich ─┘
//!                          │
//!                          └─► UrlResolver ─► metadata cache ─► HostingSource::get_video
//! ```
//!
//! A source that fails is replaced by its last successful result so one
//! outage never empties the feed.

pub mod merge;
pub mod metadata;

use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::MetadataCache;
use crate::config::SourceToggles;
use crate::error::SourceError;
use crate::resolver::UrlResolver;
use crate::sources::{Adapter, SourceRegistry};
use crate::video::{CollectionItem, VideoRecord};

pub use merge::{EnrichedItem, FeedMerger};
pub use metadata::{MetadataResolver, MAX_SHORTENER_DEPTH};

enum Fetched {
    Hosting(&'static str, Result<Vec<VideoRecord>, SourceError>),
    Collection(&'static str, Result<Vec<CollectionItem>, SourceError>),
}

pub struct Aggregator {
    registry: Arc<SourceRegistry>,
    meta: MetadataResolver,
    last_hosting: DashMap<&'static str, Vec<VideoRecord>>,
    last_collection: DashMap<&'static str, Vec<CollectionItem>>,
}

impl Aggregator {
    pub fn new(registry: Arc<SourceRegistry>, resolver: Arc<UrlResolver>, metadata: MetadataCache) -> Self {
        Self {
            meta: MetadataResolver::new(registry.clone(), resolver, metadata),
            registry,
            last_hosting: DashMap::new(),
            last_collection: DashMap::new(),
        }
    }

    pub fn metadata(&self) -> &MetadataResolver {
        &self.meta
    }

    /// Runs one full cycle. Never fails: broken sources fall back to their
    /// previous result and unresolvable collection items are dropped.
    pub async fn run_cycle(&self, toggles: &SourceToggles) -> Vec<VideoRecord> {
        let started = Instant::now();

        let fetches = self
            .registry
            .adapters()
            .filter(|adapter| toggles.is_enabled(adapter.name()))
            .map(|adapter| {
                let adapter = adapter.clone();
                async move {
                    match adapter {
                        Adapter::Hosting(source) => {
                            Fetched::Hosting(source.name(), source.get_all_videos().await)
                        }
                        Adapter::Collection(source) => {
                            Fetched::Collection(source.name(), source.get_items().await)
                        }
                    }
                }
            });
        let fetched = join_all(fetches).await;

        let mut hosting = Vec::new();
        let mut collections = Vec::new();
        for result in fetched {
            match result {
                Fetched::Hosting(name, result) => hosting.extend(self.hosting_result(name, result)),
                Fetched::Collection(name, result) => {
                    collections.push((name, self.collection_result(name, result)))
                }
            }
        }

        let enriched = join_all(
            collections
                .into_iter()
                .map(|(name, items)| self.enrich_all(name, items)),
        )
        .await;

        let mut merger = FeedMerger::seeded(hosting);
        for item in enriched.into_iter().flatten() {
            merger.merge(item, &self.registry);
        }
        let records = merger.into_records();

        info!(
            "🔄 Cycle finished: {} videos in {:.2?}",
            records.len(),
            started.elapsed()
        );
        records
    }

    fn hosting_result(
        &self,
        name: &'static str,
        result: Result<Vec<VideoRecord>, SourceError>,
    ) -> Vec<VideoRecord> {
        match result {
            Ok(mut videos) => {
                for (index, video) in videos.iter_mut().enumerate() {
                    video.source = Some(name.to_string());
                    video.index = index;
                    self.meta.remember(video);
                }
                debug!("✅ {}: {} videos", name, videos.len());
                self.last_hosting.insert(name, videos.clone());
                videos
            }
            Err(e) => {
                let fallback = self
                    .last_hosting
                    .get(name)
                    .map(|v| v.value().clone())
                    .unwrap_or_default();
                warn!(
                    "⚠️ {} failed, reusing {} videos from the last good run: {}",
                    name,
                    fallback.len(),
                    e
                );
                fallback
            }
        }
    }

    fn collection_result(
        &self,
        name: &'static str,
        result: Result<Vec<CollectionItem>, SourceError>,
    ) -> Vec<CollectionItem> {
        match result {
            Ok(items) => {
                debug!("✅ {}: {} items", name, items.len());
                self.last_collection.insert(name, items.clone());
                items
            }
            Err(e) => {
                let fallback = self
                    .last_collection
                    .get(name)
                    .map(|v| v.value().clone())
                    .unwrap_or_default();
                warn!(
                    "⚠️ {} failed, reusing {} items from the last good run: {}",
                    name,
                    fallback.len(),
                    e
                );
                fallback
            }
        }
    }

    async fn enrich_all(&self, collection: &'static str, items: Vec<CollectionItem>) -> Vec<EnrichedItem> {
        let total = items.len();
        let enriched: Vec<EnrichedItem> = join_all(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| self.enrich(collection, index, item)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        if enriched.len() < total {
            debug!(
                "{}: dropped {} of {} items without metadata",
                collection,
                total - enriched.len(),
                total
            );
        }
        enriched
    }

    async fn enrich(&self, collection: &'static str, index: usize, item: CollectionItem) -> Option<EnrichedItem> {
        let CollectionItem { mut video, col } = item;
        let col_title = video.title.clone();
        video.index = index;

        if !self.meta.add_meta_to_video(&mut video).await {
            return None;
        }

        Some(EnrichedItem {
            collection,
            col_title,
            video,
            col,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BoundedCache;
    use crate::http::{HttpResponse, MockHttpFetch};
    use crate::testing::{FakeCollection, FakeHosting};
    use crate::video::CollectionTag;
    use pretty_assertions::assert_eq;

    fn aggregator(host: Arc<FakeHosting>, col: Arc<FakeCollection>, fetch: MockHttpFetch) -> Aggregator {
        let registry = SourceRegistry::builder()
            .hosting(host)
            .collection(col)
            .build()
            .unwrap();
        let resolver = UrlResolver::new(Arc::new(fetch), BoundedCache::new(10));
        Aggregator::new(Arc::new(registry), Arc::new(resolver), BoundedCache::new(50))
    }

    #[tokio::test]
    async fn failed_source_falls_back_to_last_good_result() {
        let host = Arc::new(
            FakeHosting::new("host", &["https://x/*"])
                .with_feed(vec![VideoRecord::new("https://x/1").with_title("one")])
                .with_failure(),
        );
        let col = Arc::new(FakeCollection::new("col"));
        let agg = aggregator(host.clone(), col, MockHttpFetch::new());
        let toggles = SourceToggles::default();

        let first = agg.run_cycle(&toggles).await;
        let second = agg.run_cycle(&toggles).await;

        assert_eq!(host.feed_calls(), 2);
        assert_eq!(second, first);
        assert_eq!(second[0].source.as_deref(), Some("host"));
    }

    #[tokio::test]
    async fn failure_without_history_yields_nothing() {
        let host = Arc::new(FakeHosting::new("host", &["https://x/*"]).with_failure());
        let col = Arc::new(FakeCollection::new("col").with_failure());
        let agg = aggregator(host, col, MockHttpFetch::new());

        assert!(agg.run_cycle(&SourceToggles::default()).await.is_empty());
    }

    #[tokio::test]
    async fn collection_items_fall_back_too() {
        let host = Arc::new(
            FakeHosting::new("host", &["https://x/*"])
                .with_video(VideoRecord::new("https://x/7").with_title("seven")),
        );
        let col = Arc::new(
            FakeCollection::new("col")
                .with_items(vec![CollectionItem::new(
                    VideoRecord::new("https://x/7").with_title("Look"),
                    "https://c/7",
                    vec![],
                )])
                .with_failure(),
        );
        let agg = aggregator(host, col.clone(), MockHttpFetch::new());
        let toggles = SourceToggles::default();

        agg.run_cycle(&toggles).await;
        let second = agg.run_cycle(&toggles).await;

        assert_eq!(col.calls(), 2);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].collections[0].url, "https://c/7");
    }

    #[tokio::test]
    async fn disabled_sources_are_not_fetched() {
        let host = Arc::new(FakeHosting::new("host", &["https://x/*"]));
        let col = Arc::new(FakeCollection::new("col"));
        let agg = aggregator(host.clone(), col.clone(), MockHttpFetch::new());
        let toggles = SourceToggles::parse("host=false").unwrap();

        agg.run_cycle(&toggles).await;

        assert_eq!(host.feed_calls(), 0);
        assert_eq!(col.calls(), 1);
    }

    #[tokio::test]
    async fn hosting_and_collection_results_merge_into_one_feed() {
        let host = Arc::new(
            FakeHosting::new("host", &["https://x/*"])
                .with_feed(vec![
                    VideoRecord::new("https://x/1").with_title("First").with_desc("from host"),
                    VideoRecord::new("https://x/2").with_title("Second"),
                ])
                .with_video(
                    VideoRecord::new("https://x/3")
                        .with_title("Third")
                        .with_thumbnail("https://img/3.jpg"),
                ),
        );
        let col = Arc::new(FakeCollection::new("col").with_items(vec![
            CollectionItem::new(
                VideoRecord::new("https://x/1").with_title("Posted first").with_desc("from col"),
                "https://c/1",
                vec!["alice".to_string()],
            ),
            CollectionItem::new(
                VideoRecord::new("https://bit.ly/three").with_title("Posted third"),
                "https://c/3",
                vec!["bob".to_string()],
            ),
            CollectionItem::new(
                VideoRecord::new("https://unknown/9").with_title("Nobody hosts this"),
                "https://c/9",
                vec![],
            ),
        ]));
        let mut fetch = MockHttpFetch::new();
        fetch
            .expect_get()
            .withf(|url| url == "https://bit.ly/three")
            .times(1)
            .returning(|_| Ok(HttpResponse::redirect(301, "https://x/3")));
        let agg = aggregator(host.clone(), col, fetch);

        let feed = agg.run_cycle(&SourceToggles::default()).await;

        let urls: Vec<_> = feed.iter().map(|v| v.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x/1", "https://x/2", "https://x/3"]);

        assert_eq!(feed[0].desc.as_deref(), Some("from host"));
        assert_eq!(
            feed[0].collections,
            vec![CollectionTag {
                source: "col".into(),
                title: Some("Posted first".into()),
                url: "https://c/1".into(),
                users: vec!["alice".into()],
            }]
        );
        assert!(feed[1].collections.is_empty());

        assert_eq!(feed[2].source.as_deref(), Some("host"));
        assert_eq!(feed[2].title.as_deref(), Some("Posted third"));
        assert_eq!(feed[2].thumbnail.as_deref(), Some("https://img/3.jpg"));
        assert_eq!(feed[2].collections[0].users, vec!["bob".to_string()]);

        // x/1 came from the metadata cache seeded by the hosting feed
        assert_eq!(host.video_calls(), 1);
    }
}
