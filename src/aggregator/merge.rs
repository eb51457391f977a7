use std::collections::HashMap;

use crate::sources::SourceRegistry;
use crate::video::{CollectionRef, CollectionTag, VideoRecord};

/// A collection item after metadata lookup, still paired with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedItem {
    pub collection: &'static str,
    /// Title as the collection rendered it, captured before enrichment
    pub col_title: Option<String>,
    pub video: VideoRecord,
    pub col: CollectionRef,
}

impl EnrichedItem {
    fn tag(&self) -> CollectionTag {
        CollectionTag {
            source: self.collection.to_string(),
            title: self.col_title.clone(),
            url: self.col.url.clone(),
            users: self.col.users.clone(),
        }
    }
}

/// URL-keyed records that remember the order they were first inserted in.
#[derive(Debug, Default)]
pub struct FeedMerger {
    records: Vec<VideoRecord>,
    positions: HashMap<String, usize>,
}

impl FeedMerger {
    /// Starts from the hosting results. A URL listed twice keeps its first
    /// position and its latest record.
    pub fn seeded(hosting: impl IntoIterator<Item = VideoRecord>) -> Self {
        let mut merger = Self::default();
        for video in hosting {
            match merger.positions.get(&video.url) {
                Some(&pos) => merger.records[pos] = video,
                None => merger.insert(video),
            }
        }
        merger
    }

    fn insert(&mut self, video: VideoRecord) {
        self.positions.insert(video.url.clone(), self.records.len());
        self.records.push(video);
    }

    /// Folds one enriched collection item into the feed.
    ///
    /// A known URL gains a provenance tag and only borrows `desc` and `game`
    /// where it has none; hosting data always wins. An unknown URL becomes a
    /// new record attributed to whichever hosting source claims the URL.
    pub fn merge(&mut self, item: EnrichedItem, registry: &SourceRegistry) {
        let tag = item.tag();

        if let Some(&pos) = self.positions.get(&item.video.url) {
            let existing = &mut self.records[pos];
            if !existing.collections.contains(&tag) {
                existing.collections.push(tag);
            }
            if existing.desc.is_none() {
                existing.desc = item.video.desc;
            }
            if existing.game.is_none() {
                existing.game = item.video.game;
            }
            return;
        }

        let mut video = item.video;
        video.source = registry.source_from_url(&video.url).map(str::to_string);
        video.collections = vec![tag];
        self.insert(video);
    }

    pub fn into_records(self) -> Vec<VideoRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHosting;
    use crate::video::Game;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn registry() -> SourceRegistry {
        SourceRegistry::builder()
            .hosting(Arc::new(FakeHosting::new("host", &["https://x/*"])))
            .build()
            .unwrap()
    }

    fn item(collection: &'static str, video: VideoRecord, col_url: &str) -> EnrichedItem {
        EnrichedItem {
            collection,
            col_title: video.title.clone(),
            video,
            col: CollectionRef {
                url: col_url.to_string(),
                users: vec!["u1".to_string()],
            },
        }
    }

    fn hosted(url: &str) -> VideoRecord {
        let mut video = VideoRecord::new(url).with_title("Hosted");
        video.source = Some("host".to_string());
        video
    }

    #[test]
    fn hosting_description_wins_over_collection() {
        let mut merger = FeedMerger::seeded(vec![hosted("https://x/1").with_desc("hosting")]);
        merger.merge(
            item("col", VideoRecord::new("https://x/1").with_desc("collection"), "https://c/1"),
            &registry(),
        );

        let records = merger.into_records();
        assert_eq!(records[0].desc.as_deref(), Some("hosting"));
        assert_eq!(records[0].collections.len(), 1);
    }

    #[test]
    fn collection_backfills_missing_desc_and_game() {
        let game = Game {
            name: Some("Go".into()),
            ..Game::default()
        };
        let mut merger = FeedMerger::seeded(vec![hosted("https://x/1")]);
        merger.merge(
            item(
                "col",
                VideoRecord::new("https://x/1").with_desc("collection").with_game(game.clone()),
                "https://c/1",
            ),
            &registry(),
        );

        let records = merger.into_records();
        assert_eq!(records[0].desc.as_deref(), Some("collection"));
        assert_eq!(records[0].game, Some(game));
        assert_eq!(records[0].title.as_deref(), Some("Hosted"));
    }

    #[test]
    fn tags_accumulate_across_collections() {
        let mut merger = FeedMerger::seeded(Vec::new());
        let reg = registry();
        merger.merge(item("a", VideoRecord::new("https://x/1").with_title("A"), "https://a/1"), &reg);
        merger.merge(item("b", VideoRecord::new("https://x/1").with_title("B"), "https://b/1"), &reg);

        let records = merger.into_records();
        assert_eq!(records.len(), 1);
        let tags: Vec<_> = records[0]
            .collections
            .iter()
            .map(|t| (t.source.as_str(), t.title.as_deref()))
            .collect();
        assert_eq!(tags, vec![("a", Some("A")), ("b", Some("B"))]);
    }

    #[test]
    fn identical_tags_are_not_duplicated() {
        let mut merger = FeedMerger::seeded(vec![hosted("https://x/1")]);
        let reg = registry();
        let entry = item("a", VideoRecord::new("https://x/1"), "https://a/1");
        merger.merge(entry.clone(), &reg);
        merger.merge(entry, &reg);

        assert_eq!(merger.into_records()[0].collections.len(), 1);
    }

    #[test]
    fn new_urls_are_attributed_by_pattern_or_left_orphan() {
        let mut merger = FeedMerger::seeded(Vec::new());
        let reg = registry();
        merger.merge(item("col", VideoRecord::new("https://x/2"), "https://c/2"), &reg);
        merger.merge(item("col", VideoRecord::new("https://other/3"), "https://c/3"), &reg);

        let records = merger.into_records();
        assert_eq!(records[0].source.as_deref(), Some("host"));
        assert_eq!(records[1].source, None);
        assert_eq!(records[1].collections[0].url, "https://c/3");
    }

    #[test]
    fn output_keeps_first_insertion_order() {
        let mut merger = FeedMerger::seeded(vec![hosted("https://x/b"), hosted("https://x/a")]);
        merger.merge(item("col", VideoRecord::new("https://x/c"), "https://c/c"), &registry());
        merger.merge(item("col", VideoRecord::new("https://x/b"), "https://c/b"), &registry());

        let urls: Vec<_> = merger.into_records().into_iter().map(|v| v.url).collect();
        assert_eq!(urls, vec!["https://x/b", "https://x/a", "https://x/c"]);
    }
}
