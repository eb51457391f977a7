//! Hand-written fakes shared by unit tests.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{SourceError, StoreError};
use crate::sources::{CollectionSource, HostingSource};
use crate::storage::KeyValueStore;
use crate::video::{CollectionItem, VideoRecord};

#[derive(Default)]
pub struct MemoryStore {
    data: DashMap<String, Vec<u8>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn put(&self, name: &str, bytes: &[u8]) {
        self.data.insert(name.to_string(), bytes.to_vec());
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn get_json(&self, name: &str) -> serde_json::Value {
        let bytes = self.data.get(name).map(|b| b.value().clone()).unwrap_or_default();
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.get(name).map(|b| b.value().clone()))
    }

    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.put(name, bytes);
        Ok(())
    }
}

/// Hosting source answering from scripted feeds and a fixed video table.
///
/// Each `get_all_videos` call consumes the next scripted feed; once the
/// script runs out it returns an empty list.
pub struct FakeHosting {
    name: &'static str,
    patterns: Vec<&'static str>,
    feeds: Mutex<VecDeque<Result<Vec<VideoRecord>, String>>>,
    videos: HashMap<String, VideoRecord>,
    feed_calls: AtomicUsize,
    video_calls: AtomicUsize,
}

impl FakeHosting {
    pub fn new(name: &'static str, patterns: &[&'static str]) -> Self {
        Self {
            name,
            patterns: patterns.to_vec(),
            feeds: Mutex::new(VecDeque::new()),
            videos: HashMap::new(),
            feed_calls: AtomicUsize::new(0),
            video_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_feed(self, videos: Vec<VideoRecord>) -> Self {
        self.feeds.lock().push_back(Ok(videos));
        self
    }

    pub fn with_failure(self) -> Self {
        self.feeds.lock().push_back(Err(format!("{} is down", self.name)));
        self
    }

    pub fn with_video(mut self, video: VideoRecord) -> Self {
        self.videos.insert(video.url.clone(), video);
        self
    }

    pub fn feed_calls(&self) -> usize {
        self.feed_calls.load(Ordering::SeqCst)
    }

    pub fn video_calls(&self) -> usize {
        self.video_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostingSource for FakeHosting {
    fn name(&self) -> &'static str {
        self.name
    }

    fn patterns(&self) -> &[&'static str] {
        &self.patterns
    }

    async fn get_video(&self, url: &str) -> Result<Option<VideoRecord>, SourceError> {
        self.video_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.videos.get(url).cloned())
    }

    async fn get_all_videos(&self) -> Result<Vec<VideoRecord>, SourceError> {
        self.feed_calls.fetch_add(1, Ordering::SeqCst);
        match self.feeds.lock().pop_front() {
            Some(Ok(videos)) => Ok(videos),
            Some(Err(message)) => Err(SourceError::Parse(message)),
            None => Ok(Vec::new()),
        }
    }
}

/// Collection source with scripted results, same rules as [`FakeHosting`].
pub struct FakeCollection {
    name: &'static str,
    batches: Mutex<VecDeque<Result<Vec<CollectionItem>, String>>>,
    calls: AtomicUsize,
}

impl FakeCollection {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            batches: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_items(self, items: Vec<CollectionItem>) -> Self {
        self.batches.lock().push_back(Ok(items));
        self
    }

    pub fn with_failure(self) -> Self {
        self.batches.lock().push_back(Err(format!("{} is down", self.name)));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CollectionSource for FakeCollection {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn get_items(&self) -> Result<Vec<CollectionItem>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.batches.lock().pop_front() {
            Some(Ok(items)) => Ok(items),
            Some(Err(message)) => Err(SourceError::Parse(message)),
            None => Ok(Vec::new()),
        }
    }
}
