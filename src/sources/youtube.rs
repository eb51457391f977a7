use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info};

use super::{fetch_feeds, HostingSource};
use crate::cache::BoundedCache;
use crate::error::SourceError;
use crate::http::HttpFetch;
use crate::video::{VideoLength, VideoRecord, VideoUser};

const PATTERNS: &[&str] = &[
    "*://www.youtube.com/watch?*",
    "*://youtube.com/watch?*",
    "*://m.youtube.com/watch?*",
    "*://www.youtube.com/shorts/*",
    "*://youtube.com/shorts/*",
    "*://www.youtube.com/live/*",
    "*://www.youtube.com/embed/*",
    "*://youtu.be/*",
];

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/|live/)|youtu\.be/)([a-zA-Z0-9_-]{11})")
        .expect("video id pattern is valid")
});

/// YouTube through the Invidious REST API (no API key, no cookies).
pub struct YouTubeSource {
    fetcher: Arc<dyn HttpFetch>,
    instance: String,
    channels: Vec<String>,
    cache: BoundedCache<VideoRecord>,
}

#[derive(Debug, Deserialize)]
struct ChannelVideos {
    #[serde(default)]
    videos: Vec<InvidiousVideo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvidiousVideo {
    video_id: String,
    title: String,
    description: Option<String>,
    view_count: Option<u64>,
    /// Seconds since the epoch
    published: Option<i64>,
    length_seconds: Option<u64>,
    #[serde(default)]
    live_now: bool,
    #[serde(default)]
    is_upcoming: bool,
    premiere_timestamp: Option<i64>,
    author: Option<String>,
    author_url: Option<String>,
    #[serde(default)]
    author_thumbnails: Vec<Thumbnail>,
    #[serde(default)]
    author_verified: bool,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
    #[serde(default)]
    width: u32,
}

impl YouTubeSource {
    pub fn new(
        fetcher: Arc<dyn HttpFetch>,
        instance: impl Into<String>,
        channels: Vec<String>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            fetcher,
            instance: instance.into().trim_end_matches('/').to_string(),
            channels,
            cache: BoundedCache::with_ttl(200, cache_ttl),
        }
    }

    pub fn extract_video_id(url: &str) -> Option<String> {
        VIDEO_ID
            .captures(url)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
    }

    pub fn canonical_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", video_id)
    }

    async fn channel_videos(&self, channel_id: String) -> Result<Vec<VideoRecord>, SourceError> {
        let url = format!(
            "{}/api/v1/channels/{}/videos",
            self.instance,
            urlencoding::encode(&channel_id)
        );
        let response = self.fetcher.get(&url).await?.error_for_status(&url)?;
        let channel: ChannelVideos = response.json()?;

        debug!("📺 Channel {}: {} videos", channel_id, channel.videos.len());
        Ok(channel.videos.into_iter().map(into_record).collect())
    }
}

fn into_record(video: InvidiousVideo) -> VideoRecord {
    let url = YouTubeSource::canonical_url(&video.video_id);
    let thumbnail = format!("https://i.ytimg.com/vi/{}/mqdefault.jpg", video.video_id);

    let timestamp = match (video.is_upcoming, video.premiere_timestamp) {
        (true, Some(premiere)) => Some(premiere * 1000),
        _ => video.published.map(|secs| secs * 1000),
    };

    let length = if video.live_now {
        Some(VideoLength::Text("LIVE".to_string()))
    } else {
        video
            .length_seconds
            .filter(|secs| *secs > 0)
            .map(VideoLength::Seconds)
    };

    let avatar = video
        .author_thumbnails
        .iter()
        .find(|t| t.width >= 48)
        .or_else(|| video.author_thumbnails.first())
        .map(|t| absolute_media_url(&t.url));

    let user = VideoUser {
        url: video
            .author_url
            .map(|path| format!("https://www.youtube.com{}", path)),
        name: video.author,
        avatar,
        verified: video.author_verified,
    };

    VideoRecord {
        url,
        title: Some(video.title),
        desc: video.description.filter(|d| !d.is_empty()),
        thumbnail: Some(thumbnail),
        length,
        views: video.view_count,
        timestamp,
        is_live: Some(video.live_now),
        user: Some(user),
        ..VideoRecord::default()
    }
}

/// Invidious hands out protocol-relative avatar URLs.
fn absolute_media_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        url.to_string()
    }
}

#[async_trait]
impl HostingSource for YouTubeSource {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn patterns(&self) -> &[&'static str] {
        PATTERNS
    }

    async fn get_video(&self, url: &str) -> Result<Option<VideoRecord>, SourceError> {
        let Some(video_id) = Self::extract_video_id(url) else {
            return Err(SourceError::Unsupported(format!("no YouTube video id in {}", url)));
        };
        let canonical = Self::canonical_url(&video_id);
        if let Some(cached) = self.cache.get(&canonical) {
            return Ok(Some(cached));
        }

        let api_url = format!("{}/api/v1/videos/{}", self.instance, video_id);
        let response = self.fetcher.get(&api_url).await?;
        if response.status == 404 {
            return Ok(None);
        }
        let video: InvidiousVideo = response.error_for_status(&api_url)?.json()?;
        let record = into_record(video);

        self.cache.push(canonical, record.clone(), false);
        Ok(Some(record))
    }

    async fn get_all_videos(&self) -> Result<Vec<VideoRecord>, SourceError> {
        let videos = fetch_feeds(self.name(), &self.channels, |channel| {
            self.channel_videos(channel)
        })
        .await?;

        info!("📺 YouTube: {} videos from {} channels", videos.len(), self.channels.len());
        Ok(videos)
    }
}
