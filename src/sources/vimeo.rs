use async_trait::async_trait;
use chrono::NaiveDateTime;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::info;

use super::{fetch_feeds, HostingSource};
use crate::cache::BoundedCache;
use crate::error::SourceError;
use crate::http::HttpFetch;
use crate::video::{VideoLength, VideoRecord, VideoUser};

const API_BASE: &str = "https://vimeo.com/api/v2";

const PATTERNS: &[&str] = &[
    "*://vimeo.com/*",
    "*://www.vimeo.com/*",
    "*://player.vimeo.com/video/*",
];

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"vimeo\.com/(?:video/|channels/[^/]+/|groups/[^/]+/videos/)?(\d+)")
        .expect("vimeo id pattern is valid")
});

/// Vimeo through its simple (v2) JSON API.
pub struct VimeoSource {
    fetcher: Arc<dyn HttpFetch>,
    users: Vec<String>,
    cache: BoundedCache<VideoRecord>,
}

#[derive(Debug, Deserialize)]
struct VimeoVideo {
    id: u64,
    title: String,
    description: Option<String>,
    /// "YYYY-MM-DD HH:MM:SS"
    upload_date: Option<String>,
    thumbnail_large: Option<String>,
    user_name: Option<String>,
    user_url: Option<String>,
    user_portrait_medium: Option<String>,
    duration: Option<u64>,
    stats_number_of_plays: Option<u64>,
}

impl VimeoSource {
    pub fn new(fetcher: Arc<dyn HttpFetch>, users: Vec<String>, cache_ttl: Duration) -> Self {
        Self {
            fetcher,
            users,
            cache: BoundedCache::with_ttl(200, cache_ttl),
        }
    }

    pub fn extract_video_id(url: &str) -> Option<u64> {
        VIDEO_ID
            .captures(url)
            .and_then(|cap| cap.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    async fn user_videos(&self, user: String) -> Result<Vec<VideoRecord>, SourceError> {
        let url = format!("{}/{}/videos.json", API_BASE, urlencoding::encode(&user));
        let response = self.fetcher.get(&url).await?.error_for_status(&url)?;
        let videos: Vec<VimeoVideo> = response.json()?;
        Ok(videos.into_iter().map(into_record).collect())
    }
}

fn into_record(video: VimeoVideo) -> VideoRecord {
    let timestamp = video
        .upload_date
        .as_deref()
        .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
        .map(|dt| dt.and_utc().timestamp_millis());

    VideoRecord {
        url: format!("https://vimeo.com/{}", video.id),
        title: Some(video.title),
        desc: video.description.filter(|d| !d.is_empty()),
        thumbnail: video.thumbnail_large,
        length: video.duration.map(VideoLength::Seconds),
        views: video.stats_number_of_plays,
        timestamp,
        is_live: Some(false),
        user: Some(VideoUser {
            url: video.user_url,
            name: video.user_name,
            avatar: video.user_portrait_medium,
            verified: false,
        }),
        ..VideoRecord::default()
    }
}

#[async_trait]
impl HostingSource for VimeoSource {
    fn name(&self) -> &'static str {
        "vimeo"
    }

    fn patterns(&self) -> &[&'static str] {
        PATTERNS
    }

    async fn get_video(&self, url: &str) -> Result<Option<VideoRecord>, SourceError> {
        let Some(id) = Self::extract_video_id(url) else {
            // Profile and category pages also match the patterns
            return Ok(None);
        };
        let canonical = format!("https://vimeo.com/{}", id);
        if let Some(cached) = self.cache.get(&canonical) {
            return Ok(Some(cached));
        }

        let api_url = format!("{}/video/{}.json", API_BASE, id);
        let response = self.fetcher.get(&api_url).await?;
        if response.status == 404 {
            return Ok(None);
        }
        let videos: Vec<VimeoVideo> = response.error_for_status(&api_url)?.json()?;
        let Some(record) = videos.into_iter().next().map(into_record) else {
            return Ok(None);
        };

        self.cache.push(canonical, record.clone(), false);
        Ok(Some(record))
    }

    async fn get_all_videos(&self) -> Result<Vec<VideoRecord>, SourceError> {
        let videos = fetch_feeds(self.name(), &self.users, |user| self.user_videos(user)).await?;

        info!("🎞️ Vimeo: {} videos from {} users", videos.len(), self.users.len());
        Ok(videos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockHttpFetch};
    use pretty_assertions::assert_eq;

    const VIDEOS_JSON: &str = r#"[{
        "id": 76979871,
        "title": "The New Vimeo Player",
        "description": "",
        "url": "https://vimeo.com/76979871",
        "upload_date": "2013-10-15 14:08:29",
        "thumbnail_large": "https://i.vimeocdn.com/video/452001751_640.jpg",
        "user_name": "Vimeo Staff",
        "user_url": "https://vimeo.com/staff",
        "user_portrait_medium": "https://i.vimeocdn.com/portrait/1_75x75.jpg",
        "duration": 62,
        "stats_number_of_plays": 1234
    }]"#;

    #[test]
    fn extracts_numeric_ids() {
        assert_eq!(VimeoSource::extract_video_id("https://vimeo.com/76979871"), Some(76979871));
        assert_eq!(
            VimeoSource::extract_video_id("https://player.vimeo.com/video/76979871?h=abc"),
            Some(76979871)
        );
        assert_eq!(
            VimeoSource::extract_video_id("https://vimeo.com/channels/staffpicks/76979871"),
            Some(76979871)
        );
        assert_eq!(VimeoSource::extract_video_id("https://vimeo.com/staff"), None);
    }

    #[tokio::test]
    async fn user_feed_is_normalized() {
        let mut mock = MockHttpFetch::new();
        mock.expect_get()
            .withf(|url| url == "https://vimeo.com/api/v2/staff/videos.json")
            .returning(|_| Ok(HttpResponse::ok(VIDEOS_JSON)));
        let source = VimeoSource::new(Arc::new(mock), vec!["staff".into()], Duration::from_secs(60));

        let videos = source.get_all_videos().await.unwrap();

        assert_eq!(videos.len(), 1);
        let video = &videos[0];
        assert_eq!(video.url, "https://vimeo.com/76979871");
        assert_eq!(video.desc, None);
        assert_eq!(video.length, Some(VideoLength::Seconds(62)));
        assert_eq!(video.views, Some(1234));
        assert_eq!(video.timestamp, Some(1_381_846_109_000));
    }

    #[tokio::test]
    async fn non_video_pages_have_no_metadata() {
        let mut mock = MockHttpFetch::new();
        mock.expect_get().never();
        let source = VimeoSource::new(Arc::new(mock), Vec::new(), Duration::from_secs(60));

        assert_eq!(source.get_video("https://vimeo.com/staff").await.unwrap(), None);
    }
}
