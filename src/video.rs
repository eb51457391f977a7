use serde::{Deserialize, Serialize};

/// Length as the source reports it: seconds, or a pre-rendered text such as
/// `"LIVE"` or `"1:02:03"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VideoLength {
    Seconds(u64),
    Text(String),
}

/// Author of a video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoUser {
    pub url: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

/// Game or category a video belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub name: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
}

/// One collection site that listed a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionTag {
    /// Name of the collection adapter
    pub source: String,
    /// Title the collection gave the entry, not the video's own title
    pub title: Option<String>,
    pub url: String,
    #[serde(default)]
    pub users: Vec<String>,
}

/// Provenance carried by a collection item until it is merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRef {
    pub url: String,
    #[serde(default)]
    pub users: Vec<String>,
}

/// The canonical unit of the feed.
///
/// `url` is the identity key: an aggregation result never holds two records
/// with the same URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    /// Hosting adapter that produced the record directly, if any
    pub source: Option<String>,
    pub url: String,
    pub title: Option<String>,
    pub desc: Option<String>,
    pub thumbnail: Option<String>,
    pub length: Option<VideoLength>,
    pub views: Option<u64>,
    /// Milliseconds since the epoch; scheduled content may be in the future
    pub timestamp: Option<i64>,
    pub is_live: Option<bool>,
    #[serde(default)]
    pub watched: bool,
    pub game: Option<Game>,
    pub user: Option<VideoUser>,
    #[serde(default)]
    pub collections: Vec<CollectionTag>,
    #[serde(default)]
    pub index: usize,
}

impl VideoRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_length(mut self, length: VideoLength) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_views(mut self, views: u64) -> Self {
        self.views = Some(views);
        self
    }

    pub fn with_timestamp(mut self, millis: i64) -> Self {
        self.timestamp = Some(millis);
        self
    }

    pub fn with_user(mut self, user: VideoUser) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_game(mut self, game: Game) -> Self {
        self.game = Some(game);
        self
    }

    /// Title if it is present and non-empty.
    pub fn title_text(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.is_empty())
    }
}

/// A partial record found on a collection site, plus where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionItem {
    /// Provisional data; `url` may be shortened or point back at the collection
    pub video: VideoRecord,
    pub col: CollectionRef,
}

impl CollectionItem {
    pub fn new(video: VideoRecord, col_url: impl Into<String>, users: Vec<String>) -> Self {
        Self {
            video,
            col: CollectionRef {
                url: col_url.into(),
                users,
            },
        }
    }
}
