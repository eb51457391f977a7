use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::{fetch_feeds, CollectionSource};
use crate::error::SourceError;
use crate::http::HttpFetch;
use crate::video::{CollectionItem, VideoRecord};

const BASE_URL: &str = "https://www.reddit.com";

/// Link posts from a set of subreddits.
pub struct RedditSource {
    fetcher: Arc<dyn HttpFetch>,
    subreddits: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    title: String,
    url: Option<String>,
    permalink: String,
    author: Option<String>,
    #[serde(default)]
    is_self: bool,
}

impl RedditSource {
    pub fn new(fetcher: Arc<dyn HttpFetch>, subreddits: Vec<String>) -> Self {
        Self {
            fetcher,
            subreddits,
        }
    }

    async fn subreddit_items(&self, subreddit: String) -> Result<Vec<CollectionItem>, SourceError> {
        let url = format!(
            "{}/r/{}/new.json?limit=50&raw_json=1",
            BASE_URL,
            urlencoding::encode(&subreddit)
        );
        let response = self.fetcher.get(&url).await?.error_for_status(&url)?;
        let listing: Listing = response.json()?;
        Ok(listing_items(listing))
    }
}

fn listing_items(listing: Listing) -> Vec<CollectionItem> {
    listing
        .data
        .children
        .into_iter()
        .map(|child| child.data)
        .filter(|post| !post.is_self)
        .filter_map(|post| {
            let link = post.url?;
            let users = post.author.into_iter().collect();
            Some(CollectionItem::new(
                VideoRecord::new(link).with_title(post.title),
                format!("{}{}", BASE_URL, post.permalink),
                users,
            ))
        })
        .collect()
}

#[async_trait]
impl CollectionSource for RedditSource {
    fn name(&self) -> &'static str {
        "reddit"
    }

    async fn get_items(&self) -> Result<Vec<CollectionItem>, SourceError> {
        let items = fetch_feeds(self.name(), &self.subreddits, |sub| self.subreddit_items(sub)).await?;

        info!("👽 Reddit: {} links from {} subreddits", items.len(), self.subreddits.len());
        Ok(items)
    }
}
