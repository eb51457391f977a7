use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};
use url::Url;

use crate::cache::BoundedCache;
use crate::http::{HttpFetch, HttpResponse};

/// How a shortening service hands out its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// 3xx with a `Location` header; meta refresh as fallback
    Redirect,
    /// HTML page with `<meta http-equiv="refresh" content="0;url=...">`; header as fallback
    MetaRefresh,
}

/// Known shortening services by host.
const SHORTENERS: &[(&str, Strategy)] = &[
    ("bit.ly", Strategy::Redirect),
    ("t.co", Strategy::MetaRefresh),
    ("goo.gl", Strategy::Redirect),
    ("tinyurl.com", Strategy::Redirect),
    ("ow.ly", Strategy::Redirect),
    ("buff.ly", Strategy::Redirect),
    ("is.gd", Strategy::Redirect),
    ("dlvr.it", Strategy::Redirect),
    ("trib.al", Strategy::Redirect),
];

static META_REFRESH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*refresh[^>]*url\s*=\s*['"]?([^'">\s]+)"#)
        .expect("meta refresh pattern is valid")
});

/// Expands shortened URLs, remembering every successful expansion.
pub struct UrlResolver {
    fetcher: Arc<dyn HttpFetch>,
    cache: BoundedCache<String>,
    shorteners: HashMap<&'static str, Strategy>,
}

impl UrlResolver {
    /// `fetcher` must not follow redirects itself, or the `Location`
    /// strategy never sees a header.
    pub fn new(fetcher: Arc<dyn HttpFetch>, cache: BoundedCache<String>) -> Self {
        Self {
            fetcher,
            cache,
            shorteners: SHORTENERS.iter().copied().collect(),
        }
    }

    pub fn cache(&self) -> &BoundedCache<String> {
        &self.cache
    }

    pub fn is_shortened(&self, url: &str) -> bool {
        self.strategy_for(url).is_some()
    }

    /// The URL the short link points to, or `None` if it could not be
    /// resolved for any reason.
    pub async fn get_real_url(&self, url: &str) -> Option<String> {
        if let Some(real) = self.cache.get(url) {
            debug!("🔗 Short URL cache hit: {} -> {}", url, real);
            return Some(real);
        }

        let strategy = self.strategy_for(url)?;
        let response = match self.fetcher.get(url).await {
            Ok(response) => response,
            Err(e) => {
                warn!("⚠️ Could not expand {}: {}", url, e);
                return None;
            }
        };

        let target = match strategy {
            Strategy::Redirect => {
                redirect_target(&response).or_else(|| meta_refresh_target(&response.body))
            }
            Strategy::MetaRefresh => {
                meta_refresh_target(&response.body).or_else(|| redirect_target(&response))
            }
        };

        let Some(real) = target.and_then(|t| absolutize(url, &t)) else {
            warn!("⚠️ No redirect target found for {} (HTTP {})", url, response.status);
            return None;
        };

        debug!("🔗 Expanded {} -> {}", url, real);
        self.cache.push(url, real.clone(), false);
        Some(real)
    }

    fn strategy_for(&self, url: &str) -> Option<Strategy> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        let host = host.strip_prefix("www.").unwrap_or(host);
        self.shorteners.get(host).copied()
    }
}

fn redirect_target(response: &HttpResponse) -> Option<String> {
    if (300..400).contains(&response.status) {
        response.location.clone()
    } else {
        None
    }
}

fn meta_refresh_target(body: &str) -> Option<String> {
    META_REFRESH
        .captures(body)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().replace("&amp;", "&"))
}

fn absolutize(base: &str, target: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(target).ok().map(String::from)
}
