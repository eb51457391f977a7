use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Per-source on/off switches. Sources not mentioned are enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceToggles(BTreeMap<String, bool>);

impl SourceToggles {
    /// Parses `"youtube=true,reddit=false"`. Blank entries are ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut toggles = BTreeMap::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, enabled) = entry
                .split_once('=')
                .with_context(|| format!("expected name=bool in SOURCES, got '{}'", entry))?;
            let enabled: bool = enabled
                .trim()
                .parse()
                .with_context(|| format!("invalid toggle for source '{}'", name.trim()))?;
            toggles.insert(name.trim().to_string(), enabled);
        }
        Ok(Self(toggles))
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(true)
    }

    pub fn disabled(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, enabled)| !**enabled)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub data_dir: PathBuf,

    // Scheduling
    pub refresh_interval: Duration,
    pub sources: SourceToggles,

    // Sources
    pub youtube_channels: Vec<String>,
    pub invidious_instance: String,
    pub vimeo_users: Vec<String>,
    pub reddit_subreddits: Vec<String>,

    // Caches
    pub metadata_cache_size: usize,
    pub metadata_cache_ttl: Duration,
    pub url_cache_size: usize,
    pub watched_list_size: usize,

    // Network
    pub http_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),

            refresh_interval: Duration::from_secs(
                env_parse::<u64>("REFRESH_INTERVAL_MINUTES")?.unwrap_or(15) * 60,
            ),
            sources: SourceToggles::parse(&std::env::var("SOURCES").unwrap_or_default())?,

            youtube_channels: env_list("YOUTUBE_CHANNELS").unwrap_or_default(),
            invidious_instance: std::env::var("INVIDIOUS_INSTANCE")
                .unwrap_or(defaults.invidious_instance),
            vimeo_users: env_list("VIMEO_USERS").unwrap_or_default(),
            reddit_subreddits: env_list("REDDIT_SUBREDDITS").unwrap_or(defaults.reddit_subreddits),

            metadata_cache_size: env_parse("METADATA_CACHE_SIZE")?
                .unwrap_or(defaults.metadata_cache_size),
            metadata_cache_ttl: env_duration("METADATA_CACHE_TTL")?
                .unwrap_or(defaults.metadata_cache_ttl),
            url_cache_size: env_parse("URL_CACHE_SIZE")?.unwrap_or(defaults.url_cache_size),
            watched_list_size: env_parse("WATCHED_LIST_SIZE")?
                .unwrap_or(defaults.watched_list_size),

            http_timeout: env_duration("HTTP_TIMEOUT")?.unwrap_or(defaults.http_timeout),
        };

        config.validate()?;

        Ok(config)
    }

    /// Rejects values that would make the aggregator useless or spin.
    ///
    /// # Validation Rules
    ///
    /// - Cache capacities must be greater than 0
    /// - The refresh interval and HTTP timeout must be non-zero
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval.is_zero() {
            anyhow::bail!("Refresh interval must be greater than 0");
        }

        if self.metadata_cache_size == 0 {
            anyhow::bail!("Metadata cache size must be greater than 0");
        }

        if self.url_cache_size == 0 {
            anyhow::bail!("URL cache size must be greater than 0");
        }

        if self.watched_list_size == 0 {
            anyhow::bail!("Watched list size must be greater than 0");
        }

        if self.http_timeout.is_zero() {
            anyhow::bail!("HTTP timeout must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    pub fn summary(&self) -> String {
        let disabled: Vec<_> = self.sources.disabled().collect();
        format!(
            "Config Summary:\n  \
            Data: {}\n  \
            Refresh: every {}\n  \
            Sources: {} YouTube channels via {}, {} Vimeo users, {} subreddits (disabled: {})\n  \
            Cache: {} metadata ({} TTL), {} short URLs, {} watched\n  \
            HTTP timeout: {}",
            self.data_dir.display(),
            humantime::format_duration(self.refresh_interval),
            self.youtube_channels.len(),
            self.invidious_instance,
            self.vimeo_users.len(),
            self.reddit_subreddits.len(),
            if disabled.is_empty() {
                "none".to_string()
            } else {
                disabled.join(", ")
            },
            self.metadata_cache_size,
            humantime::format_duration(self.metadata_cache_ttl),
            self.url_cache_size,
            self.watched_list_size,
            humantime::format_duration(self.http_timeout),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "./data".into(),

            refresh_interval: Duration::from_secs(15 * 60),
            sources: SourceToggles::default(),

            youtube_channels: Vec::new(),
            invidious_instance: "https://yewtu.be".to_string(),
            vimeo_users: Vec::new(),
            reddit_subreddits: vec!["videos".to_string()],

            metadata_cache_size: 500,
            metadata_cache_ttl: Duration::from_secs(6 * 60 * 60),
            url_cache_size: 200,
            watched_list_size: 1000,

            http_timeout: Duration::from_secs(15),
        }
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {}", key)),
        _ => Ok(None),
    }
}

fn env_duration(key: &str) -> Result<Option<Duration>> {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => parse_duration(&val)
            .map(Some)
            .with_context(|| format!("invalid duration for {}", key)),
        _ => Ok(None),
    }
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|val| split_list(&val))
}

/// `"30s"`, `"6h"`, `"1h 30m"`, or a bare number of seconds.
fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    Ok(humantime::parse_duration(raw)?)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn toggles_default_to_enabled() {
        let toggles = SourceToggles::parse(" youtube=false , reddit=true ,").unwrap();
        assert!(!toggles.is_enabled("youtube"));
        assert!(toggles.is_enabled("reddit"));
        assert!(toggles.is_enabled("vimeo"));
        assert_eq!(toggles.disabled().collect::<Vec<_>>(), vec!["youtube"]);
    }

    #[test]
    fn malformed_toggles_are_rejected() {
        assert!(SourceToggles::parse("youtube").is_err());
        assert!(SourceToggles::parse("youtube=maybe").is_err());
        assert_eq!(SourceToggles::parse("").unwrap(), SourceToggles::default());
    }

    #[test]
    fn durations_accept_humantime_and_seconds() {
        assert_eq!(parse_duration("6h").unwrap(), Duration::from_secs(21_600));
        assert_eq!(parse_duration("1m 30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn lists_skip_blank_entries() {
        assert_eq!(split_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn validation_rejects_zero_values() {
        assert!(Config::default().validate().is_ok());

        let config = Config {
            metadata_cache_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            refresh_interval: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            http_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn summary_lists_disabled_sources() {
        let config = Config {
            sources: SourceToggles::parse("vimeo=false").unwrap(),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(summary.contains("disabled: vimeo"));
        assert!(summary.contains("6h"));
    }
}
