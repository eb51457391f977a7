use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use super::{Adapter, CollectionSource, HostingSource};
use crate::error::SourceError;

/// Shell-style URL pattern where `*` matches any run of characters.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    glob: String,
    regex: Regex,
}

impl UrlPattern {
    pub fn compile(glob: &str) -> Result<Self, SourceError> {
        let body = glob
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^{}$", body))
            .map_err(|e| SourceError::Parse(format!("bad URL pattern '{}': {}", glob, e)))?;

        Ok(Self {
            glob: glob.to_string(),
            regex,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }
}

struct Registered {
    adapter: Adapter,
    patterns: Vec<UrlPattern>,
}

/// Every source known to the application, fixed at startup.
///
/// Patterns are compiled once when the registry is built. Lookups by URL
/// walk hosting sources in registration order and stop at the first match.
pub struct SourceRegistry {
    sources: Vec<Registered>,
}

impl SourceRegistry {
    pub fn builder() -> SourceRegistryBuilder {
        SourceRegistryBuilder::default()
    }

    /// Name of the first hosting source whose patterns match `url`.
    pub fn source_from_url(&self, url: &str) -> Option<&'static str> {
        self.sources
            .iter()
            .find(|s| s.patterns.iter().any(|p| p.matches(url)))
            .map(|s| s.adapter.name())
    }

    pub fn is_video_page(&self, url: &str) -> bool {
        self.source_from_url(url).is_some()
    }

    pub fn hosting(&self, name: &str) -> Option<&Arc<dyn HostingSource>> {
        self.sources.iter().find_map(|s| match &s.adapter {
            Adapter::Hosting(source) if source.name() == name => Some(source),
            _ => None,
        })
    }

    pub fn adapters(&self) -> impl Iterator<Item = &Adapter> {
        self.sources.iter().map(|s| &s.adapter)
    }

    /// All hosting patterns, for wiring "open as video" style integrations.
    pub fn context_menu_patterns(&self) -> Vec<&str> {
        self.sources
            .iter()
            .flat_map(|s| s.patterns.iter().map(UrlPattern::as_str))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[derive(Default)]
pub struct SourceRegistryBuilder {
    adapters: Vec<Adapter>,
}

impl SourceRegistryBuilder {
    pub fn hosting(mut self, source: Arc<dyn HostingSource>) -> Self {
        self.adapters.push(Adapter::Hosting(source));
        self
    }

    pub fn collection(mut self, source: Arc<dyn CollectionSource>) -> Self {
        self.adapters.push(Adapter::Collection(source));
        self
    }

    pub fn build(self) -> Result<SourceRegistry, SourceError> {
        let mut seen = HashSet::new();
        let mut sources = Vec::with_capacity(self.adapters.len());

        for adapter in self.adapters {
            if !seen.insert(adapter.name()) {
                return Err(SourceError::Unsupported(format!(
                    "source '{}' registered twice",
                    adapter.name()
                )));
            }

            let patterns = match &adapter {
                Adapter::Hosting(source) => source
                    .patterns()
                    .iter()
                    .map(|glob| UrlPattern::compile(glob))
                    .collect::<Result<Vec<_>, _>>()?,
                Adapter::Collection(_) => Vec::new(),
            };

            sources.push(Registered { adapter, patterns });
        }

        let hosting = sources.iter().filter(|s| s.adapter.is_hosting()).count();
        info!(
            "📚 Source registry: {} hosting, {} collection",
            hosting,
            sources.len() - hosting
        );

        Ok(SourceRegistry { sources })
    }
}
