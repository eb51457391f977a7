use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use vidfeed::aggregator::Aggregator;
use vidfeed::cache::BoundedCache;
use vidfeed::config::Config;
use vidfeed::feed::FeedWriter;
use vidfeed::http::{HttpFetch, ReqwestFetcher};
use vidfeed::resolver::UrlResolver;
use vidfeed::scheduler::Scheduler;
use vidfeed::sources::{RedditSource, SourceRegistry, VimeoSource, YouTubeSource};
use vidfeed::storage::{JsonFileStore, KeyValueStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vidfeed=debug".parse()?)
                .add_directive("reqwest=info".parse()?),
        )
        .init();

    info!("📺 Starting vidfeed v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    let file_store = JsonFileStore::new(config.data_dir.clone()).await?;
    info!("📁 Persisting to {}", file_store.data_dir().display());
    let store: Arc<dyn KeyValueStore> = Arc::new(file_store);

    let fetcher: Arc<dyn HttpFetch> = Arc::new(ReqwestFetcher::new(config.http_timeout)?);
    let short_fetcher: Arc<dyn HttpFetch> =
        Arc::new(ReqwestFetcher::without_redirects(config.http_timeout)?);

    let registry = SourceRegistry::builder()
        .hosting(Arc::new(YouTubeSource::new(
            fetcher.clone(),
            config.invidious_instance.clone(),
            config.youtube_channels.clone(),
            config.metadata_cache_ttl,
        )))
        .hosting(Arc::new(VimeoSource::new(
            fetcher.clone(),
            config.vimeo_users.clone(),
            config.metadata_cache_ttl,
        )))
        .collection(Arc::new(RedditSource::new(
            fetcher,
            config.reddit_subreddits.clone(),
        )))
        .build()?;

    let metadata = BoundedCache::open_map(
        config.metadata_cache_size,
        Some(config.metadata_cache_ttl),
        store.clone(),
        "video_metadata",
    )
    .await;
    let short_urls =
        BoundedCache::open_map(config.url_cache_size, None, store.clone(), "shortened_urls").await;
    let watched = BoundedCache::open_key_list(config.watched_list_size, store.clone(), "watched").await;

    let resolver = Arc::new(UrlResolver::new(short_fetcher, short_urls));
    let aggregator = Arc::new(Aggregator::new(
        Arc::new(registry),
        resolver.clone(),
        metadata,
    ));
    let writer = Arc::new(FeedWriter::new(store, watched));
    let scheduler = Arc::new(Scheduler::new(
        aggregator.clone(),
        writer.clone(),
        config.sources.clone(),
        config.refresh_interval,
    ));

    if std::env::args().any(|arg| arg == "--once") {
        let count = scheduler.run_once().await?;
        info!("✅ Published {} videos", count);
    } else {
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("❌ Could not listen for Ctrl+C: {}", e);
                return;
            }
            info!("⚠️ Shutdown signal received");
            signal.cancel();
        });

        scheduler.run(shutdown).await;
    }

    flush_caches(&aggregator, &resolver, &writer).await;
    Ok(())
}

async fn flush_caches(aggregator: &Aggregator, resolver: &UrlResolver, writer: &FeedWriter) {
    let results = [
        ("video_metadata", aggregator.metadata().cache().flush().await),
        ("shortened_urls", resolver.cache().flush().await),
        ("watched", writer.watched().flush().await),
    ];
    for (name, result) in results {
        if let Err(e) = result {
            error!("❌ Could not flush cache '{}': {}", name, e);
        }
    }
    info!("💾 Caches flushed");
}
