use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::FeedDescriptor;
use crate::db::{Database, NewArticle};

pub struct Fetcher {
    client: Client,
    db: Arc<Database>,
    catalog: Vec<FeedDescriptor>,
    max_concurrency: usize,
    fetching: Arc<RwLock<bool>>,
}

impl Fetcher {
    pub fn new(db: Arc<Database>, catalog: Vec<FeedDescriptor>, max_concurrency: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Newsdesk/1.0 (News Aggregator)")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            db,
            catalog,
            max_concurrency: max_concurrency.max(1),
            fetching: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn is_fetching(&self) -> bool {
        *self.fetching.read().await
    }

    /// Run one full fetch cycle over the catalog and return how many
    /// articles were newly inserted. A cycle already in progress is not
    /// doubled up; the call fetches nothing and returns None so callers
    /// can tell a skipped cycle from one that found nothing new.
    pub async fn run_fetch_cycle(&self) -> anyhow::Result<Option<u64>> {
        {
            let mut fetching = self.fetching.write().await;
            if *fetching {
                info!("Fetch cycle already in progress, skipping");
                return Ok(None);
            }
            *fetching = true;
        }

        let result = self.do_fetch_cycle().await;

        {
            let mut fetching = self.fetching.write().await;
            *fetching = false;
        }

        result.map(Some)
    }

    async fn do_fetch_cycle(&self) -> anyhow::Result<u64> {
        info!("Fetching {} feeds", self.catalog.len());

        // One spawned task per feed, at most max_concurrency in flight.
        // All store writes happen below in this single collection loop, so
        // the tasks never contend on the database.
        let mut tasks = stream::iter(self.catalog.iter().cloned())
            .map(|descriptor| {
                let client = self.client.clone();
                tokio::spawn(async move { Self::fetch_feed(client, descriptor).await })
            })
            .buffer_unordered(self.max_concurrency);

        let mut inserted: u64 = 0;
        while let Some(joined) = tasks.next().await {
            let articles = match joined {
                Ok(articles) => articles,
                Err(e) => {
                    // A crashed task loses only its own feed's results
                    error!("Feed task failed to complete: {}", e);
                    continue;
                }
            };

            for article in articles {
                if self.db.insert_if_absent(&article).await? {
                    inserted += 1;
                }
            }
        }

        info!("Fetch cycle complete, {} new articles", inserted);
        Ok(inserted)
    }

    /// Fetch and normalize one feed. All failures are contained here: a
    /// feed that cannot be fetched or parsed yields no articles and never
    /// disturbs its siblings.
    async fn fetch_feed(client: Client, descriptor: FeedDescriptor) -> Vec<NewArticle> {
        match Self::try_fetch_feed(&client, &descriptor).await {
            Ok(articles) => {
                info!(
                    "Fetched {} articles from '{}'",
                    articles.len(),
                    descriptor.source_name
                );
                articles
            }
            Err(e) => {
                warn!(
                    "Failed to fetch '{}' ({}): {}",
                    descriptor.source_name, descriptor.url, e
                );
                Vec::new()
            }
        }
    }

    async fn try_fetch_feed(
        client: &Client,
        descriptor: &FeedDescriptor,
    ) -> anyhow::Result<Vec<NewArticle>> {
        let response = client
            .get(&descriptor.url)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;
        let parsed = parser::parse(&bytes[..])?;

        Ok(Self::normalize_entries(parsed, descriptor))
    }

    /// Turn parsed feed entries into article records tagged with the
    /// descriptor's source and category. Entries without a title or link
    /// are dropped.
    pub fn normalize_entries(
        feed: feed_rs::model::Feed,
        descriptor: &FeedDescriptor,
    ) -> Vec<NewArticle> {
        feed.entries
            .into_iter()
            .filter_map(|entry| Self::normalize_entry(entry, descriptor))
            .collect()
    }

    fn normalize_entry(entry: Entry, descriptor: &FeedDescriptor) -> Option<NewArticle> {
        let Some(title) = entry
            .title
            .as_ref()
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
        else {
            debug!("Skipping entry with no title from '{}'", descriptor.source_name);
            return None;
        };

        let Some(link) = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .filter(|l| !l.is_empty())
        else {
            debug!("Skipping entry with no link: {}", title);
            return None;
        };

        let published: Option<DateTime<Utc>> = entry.published.or(entry.updated);
        let published_at = published.map(|dt| dt.to_rfc3339());

        let image_url = Self::extract_image(&entry);

        Some(NewArticle {
            link,
            title,
            published_at,
            source_name: descriptor.source_name.clone(),
            category: descriptor.category.clone(),
            sub_category: descriptor.sub_category.clone(),
            image_url,
        })
    }

    /// First media-content URL wins; otherwise an enclosure link with an
    /// image media type; otherwise none.
    pub fn extract_image(entry: &Entry) -> Option<String> {
        if let Some(url) = entry
            .media
            .iter()
            .flat_map(|media| media.content.iter())
            .find_map(|content| content.url.as_ref())
        {
            return Some(url.to_string());
        }

        entry
            .links
            .iter()
            .find(|link| {
                link.rel.as_deref() == Some("enclosure")
                    && link
                        .media_type
                        .as_deref()
                        .is_some_and(|t| t.contains("image"))
            })
            .map(|link| link.href.clone())
    }
}

/// Run an initial fetch cycle, then keep refreshing on the configured
/// interval. Errors are logged and the loop keeps going.
pub async fn start_background_refresh(fetcher: Arc<Fetcher>, interval_minutes: u64) {
    let interval = Duration::from_secs(interval_minutes * 60);

    info!("Starting initial fetch cycle");
    if let Err(e) = fetcher.run_fetch_cycle().await {
        error!("Initial fetch cycle failed: {}", e);
    }

    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled fetch cycle");
        if let Err(e) = fetcher.run_fetch_cycle().await {
            error!("Scheduled fetch cycle failed: {}", e);
        }
    }
}
