//! Bounded-concurrency fetch orchestration with proxy rotation and
//! bot-detection retry.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::AppError;
use crate::proxy::ProxyRotator;
use crate::record::Record;
use crate::traits::SourceAdapter;

/// Tuning for one source's fetch phase.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum concurrent in-flight fetches.
    pub max_workers: usize,
    /// Retries after the first attempt (2 means 3 total attempts).
    pub max_retries: u32,
    /// Fixed pause between attempts on the same URL.
    pub retry_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Runs a bounded worker pool over one source's profile URLs.
///
/// Workers pull URLs from a shared queue and fan results into a single
/// collector channel; the proxy rotator's cursor is the only state shared
/// between them. Per-URL failures are absorbed and logged — a run always
/// completes with whatever could be fetched.
pub struct FetchOrchestrator<A: SourceAdapter> {
    adapter: A,
    rotator: Arc<ProxyRotator>,
    config: FetchConfig,
}

impl<A: SourceAdapter + 'static> FetchOrchestrator<A> {
    pub fn new(
        adapter: A,
        rotator: Arc<ProxyRotator>,
        config: FetchConfig,
    ) -> Result<Self, AppError> {
        if config.max_workers == 0 {
            return Err(AppError::Config("max_workers must be at least 1".into()));
        }
        Ok(Self {
            adapter,
            rotator,
            config,
        })
    }

    /// List the source's profile pages, then fetch them all.
    ///
    /// A listing failure (after retries) degrades to an empty result for
    /// this source; it never aborts the run.
    pub async fn run(&self) -> Vec<Record> {
        let source = self.adapter.source_id();
        let urls = match self.list_pages().await {
            Ok(urls) => urls,
            Err(error) => {
                tracing::error!(source, error = %error, "Could not list profile pages");
                return Vec::new();
            }
        };
        tracing::info!(source, pages = urls.len(), "Listing complete");
        self.fetch_profiles(urls).await
    }

    /// Expand the source's listings, retrying with rotated proxies.
    pub async fn list_pages(&self) -> Result<Vec<String>, AppError> {
        let mut attempt = 0u32;
        loop {
            let proxy = self.rotator.next();
            match self.adapter.list_pages(&proxy).await {
                Ok(urls) => return Ok(urls),
                Err(error) if error.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        source = self.adapter.source_id(),
                        error = %error,
                        attempt,
                        "Listing failed, retrying with a fresh proxy"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Fetch every URL through the bounded worker pool.
    ///
    /// Output order is unspecified. An empty URL set yields an empty result.
    pub async fn fetch_profiles(&self, urls: Vec<String>) -> Vec<Record> {
        if urls.is_empty() {
            return Vec::new();
        }

        let total = urls.len();
        let queue = Arc::new(Mutex::new(VecDeque::from(urls)));
        let (tx, mut rx) = mpsc::channel::<Result<Record, AppError>>(total);

        let workers = self.config.max_workers.min(total);
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let adapter = self.adapter.clone();
            let rotator = Arc::clone(&self.rotator);
            let config = self.config.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let url = {
                        let mut queue = queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                        queue.pop_front()
                    };
                    let Some(url) = url else { break };

                    let outcome = fetch_with_retry(&adapter, &url, &rotator, &config).await;
                    if tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(tx);

        let mut records = Vec::new();
        let mut failed = 0usize;
        while let Some(outcome) = rx.recv().await {
            match outcome {
                Ok(record) => records.push(record),
                Err(_) => failed += 1,
            }
        }
        for handle in handles {
            let _ = handle.await;
        }

        tracing::info!(
            source = self.adapter.source_id(),
            total,
            fetched = records.len(),
            failed,
            "Profile fetch complete"
        );
        records
    }
}

/// One URL's bounded retry loop: each attempt gets a freshly rotated proxy.
async fn fetch_with_retry<A: SourceAdapter>(
    adapter: &A,
    url: &str,
    rotator: &ProxyRotator,
    config: &FetchConfig,
) -> Result<Record, AppError> {
    let mut attempt = 0u32;
    loop {
        let proxy = rotator.next();
        match adapter.fetch_profile(url, &proxy).await {
            Ok(record) => return Ok(record),
            Err(error) if error.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                tracing::warn!(
                    url,
                    error = %error,
                    attempt,
                    max_retries = config.max_retries,
                    "Fetch failed, retrying with a fresh proxy"
                );
                tokio::time::sleep(config.retry_delay).await;
            }
            Err(error) => {
                tracing::warn!(url, error = %error, "Giving up on profile");
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyEndpoint;
    use crate::testutil::{MockAdapter, make_profile, test_rotator};

    fn fast_config(max_workers: usize) -> FetchConfig {
        FetchConfig {
            max_workers,
            max_retries: 2,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn zero_urls_is_empty_not_an_error() {
        let adapter = MockAdapter::new("mock");
        let orchestrator =
            FetchOrchestrator::new(adapter, test_rotator(3), fast_config(4)).unwrap();

        let records = orchestrator.fetch_profiles(Vec::new()).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn zero_workers_is_config_error() {
        let adapter = MockAdapter::new("mock");
        let result = FetchOrchestrator::new(adapter, test_rotator(3), fast_config(0));
        assert!(matches!(result.err(), Some(AppError::Config(_))));
    }

    #[tokio::test]
    async fn fetches_every_listed_profile() {
        let adapter = MockAdapter::new("mock").with_listing(vec![
            "https://mock.test/p/1",
            "https://mock.test/p/2",
            "https://mock.test/p/3",
        ]);
        let orchestrator =
            FetchOrchestrator::new(adapter, test_rotator(3), fast_config(2)).unwrap();

        let records = orchestrator.run().await;
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn bot_detection_retries_with_a_fresh_proxy() {
        let url = "https://mock.test/p/1";
        let adapter = MockAdapter::new("mock").profile_sequence(
            url,
            vec![
                Err(AppError::BotDetected(url.into())),
                Ok(make_profile("mock", "Foo", "FOO")),
            ],
        );
        let orchestrator =
            FetchOrchestrator::new(adapter.clone(), test_rotator(3), fast_config(1)).unwrap();

        let records = orchestrator.fetch_profiles(vec![url.to_string()]).await;

        assert_eq!(records.len(), 1);
        let proxies: Vec<ProxyEndpoint> = adapter.seen_proxies.lock().unwrap().clone();
        assert_eq!(proxies.len(), 2);
        assert_ne!(proxies[0], proxies[1], "retry must rotate the proxy");
    }

    #[tokio::test]
    async fn retry_exhaustion_skips_the_url_without_failing_the_run() {
        let bad = "https://mock.test/p/bad";
        let good = "https://mock.test/p/good";
        let adapter = MockAdapter::new("mock").profile_sequence(
            bad,
            vec![
                Err(AppError::Transient("timeout".into())),
                Err(AppError::Transient("timeout".into())),
                Err(AppError::Transient("timeout".into())),
            ],
        );
        let orchestrator =
            FetchOrchestrator::new(adapter.clone(), test_rotator(3), fast_config(2)).unwrap();

        let records = orchestrator
            .fetch_profiles(vec![bad.to_string(), good.to_string()])
            .await;

        assert_eq!(records.len(), 1);
        // max_retries = 2 means exactly 3 attempts on the bad URL
        assert_eq!(adapter.attempts_for(bad), 3);
    }

    #[tokio::test]
    async fn non_retryable_failure_gives_up_immediately() {
        let url = "https://mock.test/p/1";
        let adapter = MockAdapter::new("mock")
            .profile_sequence(url, vec![Err(AppError::Config("broken selector".into()))]);
        let orchestrator =
            FetchOrchestrator::new(adapter.clone(), test_rotator(3), fast_config(2)).unwrap();

        let records = orchestrator.fetch_profiles(vec![url.to_string()]).await;

        assert!(records.is_empty());
        assert_eq!(adapter.attempts_for(url), 1);
    }

    #[tokio::test]
    async fn worker_bound_is_enforced() {
        let urls: Vec<String> = (0..20).map(|i| format!("https://mock.test/p/{i}")).collect();
        let adapter = MockAdapter::new("mock").with_fetch_delay(Duration::from_millis(10));
        let orchestrator =
            FetchOrchestrator::new(adapter.clone(), test_rotator(3), fast_config(3)).unwrap();

        let records = orchestrator.fetch_profiles(urls).await;

        assert_eq!(records.len(), 20);
        assert!(
            adapter.max_in_flight() <= 3,
            "observed {} concurrent fetches",
            adapter.max_in_flight()
        );
    }

    #[tokio::test]
    async fn listing_failure_is_retried_then_succeeds() {
        let adapter = MockAdapter::new("mock")
            .listing_sequence(vec![
                Err(AppError::Transient("timeout".into())),
                Ok(vec!["https://mock.test/p/1".to_string()]),
            ]);
        let orchestrator =
            FetchOrchestrator::new(adapter, test_rotator(3), fast_config(2)).unwrap();

        let records = orchestrator.run().await;
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn listing_exhaustion_degrades_to_empty_run() {
        let adapter = MockAdapter::new("mock").listing_sequence(vec![
            Err(AppError::Transient("timeout".into())),
            Err(AppError::Transient("timeout".into())),
            Err(AppError::Transient("timeout".into())),
        ]);
        let orchestrator =
            FetchOrchestrator::new(adapter, test_rotator(3), fast_config(2)).unwrap();

        let records = orchestrator.run().await;
        assert!(records.is_empty());
    }
}
