//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests. Shared state
//! lives behind `Arc<Mutex<_>>` so cloned mocks (e.g. inside fetch workers)
//! record into the same place and tests can assert on it afterwards.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::proxy::{ProxyEndpoint, ProxyRotator};
use crate::record::{FieldKey, Record};
use crate::traits::{Sink, SourceAdapter};

/// Rotator over `n` loopback proxies on ports 8000..8000+n.
pub fn test_rotator(n: u16) -> Arc<ProxyRotator> {
    let pool = (0..n)
        .map(|i| ProxyEndpoint {
            host: "127.0.0.1".to_string(),
            port: 8000 + i,
            user: None,
            pass: None,
        })
        .collect();
    Arc::new(ProxyRotator::new(pool).expect("non-empty test pool"))
}

/// A minimal populated profile record.
pub fn make_profile(source: &str, name: &str, ticker: &str) -> Record {
    let mut record = Record::new(source);
    record.set(FieldKey::Name, name);
    record.set(FieldKey::Ticker, ticker);
    record
}

// ---------------------------------------------------------------------------
// MockAdapter
// ---------------------------------------------------------------------------

/// Mock source adapter with scripted listing and per-URL profile responses.
///
/// Unscripted URLs succeed with a default record, so large fan-out tests
/// need no per-URL setup. Tracks the proxies it was handed, per-URL attempt
/// counts, and the high-water mark of concurrent fetches.
#[derive(Clone)]
pub struct MockAdapter {
    source: String,
    listing: Arc<Mutex<VecDeque<Result<Vec<String>, AppError>>>>,
    profiles: Arc<Mutex<HashMap<String, VecDeque<Result<Record, AppError>>>>>,
    attempts: Arc<Mutex<HashMap<String, usize>>>,
    pub seen_proxies: Arc<Mutex<Vec<ProxyEndpoint>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    fetch_delay: Option<Duration>,
}

impl MockAdapter {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            listing: Arc::new(Mutex::new(VecDeque::new())),
            profiles: Arc::new(Mutex::new(HashMap::new())),
            attempts: Arc::new(Mutex::new(HashMap::new())),
            seen_proxies: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            fetch_delay: None,
        }
    }

    /// Script one successful listing response.
    pub fn with_listing(self, urls: Vec<&str>) -> Self {
        self.listing
            .lock()
            .unwrap()
            .push_back(Ok(urls.into_iter().map(String::from).collect()));
        self
    }

    /// Script a sequence of listing responses, consumed one per call.
    pub fn listing_sequence(self, responses: Vec<Result<Vec<String>, AppError>>) -> Self {
        *self.listing.lock().unwrap() = responses.into();
        self
    }

    /// Script a sequence of responses for one profile URL.
    pub fn profile_sequence(self, url: &str, responses: Vec<Result<Record, AppError>>) -> Self {
        self.profiles
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into());
        self
    }

    /// Make every fetch take this long (for concurrency-bound tests).
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// How many fetch attempts the adapter saw for `url`.
    pub fn attempts_for(&self, url: &str) -> usize {
        self.attempts.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Highest number of fetches observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl SourceAdapter for MockAdapter {
    fn source_id(&self) -> &str {
        &self.source
    }

    async fn list_pages(&self, _proxy: &ProxyEndpoint) -> Result<Vec<String>, AppError> {
        let mut listing = self.listing.lock().unwrap();
        listing.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_profile(&self, url: &str, proxy: &ProxyEndpoint) -> Result<Record, AppError> {
        self.seen_proxies.lock().unwrap().push(proxy.clone());
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = {
            let mut profiles = self.profiles.lock().unwrap();
            profiles.get_mut(url).and_then(VecDeque::pop_front)
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        scripted.unwrap_or_else(|| {
            let mut record = Record::new(&self.source);
            record.set(FieldKey::ProfileUrl, url);
            Ok(record)
        })
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Mock sink recording every write, with an optional one-shot failure.
#[derive(Clone, Default)]
pub struct MockSink {
    pub written: Arc<Mutex<Vec<Vec<Record>>>>,
    write_error: Arc<Mutex<Option<AppError>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_error(error: AppError) -> Self {
        Self {
            written: Arc::new(Mutex::new(Vec::new())),
            write_error: Arc::new(Mutex::new(Some(error))),
        }
    }

    /// Records from the only write, panicking if none or several happened.
    pub fn single_write(&self) -> Vec<Record> {
        let written = self.written.lock().unwrap();
        assert_eq!(written.len(), 1, "expected exactly one sink write");
        written[0].clone()
    }
}

impl Sink for MockSink {
    fn write(&self, records: &[Record]) -> Result<(), AppError> {
        if let Some(error) = self.write_error.lock().unwrap().take() {
            return Err(error);
        }
        self.written.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}
