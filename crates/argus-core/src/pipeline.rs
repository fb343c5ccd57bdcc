use std::sync::Arc;

use chrono::Utc;

use crate::error::AppError;
use crate::normalize::normalize_record;
use crate::orchestrator::{FetchConfig, FetchOrchestrator};
use crate::proxy::ProxyRotator;
use crate::reconcile::{ReconcileConfig, reconcile};
use crate::record::Record;
use crate::traits::{Sink, SourceAdapter};

/// Summary of one completed pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    /// Records fetched across all sources, before reconciliation.
    pub fetched: usize,
    /// Canonical records handed to the sink.
    pub written: usize,
}

/// Sequences the whole run: fetch per source → normalize → reconcile → sink.
///
/// Each `collect` call runs one source's bounded fetch phase and appends to
/// the in-memory pool; `finish` consumes the driver. Reconciliation is
/// single-threaded by design — records are owned exclusively by their fetch
/// task until they land in the pool.
pub struct Pipeline<S: Sink> {
    fetch: FetchConfig,
    reconcile: ReconcileConfig,
    rotator: Arc<ProxyRotator>,
    sink: S,
    pool: Vec<Record>,
}

impl<S: Sink> Pipeline<S> {
    pub fn new(
        fetch: FetchConfig,
        reconcile: ReconcileConfig,
        rotator: Arc<ProxyRotator>,
        sink: S,
    ) -> Self {
        Self {
            fetch,
            reconcile,
            rotator,
            sink,
            pool: Vec::new(),
        }
    }

    /// Fetch one source's profiles into the pool with the run-wide fetch
    /// settings. Returns how many records the source yielded.
    pub async fn collect<A: SourceAdapter + 'static>(
        &mut self,
        adapter: A,
    ) -> Result<usize, AppError> {
        let fetch = self.fetch.clone();
        self.collect_with(adapter, fetch).await
    }

    /// Like [`collect`](Self::collect), but with a per-source pool sizing.
    pub async fn collect_with<A: SourceAdapter + 'static>(
        &mut self,
        adapter: A,
        fetch: FetchConfig,
    ) -> Result<usize, AppError> {
        let source = adapter.source_id().to_string();
        let orchestrator = FetchOrchestrator::new(adapter, Arc::clone(&self.rotator), fetch)?;
        let mut records = orchestrator.run().await;
        let count = records.len();
        tracing::info!(source, records = count, "Source collected");
        self.pool.append(&mut records);
        Ok(count)
    }

    /// Normalize, reconcile, and hand the canonical set to the sink.
    pub fn finish(mut self) -> Result<PipelineReport, AppError> {
        let today = Utc::now().date_naive();
        for record in &mut self.pool {
            normalize_record(record, today, &self.reconcile.sentinel);
        }

        let fetched = self.pool.len();
        let canonical = reconcile(std::mem::take(&mut self.pool), &self.reconcile);
        self.sink.write(&canonical)?;

        tracing::info!(fetched, written = canonical.len(), "Pipeline complete");
        Ok(PipelineReport {
            fetched,
            written: canonical.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::record::FieldKey;
    use crate::testutil::{MockAdapter, MockSink, make_profile, test_rotator};

    fn fast_fetch() -> FetchConfig {
        FetchConfig {
            max_workers: 4,
            max_retries: 1,
            retry_delay: Duration::from_millis(1),
        }
    }

    fn loose_reconcile(ranks: &[(&str, u32)]) -> ReconcileConfig {
        ReconcileConfig {
            equality_keys: vec![FieldKey::Name, FieldKey::Ticker],
            priority_table: ranks.iter().map(|(s, r)| (s.to_string(), *r)).collect(),
            validity_threshold: 0,
            ..ReconcileConfig::default()
        }
    }

    #[tokio::test]
    async fn two_sources_merge_into_one_canonical_record() {
        let url_a = "https://a.test/p/foo";
        let url_b = "https://b.test/p/foo";

        let mut profile_b = make_profile("b", "Foo", "FOO");
        profile_b.set(FieldKey::Raised, "5M");

        let adapter_a = MockAdapter::new("a")
            .with_listing(vec![url_a])
            .profile_sequence(url_a, vec![Ok(make_profile("a", "Foo", "FOO"))]);
        let adapter_b = MockAdapter::new("b")
            .with_listing(vec![url_b])
            .profile_sequence(url_b, vec![Ok(profile_b)]);

        let sink = MockSink::new();
        let mut pipeline = Pipeline::new(
            fast_fetch(),
            loose_reconcile(&[("b", 0), ("a", 1)]),
            test_rotator(3),
            sink.clone(),
        );

        assert_eq!(pipeline.collect(adapter_a).await.unwrap(), 1);
        assert_eq!(pipeline.collect(adapter_b).await.unwrap(), 1);
        let report = pipeline.finish().unwrap();

        assert_eq!(report, PipelineReport { fetched: 2, written: 1 });
        let written = sink.single_write();
        assert_eq!(written[0].get(FieldKey::Raised), "5M");
    }

    #[tokio::test]
    async fn finish_normalizes_before_reconciling() {
        let url = "https://a.test/p/foo";
        let mut profile = make_profile("a", "Foo", "FOO");
        profile.set(FieldKey::SaleStart, "March 24, 2018");
        profile.set(FieldKey::Country, "United Kingdom");

        let adapter = MockAdapter::new("a")
            .with_listing(vec![url])
            .profile_sequence(url, vec![Ok(profile)]);

        let sink = MockSink::new();
        let mut pipeline = Pipeline::new(
            fast_fetch(),
            loose_reconcile(&[]),
            test_rotator(3),
            sink.clone(),
        );
        pipeline.collect(adapter).await.unwrap();
        pipeline.finish().unwrap();

        let written = sink.single_write();
        assert_eq!(written[0].get(FieldKey::SaleStart), "24-03-2018");
        assert_eq!(written[0].get(FieldKey::Country), "GBR");
    }

    #[tokio::test]
    async fn sink_failure_propagates() {
        let sink = MockSink::with_write_error(AppError::Sink("disk full".into()));
        let pipeline = Pipeline::new(
            fast_fetch(),
            loose_reconcile(&[]),
            test_rotator(1),
            sink,
        );

        let err = pipeline.finish().unwrap_err();
        assert!(matches!(err, AppError::Sink(_)));
    }
}
