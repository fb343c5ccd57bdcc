use std::future::Future;

use crate::error::AppError;
use crate::proxy::ProxyEndpoint;
use crate::record::Record;

/// One external profile source (a site).
///
/// Implementers own their page-parsing rules; the core only sees candidate
/// records. Adapters are cloned into fetch workers, so implementations keep
/// shared state behind `Arc`.
pub trait SourceAdapter: Send + Sync + Clone {
    /// Stable identifier written into `Record::source` and looked up in the
    /// priority table.
    fn source_id(&self) -> &str;

    /// Expand the source's seed listings into profile URLs.
    fn list_pages(
        &self,
        proxy: &ProxyEndpoint,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Fetch and parse one profile page into a candidate record.
    ///
    /// A field missing from the page is not a failure; only inability to
    /// retrieve or recognize the page at all is.
    fn fetch_profile(
        &self,
        url: &str,
        proxy: &ProxyEndpoint,
    ) -> impl Future<Output = Result<Record, AppError>> + Send;
}

/// Destination for the final canonical record set.
pub trait Sink {
    fn write(&self, records: &[Record]) -> Result<(), AppError>;
}

/// A no-op Sink for runs that only want the in-memory result.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn write(&self, _records: &[Record]) -> Result<(), AppError> {
        Ok(())
    }
}
