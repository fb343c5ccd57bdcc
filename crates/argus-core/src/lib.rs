pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod pipeline;
pub mod proxy;
pub mod reconcile;
pub mod record;
pub mod testutil;
pub mod traits;

pub use error::AppError;
pub use orchestrator::{FetchConfig, FetchOrchestrator};
pub use pipeline::{Pipeline, PipelineReport};
pub use proxy::{ProxyEndpoint, ProxyRotator};
pub use reconcile::{ReconcileConfig, reconcile};
pub use record::{CampaignStatus, FieldKey, NOT_AVAILABLE, Record};
pub use traits::{Sink, SourceAdapter};
