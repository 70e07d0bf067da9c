//! # vigil-provider
//!
//! Client for the external screening provider (an OpenSanctions `yente`
//! instance or the hosted API).
//!
//! The provider's matching algorithm is a black box: Vigil sends FTM queries
//! and receives ranked candidates. The same provider also publishes the
//! watchlist catalog, the delta lists, and the delta files that drive
//! dataset-triggered rescreening.

mod client;
mod error;
mod response;
pub mod types;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

pub use client::HttpScreeningProvider;
pub use error::ProviderError;
pub use types::{
    Algorithm, CatalogDataset, DeltaList, EntityQuery, MatchCandidate, OrgConfig, QueryConfig,
    RawCatalog, SearchRequest, SearchResponse, merge_enriched,
};

/// A stream of raw body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ProviderError>> + Send>>;

/// Everything Vigil asks of the screening provider.
#[async_trait]
pub trait ScreeningProvider: Send + Sync {
    /// A provider URL is configured.
    fn is_configured(&self) -> bool;

    /// The provider is a self-hosted instance; only those are asked for
    /// enrichment.
    fn is_self_hosted(&self) -> bool;

    /// Run a screening query.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ProviderError>;

    /// Matching algorithms the provider offers.
    async fn algorithms(&self) -> Result<Vec<Algorithm>, ProviderError>;

    /// The watchlist catalog.
    async fn raw_catalog(&self) -> Result<RawCatalog, ProviderError>;

    /// Full payload of one watchlist entity.
    async fn enrich_entity(&self, entity_id: &str) -> Result<serde_json::Value, ProviderError>;

    /// Fetch a delta-list document.
    async fn fetch_delta_list(&self, url: &str) -> Result<DeltaList, ProviderError>;

    /// Open a streaming download of a delta file.
    async fn download(&self, url: &str) -> Result<ByteStream, ProviderError>;
}
