//! Screening provider fake.
//!
//! Search results are registered per dataset and returned for any request
//! whose first dataset matches, going through the real response adapter so
//! whitelist filtering and partial detection behave as in production.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use serde_json::{Value, json};
use vigil_provider::types::parse_match_response;
use vigil_provider::{
    Algorithm, ByteStream, DeltaList, ProviderError, RawCatalog, ScreeningProvider, SearchRequest,
    SearchResponse,
};

use crate::lock;

/// Download chunk size; small so decoders see records split across chunks.
const CHUNK: usize = 7;

/// A provider search result for `entity_id` with `score`.
#[must_use]
pub fn candidate(entity_id: &str, score: f64) -> Value {
    json!({
        "id": entity_id,
        "schema": "Person",
        "score": score,
        "match": true,
        "caption": format!("Entity {entity_id}"),
        "properties": {"name": [format!("Entity {entity_id}")]},
    })
}

/// An exported org entity as returned when searching an org dataset,
/// linked back to `object_type`/`object_id` through its notes.
#[must_use]
pub fn org_entity(entity_id: &str, object_type: &str, object_id: &str, score: f64) -> Value {
    let notes = json!({"objectId": object_id, "objectType": object_type}).to_string();
    json!({
        "id": entity_id,
        "schema": "Person",
        "score": score,
        "match": true,
        "properties": {"notes": [notes]},
    })
}

#[derive(Default)]
struct State {
    configured: bool,
    self_hosted: bool,
    algorithms: Vec<Algorithm>,
    results: BTreeMap<String, Vec<Value>>,
    totals: BTreeMap<String, u64>,
    searches: Vec<SearchRequest>,
    catalog: RawCatalog,
    delta_lists: BTreeMap<String, DeltaList>,
    files: BTreeMap<String, Bytes>,
    failing_downloads: BTreeSet<String>,
    downloads: Vec<String>,
    enriched: BTreeMap<String, Value>,
    enrich_calls: Vec<String>,
}

/// Downloads whose body stream is still alive, and the most seen at once.
#[derive(Debug, Default)]
struct DownloadGauge {
    open: AtomicUsize,
    peak: AtomicUsize,
}

impl DownloadGauge {
    fn start(self: &Arc<Self>) -> OpenDownload {
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(open, Ordering::SeqCst);
        OpenDownload(Arc::clone(self))
    }
}

struct OpenDownload(Arc<DownloadGauge>);

impl Drop for OpenDownload {
    fn drop(&mut self) {
        self.0.open.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct FakeProvider {
    state: Mutex<State>,
    gauge: Arc<DownloadGauge>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProvider {
    /// Configured, hosted, offering `logic-v1`, matching nothing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                configured: true,
                algorithms: vec![Algorithm {
                    name: "logic-v1".into(),
                    description: None,
                }],
                ..State::default()
            }),
            gauge: Arc::default(),
        }
    }

    #[must_use]
    pub fn unconfigured() -> Self {
        let provider = Self::new();
        lock(&provider.state).configured = false;
        provider
    }

    #[must_use]
    pub fn self_hosted(self) -> Self {
        lock(&self.state).self_hosted = true;
        self
    }

    /// Results returned for searches against `dataset`.
    pub fn set_results(&self, dataset: &str, results: Vec<Value>) {
        lock(&self.state).results.insert(dataset.to_string(), results);
    }

    /// Report more results than returned, making searches partial.
    pub fn set_total(&self, dataset: &str, total: u64) {
        lock(&self.state).totals.insert(dataset.to_string(), total);
    }

    #[must_use]
    pub fn searches(&self) -> Vec<SearchRequest> {
        lock(&self.state).searches.clone()
    }

    pub fn set_catalog(&self, catalog: RawCatalog) {
        lock(&self.state).catalog = catalog;
    }

    pub fn set_delta_list(&self, url: &str, list: DeltaList) {
        lock(&self.state).delta_lists.insert(url.to_string(), list);
    }

    pub fn set_file(&self, url: &str, body: impl Into<Bytes>) {
        lock(&self.state).files.insert(url.to_string(), body.into());
    }

    /// Make the download of `url` fail halfway through.
    pub fn fail_download(&self, url: &str) {
        lock(&self.state).failing_downloads.insert(url.to_string());
    }

    #[must_use]
    pub fn downloads(&self) -> Vec<String> {
        lock(&self.state).downloads.clone()
    }

    /// Most downloads that had a body stream open at the same time.
    #[must_use]
    pub fn peak_downloads(&self) -> usize {
        self.gauge.peak.load(Ordering::SeqCst)
    }

    pub fn set_enriched(&self, entity_id: &str, payload: Value) {
        lock(&self.state).enriched.insert(entity_id.to_string(), payload);
    }

    #[must_use]
    pub fn enrich_calls(&self) -> Vec<String> {
        lock(&self.state).enrich_calls.clone()
    }
}

#[async_trait]
impl ScreeningProvider for FakeProvider {
    fn is_configured(&self) -> bool {
        lock(&self.state).configured
    }

    fn is_self_hosted(&self) -> bool {
        lock(&self.state).self_hosted
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ProviderError> {
        let mut state = lock(&self.state);
        if !state.configured {
            return Err(ProviderError::NotConfigured);
        }
        state.searches.push(request.clone());

        let dataset = request.config.datasets.first().cloned().unwrap_or_default();
        let results = state.results.get(&dataset).cloned().unwrap_or_default();
        let total = state
            .totals
            .get(&dataset)
            .copied()
            .unwrap_or(results.len() as u64);
        let raw = json!({
            "responses": {
                "q0": {"results": results, "total": {"value": total}}
            }
        });
        parse_match_response(raw, &request.whitelisted_entity_ids)
    }

    async fn algorithms(&self) -> Result<Vec<Algorithm>, ProviderError> {
        Ok(lock(&self.state).algorithms.clone())
    }

    async fn raw_catalog(&self) -> Result<RawCatalog, ProviderError> {
        Ok(lock(&self.state).catalog.clone())
    }

    async fn enrich_entity(&self, entity_id: &str) -> Result<Value, ProviderError> {
        let mut state = lock(&self.state);
        state.enrich_calls.push(entity_id.to_string());
        state
            .enriched
            .get(entity_id)
            .cloned()
            .ok_or_else(|| ProviderError::Api {
                status: 404,
                message: format!("entity {entity_id} not found"),
            })
    }

    async fn fetch_delta_list(&self, url: &str) -> Result<DeltaList, ProviderError> {
        lock(&self.state)
            .delta_lists
            .get(url)
            .cloned()
            .ok_or_else(|| ProviderError::Api {
                status: 404,
                message: format!("no delta list at {url}"),
            })
    }

    async fn download(&self, url: &str) -> Result<ByteStream, ProviderError> {
        let mut state = lock(&self.state);
        state.downloads.push(url.to_string());
        let body = state.files.get(url).cloned().ok_or_else(|| ProviderError::Api {
            status: 404,
            message: format!("no file at {url}"),
        })?;

        let mut chunks: Vec<Result<Bytes, ProviderError>> = (0..body.len())
            .step_by(CHUNK)
            .map(|start| Ok(body.slice(start..(start + CHUNK).min(body.len()))))
            .collect();
        if state.failing_downloads.contains(url) {
            chunks.truncate(chunks.len() / 2);
            chunks.push(Err(ProviderError::Api {
                status: 502,
                message: "connection reset".into(),
            }));
        }
        drop(state);

        // Counted until the body is dropped; every chunk yields so concurrent
        // transfers interleave.
        let open = self.gauge.start();
        let body = stream::iter(chunks).then(move |chunk| {
            let _open = &open;
            async move {
                tokio::task::yield_now().await;
                chunk
            }
        });
        Ok(Box::pin(body))
    }
}
