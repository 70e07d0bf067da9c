//! Provider request and response types, and the adapters that turn raw
//! provider JSON into them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vigil_core::mapping::ScreeningFilters;

use crate::error::ProviderError;

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Threshold and limit taken from the screening config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgConfig {
    /// 0 to 100.
    pub match_threshold: u32,
    pub match_limit: u32,
}

/// Provider-side selection: which datasets, which algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub datasets: Vec<String>,
    pub algorithm: String,
}

/// One entity to match: an FTM schema and its property filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityQuery {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub filters: ScreeningFilters,
}

/// A full screening query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub org_config: OrgConfig,
    pub config: QueryConfig,
    pub queries: Vec<EntityQuery>,
    /// Entities to drop from the results.
    pub whitelisted_entity_ids: Vec<String>,
}

impl SearchRequest {
    /// The request body sent to the `/match` endpoint.
    #[must_use]
    pub fn match_body(&self) -> Value {
        let queries: serde_json::Map<String, Value> = self
            .queries
            .iter()
            .enumerate()
            .map(|(i, q)| {
                (
                    format!("q{i}"),
                    serde_json::json!({
                        "schema": q.entity_type,
                        "properties": q.filters,
                    }),
                )
            })
            .collect();
        serde_json::json!({ "queries": queries })
    }

    /// Query string of the `/match` endpoint.
    #[must_use]
    pub fn match_query_string(&self) -> String {
        let mut params = vec![
            format!("algorithm={}", urlencoding::encode(&self.config.algorithm)),
            format!(
                "threshold={}",
                f64::from(self.org_config.match_threshold) / 100.0
            ),
            format!("limit={}", self.org_config.match_limit),
        ];
        params.extend(
            self.config
                .datasets
                .iter()
                .map(|d| format!("include_dataset={}", urlencoding::encode(d))),
        );
        params.extend(
            self.whitelisted_entity_ids
                .iter()
                .map(|id| format!("exclude_entity_ids={}", urlencoding::encode(id))),
        );
        params.join("&")
    }
}

/// A single ranked candidate returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub entity_id: String,
    pub score: f64,
    /// The full provider entity as returned.
    pub payload: Value,
}

/// Adapted search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub matches: Vec<MatchCandidate>,
    /// More candidates existed than were returned.
    pub is_partial: bool,
    /// The raw provider body, kept for auditing.
    pub raw: Value,
}

#[derive(Deserialize)]
struct RawMatchResponse {
    #[serde(default)]
    responses: BTreeMap<String, RawQueryResponse>,
}

#[derive(Deserialize)]
struct RawQueryResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    total: Option<RawTotal>,
}

#[derive(Deserialize)]
struct RawTotal {
    value: u64,
}

/// Adapt a raw `/match` body.
///
/// Results flagged `"match": false` are dropped, as are whitelisted entities
/// (the provider should already have excluded them). Candidates are ordered
/// by descending score, entity id breaking ties.
///
/// # Errors
///
/// Returns [`ProviderError::Parse`] if the body does not have the expected
/// shape or a result has no id.
pub fn parse_match_response(raw: Value, whitelisted: &[String]) -> Result<SearchResponse, ProviderError> {
    let parsed: RawMatchResponse = serde_json::from_value(raw.clone())
        .map_err(|e| ProviderError::Parse(format!("match response: {e}")))?;
    let whitelisted: BTreeSet<&str> = whitelisted.iter().map(String::as_str).collect();

    let mut matches = Vec::new();
    let mut is_partial = false;
    let mut removed = 0_usize;
    let mut seen = BTreeSet::new();

    for (query, response) in parsed.responses {
        let returned = response.results.len() as u64;
        if response.total.is_some_and(|t| t.value > returned) {
            is_partial = true;
        }
        for result in response.results {
            if result.get("match").and_then(Value::as_bool) == Some(false) {
                continue;
            }
            let entity_id = result
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| ProviderError::Parse(format!("result without id in {query}")))?
                .to_string();
            if whitelisted.contains(entity_id.as_str()) {
                removed += 1;
                continue;
            }
            if !seen.insert(entity_id.clone()) {
                continue;
            }
            let score = result.get("score").and_then(Value::as_f64).unwrap_or_default();
            matches.push(MatchCandidate {
                entity_id,
                score,
                payload: result,
            });
        }
    }

    if removed > 0 {
        tracing::warn!(removed, "provider returned whitelisted entities, removed from results");
    }

    matches.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });

    Ok(SearchResponse {
        matches,
        is_partial,
        raw,
    })
}

// ---------------------------------------------------------------------------
// Algorithms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Algorithm {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct AlgorithmsResponse {
    pub algorithms: Vec<Algorithm>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// One dataset of the provider catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDataset {
    pub name: String,
    pub version: String,
    /// URL of the delta-list document, absent when the dataset has no deltas.
    #[serde(default)]
    pub delta_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The provider catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCatalog {
    #[serde(default)]
    pub current: Vec<String>,
    #[serde(default)]
    pub outdated: Vec<String>,
    #[serde(default)]
    pub datasets: BTreeMap<String, CatalogDataset>,
}

impl RawCatalog {
    /// Datasets without any tag starting with `internal_prefix`.
    pub fn public_datasets<'a>(
        &'a self,
        internal_prefix: &'a str,
    ) -> impl Iterator<Item = &'a CatalogDataset> + 'a {
        self.datasets
            .values()
            .filter(move |d| !d.tags.iter().any(|t| t.starts_with(internal_prefix)))
    }
}

#[derive(Deserialize)]
struct WireCatalog {
    #[serde(default)]
    current: Vec<String>,
    #[serde(default)]
    outdated: Vec<String>,
    #[serde(default)]
    datasets: Vec<CatalogDataset>,
}

/// Adapt a raw `/catalog` body (datasets as a list) into a name-keyed catalog.
///
/// # Errors
///
/// Returns [`ProviderError::Parse`] if the body has an unexpected shape.
pub fn parse_catalog(raw: Value) -> Result<RawCatalog, ProviderError> {
    let wire: WireCatalog =
        serde_json::from_value(raw).map_err(|e| ProviderError::Parse(format!("catalog: {e}")))?;
    Ok(RawCatalog {
        current: wire.current,
        outdated: wire.outdated,
        datasets: wire
            .datasets
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect(),
    })
}

/// The delta-list document: version → file URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaList {
    pub versions: BTreeMap<String, String>,
}

impl DeltaList {
    /// Versions in `(after, up_to]`, ascending.
    #[must_use]
    pub fn between(&self, after: &str, up_to: &str) -> Vec<(String, String)> {
        self.versions
            .iter()
            .filter(|(v, _)| v.as_str() > after && v.as_str() <= up_to)
            .map(|(v, url)| (v.clone(), url.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// Layer an enriched payload over the original one.
///
/// Objects merge key by key, recursively; anything else is replaced by the
/// enriched value. Keys missing from the enrichment are kept.
#[must_use]
pub fn merge_enriched(original: &Value, enriched: &Value) -> Value {
    match (original, enriched) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let next = merged
                    .get(key)
                    .map_or_else(|| value.clone(), |current| merge_enriched(current, value));
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn request() -> SearchRequest {
        SearchRequest {
            org_config: OrgConfig {
                match_threshold: 70,
                match_limit: 5,
            },
            config: QueryConfig {
                datasets: vec!["sanctions".into(), "peps".into()],
                algorithm: "logic-v1".into(),
            },
            queries: vec![EntityQuery {
                entity_type: "Company".into(),
                filters: ScreeningFilters::from([("name".into(), vec!["Acme Corp".into()])]),
            }],
            whitelisted_entity_ids: vec!["NK-1".into()],
        }
    }

    #[test]
    fn match_body_names_queries() {
        assert_eq!(
            request().match_body(),
            json!({"queries": {"q0": {"schema": "Company", "properties": {"name": ["Acme Corp"]}}}})
        );
    }

    #[test]
    fn match_query_string_carries_selection() {
        assert_eq!(
            request().match_query_string(),
            "algorithm=logic-v1&threshold=0.7&limit=5&include_dataset=sanctions&include_dataset=peps&exclude_entity_ids=NK-1"
        );
    }

    #[test]
    fn parse_match_response_orders_and_filters() {
        let raw = json!({
            "responses": {
                "q0": {
                    "status": 200,
                    "results": [
                        {"id": "NK-2", "score": 0.8, "match": true},
                        {"id": "NK-1", "score": 0.95, "match": true},
                        {"id": "NK-3", "score": 0.9, "match": true},
                        {"id": "NK-4", "score": 0.4, "match": false}
                    ],
                    "total": {"value": 4, "relation": "eq"}
                }
            }
        });
        let response = parse_match_response(raw, &["NK-1".into()]).unwrap();
        let ids: Vec<_> = response.matches.iter().map(|m| m.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["NK-3", "NK-2"]);
        assert!(!response.is_partial);
    }

    #[test]
    fn parse_match_response_detects_partial() {
        let raw = json!({
            "responses": {"q0": {"results": [{"id": "NK-1", "score": 0.9}], "total": {"value": 12}}}
        });
        let response = parse_match_response(raw, &[]).unwrap();
        assert!(response.is_partial);
        assert_eq!(response.matches.len(), 1);
    }

    #[test]
    fn parse_match_response_rejects_results_without_id() {
        let raw = json!({"responses": {"q0": {"results": [{"score": 0.9}]}}});
        assert!(parse_match_response(raw, &[]).is_err());
    }

    #[test]
    fn catalog_keeps_public_datasets() {
        let raw = json!({
            "current": ["sanctions"],
            "outdated": [],
            "datasets": [
                {"name": "sanctions", "version": "20260101", "delta_url": "https://x/delta.json", "tags": ["list.sanction"]},
                {"name": "marble_org1", "version": "20260101", "tags": ["internal.org"]}
            ]
        });
        let catalog = parse_catalog(raw).unwrap();
        let public: Vec<_> = catalog.public_datasets("internal").map(|d| d.name.as_str()).collect();
        assert_eq!(public, vec!["sanctions"]);
    }

    #[test]
    fn delta_list_window_is_half_open() {
        let list = DeltaList {
            versions: BTreeMap::from([
                ("v1".to_string(), "u1".to_string()),
                ("v2".to_string(), "u2".to_string()),
                ("v3".to_string(), "u3".to_string()),
                ("v4".to_string(), "u4".to_string()),
            ]),
        };
        let picked: Vec<_> = list.between("v1", "v3").into_iter().map(|(v, _)| v).collect();
        assert_eq!(picked, vec!["v2", "v3"]);
    }

    #[test]
    fn enrichment_layers_over_original() {
        let original = json!({
            "id": "NK-1",
            "score": 0.9,
            "properties": {"name": ["Acme"], "country": ["us"]}
        });
        let enriched = json!({
            "id": "NK-1",
            "properties": {"name": ["Acme Corp"], "sanctions": [{"id": "s1"}]}
        });
        assert_eq!(
            merge_enriched(&original, &enriched),
            json!({
                "id": "NK-1",
                "score": 0.9,
                "properties": {"name": ["Acme Corp"], "country": ["us"], "sanctions": [{"id": "s1"}]}
            })
        );
    }
}
