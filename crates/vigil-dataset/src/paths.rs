//! Blob paths of exported and downloaded files.

#[must_use]
pub fn full_dataset(org_id: &str, version: &str) -> String {
    format!("datasets/{org_id}/full/{version}.jsonl")
}

#[must_use]
pub fn delta_dataset(org_id: &str, version: &str) -> String {
    format!("datasets/{org_id}/delta/{version}.jsonl")
}

/// The published `{"versions": {...}}` document of an org.
#[must_use]
pub fn delta_list(org_id: &str) -> String {
    format!("datasets/{org_id}/deltas.json")
}

/// A downloaded watchlist delta file.
#[must_use]
pub fn watchlist_update(dataset: &str, version: &str) -> String {
    format!("updates/{dataset}/{version}.jsonl")
}
