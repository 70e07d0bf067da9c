//! Blob storage configuration.

use serde::{Deserialize, Serialize};

fn default_root() -> String {
    String::from(".vigil/blobs")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Local directory backing the blob store.
    #[serde(default = "default_root")]
    pub root: String,

    /// Base URL under which exported files are served to the indexer.
    #[serde(default)]
    pub public_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            public_url: String::new(),
        }
    }
}

impl StorageConfig {
    /// Public URL of a blob path.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.public_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_for_joins_without_double_slash() {
        let config = StorageConfig {
            public_url: "https://files.example.com/".into(),
            ..Default::default()
        };
        assert_eq!(
            config.url_for("/datasets/org/full.json"),
            "https://files.example.com/datasets/org/full.json"
        );
    }
}
