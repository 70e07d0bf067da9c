//! General application configuration.

use serde::{Deserialize, Serialize};

fn default_dataset_prefix() -> String {
    String::from("marble_")
}

fn default_internal_tag_prefix() -> String {
    String::from("internal")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Prefix of exported organization dataset names.
    #[serde(default = "default_dataset_prefix")]
    pub dataset_prefix: String,

    /// Provider catalog datasets carrying a tag with this prefix are ignored.
    #[serde(default = "default_internal_tag_prefix")]
    pub internal_tag_prefix: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            dataset_prefix: default_dataset_prefix(),
            internal_tag_prefix: default_internal_tag_prefix(),
        }
    }
}

impl GeneralConfig {
    /// Name of the exported dataset of `org_id`.
    #[must_use]
    pub fn org_dataset_name(&self, org_id: &str) -> String {
        format!("{}{}", self.dataset_prefix, org_id.replace('-', "_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_dataset_name_is_prefixed() {
        let config = GeneralConfig::default();
        assert_eq!(config.org_dataset_name("a-b"), "marble_a_b");
    }
}
