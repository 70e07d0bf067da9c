//! Database locations.

use serde::{Deserialize, Serialize};

fn default_control_path() -> String {
    String::from(".vigil/control.db")
}

fn default_org_dir() -> String {
    String::from(".vigil/orgs")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Control-plane database file, or `":memory:"`.
    #[serde(default = "default_control_path")]
    pub control_path: String,

    /// Directory holding one database file per organization.
    #[serde(default = "default_org_dir")]
    pub org_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            control_path: default_control_path(),
            org_dir: default_org_dir(),
        }
    }
}
