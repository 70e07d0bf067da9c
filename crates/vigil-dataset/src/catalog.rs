//! Catalog served to the external indexer: one dataset per organization.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vigil_config::{GeneralConfig, StorageConfig};
use vigil_core::enums::DatasetFileType;
use vigil_db::VigilDb;
use vigil_db::repos::datasets;

use crate::blob::BlobStore;
use crate::error::DatasetError;
use crate::paths;

/// One organization dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub title: String,
    pub version: String,
    pub entities_url: String,
    pub delta_url: String,
    pub tags: Vec<String>,
}

/// The whole catalog document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub current: Vec<String>,
    pub outdated: Vec<String>,
    pub datasets: Vec<CatalogEntry>,
}

/// Delta-list document published per organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaVersions {
    pub versions: BTreeMap<String, String>,
}

pub struct ExportedCatalog {
    db: Arc<VigilDb>,
    storage: StorageConfig,
    general: GeneralConfig,
    max_deltas: u32,
}

impl ExportedCatalog {
    #[must_use]
    pub const fn new(
        db: Arc<VigilDb>,
        storage: StorageConfig,
        general: GeneralConfig,
        max_deltas: u32,
    ) -> Self {
        Self {
            db,
            storage,
            general,
            max_deltas,
        }
    }

    /// Catalog of every organization that exported a full snapshot.
    ///
    /// # Errors
    ///
    /// Returns a database error if the lookup fails.
    pub async fn document(&self) -> Result<CatalogDocument, DatasetError> {
        let org_ids = {
            let conn = self.db.control().await;
            datasets::list_exporting_org_ids(&conn).await?
        };
        let entries = self.for_orgs(&org_ids).await?;
        Ok(CatalogDocument {
            current: entries.iter().map(|e| e.name.clone()).collect(),
            outdated: Vec::new(),
            datasets: entries,
        })
    }

    /// Entries for the given organizations, skipping those without a full
    /// snapshot.
    ///
    /// The version is that of the latest file of any type, so the indexer
    /// notices new deltas. Every entry is tagged internal, which keeps the
    /// dataset scan from treating our own exports as watchlists.
    ///
    /// # Errors
    ///
    /// Returns a database error if a lookup fails.
    pub async fn for_orgs(&self, org_ids: &[String]) -> Result<Vec<CatalogEntry>, DatasetError> {
        let conn = self.db.control().await;
        let mut entries = Vec::with_capacity(org_ids.len());
        for org_id in org_ids {
            let Some(full) =
                datasets::latest_file_of_type(&conn, org_id, DatasetFileType::Full).await?
            else {
                continue;
            };
            let version = datasets::latest_file(&conn, org_id)
                .await?
                .map_or(full.version.clone(), |f| f.version);
            let name = self.general.org_dataset_name(org_id);
            entries.push(CatalogEntry {
                title: format!("Monitored objects of {org_id}"),
                name,
                version,
                entities_url: self.storage.url_for(&full.file_path),
                delta_url: self.storage.url_for(&paths::delta_list(org_id)),
                tags: vec![format!("{}.marble", self.general.internal_tag_prefix)],
            });
        }
        Ok(entries)
    }

    /// Most recent deltas of an organization as `version → URL`.
    ///
    /// # Errors
    ///
    /// Returns a database error if the lookup fails.
    pub async fn delta_list(&self, org_id: &str) -> Result<DeltaVersions, DatasetError> {
        let conn = self.db.control().await;
        let files = datasets::list_recent_deltas(&conn, org_id, self.max_deltas).await?;
        Ok(DeltaVersions {
            versions: files
                .into_iter()
                .map(|f| (f.version, self.storage.url_for(&f.file_path)))
                .collect(),
        })
    }

    /// Write the delta-list document next to the org's files.
    ///
    /// # Errors
    ///
    /// Returns a database, JSON, or store error.
    pub async fn publish_delta_list(
        &self,
        store: &BlobStore,
        org_id: &str,
    ) -> Result<DeltaVersions, DatasetError> {
        let versions = self.delta_list(org_id).await?;
        store
            .put(&paths::delta_list(org_id), serde_json::to_vec(&versions)?)
            .await?;
        tracing::debug!(org_id, deltas = versions.versions.len(), "published delta list");
        Ok(versions)
    }
}
