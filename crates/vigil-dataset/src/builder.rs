//! Dataset export: the first full snapshot of an organization, then deltas.
//!
//! Delta tracks are read page by page, keyed on entity id, below a
//! high-water mark captured when the build starts. Tracks written while a
//! build runs are picked up by the next one.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use object_store::buffered::BufWriter;
use serde_jsonlines::AsyncJsonLinesWriter;
use tokio::io::AsyncWriteExt;
use vigil_core::entities::{DataModel, DatasetFile, DeltaTrack, IngestedObject};
use vigil_core::enums::{DatasetFileType, DeltaOperation};
use vigil_core::errors::CoreError;
use vigil_core::mapping::{DataModelMapping, build_mapping};
use vigil_db::VigilDb;
use vigil_db::error::DatabaseError;
use vigil_db::repos::delta_tracks::PendingTrack;
use vigil_db::repos::{data_model, datasets, delta_tracks, ingested};

use crate::blob::BlobStore;
use crate::entity::{DeltaOp, DeltaRecord, FtmEntity, entity_from_object};
use crate::error::DatasetError;
use crate::paths;
use crate::version::generate_next_version;

type EntityWriter = AsyncJsonLinesWriter<BufWriter>;

/// Builds and records exported dataset files.
#[derive(Clone)]
pub struct DatasetBuilder {
    db: Arc<VigilDb>,
    store: BlobStore,
    page_size: u32,
}

impl DatasetBuilder {
    #[must_use]
    pub fn new(db: Arc<VigilDb>, store: BlobStore, page_size: u32) -> Self {
        Self {
            db,
            store,
            page_size: page_size.max(1),
        }
    }

    /// Build whatever comes next for `org_id`: a full snapshot if nothing was
    /// exported yet, a delta otherwise.
    ///
    /// Returns `None` when there is nothing to export.
    ///
    /// # Errors
    ///
    /// See [`Self::build_full`] and [`Self::build_delta`].
    pub async fn build_next(
        &self,
        org_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DatasetFile>, DatasetError> {
        let latest = {
            let conn = self.db.control().await;
            datasets::latest_file(&conn, org_id).await?
        };
        let version = generate_next_version(latest.as_ref().map(|f| f.version.as_str()), now);
        match latest {
            None => self.build_full(org_id, &version, now).await,
            Some(_) => self.build_delta(org_id, &version, now).await,
        }
    }

    /// Write the latest state of every tracked entity.
    ///
    /// Deleted entities are left out. Every track folded into the snapshot is
    /// marked exported.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::MissingObjects`] if a track points at an
    /// ingested row that no longer exists, or a storage/database error.
    pub async fn build_full(
        &self,
        org_id: &str,
        version: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DatasetFile>, DatasetError> {
        let high_water_mark = {
            let conn = self.db.org(org_id).await?;
            delta_tracks::high_water_mark(&conn).await?
        };
        if high_water_mark == 0 {
            tracing::debug!(org_id, "no delta tracks, skipping full dataset");
            return Ok(None);
        }

        let mut mappings = Mappings::load(&self.db, org_id).await?;
        let path = paths::full_dataset(org_id, version);
        let mut writer = AsyncJsonLinesWriter::new(self.store.writer(&path));

        let written = match self
            .write_full(org_id, high_water_mark, &mut mappings, &mut writer)
            .await
        {
            Ok(written) => written,
            Err(e) => {
                let _ = writer.into_inner().abort().await;
                return Err(e);
            }
        };
        finish(writer).await?;

        let file = self
            .record(org_id, DatasetFileType::Full, version, path, written, high_water_mark, now)
            .await?;
        Ok(Some(file))
    }

    /// Write the changes since the previous export as delta records.
    ///
    /// An entity exported before becomes `MOD` (or `DEL` when deleted); one
    /// never exported becomes `ADD`, and if it was also deleted since, it is
    /// not written at all.
    ///
    /// # Errors
    ///
    /// Same as [`Self::build_full`].
    pub async fn build_delta(
        &self,
        org_id: &str,
        version: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DatasetFile>, DatasetError> {
        let (pending, high_water_mark) = {
            let conn = self.db.org(org_id).await?;
            (
                delta_tracks::count_unexported(&conn).await?,
                delta_tracks::high_water_mark(&conn).await?,
            )
        };
        if pending == 0 {
            tracing::debug!(org_id, "no unexported delta tracks, skipping delta");
            return Ok(None);
        }

        let mut mappings = Mappings::load(&self.db, org_id).await?;
        let path = paths::delta_dataset(org_id, version);
        let mut writer = AsyncJsonLinesWriter::new(self.store.writer(&path));

        let written = match self
            .write_delta(org_id, high_water_mark, &mut mappings, &mut writer)
            .await
        {
            Ok(written) => written,
            Err(e) => {
                let _ = writer.into_inner().abort().await;
                return Err(e);
            }
        };
        finish(writer).await?;

        let file = self
            .record(org_id, DatasetFileType::Delta, version, path, written, high_water_mark, now)
            .await?;
        Ok(Some(file))
    }

    async fn write_full(
        &self,
        org_id: &str,
        up_to: i64,
        mappings: &mut Mappings,
        writer: &mut EntityWriter,
    ) -> Result<u64, DatasetError> {
        let mut after: Option<String> = None;
        let mut written = 0u64;
        loop {
            let (page, objects) = {
                let conn = self.db.org(org_id).await?;
                let page =
                    delta_tracks::page_latest(&conn, after.as_deref(), up_to, self.page_size).await?;
                let objects = fetch_objects(&conn, page.iter()).await?;
                (page, objects)
            };
            let Some(last) = page.last() else { break };
            after = Some(last.entity_id.clone());

            for track in &page {
                if track.operation == DeltaOperation::Delete {
                    continue;
                }
                let object = object_of(&objects, track)?;
                let mapping = mappings.get(&track.object_type)?;
                writer
                    .write(&entity_from_object(&track.entity_id, org_id, object, mapping))
                    .await?;
                written += 1;
            }
            if page.len() < self.page_size as usize {
                break;
            }
        }
        Ok(written)
    }

    async fn write_delta(
        &self,
        org_id: &str,
        up_to: i64,
        mappings: &mut Mappings,
        writer: &mut EntityWriter,
    ) -> Result<u64, DatasetError> {
        let mut after: Option<String> = None;
        let mut written = 0u64;
        loop {
            let (page, objects) = {
                let conn = self.db.org(org_id).await?;
                let page =
                    delta_tracks::page_unexported(&conn, after.as_deref(), up_to, self.page_size)
                        .await?;
                let objects = fetch_objects(&conn, page.iter().map(|p| &p.track)).await?;
                (page, objects)
            };
            let Some(last) = page.last() else { break };
            after = Some(last.track.entity_id.clone());

            for PendingTrack {
                track,
                previously_exported,
            } in &page
            {
                let record = match (track.operation, *previously_exported) {
                    (DeltaOperation::Delete, false) => continue,
                    (DeltaOperation::Delete, true) => {
                        let mapping = mappings.get(&track.object_type)?;
                        DeltaRecord {
                            op: DeltaOp::Del,
                            entity: FtmEntity::new(&track.entity_id, &mapping.entity_type, org_id),
                        }
                    }
                    (_, exported) => {
                        let object = object_of(&objects, track)?;
                        let mapping = mappings.get(&track.object_type)?;
                        DeltaRecord {
                            op: if exported { DeltaOp::Mod } else { DeltaOp::Add },
                            entity: entity_from_object(&track.entity_id, org_id, object, mapping),
                        }
                    }
                };
                writer.write(&record).await?;
                written += 1;
            }
            if page.len() < self.page_size as usize {
                break;
            }
        }
        Ok(written)
    }

    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        org_id: &str,
        file_type: DatasetFileType,
        version: &str,
        file_path: String,
        item_count: u64,
        up_to: i64,
        now: DateTime<Utc>,
    ) -> Result<DatasetFile, DatasetError> {
        let file = DatasetFile {
            id: vigil_core::new_id(),
            org_id: org_id.to_string(),
            file_type,
            version: version.to_string(),
            file_path,
            item_count,
            created_at: now,
        };
        // Org before control; the org transaction commits last.
        let org_tx = self.db.org_tx(org_id).await?;
        let marked = delta_tracks::mark_exported(&org_tx, &file.id, up_to).await?;
        let control_tx = self.db.control_tx().await?;
        datasets::insert_file(&control_tx, &file).await?;
        control_tx.commit().await?;
        org_tx.commit().await?;
        tracing::info!(
            org_id,
            version,
            file_type = %file_type,
            items = item_count,
            tracks = marked,
            "dataset file written"
        );
        Ok(file)
    }
}

async fn finish(mut writer: EntityWriter) -> Result<(), DatasetError> {
    writer.flush().await?;
    writer.into_inner().shutdown().await?;
    Ok(())
}

/// Per-table mappings of one organization, built on first use.
struct Mappings {
    model: DataModel,
    built: HashMap<String, DataModelMapping>,
}

impl Mappings {
    async fn load(db: &VigilDb, org_id: &str) -> Result<Self, DatasetError> {
        let conn = db.control().await;
        Ok(Self {
            model: data_model::get_data_model(&conn, org_id).await?,
            built: HashMap::new(),
        })
    }

    fn get(&mut self, object_type: &str) -> Result<&DataModelMapping, DatasetError> {
        if !self.built.contains_key(object_type) {
            let table = self
                .model
                .table(object_type)
                .ok_or_else(|| CoreError::not_found("table", object_type))?;
            self.built.insert(object_type.to_string(), build_mapping(table)?);
        }
        self.built
            .get(object_type)
            .ok_or_else(|| CoreError::not_found("table", object_type).into())
    }
}

/// Batch-fetch the ingested rows referenced by non-delete tracks, one query
/// per object type, keyed by internal id.
async fn fetch_objects<'a>(
    conn: &libsql::Connection,
    tracks: impl Iterator<Item = &'a DeltaTrack>,
) -> Result<HashMap<String, IngestedObject>, DatasetError> {
    let mut wanted: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for track in tracks.filter(|t| t.operation != DeltaOperation::Delete) {
        let internal_id = track.object_internal_id.clone().ok_or_else(|| {
            DatabaseError::InvalidState(format!("delta track {} has no ingested row", track.id))
        })?;
        wanted.entry(&track.object_type).or_default().insert(internal_id);
    }

    let mut objects = HashMap::new();
    for (object_type, ids) in wanted {
        let ids: Vec<String> = ids.into_iter().collect();
        let rows = ingested::get_by_internal_ids(conn, object_type, &ids).await?;
        if rows.len() != ids.len() {
            return Err(DatasetError::MissingObjects {
                object_type: object_type.to_string(),
                expected: ids.len(),
                found: rows.len(),
            });
        }
        objects.extend(rows.into_iter().map(|o| (o.internal_id.clone(), o)));
    }
    Ok(objects)
}

fn object_of<'a>(
    objects: &'a HashMap<String, IngestedObject>,
    track: &DeltaTrack,
) -> Result<&'a IngestedObject, DatasetError> {
    track
        .object_internal_id
        .as_deref()
        .and_then(|id| objects.get(id))
        .ok_or_else(|| {
            CoreError::not_found("ingested object", track.object_internal_id.clone().unwrap_or_default())
                .into()
        })
}
