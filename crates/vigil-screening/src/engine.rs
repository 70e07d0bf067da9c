//! Monitoring registration and screening execution.

use chrono::{DateTime, Utc};
use serde_json::Value;
use vigil_core::entities::{
    Case, ContinuousScreening, ContinuousScreeningWithMatches, DeltaTrack, IngestedObject,
    MonitoredObject, NewCase, ScreeningConfig, ScreeningMatch,
};
use vigil_core::enums::{DeltaOperation, MatchStatus, ScreeningStatus, TriggerType};
use vigil_core::errors::CoreError;
use vigil_core::mapping::{
    DataModelMapping, build_mapping, case_name_from_ingested_object, prepare_screening_filters,
};
use vigil_core::ports::Credentials;
use vigil_core::counterparty_identifier;
use vigil_db::repos::{delta_tracks, ingested, monitored, screenings, whitelist};
use vigil_provider::{EntityQuery, OrgConfig, QueryConfig, SearchRequest, SearchResponse};

use crate::ScreeningService;
use crate::error::{ScreeningError, bad_parameter, not_found};

/// How the object to monitor is designated.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectSource {
    /// An object already ingested.
    ObjectId(String),
    /// A raw ingestion payload, ingested first.
    Payload(Value),
}

/// Everything needed to screen one object version under one config.
#[derive(Debug, Clone, Copy)]
pub struct ScreeningTarget<'a> {
    pub config: &'a ScreeningConfig,
    pub object: &'a IngestedObject,
    pub mapping: &'a DataModelMapping,
}

impl ScreeningService {
    /// Start monitoring an object under a config and screen it.
    ///
    /// Returns the screening, or `None` when `skip_screen` is set. The
    /// object is recorded for dataset export either way. A screening with
    /// matches gets an enrichment job once it is committed.
    ///
    /// # Errors
    ///
    /// - `NotFound`: unknown config, table, or ingested object
    /// - `BadParameter`: object type not covered by the config, or a payload
    ///   without `object_id`
    /// - `Conflict`: a stale payload, or an object id already monitored
    /// - [`ScreeningError::CaseCreation`]: the screening was saved but its
    ///   case could not be opened
    pub async fn create_continuous_screening_object(
        &self,
        creds: &Credentials,
        object_type: &str,
        config_stable_id: &str,
        source: ObjectSource,
        skip_screen: bool,
    ) -> Result<Option<ContinuousScreeningWithMatches>, ScreeningError> {
        let config = self.load_config_for(creds, config_stable_id).await?;
        self.access().check_feature(creds)?;
        self.access().can_write_monitoring(creds, &config.org_id)?;

        if !config.covers(object_type) {
            return Err(bad_parameter(format!(
                "object type {object_type} is not covered by config {config_stable_id}"
            )));
        }

        let (object_id, from_payload) = match source {
            ObjectSource::ObjectId(id) => (id, false),
            ObjectSource::Payload(payload) => {
                let ingested = self
                    .collaborators
                    .ingester
                    .ingest_object(&config.org_id, object_type, &payload)
                    .await?;
                if ingested == 0 {
                    return Err(CoreError::Conflict(
                        "no object ingested: the payload is not newer than the stored version"
                            .into(),
                    )
                    .into());
                }
                let id = payload
                    .get("object_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| bad_parameter("payload is missing object_id"))?;
                (id.to_string(), true)
            }
        };

        let mapping = self.mapping_for(&config.org_id, object_type).await?;
        let object = self
            .current_object(&config.org_id, object_type, &object_id)
            .await?;
        let target = ScreeningTarget {
            config: &config,
            object: &object,
            mapping: &mapping,
        };

        let search = if skip_screen {
            None
        } else {
            Some(self.search_object(target).await?)
        };

        let now = Utc::now();
        let org_tx = self.db.org_tx(&config.org_id).await?;
        let monitoring = MonitoredObject {
            id: vigil_core::new_id(),
            object_type: object_type.to_string(),
            object_id: object_id.clone(),
            config_stable_id: config.stable_id.clone(),
            created_at: now,
        };
        match monitored::insert(&org_tx, &monitoring).await {
            Ok(()) => {}
            Err(e) if e.is_unique_violation() && from_payload => {
                tracing::debug!(object_type, object_id, "object already monitored, rescreening update");
            }
            Err(e) if e.is_unique_violation() => {
                return Err(CoreError::Conflict(format!(
                    "{object_type} {object_id} is already monitored by config {config_stable_id}"
                ))
                .into());
            }
            Err(e) => return Err(e.into()),
        }
        record_delta_track(&org_tx, &object, now).await?;

        let mut screening = None;
        if let Some((request, response)) = search {
            let built = build_object_screening(target, TriggerType::ObjectAdded, &request, response, now);
            self.save_screening(&built).await?;
            screening = Some(built);
        }
        org_tx.commit().await?;

        let Some(mut screening) = screening else {
            return Ok(None);
        };
        tracing::info!(
            org_id = %config.org_id,
            screening_id = %screening.screening.id,
            matches = screening.matches.len(),
            status = %screening.screening.status,
            "object screened"
        );
        if !screening.matches.is_empty() {
            // The screening is committed; a lost enrichment job is only logged.
            if let Err(e) = self
                .collaborators
                .enrichment
                .schedule_enrichment(&screening.screening.id)
                .await
            {
                tracing::warn!(
                    screening_id = %screening.screening.id,
                    error = %e,
                    "failed to schedule match enrichment"
                );
            }
        }
        if screening.screening.status == ScreeningStatus::InReview {
            self.open_case(target, &mut screening).await?;
        }
        Ok(Some(screening))
    }

    /// Stop monitoring an object under a config.
    ///
    /// When no other config monitors the object any more, a `Delete` delta
    /// track removes it from the exported dataset.
    ///
    /// # Errors
    ///
    /// `NotFound` if the config or the monitoring row does not exist.
    pub async fn delete_continuous_screening_object(
        &self,
        creds: &Credentials,
        object_type: &str,
        object_id: &str,
        config_stable_id: &str,
    ) -> Result<(), ScreeningError> {
        let config = self.load_config_for(creds, config_stable_id).await?;
        self.access().check_feature(creds)?;
        self.access().can_write_monitoring(creds, &config.org_id)?;

        let tx = self.db.org_tx(&config.org_id).await?;
        let monitoring = monitored::find(&tx, object_type, object_id, config_stable_id)
            .await?
            .ok_or_else(|| not_found("monitored object", &format!("{object_type}/{object_id}")))?;
        monitored::delete(&tx, &monitoring.id).await?;

        if monitored::list_for_object(&tx, object_type, object_id).await?.is_empty() {
            let latest = delta_tracks::latest_for_object(&tx, object_type, object_id).await?;
            if let Some(latest) = latest.filter(|t| t.operation != DeltaOperation::Delete) {
                let track = DeltaTrack {
                    id: vigil_core::new_id(),
                    entity_id: latest.entity_id,
                    object_type: object_type.to_string(),
                    object_id: object_id.to_string(),
                    object_internal_id: None,
                    operation: DeltaOperation::Delete,
                    dataset_file_id: None,
                    created_at: Utc::now(),
                };
                delta_tracks::insert(&tx, &track).await?;
            }
        }
        tx.commit().await?;
        tracing::info!(object_type, object_id, config_stable_id, "monitoring removed");
        Ok(())
    }

    /// # Errors
    ///
    /// `NotFound` if the screening does not exist in the caller's
    /// organization.
    pub async fn get_screening(
        &self,
        creds: &Credentials,
        screening_id: &str,
    ) -> Result<ContinuousScreeningWithMatches, ScreeningError> {
        self.access().check_feature(creds)?;
        let conn = self.db.control().await;
        screenings::get_with_matches(&conn, screening_id)
            .await?
            .filter(|s| s.screening.org_id == creds.org_id)
            .ok_or_else(|| not_found("screening", screening_id))
    }

    /// Screenings of one object, newest first.
    ///
    /// # Errors
    ///
    /// Returns a database error if the lookup fails.
    pub async fn list_screenings_for_object(
        &self,
        creds: &Credentials,
        object_type: &str,
        object_id: &str,
    ) -> Result<Vec<ContinuousScreening>, ScreeningError> {
        self.access().check_feature(creds)?;
        let conn = self.db.control().await;
        Ok(screenings::list_for_object(&conn, &creds.org_id, object_type, object_id).await?)
    }

    // -----------------------------------------------------------------------
    // Building blocks shared with the worker
    // -----------------------------------------------------------------------

    /// FTM mapping of an organization table.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown table, `BadParameter` if it is not screenable.
    pub async fn mapping_for(
        &self,
        org_id: &str,
        object_type: &str,
    ) -> Result<DataModelMapping, ScreeningError> {
        let model = self.collaborators.data_model.get_data_model(org_id).await?;
        let table = model
            .table(object_type)
            .ok_or_else(|| not_found("table", object_type))?;
        Ok(build_mapping(table)?)
    }

    /// Current ingested version of an object.
    ///
    /// # Errors
    ///
    /// `NotFound` if the object was never ingested.
    pub async fn current_object(
        &self,
        org_id: &str,
        object_type: &str,
        object_id: &str,
    ) -> Result<IngestedObject, ScreeningError> {
        let conn = self.db.org(org_id).await?;
        ingested::get_current(&conn, object_type, object_id)
            .await?
            .ok_or_else(|| not_found("ingested object", &format!("{object_type}/{object_id}")))
    }

    /// Query the provider for one object, whitelisted entities excluded.
    ///
    /// # Errors
    ///
    /// `BadParameter` if a mapped field is missing from the object, or a
    /// provider error.
    pub async fn search_object(
        &self,
        target: ScreeningTarget<'_>,
    ) -> Result<(SearchRequest, SearchResponse), ScreeningError> {
        let filters = prepare_screening_filters(target.object, target.mapping)?;
        let counterparty = counterparty_identifier(&target.object.object_type, &target.object.object_id);
        let whitelisted = {
            let conn = self.db.control().await;
            whitelist::entity_ids_for(&conn, &target.config.org_id, &counterparty).await?
        };
        let request = SearchRequest {
            org_config: OrgConfig {
                match_threshold: target.config.match_threshold,
                match_limit: target.config.match_limit,
            },
            config: QueryConfig {
                datasets: target.config.datasets.clone(),
                algorithm: target.config.algorithm.clone(),
            },
            queries: vec![EntityQuery {
                entity_type: target.mapping.entity_type.clone(),
                filters,
            }],
            whitelisted_entity_ids: whitelisted,
        };
        let response = self.provider.search(&request).await?;
        Ok((request, response))
    }

    /// Store a screening and its matches in one control-plane transaction.
    ///
    /// # Errors
    ///
    /// Returns a database error; nothing is stored in that case.
    pub async fn save_screening(
        &self,
        screening: &ContinuousScreeningWithMatches,
    ) -> Result<(), ScreeningError> {
        let tx = self.db.control_tx().await?;
        screenings::insert_screening(&tx, &screening.screening).await?;
        screenings::insert_matches(&tx, &screening.matches).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Open a case for a screening in review and bind it.
    ///
    /// # Errors
    ///
    /// [`ScreeningError::CaseCreation`] if the case manager fails; the
    /// screening stays stored without a case.
    pub async fn open_case(
        &self,
        target: ScreeningTarget<'_>,
        screening: &mut ContinuousScreeningWithMatches,
    ) -> Result<Case, ScreeningError> {
        let screening_id = screening.screening.id.clone();
        let case_error = |source: CoreError| ScreeningError::CaseCreation {
            screening_id: screening_id.clone(),
            source,
        };

        let new_case = NewCase {
            org_id: target.config.org_id.clone(),
            inbox_id: target.config.inbox_id.clone(),
            name: case_name_from_ingested_object(target.object, target.mapping),
            screening_id: screening.screening.id.clone(),
            match_ids: screening.matches.iter().map(|m| m.id.clone()).collect(),
        };
        let case = self
            .collaborators
            .cases
            .create_case(new_case)
            .await
            .map_err(case_error)?;
        {
            let conn = self.db.control().await;
            screenings::set_case(&conn, &screening.screening.id, &case.id, Utc::now()).await?;
        }
        screening.screening.case_id = Some(case.id.clone());
        self.collaborators
            .cases
            .perform_case_side_effects(&case)
            .await
            .map_err(case_error)?;

        tracing::info!(
            screening_id = %screening.screening.id,
            case_id = %case.id,
            inbox_id = %case.inbox_id,
            "case opened"
        );
        Ok(case)
    }
}

/// Record that an object version belongs in the exported dataset.
///
/// The first track of an object (or the first after a deletion) is an `Add`
/// with a fresh entity id; later ones are `Update`s of the same entity. A
/// version that is already the latest tracked one records nothing.
///
/// # Errors
///
/// Returns a database error if a statement fails.
pub async fn record_delta_track(
    conn: &libsql::Connection,
    object: &IngestedObject,
    now: DateTime<Utc>,
) -> Result<Option<DeltaTrack>, ScreeningError> {
    let latest = delta_tracks::latest_for_object(conn, &object.object_type, &object.object_id).await?;
    let (entity_id, operation) = match latest {
        Some(track) if track.operation != DeltaOperation::Delete => {
            if track.object_internal_id.as_deref() == Some(object.internal_id.as_str()) {
                return Ok(None);
            }
            (track.entity_id, DeltaOperation::Update)
        }
        _ => (vigil_core::new_id(), DeltaOperation::Add),
    };
    let track = DeltaTrack {
        id: vigil_core::new_id(),
        entity_id,
        object_type: object.object_type.clone(),
        object_id: object.object_id.clone(),
        object_internal_id: Some(object.internal_id.clone()),
        operation,
        dataset_file_id: None,
        created_at: now,
    };
    delta_tracks::insert(conn, &track).await?;
    Ok(Some(track))
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Screening of an organization object against the watchlists.
///
/// In review when anything matched, no hit otherwise.
#[must_use]
pub fn build_object_screening(
    target: ScreeningTarget<'_>,
    trigger: TriggerType,
    request: &SearchRequest,
    response: SearchResponse,
    now: DateTime<Utc>,
) -> ContinuousScreeningWithMatches {
    let id = vigil_core::new_id();
    let matches: Vec<ScreeningMatch> = response
        .matches
        .into_iter()
        .map(|candidate| ScreeningMatch {
            id: vigil_core::new_id(),
            screening_id: id.clone(),
            opensanctions_entity_id: candidate.entity_id,
            status: MatchStatus::Pending,
            payload: candidate.payload,
            enriched: false,
            reviewed_by: None,
            created_at: now,
            updated_at: now,
        })
        .collect();
    let status = if matches.is_empty() {
        ScreeningStatus::NoHit
    } else {
        ScreeningStatus::InReview
    };
    ContinuousScreeningWithMatches {
        screening: ContinuousScreening {
            id,
            org_id: target.config.org_id.clone(),
            config_id: target.config.id.clone(),
            config_stable_id: target.config.stable_id.clone(),
            case_id: None,
            object_type: target.object.object_type.clone(),
            object_id: target.object.object_id.clone(),
            object_internal_id: target.object.internal_id.clone(),
            trigger_type: trigger,
            status,
            is_partial: response.is_partial,
            number_of_matches: count(matches.len()),
            search_input: serde_json::to_value(request).unwrap_or(Value::Null),
            opensanctions_entity_id: None,
            opensanctions_entity_payload: None,
            opensanctions_entity_enriched: false,
            created_at: now,
            updated_at: now,
        },
        matches,
    }
}

/// Screening raised by a watchlist change: the watchlist entity is the
/// screening's own entity and its single match.
#[must_use]
pub fn build_dataset_screening(
    target: ScreeningTarget<'_>,
    entity_id: &str,
    entity_payload: Value,
    search_input: Value,
    now: DateTime<Utc>,
) -> ContinuousScreeningWithMatches {
    let id = vigil_core::new_id();
    let matched = ScreeningMatch {
        id: vigil_core::new_id(),
        screening_id: id.clone(),
        opensanctions_entity_id: entity_id.to_string(),
        status: MatchStatus::Pending,
        payload: entity_payload.clone(),
        enriched: false,
        reviewed_by: None,
        created_at: now,
        updated_at: now,
    };
    ContinuousScreeningWithMatches {
        screening: ContinuousScreening {
            id,
            org_id: target.config.org_id.clone(),
            config_id: target.config.id.clone(),
            config_stable_id: target.config.stable_id.clone(),
            case_id: None,
            object_type: target.object.object_type.clone(),
            object_id: target.object.object_id.clone(),
            object_internal_id: target.object.internal_id.clone(),
            trigger_type: TriggerType::DatasetUpdated,
            status: ScreeningStatus::InReview,
            is_partial: false,
            number_of_matches: 1,
            search_input,
            opensanctions_entity_id: Some(entity_id.to_string()),
            opensanctions_entity_payload: Some(entity_payload),
            opensanctions_entity_enriched: false,
            created_at: now,
            updated_at: now,
        },
        matches: vec![matched],
    }
}
