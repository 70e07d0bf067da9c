//! Match review state machine and whitelists.
//!
//! A screening can only be reviewed while it is in review and bound to a
//! case. Confirming one match closes the screening as a hit and skips the
//! remaining pending matches. Rejecting the last pending match closes it as
//! no hit, unless the provider capped the results (partial screening).

use chrono::Utc;
use vigil_core::entities::{
    ContinuousScreening, ContinuousScreeningWithMatches, NewCaseEvent, ScreeningWhitelist,
};
use vigil_core::enums::{CaseEventType, MatchStatus, ScreeningStatus};
use vigil_core::errors::CoreError;
use vigil_core::ports::Credentials;
use vigil_core::counterparty_identifier;
use vigil_db::repos::{screenings, whitelist};

use crate::ScreeningService;
use crate::error::{ScreeningError, bad_parameter, not_found, unprocessable};

impl ScreeningService {
    /// Review one match.
    ///
    /// With `whitelist` set on a `NoHit` review, the matched entity is
    /// whitelisted for the screened object so later screenings ignore it.
    ///
    /// # Errors
    ///
    /// - `BadParameter`: `status` is neither `ConfirmedHit` nor `NoHit`
    /// - `NotFound`: unknown match or screening
    /// - `UnprocessableEntity`: screening not in a case, not in review, or
    ///   match already reviewed
    /// - `Forbidden`: missing review or whitelist permission
    pub async fn update_match_status(
        &self,
        creds: &Credentials,
        match_id: &str,
        status: MatchStatus,
        whitelist_entity: bool,
    ) -> Result<ContinuousScreeningWithMatches, ScreeningError> {
        if !status.is_reviewable_target() {
            return Err(bad_parameter(format!(
                "a match can only be reviewed as confirmed_hit or no_hit, got {status}"
            )));
        }
        self.access().check_feature(creds)?;

        let now = Utc::now();
        let reviewer = creds.user_id.as_deref();
        let tx = self.db.control_tx().await?;

        let matched = screenings::get_match(&tx, match_id)
            .await?
            .ok_or_else(|| not_found("screening match", match_id))?;
        let screening = screenings::get_screening(&tx, &matched.screening_id)
            .await?
            .filter(|s| s.org_id == creds.org_id)
            .ok_or_else(|| not_found("screening", &matched.screening_id))?;
        let case_id = self.check_reviewable(creds, &screening)?;
        if whitelist_entity && status == MatchStatus::NoHit {
            self.access().can_write_whitelist(creds, &screening.org_id)?;
        }
        if !matched.status.can_transition_to(status) {
            return Err(CoreError::InvalidTransition {
                entity_type: "screening match".into(),
                id: matched.id.clone(),
                from: matched.status.to_string(),
                to: status.to_string(),
            }
            .into());
        }

        screenings::update_match_status(&tx, match_id, status, reviewer, now).await?;

        let mut closed_as = None;
        match status {
            MatchStatus::ConfirmedHit => {
                let skipped = screenings::skip_pending_matches(&tx, &screening.id, reviewer, now).await?;
                screenings::update_status(&tx, &screening.id, ScreeningStatus::ConfirmedHit, now).await?;
                tracing::debug!(screening_id = %screening.id, skipped, "remaining matches skipped");
                closed_as = Some(ScreeningStatus::ConfirmedHit);
            }
            MatchStatus::NoHit => {
                let pending = screenings::count_pending_matches(&tx, &screening.id).await?;
                if pending == 0 && !screening.is_partial {
                    screenings::update_status(&tx, &screening.id, ScreeningStatus::NoHit, now).await?;
                    closed_as = Some(ScreeningStatus::NoHit);
                } else if pending == 0 {
                    tracing::info!(
                        screening_id = %screening.id,
                        "partial screening left in review after its last match"
                    );
                }
                if whitelist_entity {
                    let entry = ScreeningWhitelist {
                        id: vigil_core::new_id(),
                        org_id: screening.org_id.clone(),
                        counterparty_id: counterparty_identifier(&screening.object_type, &screening.object_id),
                        entity_id: matched.opensanctions_entity_id.clone(),
                        reviewer_id: creds.user_id.clone(),
                        created_at: now,
                    };
                    if !whitelist::insert(&tx, &entry).await? {
                        tracing::debug!(
                            counterparty_id = %entry.counterparty_id,
                            entity_id = %entry.entity_id,
                            "entity already whitelisted"
                        );
                    }
                }
            }
            MatchStatus::Pending | MatchStatus::Skipped => {}
        }

        let result = screenings::get_with_matches(&tx, &screening.id)
            .await?
            .ok_or_else(|| not_found("screening", &screening.id))?;
        tx.commit().await?;

        if let Some(new_status) = closed_as {
            self.emit_review_event(creds, &case_id, &screening.id, CaseEventType::ScreeningReviewed, new_status)
                .await?;
        }
        tracing::info!(screening_id = %screening.id, match_id, status = %status, "match reviewed");
        Ok(result)
    }

    /// Close a screening as no hit without reviewing each match.
    ///
    /// # Errors
    ///
    /// Same preconditions as [`Self::update_match_status`].
    pub async fn dismiss_continuous_screening(
        &self,
        creds: &Credentials,
        screening_id: &str,
    ) -> Result<ContinuousScreeningWithMatches, ScreeningError> {
        self.access().check_feature(creds)?;
        let now = Utc::now();
        let tx = self.db.control_tx().await?;

        let screening = screenings::get_screening(&tx, screening_id)
            .await?
            .filter(|s| s.org_id == creds.org_id)
            .ok_or_else(|| not_found("screening", screening_id))?;
        let case_id = self.check_reviewable(creds, &screening)?;

        let skipped =
            screenings::skip_pending_matches(&tx, screening_id, creds.user_id.as_deref(), now).await?;
        screenings::update_status(&tx, screening_id, ScreeningStatus::NoHit, now).await?;
        let result = screenings::get_with_matches(&tx, screening_id)
            .await?
            .ok_or_else(|| not_found("screening", screening_id))?;
        tx.commit().await?;

        self.emit_review_event(
            creds,
            &case_id,
            screening_id,
            CaseEventType::ScreeningDismissed,
            ScreeningStatus::NoHit,
        )
        .await?;
        tracing::info!(screening_id, skipped, "screening dismissed");
        Ok(result)
    }

    /// Whitelist entries of the caller's organization, optionally for one
    /// counterparty (`objectType_objectId`).
    ///
    /// # Errors
    ///
    /// Returns a database error if the lookup fails.
    pub async fn list_whitelist(
        &self,
        creds: &Credentials,
        counterparty_id: Option<&str>,
    ) -> Result<Vec<ScreeningWhitelist>, ScreeningError> {
        self.access().check_feature(creds)?;
        let conn = self.db.control().await;
        Ok(whitelist::list(&conn, &creds.org_id, counterparty_id).await?)
    }

    /// # Errors
    ///
    /// `Forbidden` without the whitelist permission, `NotFound` for an
    /// unknown entry.
    pub async fn delete_whitelist_entry(
        &self,
        creds: &Credentials,
        entry_id: &str,
    ) -> Result<(), ScreeningError> {
        self.access().check_feature(creds)?;
        self.access().can_write_whitelist(creds, &creds.org_id)?;
        let conn = self.db.control().await;
        whitelist::delete(&conn, &creds.org_id, entry_id).await?;
        Ok(())
    }

    /// Shared review preconditions; returns the bound case id.
    fn check_reviewable(
        &self,
        creds: &Credentials,
        screening: &ContinuousScreening,
    ) -> Result<String, ScreeningError> {
        let case_id = screening
            .case_id
            .clone()
            .ok_or_else(|| unprocessable(format!("screening {} is not in case", screening.id)))?;
        if screening.status != ScreeningStatus::InReview {
            return Err(unprocessable(format!(
                "screening {} is not in review (status {})",
                screening.id, screening.status
            )));
        }
        self.access().can_review_hits(creds, &screening.org_id, &case_id)?;
        Ok(case_id)
    }

    async fn emit_review_event(
        &self,
        creds: &Credentials,
        case_id: &str,
        screening_id: &str,
        event_type: CaseEventType,
        new_status: ScreeningStatus,
    ) -> Result<(), ScreeningError> {
        self.collaborators
            .cases
            .create_case_event(NewCaseEvent {
                org_id: creds.org_id.clone(),
                case_id: case_id.to_string(),
                user_id: creds.user_id.clone(),
                event_type,
                resource_id: screening_id.to_string(),
                new_value: new_status.as_str().to_string(),
            })
            .await?;
        Ok(())
    }
}
