//! Status enums and operation kinds for Vigil.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`.
//! Status enums with state machines provide `allowed_next_states()` to enforce
//! valid transitions at the application layer.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ScreeningStatus
// ---------------------------------------------------------------------------

/// Status of a continuous screening.
///
/// ```text
/// in_review → confirmed_hit
///           → no_hit
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningStatus {
    InReview,
    ConfirmedHit,
    NoHit,
}

impl ScreeningStatus {
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::InReview => &[Self::ConfirmedHit, Self::NoHit],
            Self::ConfirmedHit | Self::NoHit => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InReview => "in_review",
            Self::ConfirmedHit => "confirmed_hit",
            Self::NoHit => "no_hit",
        }
    }
}

impl fmt::Display for ScreeningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MatchStatus
// ---------------------------------------------------------------------------

/// Review status of a single screening match.
///
/// ```text
/// pending → confirmed_hit
///         → no_hit
///         → skipped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    ConfirmedHit,
    NoHit,
    Skipped,
}

impl MatchStatus {
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::ConfirmedHit, Self::NoHit, Self::Skipped],
            Self::ConfirmedHit | Self::NoHit | Self::Skipped => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Whether an analyst may set this status directly on a match.
    #[must_use]
    pub const fn is_reviewable_target(self) -> bool {
        matches!(self, Self::ConfirmedHit | Self::NoHit)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ConfirmedHit => "confirmed_hit",
            Self::NoHit => "no_hit",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TriggerType
// ---------------------------------------------------------------------------

/// Why a screening was run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    ObjectAdded,
    ObjectUpdated,
    DatasetUpdated,
}

impl TriggerType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ObjectAdded => "object_added",
            Self::ObjectUpdated => "object_updated",
            Self::DatasetUpdated => "dataset_updated",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DeltaOperation
// ---------------------------------------------------------------------------

/// Change recorded in the per-org delta track log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaOperation {
    Add,
    Update,
    Delete,
}

impl DeltaOperation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for DeltaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DatasetFileType
// ---------------------------------------------------------------------------

/// Kind of exported dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetFileType {
    Full,
    Delta,
}

impl DatasetFileType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Delta => "delta",
        }
    }
}

impl fmt::Display for DatasetFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// UpdateJobStatus
// ---------------------------------------------------------------------------

/// Progress of one org's application of a downloaded watchlist delta.
///
/// ```text
/// pending → processing → completed
///                      → failed → processing (retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateJobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl UpdateJobStatus {
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Processing],
            Self::Processing => &[Self::Processing, Self::Completed, Self::Failed],
            Self::Failed => &[Self::Processing],
            Self::Completed => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UpdateJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CaseEventType
// ---------------------------------------------------------------------------

/// Case events emitted by match review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseEventType {
    ScreeningReviewed,
    ScreeningDismissed,
}

impl CaseEventType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ScreeningReviewed => "continuous_screening_reviewed",
            Self::ScreeningDismissed => "continuous_screening_dismissed",
        }
    }
}

impl fmt::Display for CaseEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn screening_status_only_leaves_review() {
        assert!(ScreeningStatus::InReview.can_transition_to(ScreeningStatus::ConfirmedHit));
        assert!(ScreeningStatus::InReview.can_transition_to(ScreeningStatus::NoHit));
        assert!(!ScreeningStatus::NoHit.can_transition_to(ScreeningStatus::InReview));
        assert!(!ScreeningStatus::ConfirmedHit.can_transition_to(ScreeningStatus::NoHit));
    }

    #[test]
    fn match_status_terminal_states() {
        for status in [MatchStatus::ConfirmedHit, MatchStatus::NoHit, MatchStatus::Skipped] {
            assert!(status.allowed_next_states().is_empty(), "{status} should be terminal");
        }
        assert!(MatchStatus::Pending.can_transition_to(MatchStatus::Skipped));
    }

    #[rstest]
    #[case(MatchStatus::ConfirmedHit, true)]
    #[case(MatchStatus::NoHit, true)]
    #[case(MatchStatus::Pending, false)]
    #[case(MatchStatus::Skipped, false)]
    fn only_hit_and_no_hit_are_review_targets(#[case] status: MatchStatus, #[case] reviewable: bool) {
        assert_eq!(status.is_reviewable_target(), reviewable);
    }

    #[test]
    fn serde_matches_as_str() {
        let json = serde_json::to_string(&TriggerType::DatasetUpdated).unwrap();
        assert_eq!(json, "\"dataset_updated\"");
        let op: DeltaOperation = serde_json::from_str("\"update\"").unwrap();
        assert_eq!(op, DeltaOperation::Update);
        assert_eq!(
            serde_json::to_string(&UpdateJobStatus::Processing).unwrap(),
            format!("\"{}\"", UpdateJobStatus::Processing.as_str())
        );
    }

    #[test]
    fn failed_update_job_can_retry() {
        assert!(UpdateJobStatus::Failed.can_transition_to(UpdateJobStatus::Processing));
        assert!(!UpdateJobStatus::Completed.can_transition_to(UpdateJobStatus::Processing));
    }
}
