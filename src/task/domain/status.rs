//! Stored task and approval status values.

use super::{ParseApprovalStatusError, ParseTaskStatusError, Stage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw task status as held by the backing store.
///
/// The display lane of a task is derived from this value together with its
/// [`ApprovalStatus`]; see [`super::effective_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Work has not started.
    Pending,
    /// Work is under way.
    InProgress,
    /// Work is finished and may enter the approval gate.
    Completed,
    /// Legacy status written by older clients for approved work.
    Approved,
    /// Terminal cancellation, displayed in the approved lane.
    Cancelled,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Approved => "approved",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<Stage> for TaskStatus {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Pending => Self::Pending,
            Stage::InProgress => Self::InProgress,
            Stage::Completed => Self::Completed,
            Stage::Approved => Self::Approved,
        }
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "approved" => Ok(Self::Approved),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the completion approval sub-flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// A reviewer decision is outstanding.
    Pending,
    /// The reviewer accepted the completed work.
    Approved,
    /// The reviewer sent the work back.
    Rejected,
}

impl ApprovalStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl TryFrom<&str> for ApprovalStatus {
    type Error = ParseApprovalStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseApprovalStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reviewer decision on a pending approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// The work is accepted.
    Approved,
    /// The work goes back to the active board.
    Rejected,
}

impl ApprovalOutcome {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Board column prefixes that may precede a status token.
const COLUMN_PREFIXES: [&str; 4] = ["column-", "column_", "col-", "col_"];

/// Maps an externally supplied status token onto a canonical stage.
///
/// Board columns may encode their origin as `board:<id>:<status>` or
/// `column-<status>`; both forms are stripped, and `-` or spaces are read as
/// `_`. `cancelled` folds into the approved lane. Returns `None` when the
/// token does not name a known status.
#[must_use]
pub fn parse_status_token(token: &str) -> Option<Stage> {
    let lowered = token.trim().to_ascii_lowercase();
    let last_segment = lowered.rsplit(':').next().unwrap_or_default();
    let unprefixed = COLUMN_PREFIXES
        .iter()
        .find_map(|prefix| last_segment.strip_prefix(prefix))
        .unwrap_or(last_segment);
    let canonical = unprefixed.trim().replace(['-', ' '], "_");

    match canonical.as_str() {
        "pending" => Some(Stage::Pending),
        "in_progress" => Some(Stage::InProgress),
        "completed" => Some(Stage::Completed),
        "approved" | "cancelled" | "canceled" => Some(Stage::Approved),
        _ => None,
    }
}

/// Total normalisation of a status token, defaulting to [`Stage::Pending`].
///
/// Unrecognised tokens are logged so that data-quality problems stay visible
/// even though the fallback hides them from the board.
#[must_use]
pub fn normalize_status(token: &str) -> Stage {
    parse_status_token(token).unwrap_or_else(|| {
        tracing::warn!(token, "unrecognised status token, defaulting to pending");
        Stage::Pending
    })
}
