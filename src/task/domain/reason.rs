//! Free-text justifications attached to rejections.

use super::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Explanation an assignee gives when rejecting an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RejectionReason(String);

impl RejectionReason {
    /// Minimum number of characters a rejection reason must contain.
    pub const MIN_CHARS: usize = 20;

    /// Creates a validated rejection reason.
    ///
    /// Surrounding whitespace is trimmed before the length is measured in
    /// characters.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::RejectionReasonTooShort`] when the trimmed
    /// reason holds fewer than [`Self::MIN_CHARS`] characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let trimmed = raw.trim();
        let actual = trimmed.chars().count();
        if actual < Self::MIN_CHARS {
            return Err(ValidationError::RejectionReasonTooShort {
                minimum: Self::MIN_CHARS,
                actual,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the reason text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RejectionReason {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RejectionReason> for String {
    fn from(reason: RejectionReason) -> Self {
        reason.0
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reviewer note explaining why completed work was sent back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApprovalNote(String);

impl ApprovalNote {
    /// Creates a validated approval rejection note.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyApprovalNote`] when the note is empty
    /// after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyApprovalNote);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the note text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ApprovalNote {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApprovalNote> for String {
    fn from(note: ApprovalNote) -> Self {
        note.0
    }
}

impl fmt::Display for ApprovalNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
