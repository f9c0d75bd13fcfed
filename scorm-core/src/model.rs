//! SCORM 2004 runtime data model keys and status vocabularies

use serde::{Deserialize, Serialize};

/// Opaque state blob the content rewrites in full on every save
pub const SUSPEND_DATA: &str = "cmi.suspend_data";
/// Score normalised to [-1, 1]
pub const SCORE_SCALED: &str = "cmi.score.scaled";
pub const COMPLETION_STATUS: &str = "cmi.completion_status";
pub const SUCCESS_STATUS: &str = "cmi.success_status";

/// `cmi.completion_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Completed,
    Incomplete,
    NotAttempted,
    Unknown,
}

impl CompletionStatus {
    /// Parse a data model value; anything unrecognised is `Unknown`
    pub fn from_value(value: &str) -> Self {
        match value {
            "completed" => Self::Completed,
            "incomplete" => Self::Incomplete,
            "not attempted" => Self::NotAttempted,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::NotAttempted => "not attempted",
            Self::Unknown => "unknown",
        }
    }
}

/// `cmi.success_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessStatus {
    Passed,
    Failed,
    Unknown,
}

impl SuccessStatus {
    pub fn from_value(value: &str) -> Self {
        match value {
            "passed" => Self::Passed,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}
