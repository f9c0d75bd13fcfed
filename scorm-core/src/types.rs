//! Identifiers and the attempt/resource data model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database identifier of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(pub i64);

/// Database identifier of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub i64);

/// Database identifier of a ledger element
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub i64);

/// User identifier issued by the launching platform
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! display_inner {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

display_inner!(AttemptId, ResourceId, ElementId, UserId);

/// Lifecycle status of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl AttemptStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Parse from database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

/// Which of a user's attempts counts when reporting a resource's scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingMethod {
    /// The attempt with the highest computed score
    #[default]
    Highest,
    /// The most recently started attempt
    Last,
}

impl GradingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Highest => "highest",
            Self::Last => "last",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "highest" => Some(Self::Highest),
            "last" => Some(Self::Last),
            _ => None,
        }
    }
}

/// An assessment definition that attempts are launched against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub title: String,
    pub grading_method: GradingMethod,
}

/// One learner's run of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub resource: ResourceId,
    pub user: UserId,
    pub status: AttemptStatus,
    pub created_at: DateTime<Utc>,
}

impl Attempt {
    /// Whether the given user owns this attempt
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.user == user
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_db_strings() {
        for status in [
            AttemptStatus::InProgress,
            AttemptStatus::Completed,
            AttemptStatus::Abandoned,
        ] {
            assert_eq!(AttemptStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AttemptStatus::parse("paused"), None);
    }

    #[test]
    fn grading_method_defaults_to_highest() {
        assert_eq!(GradingMethod::default(), GradingMethod::Highest);
        assert_eq!(GradingMethod::parse("last"), Some(GradingMethod::Last));
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&AttemptId(42)).unwrap();
        assert_eq!(json, "42");
        let user: UserId = serde_json::from_str("\"lti-user-7\"").unwrap();
        assert_eq!(user.as_str(), "lti-user-7");
    }
}
