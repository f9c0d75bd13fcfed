//! Session identity for ingest connections
//!
//! Establishing a session is the launching platform's job. This module only
//! defines what the rest of the system sees: a [`Principal`] attached to each
//! request, and a [`SessionResolver`] that turns a session token into a user.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Who a request is from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Principal {
    /// No valid session accompanied the request
    Anonymous,
    /// A learner with an established session
    User { user: UserId },
}

impl Principal {
    pub fn user(&self) -> Option<&UserId> {
        match self {
            Principal::User { user } => Some(user),
            Principal::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Principal::User { .. })
    }
}

/// Resolves a session token to the user it was issued to
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<UserId>;
}

/// Fixed token table, loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticSessions {
    tokens: HashMap<String, UserId>,
}

impl StaticSessions {
    pub fn new(tokens: impl IntoIterator<Item = (String, UserId)>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    /// Add a token
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, user: UserId) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }
}

#[async_trait]
impl SessionResolver for StaticSessions {
    async fn resolve(&self, token: &str) -> Option<UserId> {
        self.tokens.get(token).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_sessions_resolve_known_tokens_only() {
        let sessions = StaticSessions::default().with_token("tok-1", UserId::new("alice"));

        assert_eq!(sessions.resolve("tok-1").await, Some(UserId::new("alice")));
        assert_eq!(sessions.resolve("tok-2").await, None);
    }

    #[test]
    fn principal_exposes_user() {
        let principal = Principal::User {
            user: UserId::new("bob"),
        };
        assert!(principal.is_authenticated());
        assert_eq!(principal.user().map(UserId::as_str), Some("bob"));
        assert!(Principal::Anonymous.user().is_none());
    }
}
