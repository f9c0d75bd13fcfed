//! In-memory cache of externally hosted exam definitions

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{CacheError, ExamCache};

/// A fetched exam definition
#[derive(Debug, Clone, PartialEq)]
pub struct CachedExam {
    pub definition: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

/// Fetches exam definitions over HTTP and keeps the latest copy of each
pub struct HttpExamCache {
    http_client: reqwest::Client,
    entries: RwLock<HashMap<String, CachedExam>>,
}

impl HttpExamCache {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, link: &str) -> Option<CachedExam> {
        self.entries.read().ok()?.get(link).cloned()
    }
}

#[async_trait]
impl ExamCache for HttpExamCache {
    async fn update_cache(&self, link: &str) -> Result<(), CacheError> {
        let fetch_err = |reason: String| CacheError::Fetch {
            link: link.to_string(),
            reason,
        };

        let response = self
            .http_client
            .get(link)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_err(format!("status {}", response.status())));
        }

        let definition: serde_json::Value =
            response.json().await.map_err(|e| CacheError::Invalid {
                link: link.to_string(),
                reason: e.to_string(),
            })?;

        let entry = CachedExam {
            definition,
            fetched_at: Utc::now(),
        };
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(link.to_string(), entry);
        }
        debug!(%link, "Exam definition cached");
        Ok(())
    }
}
