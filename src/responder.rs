//! Answers popup lookups from the visit cache.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::models::{hostname_of, HostnameEntry};
use crate::visit_cache::{SessionStore, StoreError};

/// Message a popup sends to ask about a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMessage {
    pub msg: String,
    /// URL of the page in question
    pub data: String,
}

impl QueryMessage {
    pub fn get_partners(url: impl Into<String>) -> Self {
        Self {
            msg: Config::QUERY_TAG.to_string(),
            data: url.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("session store error: {0}")]
    Store(#[from] StoreError),
}

/// Read-only view over the visit cache
pub struct QueryResponder {
    store: Arc<dyn SessionStore>,
}

impl QueryResponder {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Entry for the hostname of `url`, `None` if it was never visited
    pub async fn get_entry(&self, url: &str) -> Result<Option<HostnameEntry>, QueryError> {
        let hostname = hostname_of(url).map_err(|source| QueryError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Ok(self.store.entry(&hostname).await?)
    }

    /// Answer a popup message. Returns `None` for messages with another tag.
    pub async fn handle(
        &self,
        message: &QueryMessage,
    ) -> Option<Result<Option<HostnameEntry>, QueryError>> {
        if message.msg != Config::QUERY_TAG {
            return None;
        }
        Some(self.get_entry(&message.data).await)
    }
}
