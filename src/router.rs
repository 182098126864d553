//! Navigation handling: decide which extractor a hostname needs and record
//! the result in the visit cache.
//!
//! Each hostname moves through `unseen -> seen/pending -> seen/resolved`
//! once per session. Re-visits are not refreshed, and `lastVisited` keeps
//! its first-seen value.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::extractors::{
    DomScrapeExtractor, ExtractError, Extractor, PartnerPage, TcfJsonExtractor,
};
use crate::models::{hostname_of, normalize_vendors, HostnameEntry};
use crate::network::Fetcher;
use crate::sandbox::SandboxProvisioner;
use crate::visit_cache::{SessionStore, StoreError};

/// Browser tab as seen by the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: u64,
    pub url: Option<String>,
}

/// Resolves the tab the user is looking at
#[async_trait]
pub trait TabQuery: Send + Sync {
    /// Active tab of the last focused window, if any
    async fn active_tab(&self) -> Option<Tab>;
}

/// Hostname to extractor mapping, matched exactly
#[derive(Default, Clone)]
pub struct DispatchTable {
    extractors: HashMap<String, Arc<dyn Extractor>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The sites this build knows how to read
    pub fn standard(fetcher: Arc<dyn Fetcher>, provisioner: Arc<SandboxProvisioner>) -> Self {
        let amazon: Arc<dyn Extractor> =
            Arc::new(DomScrapeExtractor::new(PartnerPage::amazon(), provisioner));
        let heise: Arc<dyn Extractor> = Arc::new(TcfJsonExtractor::heise(Arc::clone(&fetcher)));
        let spiegel: Arc<dyn Extractor> = Arc::new(TcfJsonExtractor::spiegel(fetcher));

        Self::new()
            .with("amazon.de", Arc::clone(&amazon))
            .with("www.amazon.de", amazon)
            .with("www.heise.de", heise)
            .with("www.spiegel.de", spiegel)
    }

    pub fn with(mut self, hostname: impl Into<String>, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.insert(hostname.into(), extractor);
        self
    }

    pub fn get(&self, hostname: &str) -> Option<&Arc<dyn Extractor>> {
        self.extractors.get(hostname)
    }

    pub fn hostnames(&self) -> impl Iterator<Item = &str> {
        self.extractors.keys().map(String::as_str)
    }
}

/// What a navigation event led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitOutcome {
    /// No tab, a browser-internal page, or a URL without a host
    Ignored,
    /// Hostname was already recorded this session
    AlreadyVisited,
    /// New entry written; `vendors` is the vendor count if an extractor ran
    Recorded { vendors: Option<usize> },
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("invalid page URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("extraction for {hostname} failed: {source}")]
    Extract {
        hostname: String,
        source: ExtractError,
    },

    #[error("invalid vendor policy URL for {hostname}: {source}")]
    InvalidPolicyUrl {
        hostname: String,
        source: url::ParseError,
    },

    #[error("session store error: {0}")]
    Store(#[from] StoreError),
}

/// Routes navigation events to extractors and fills the visit cache
pub struct VisitRouter {
    store: Arc<dyn SessionStore>,
    dispatch: DispatchTable,
    internal_schemes: Vec<String>,
    // Held across the read-modify-write of the whole cache
    write_lock: Mutex<()>,
}

impl VisitRouter {
    pub fn new(store: Arc<dyn SessionStore>, dispatch: DispatchTable) -> Self {
        Self {
            store,
            dispatch,
            internal_schemes: Config::INTERNAL_SCHEMES
                .iter()
                .map(|scheme| scheme.to_string())
                .collect(),
            write_lock: Mutex::new(()),
        }
    }

    /// Override the URL prefixes treated as browser-internal pages
    pub fn with_internal_schemes(mut self, schemes: Vec<String>) -> Self {
        self.internal_schemes = schemes;
        self
    }

    /// Tab update hook: looks at the active tab, whichever tab fired
    pub async fn on_tab_updated(
        &self,
        tabs: &dyn TabQuery,
        tab_id: u64,
    ) -> Result<VisitOutcome, RouterError> {
        let Some(tab) = tabs.active_tab().await else {
            tracing::debug!(tab_id, "no active tab");
            return Ok(VisitOutcome::Ignored);
        };
        let Some(url) = tab.url else {
            return Ok(VisitOutcome::Ignored);
        };
        self.visit(&url).await
    }

    /// Best-effort variant of [`visit`](Self::visit): failures are logged
    /// and dropped, leaving the hostname unrecorded.
    pub async fn on_navigation_completed(&self, url: &str) {
        if let Err(e) = self.visit(url).await {
            tracing::warn!(url, error = %e, "vendor lookup failed");
        }
    }

    /// Record a visit to `url`, running the matching extractor on first sight
    pub async fn visit(&self, url: &str) -> Result<VisitOutcome, RouterError> {
        if self.is_internal(url) {
            return Ok(VisitOutcome::Ignored);
        }

        let hostname = hostname_of(url).map_err(|source| RouterError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        if hostname.is_empty() {
            return Ok(VisitOutcome::Ignored);
        }

        if self.store.get().await?.contains_key(&hostname) {
            // TODO: refresh entries whose lastVisited is older than a revisit interval
            tracing::debug!(hostname = %hostname, "already visited");
            return Ok(VisitOutcome::AlreadyVisited);
        }

        let mut entry = HostnameEntry::first_seen_now();

        if let Some(extractor) = self.dispatch.get(&hostname) {
            tracing::info!(hostname = %hostname, extractor = extractor.name(), "extracting vendors");

            let records = extractor
                .extract()
                .await
                .map_err(|source| RouterError::Extract {
                    hostname: hostname.clone(),
                    source,
                })?;
            let rows = normalize_vendors(records).map_err(|source| {
                RouterError::InvalidPolicyUrl {
                    hostname: hostname.clone(),
                    source,
                }
            })?;
            entry.vendors = Some(rows);
        }

        let vendors = entry.vendors.as_ref().map(Vec::len);

        // Re-read under the lock so entries written by other hostnames survive
        {
            let _guard = self.write_lock.lock().await;
            let mut cache = self.store.get().await?;
            cache.insert(hostname.clone(), entry);
            self.store.set(cache).await?;
        }

        tracing::info!(hostname = %hostname, vendors = ?vendors, "recorded visit");
        Ok(VisitOutcome::Recorded { vendors })
    }

    fn is_internal(&self, url: &str) -> bool {
        self.internal_schemes
            .iter()
            .any(|scheme| url.starts_with(scheme.as_str()))
    }
}
