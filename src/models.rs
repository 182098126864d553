use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// One third party a site discloses as receiving user data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRecord {
    /// Display name of the vendor
    pub name: String,

    /// Privacy policy link, `None` when the site gives no usable link
    #[serde(rename = "policyUrl", default)]
    pub policy_url: Option<String>,
}

impl VendorRecord {
    pub fn new(name: impl Into<String>, policy_url: Option<String>) -> Self {
        Self {
            name: name.into(),
            policy_url,
        }
    }
}

/// Vendor list as returned by a privacy-manager endpoint.
///
/// `vendors` is required: an error body without it must not read as an
/// empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorList {
    pub vendors: Vec<VendorRecord>,
}

/// Cached vendor row: `[name, policyUrl, registrantHostname]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedVendorRow(pub String, pub Option<String>, pub Option<String>);

impl NormalizedVendorRow {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn policy_url(&self) -> Option<&str> {
        self.1.as_deref()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.2.as_deref()
    }
}

/// What the session knows about one hostname
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostnameEntry {
    /// First-seen time in milliseconds since the Unix epoch
    #[serde(rename = "lastVisited")]
    pub last_visited: u64,

    /// Present once extraction for the hostname completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendors: Option<Vec<NormalizedVendorRow>>,
}

impl HostnameEntry {
    /// Create an entry stamped with the current time
    pub fn first_seen_now() -> Self {
        Self {
            last_visited: now_millis(),
            vendors: None,
        }
    }
}

/// Session cache keyed by hostname
pub type VisitCache = BTreeMap<String, HostnameEntry>;

/// Current wall clock time in epoch milliseconds
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Hostname of an absolute URL (empty for URLs without a host)
pub fn hostname_of(url: &str) -> Result<String, url::ParseError> {
    let parsed = Url::parse(url)?;
    Ok(parsed.host_str().unwrap_or_default().to_string())
}

/// Enrich vendor records with the hostname of their policy URL.
///
/// A record without a policy URL becomes `[name, null, null]`. A policy URL
/// that does not parse fails the whole list.
pub fn normalize_vendors(
    records: Vec<VendorRecord>,
) -> Result<Vec<NormalizedVendorRow>, url::ParseError> {
    records
        .into_iter()
        .map(|record| match record.policy_url {
            None => Ok(NormalizedVendorRow(record.name, None, None)),
            Some(policy_url) => {
                let hostname = Url::parse(&policy_url)?.host_str().map(str::to_string);
                Ok(NormalizedVendorRow(record.name, Some(policy_url), hostname))
            }
        })
        .collect()
}
