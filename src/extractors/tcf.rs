//! TCF privacy-manager extraction.
//!
//! Consent-management platforms built on the IAB Transparency & Consent
//! Framework serve their vendor list over two dependent calls:
//!
//! 1. `GET https://<cmp>/mms/v2/message?message_id=<id>` returns the consent
//!    message. Its `message_json` field is itself a JSON document (a string)
//!    whose `settings.vendorList` names the vendor list; `site_id` names the
//!    site.
//! 2. `GET https://<cmp>/consent/tcfv2/privacy-manager/privacy-manager-view
//!    ?siteId=<site_id>&vendorListId=<vendorList>` returns `{vendors: [...]}`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::{ExtractError, Extractor};
use crate::config::Config;
use crate::models::{VendorList, VendorRecord};
use crate::network::Fetcher;

#[derive(Debug, Deserialize)]
struct MessageMetadata {
    message_json: String,
    site_id: Value,
}

#[derive(Debug, Deserialize)]
struct EmbeddedMessage {
    settings: MessageSettings,
}

#[derive(Debug, Deserialize)]
struct MessageSettings {
    #[serde(rename = "vendorList")]
    vendor_list: Value,
}

/// Extractor for a TCF consent-management deployment
pub struct TcfJsonExtractor {
    label: String,
    cmp_host: String,
    message_id: String,
    fetcher: Arc<dyn Fetcher>,
}

impl TcfJsonExtractor {
    pub fn new(
        label: impl Into<String>,
        cmp_host: impl Into<String>,
        message_id: impl Into<String>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            label: label.into(),
            cmp_host: cmp_host.into(),
            message_id: message_id.into(),
            fetcher,
        }
    }

    pub fn heise(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::new("heise", Config::HEISE_CMP_HOST, Config::TCF_MESSAGE_ID, fetcher)
    }

    pub fn spiegel(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::new("spiegel", Config::SPIEGEL_CMP_HOST, Config::TCF_MESSAGE_ID, fetcher)
    }

    pub fn message_url(&self) -> String {
        format!(
            "https://{}/mms/v2/message?message_id={}",
            self.cmp_host, self.message_id
        )
    }

    pub fn privacy_manager_url(&self, site_id: &str, vendor_list_id: &str) -> String {
        format!(
            "https://{}/consent/tcfv2/privacy-manager/privacy-manager-view?siteId={}&vendorListId={}",
            self.cmp_host, site_id, vendor_list_id
        )
    }

    /// Run both calls and return the privacy manager's vendor list as-is
    pub async fn fetch_vendor_list(&self) -> Result<VendorList, ExtractError> {
        let message = self.fetcher.fetch(&self.message_url()).await?;
        let metadata: MessageMetadata = serde_json::from_str(&message.content)?;
        let embedded: EmbeddedMessage = serde_json::from_str(&metadata.message_json)?;

        let site_id = query_value(&metadata.site_id)?;
        let vendor_list_id = query_value(&embedded.settings.vendor_list)?;

        let url = self.privacy_manager_url(&site_id, &vendor_list_id);
        let response = self.fetcher.fetch(&url).await?;
        Ok(serde_json::from_str(&response.content)?)
    }
}

/// Render an identifier the way it appears in a query string
fn query_value(value: &Value) -> Result<String, ExtractError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(ExtractError::MalformedResponse(format!(
            "expected string or number identifier, got {}",
            other
        ))),
    }
}

#[async_trait]
impl Extractor for TcfJsonExtractor {
    fn name(&self) -> &str {
        &self.label
    }

    async fn extract(&self) -> Result<Vec<VendorRecord>, ExtractError> {
        let list = self.fetch_vendor_list().await?;
        tracing::debug!(cmp = %self.cmp_host, count = list.vendors.len(), "fetched TCF vendor list");
        Ok(list.vendors)
    }
}
