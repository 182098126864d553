//! Partner-page scraping.
//!
//! Some retailers list their advertising partners in a plain HTML table on a
//! privacy-preferences page:
//!
//! ```html
//! <tr><td>
//!   <div class="a-row">Partner name</div>
//!   <div class="a-row"><a class="a-link-normal" href="https://...">Privacy</a></div>
//! </td></tr>
//! ```
//!
//! Matched `.a-row` cells alternate between the partner name and the cell
//! holding its policy link, so only even positions are names. A link whose
//! `href` is `#` means the partner published no policy.

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;

use super::{ExtractError, Extractor};
use crate::models::VendorRecord;
use crate::network::Fetcher;
use crate::sandbox::{SandboxHost, SandboxProvisioner, SandboxRequest};

lazy_static! {
    static ref PARTNER_ROW: Selector =
        Selector::parse("tr > td > .a-row").expect("Invalid CSS selector");
    static ref POLICY_LINK: Selector =
        Selector::parse(".a-link-normal").expect("Invalid CSS selector");
}

const NO_POLICY_HREF: &str = "#";

/// A site whose partners are scraped from an HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerPage {
    /// Vendor family, used in the `parse-<vendor>-partners` message
    pub vendor: String,
    /// Page listing the partners
    pub url: String,
    /// Offscreen document that parses this page
    pub sandbox_path: String,
}

impl PartnerPage {
    pub fn amazon() -> Self {
        Self {
            vendor: "amazon".to_string(),
            url: "https://www.amazon.de/privacyprefs/retail/partners".to_string(),
            sandbox_path: "/amazon.html".to_string(),
        }
    }

    /// Message type the sandbox answers for this page
    pub fn message_type(&self) -> String {
        format!("parse-{}-partners", self.vendor)
    }
}

/// Extract partner names and policy links from a partner page.
///
/// # Errors
///
/// Returns `MalformedResponse` when a name cell has no following cell, the
/// following cell has no policy link, or the link has no `href`.
///
/// # Example
///
/// ```
/// use vendor_disclosure::extractors::parse_partner_rows;
///
/// let html = r##"<table><tr><td>
///     <div class="a-row"> Acme </div>
///     <div class="a-row"><a class="a-link-normal" href="#">-</a></div>
/// </td></tr></table>"##;
/// let partners = parse_partner_rows(html).unwrap();
/// assert_eq!(partners[0].name, "Acme");
/// assert_eq!(partners[0].policy_url, None);
/// ```
pub fn parse_partner_rows(html: &str) -> Result<Vec<VendorRecord>, ExtractError> {
    let document = Html::parse_document(html);

    document
        .select(&PARTNER_ROW)
        .step_by(2)
        .map(|partner| {
            let name = partner.text().collect::<String>().trim().to_string();

            let sibling = partner
                .next_siblings()
                .find_map(ElementRef::wrap)
                .ok_or_else(|| {
                    ExtractError::MalformedResponse(format!("partner '{}' has no policy cell", name))
                })?;

            let link = sibling.select(&POLICY_LINK).next().ok_or_else(|| {
                ExtractError::MalformedResponse(format!("partner '{}' has no policy link", name))
            })?;

            let href = link.value().attr("href").ok_or_else(|| {
                ExtractError::MalformedResponse(format!("policy link of '{}' has no href", name))
            })?;

            let policy_url = (href != NO_POLICY_HREF).then(|| href.to_string());
            Ok(VendorRecord { name, policy_url })
        })
        .collect()
}

/// Fetch a partner page and parse it. Runs inside the sandbox.
pub async fn scrape_partner_page(
    fetcher: &dyn Fetcher,
    page: &PartnerPage,
) -> Result<Vec<VendorRecord>, ExtractError> {
    let response = fetcher.fetch(&page.url).await?;
    let partners = parse_partner_rows(&response.content)?;
    tracing::debug!(vendor = %page.vendor, count = partners.len(), "parsed partner page");
    Ok(partners)
}

/// Extractor that hands partner-page parsing to the offscreen sandbox
pub struct DomScrapeExtractor {
    page: PartnerPage,
    provisioner: Arc<SandboxProvisioner>,
}

impl DomScrapeExtractor {
    pub fn new(page: PartnerPage, provisioner: Arc<SandboxProvisioner>) -> Self {
        Self { page, provisioner }
    }

    fn host(&self) -> &Arc<dyn SandboxHost> {
        self.provisioner.host()
    }
}

#[async_trait]
impl Extractor for DomScrapeExtractor {
    fn name(&self) -> &str {
        &self.page.vendor
    }

    async fn extract(&self) -> Result<Vec<VendorRecord>, ExtractError> {
        self.provisioner.ensure_sandbox(&self.page.sandbox_path).await?;

        let request = SandboxRequest::parse_partners(&self.page);
        let partners = self.host().send(&self.page.sandbox_path, request).await?;
        Ok(partners)
    }
}
