//! Site-specific vendor extractors.
//!
//! Each supported site discloses its partners in one of two ways:
//!
//! - **Partner pages**: a server-rendered HTML table that has to be scraped
//!   (see [`partners`]). Parsing happens inside the offscreen sandbox.
//! - **TCF privacy managers**: a consent-management platform REST API that
//!   returns the vendor list as JSON (see [`tcf`]).
//!
//! Both produce the same flat list of [`VendorRecord`]s, which the router
//! normalizes before caching.

pub mod partners;
pub mod tcf;

use async_trait::async_trait;

use crate::models::VendorRecord;
use crate::network::FetchError;
use crate::sandbox::SandboxError;

pub use partners::{parse_partner_rows, DomScrapeExtractor, PartnerPage};
pub use tcf::TcfJsonExtractor;

/// Produces the vendor list a site discloses
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    async fn extract(&self) -> Result<Vec<VendorRecord>, ExtractError>;
}

/// Errors raised while extracting a vendor list
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("fetch failed: {0}")]
    Network(#[from] FetchError),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),
}
