pub mod cli;
pub mod config;
pub mod extractors;
pub mod logging;
pub mod models;
pub mod network;
pub mod responder;
pub mod router;
pub mod sandbox;
pub mod visit_cache;

// Re-export main types for library usage
pub use extractors::{DomScrapeExtractor, ExtractError, Extractor, PartnerPage, TcfJsonExtractor};
pub use models::{HostnameEntry, NormalizedVendorRow, VendorList, VendorRecord, VisitCache};
pub use network::{FetchError, FetchResult, Fetcher, HttpClient};
pub use responder::{QueryMessage, QueryResponder};
pub use router::{DispatchTable, Tab, TabQuery, VisitOutcome, VisitRouter};
pub use sandbox::{LocalSandbox, SandboxHost, SandboxProvisioner, SandboxRequest};
pub use visit_cache::{JsonFileSessionStore, MemorySessionStore, SessionStore};
