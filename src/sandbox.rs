//! Offscreen parsing sandbox.
//!
//! Partner pages are parsed in an isolated document rather than in the
//! router. This module has two halves:
//!
//! - [`SandboxProvisioner`] makes sure the document at a given path exists
//!   before anyone talks to it, and never lets two concurrent callers create
//!   it twice.
//! - [`LocalSandbox`] is an in-process [`SandboxHost`]: every created
//!   document is a tokio task fed through a channel, answering each
//!   `parse-<vendor>-partners` request exactly once.

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;
use crate::extractors::partners::{scrape_partner_page, PartnerPage};
use crate::models::VendorRecord;
use crate::network::Fetcher;

/// Message sent from the router to a sandbox document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
}

impl SandboxRequest {
    /// Ask the offscreen document to parse a partner page
    pub fn parse_partners(page: &PartnerPage) -> Self {
        Self {
            kind: page.message_type(),
            target: Config::SANDBOX_TARGET.to_string(),
        }
    }
}

/// Errors from the sandbox host or the work it ran
#[derive(Debug, Clone, thiserror::Error)]
pub enum SandboxError {
    #[error("no sandbox document at {0}")]
    NotFound(String),

    #[error("sandbox document already exists at {0}")]
    AlreadyExists(String),

    #[error("sandbox document at {0} is closed")]
    Closed(String),

    #[error("sandbox document did not reply")]
    NoReply,

    #[error("sandbox parsing failed: {0}")]
    Failed(String),
}

/// Platform side of the sandbox: lookup, creation and messaging
#[async_trait]
pub trait SandboxHost: Send + Sync {
    /// Whether a document for `path` is alive
    async fn has_document(&self, path: &str) -> Result<bool, SandboxError>;

    async fn create_document(
        &self,
        path: &str,
        reason: &str,
        justification: &str,
    ) -> Result<(), SandboxError>;

    /// Send one request and wait for its single reply
    async fn send(
        &self,
        path: &str,
        request: SandboxRequest,
    ) -> Result<Vec<VendorRecord>, SandboxError>;
}

type Creation = Shared<BoxFuture<'static, Result<(), SandboxError>>>;

/// Hands out a ready sandbox, creating it at most once at a time.
///
/// The in-flight slot is a plain mutex around a shared future. The lock is
/// only held to read or swap the slot, never across an await, so it acts as
/// a single-slot registry rather than a critical section.
pub struct SandboxProvisioner {
    host: Arc<dyn SandboxHost>,
    creating: Mutex<Option<Creation>>,
}

impl SandboxProvisioner {
    pub fn new(host: Arc<dyn SandboxHost>) -> Self {
        Self {
            host,
            creating: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &Arc<dyn SandboxHost> {
        &self.host
    }

    /// Ensure the document at `path` exists, joining any creation in flight
    pub async fn ensure_sandbox(&self, path: &str) -> Result<(), SandboxError> {
        if self.host.has_document(path).await? {
            return Ok(());
        }

        let creation = {
            let mut slot = self.creating.lock();
            match slot.as_ref() {
                Some(in_flight) => {
                    tracing::debug!(path, "joining sandbox creation in flight");
                    in_flight.clone()
                }
                None => {
                    let creation = Self::create(Arc::clone(&self.host), path.to_string());
                    *slot = Some(creation.clone());
                    creation
                }
            }
        };

        let result = creation.clone().await;

        let mut slot = self.creating.lock();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&creation)) {
            *slot = None;
        }

        result
    }

    fn create(host: Arc<dyn SandboxHost>, path: String) -> Creation {
        async move {
            // The document may have appeared while this caller was suspended
            if host.has_document(&path).await? {
                return Ok(());
            }
            tracing::info!(path = %path, "creating sandbox document");
            host.create_document(&path, Config::SANDBOX_REASON, Config::SANDBOX_JUSTIFICATION)
                .await
        }
        .boxed()
        .shared()
    }
}

struct Envelope {
    request: SandboxRequest,
    reply: oneshot::Sender<Result<Vec<VendorRecord>, SandboxError>>,
}

/// In-process sandbox host backed by tokio tasks
pub struct LocalSandbox {
    fetcher: Arc<dyn Fetcher>,
    pages: Arc<Vec<PartnerPage>>,
    documents: Mutex<HashMap<String, mpsc::Sender<Envelope>>>,
}

impl LocalSandbox {
    /// Create a host whose documents can parse the given partner pages
    pub fn new(fetcher: Arc<dyn Fetcher>, pages: Vec<PartnerPage>) -> Self {
        Self {
            fetcher,
            pages: Arc::new(pages),
            documents: Mutex::new(HashMap::new()),
        }
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().len()
    }
}

#[async_trait]
impl SandboxHost for LocalSandbox {
    async fn has_document(&self, path: &str) -> Result<bool, SandboxError> {
        Ok(self
            .documents
            .lock()
            .get(path)
            .is_some_and(|sender| !sender.is_closed()))
    }

    async fn create_document(
        &self,
        path: &str,
        reason: &str,
        justification: &str,
    ) -> Result<(), SandboxError> {
        let mut documents = self.documents.lock();
        if documents.get(path).is_some_and(|sender| !sender.is_closed()) {
            return Err(SandboxError::AlreadyExists(path.to_string()));
        }

        let (tx, rx) = mpsc::channel(Config::SANDBOX_QUEUE_DEPTH);
        tokio::spawn(run_document(
            path.to_string(),
            rx,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.pages),
        ));
        documents.insert(path.to_string(), tx);

        tracing::debug!(path, reason, justification, "sandbox document started");
        Ok(())
    }

    async fn send(
        &self,
        path: &str,
        request: SandboxRequest,
    ) -> Result<Vec<VendorRecord>, SandboxError> {
        let sender = self
            .documents
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| SandboxError::NotFound(path.to_string()))?;

        let (reply, response) = oneshot::channel();
        sender
            .send(Envelope { request, reply })
            .await
            .map_err(|_| SandboxError::Closed(path.to_string()))?;

        response.await.map_err(|_| SandboxError::NoReply)?
    }
}

/// Message loop of one sandbox document
async fn run_document(
    path: String,
    mut inbox: mpsc::Receiver<Envelope>,
    fetcher: Arc<dyn Fetcher>,
    pages: Arc<Vec<PartnerPage>>,
) {
    while let Some(Envelope { request, reply }) = inbox.recv().await {
        if request.target != Config::SANDBOX_TARGET {
            tracing::debug!(path = %path, target = %request.target, "message not meant for this document");
            continue;
        }

        let Some(page) = pages.iter().find(|page| page.message_type() == request.kind).cloned() else {
            tracing::warn!(path = %path, kind = %request.kind, "Unexpected message type");
            continue;
        };

        let fetcher = Arc::clone(&fetcher);
        tokio::spawn(async move {
            let result = scrape_partner_page(fetcher.as_ref(), &page)
                .await
                .map_err(|e| SandboxError::Failed(e.to_string()));
            // The requester may have gone away; nothing to do then.
            let _ = reply.send(result);
        });
    }
    tracing::debug!(path = %path, "sandbox document closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{FetchError, FetchResult};
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct SlowHost {
        exists: AtomicBool,
        creations: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SandboxHost for SlowHost {
        async fn has_document(&self, _path: &str) -> Result<bool, SandboxError> {
            Ok(self.exists.load(Ordering::SeqCst))
        }

        async fn create_document(
            &self,
            path: &str,
            _reason: &str,
            _justification: &str,
        ) -> Result<(), SandboxError> {
            self.creations.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(SandboxError::Failed(format!("cannot create {}", path)));
            }
            self.exists.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn send(
            &self,
            _path: &str,
            _request: SandboxRequest,
        ) -> Result<Vec<VendorRecord>, SandboxError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_create_once() {
        let host = Arc::new(SlowHost::default());
        let provisioner = SandboxProvisioner::new(host.clone());

        let results = join_all((0..8).map(|_| provisioner.ensure_sandbox("/amazon.html"))).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(host.creations.load(Ordering::SeqCst), 1);
        assert!(provisioner.creating.lock().is_none());
    }

    #[tokio::test]
    async fn test_existing_document_is_reused() {
        let host = Arc::new(SlowHost::default());
        host.exists.store(true, Ordering::SeqCst);
        let provisioner = SandboxProvisioner::new(host.clone());

        provisioner.ensure_sandbox("/amazon.html").await.unwrap();

        assert_eq!(host.creations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_creation_is_shared_and_cleared() {
        let host = Arc::new(SlowHost {
            fail: true,
            ..Default::default()
        });
        let provisioner = SandboxProvisioner::new(host.clone());

        let results = join_all((0..3).map(|_| provisioner.ensure_sandbox("/amazon.html"))).await;

        assert!(results.iter().all(Result::is_err));
        assert_eq!(host.creations.load(Ordering::SeqCst), 1);
        assert!(provisioner.creating.lock().is_none());

        // A later caller starts a fresh attempt
        let _ = provisioner.ensure_sandbox("/amazon.html").await;
        assert_eq!(host.creations.load(Ordering::SeqCst), 2);
    }

    struct PageFetcher(String);

    #[async_trait]
    impl Fetcher for PageFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchResult, FetchError> {
            Ok(FetchResult::ok(self.0.clone()))
        }
    }

    fn local_sandbox() -> LocalSandbox {
        let html = r#"<table><tr><td><div class="a-row">Acme</div><div class="a-row"><a class="a-link-normal" href="https://acme.example/p">p</a></div></td></tr></table>"#;
        LocalSandbox::new(Arc::new(PageFetcher(html.to_string())), vec![PartnerPage::amazon()])
    }

    #[tokio::test]
    async fn test_local_sandbox_parses_partner_page() {
        let sandbox = local_sandbox();
        sandbox
            .create_document("/amazon.html", "DOM_PARSER", "test")
            .await
            .unwrap();
        assert!(sandbox.has_document("/amazon.html").await.unwrap());

        let partners = sandbox
            .send("/amazon.html", SandboxRequest::parse_partners(&PartnerPage::amazon()))
            .await
            .unwrap();

        assert_eq!(partners.len(), 1);
        assert_eq!(partners[0].name, "Acme");
    }

    #[tokio::test]
    async fn test_local_sandbox_rejects_duplicate_document() {
        let sandbox = local_sandbox();
        sandbox.create_document("/amazon.html", "DOM_PARSER", "test").await.unwrap();
        let second = sandbox.create_document("/amazon.html", "DOM_PARSER", "test").await;
        assert!(matches!(second, Err(SandboxError::AlreadyExists(_))));
        assert_eq!(sandbox.document_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_message_type_gets_no_reply() {
        let sandbox = local_sandbox();
        sandbox.create_document("/amazon.html", "DOM_PARSER", "test").await.unwrap();

        let paypal = PartnerPage {
            vendor: "paypal".to_string(),
            url: "https://www.paypal.com/partners".to_string(),
            sandbox_path: "/amazon.html".to_string(),
        };
        let result = sandbox
            .send("/amazon.html", SandboxRequest::parse_partners(&paypal))
            .await;
        assert!(matches!(result, Err(SandboxError::NoReply)));

        let wrong_target = SandboxRequest {
            kind: "parse-amazon-partners".to_string(),
            target: "background".to_string(),
        };
        let result = sandbox.send("/amazon.html", wrong_target).await;
        assert!(matches!(result, Err(SandboxError::NoReply)));
    }

    #[tokio::test]
    async fn test_send_without_document() {
        let sandbox = local_sandbox();
        let result = sandbox
            .send("/amazon.html", SandboxRequest::parse_partners(&PartnerPage::amazon()))
            .await;
        assert!(matches!(result, Err(SandboxError::NotFound(_))));
    }

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_string(&SandboxRequest::parse_partners(&PartnerPage::amazon())).unwrap();
        assert_eq!(json, r#"{"type":"parse-amazon-partners","target":"offscreen"}"#);
    }
}
