//! Job-Description Extractor.
//!
//! Three tiers, first hit wins: structural selector groups (host-matching
//! groups promoted), description metadata, then a network refetch of the
//! page with the first two tiers re-run on the fetched markup.

use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::dom::{query_attr, query_text, Document, HtmlPage};
use crate::errors::AgentError;
use crate::lexicon::{SelectorGroup, JOB_DESCRIPTION_SELECTORS, META_DESCRIPTION_SELECTOR};
use crate::relay::{Relay, RelayMessage};

/// Structural matches must be longer than this to count as a description.
pub const MIN_DESCRIPTION_CHARS: usize = 120;

/// Fetches fresh markup for a page.
#[async_trait(?Send)]
pub trait MarkupSource {
    async fn fetch_page(&self, page_url: &Url) -> Result<String, AgentError>;
}

/// Refetches over HTTP without credentials. The URL comes from the host relay
/// (`getTabUrl`) when it answers, else the page's own URL.
pub struct HttpMarkupSource {
    client: Client,
    relay: Rc<dyn Relay>,
}

impl HttpMarkupSource {
    pub fn new(relay: Rc<dyn Relay>, timeout: Duration) -> Result<Self, AgentError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, relay })
    }

    async fn resolve_url(&self, page_url: &Url) -> Url {
        match self.relay.send(RelayMessage::GetTabUrl).await {
            Ok(value) => value
                .get("url")
                .and_then(|u| u.as_str())
                .or_else(|| value.as_str())
                .and_then(|u| Url::parse(u).ok())
                .unwrap_or_else(|| page_url.clone()),
            Err(e) => {
                debug!("Relay could not resolve the tab URL: {}", e);
                page_url.clone()
            }
        }
    }
}

#[async_trait(?Send)]
impl MarkupSource for HttpMarkupSource {
    async fn fetch_page(&self, page_url: &Url) -> Result<String, AgentError> {
        let url = self.resolve_url(page_url).await;
        debug!("Refetching {} for description extraction", url);
        // The body is parsed whatever the status; error pages simply yield nothing.
        let body = self.client.get(url).send().await?.text().await?;
        Ok(body)
    }
}

/// Selector groups in the order they are tried for `host`.
pub fn ordered_groups(host: &str) -> Vec<&'static SelectorGroup> {
    let (promoted, rest): (Vec<_>, Vec<_>) = JOB_DESCRIPTION_SELECTORS
        .iter()
        .partition(|g| g.applies_to(host));
    promoted.into_iter().chain(rest).collect()
}

/// Tiers 1 and 2 against an already-available document.
pub fn extract_from_document<D: Document + ?Sized>(doc: &D) -> Option<String> {
    let host = doc.url().host_str().unwrap_or_default().to_string();

    for group in ordered_groups(&host) {
        if let Some(text) = query_text(doc, group.selectors) {
            if text.chars().count() > MIN_DESCRIPTION_CHARS {
                debug!("Description matched selector group {}", group.platform);
                return Some(text);
            }
        }
    }

    query_attr(doc, META_DESCRIPTION_SELECTOR, "content")
}

/// Runs all three tiers. Only a transport failure during the refetch is an error.
pub async fn extract<D: Document + ?Sized>(
    doc: &D,
    source: &dyn MarkupSource,
) -> Result<String, AgentError> {
    if let Some(text) = extract_from_document(doc) {
        return Ok(text);
    }

    let markup = source.fetch_page(doc.url()).await?;
    let fetched = HtmlPage::parse(doc.url().clone(), &markup);
    let text = extract_from_document(&fetched).unwrap_or_default();
    info!("Description from refetched markup: {} chars", text.len());
    Ok(text)
}

/// `extract` with every failure collapsed to `""`.
pub async fn extract_or_empty<D: Document + ?Sized>(doc: &D, source: &dyn MarkupSource) -> String {
    match extract(doc, source).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Description extraction failed: {}", e);
            String::new()
        }
    }
}
