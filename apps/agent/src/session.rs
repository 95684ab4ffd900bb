//! Page-visit state shared by every component working on one page view.
//!
//! The description and match caches are first-writer-wins; the tracking guard
//! is a synchronous check-then-set so it never spans an await.

use std::cell::RefCell;
use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::backend::Backend;
use crate::dom::Page;
use crate::extractor::{self, MarkupSource};
use crate::models::job::MatchResult;

pub struct PageSession {
    pub id: Uuid,
    started_at: DateTime<Utc>,
    url: Url,
    job_description: OnceCell<String>,
    match_result: RefCell<Option<MatchResult>>,
    tracked: RefCell<HashSet<String>>,
    in_flight: RefCell<HashSet<String>>,
    tailored_hosts: RefCell<HashSet<String>>,
}

impl PageSession {
    pub fn new(url: Url) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            url,
            job_description: OnceCell::new(),
            match_result: RefCell::new(None),
            tracked: RefCell::new(HashSet::new()),
            in_flight: RefCell::new(HashSet::new()),
            tailored_hosts: RefCell::new(HashSet::new()),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Time spent on the page so far.
    pub fn elapsed(&self) -> Duration {
        Utc::now() - self.started_at
    }

    /// The page's description, extracted on first use. A non-empty result is
    /// cached for the rest of the visit; an empty one is retried next time.
    pub async fn job_description<P: Page + ?Sized>(
        &self,
        page: &P,
        source: &dyn MarkupSource,
    ) -> String {
        let result = self
            .job_description
            .get_or_try_init(|| async {
                match extractor::extract(page, source).await {
                    Ok(text) if !text.is_empty() => Ok(text),
                    Ok(_) => Err(()),
                    Err(e) => {
                        warn!("Description extraction failed: {}", e);
                        Err(())
                    }
                }
            })
            .await;
        result.cloned().unwrap_or_default()
    }

    pub fn cached_job_description(&self) -> Option<&str> {
        self.job_description.get().map(String::as_str)
    }

    pub fn cache_match(&self, result: MatchResult) {
        debug!("Caching match {}% for session {}", result.display_percent(), self.id);
        *self.match_result.borrow_mut() = Some(result);
    }

    pub fn cached_match(&self) -> Option<MatchResult> {
        self.match_result.borrow().clone()
    }

    pub fn set_tailored_resume(&self, host: &str, enabled: bool) {
        let mut hosts = self.tailored_hosts.borrow_mut();
        if enabled {
            hosts.insert(host.to_string());
        } else {
            hosts.remove(host);
        }
    }

    pub fn uses_tailored_resume(&self, host: &str) -> bool {
        self.tailored_hosts.borrow().contains(host)
    }

    /// Page-visit key for "applied" tracking.
    pub fn tracking_key(&self) -> String {
        format!("applyease_tracked_{}", self.url)
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        self.tracked.borrow().contains(key)
    }

    /// Claims `key` for one tracking attempt. `false` when it is already
    /// tracked or another attempt holds it.
    pub fn begin_tracking(&self, key: &str) -> bool {
        if self.is_tracked(key) {
            return false;
        }
        self.in_flight.borrow_mut().insert(key.to_string())
    }

    /// Releases the claim and marks `key` tracked for the rest of the visit.
    pub fn finish_tracking(&self, key: &str) {
        self.in_flight.borrow_mut().remove(key);
        self.tracked.borrow_mut().insert(key.to_string());
    }
}

/// Borrowed collaborators for one page view.
#[derive(Clone, Copy)]
pub struct PageContext<'a> {
    pub page: &'a dyn Page,
    pub backend: &'a dyn Backend,
    pub markup: &'a dyn MarkupSource,
    pub session: &'a PageSession,
}

impl<'a> PageContext<'a> {
    pub async fn job_description(&self) -> String {
        self.session.job_description(self.page, self.markup).await
    }
}
