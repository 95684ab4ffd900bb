//! Application-Event Tracker: posts at most one "applied" event per page visit.
//!
//! Submit signals and clicks on apply-like controls both qualify. The visit key
//! is claimed synchronously before the settle delay, so a second signal that
//! arrives while the first is still in flight is dropped.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dom::{collapse_whitespace, query_text, Document, ElementId};
use crate::lexicon::{
    apply_control_keywords, APPLY_CONTROL_SELECTOR, COMPANY_SELECTORS, HOSTING_PLATFORMS,
    LOCATION_SELECTORS, TITLE_PART_SEPARATORS, TITLE_SITE_SEPARATORS, TITLE_SELECTORS,
};
use crate::matcher::IdentitySignal;
use crate::models::job::TrackedJob;
use crate::relay::TokenStore;
use crate::session::PageContext;

pub const SUBMIT_SETTLE_DELAY: Duration = Duration::from_millis(300);
pub const CLICK_SETTLE_DELAY: Duration = Duration::from_millis(800);
pub const APPLIED_STATUS: &str = "applied";
pub const TRACKING_NOTES: &str = "Auto-tracked via ApplyEase";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSignal {
    /// A form submission, seen in the capture phase.
    Submit,
    Click(ElementId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackOutcome {
    Posted,
    AlreadyTracked,
    NotApplySignal,
    MissingJobInfo,
    NoToken,
    PostFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobInfo {
    pub title: String,
    pub company: String,
    pub location: String,
}

impl JobInfo {
    pub fn is_complete(&self) -> bool {
        !self.title.is_empty() && !self.company.is_empty()
    }
}

fn first_text<D: Document + ?Sized>(doc: &D, selectors: &[&str]) -> String {
    selectors
        .iter()
        .find_map(|s| query_text(doc, s))
        .unwrap_or_default()
}

/// Splits a page title like "Senior Engineer - Acme | LinkedIn" into (title, company).
pub fn split_page_title(page_title: &str) -> (Option<String>, Option<String>) {
    let posting = page_title
        .split(TITLE_SITE_SEPARATORS)
        .next()
        .unwrap_or_default();

    let non_empty = |s: &str| {
        let s = collapse_whitespace(s);
        (!s.is_empty()).then_some(s)
    };

    match TITLE_PART_SEPARATORS.iter().find(|sep| posting.contains(**sep)) {
        Some(sep) => {
            let mut parts = posting.split(*sep);
            let title = parts.next().and_then(non_empty);
            let company = parts.next().and_then(non_empty);
            (title, company)
        }
        None => (non_empty(posting), None),
    }
}

pub fn is_hosting_platform(company: &str) -> bool {
    let lower = company.to_lowercase();
    HOSTING_PLATFORMS.iter().any(|p| lower.contains(p))
}

/// Title, company and location from selectors, then the page title.
pub fn guess_job_info<D: Document + ?Sized>(doc: &D) -> JobInfo {
    let mut info = JobInfo {
        title: first_text(doc, TITLE_SELECTORS),
        company: first_text(doc, COMPANY_SELECTORS),
        location: first_text(doc, LOCATION_SELECTORS),
    };

    if info.title.is_empty() || info.company.is_empty() {
        let (title, company) = split_page_title(&doc.title());
        if info.title.is_empty() {
            info.title = title.unwrap_or_default();
        }
        if info.company.is_empty() {
            info.company = company.unwrap_or_default();
        }
    }

    if is_hosting_platform(&info.company) {
        debug!("Dropping hosting platform {:?} as company", info.company);
        info.company.clear();
    }
    info
}

pub fn is_apply_text(text: &str) -> bool {
    let signal = IdentitySignal::new(text);
    apply_control_keywords()
        .iter()
        .any(|k| k.strength(&signal).is_some())
}

fn control_text<D: Document + ?Sized>(doc: &D, id: ElementId) -> String {
    let text = collapse_whitespace(&doc.text_content(id));
    if text.is_empty() {
        doc.attribute(id, "value").unwrap_or_default()
    } else {
        text
    }
}

/// Per-visit tracking state: the visit key and the apply controls being watched.
pub struct Tracker {
    key: String,
    watched: Vec<ElementId>,
}

impl Tracker {
    pub fn attach<D: Document + ?Sized>(doc: &D, key: String) -> Self {
        let watched: Vec<ElementId> = doc
            .select_all(APPLY_CONTROL_SELECTOR)
            .into_iter()
            .filter(|id| is_apply_text(&control_text(doc, *id)))
            .collect();
        debug!("Watching {} apply controls for {}", watched.len(), key);
        Self { key, watched }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn watched(&self) -> &[ElementId] {
        &self.watched
    }

    pub fn qualifies(&self, signal: PageSignal) -> bool {
        match signal {
            PageSignal::Submit => true,
            PageSignal::Click(id) => self.watched.contains(&id),
        }
    }

    /// Handles one signal to completion. The visit is marked tracked whatever
    /// the post outcome; only the first qualifying signal ever reaches the backend.
    pub async fn handle_signal(
        &self,
        ctx: &PageContext<'_>,
        tokens: &dyn TokenStore,
        signal: PageSignal,
    ) -> TrackOutcome {
        if !self.qualifies(signal) {
            return TrackOutcome::NotApplySignal;
        }
        if !ctx.session.begin_tracking(&self.key) {
            debug!("{} already tracked; ignoring {:?}", self.key, signal);
            return TrackOutcome::AlreadyTracked;
        }

        let delay = match signal {
            PageSignal::Submit => SUBMIT_SETTLE_DELAY,
            PageSignal::Click(_) => CLICK_SETTLE_DELAY,
        };
        tokio::time::sleep(delay).await;

        let outcome = self.post_applied(ctx, tokens).await;
        ctx.session.finish_tracking(&self.key);
        outcome
    }

    async fn post_applied(&self, ctx: &PageContext<'_>, tokens: &dyn TokenStore) -> TrackOutcome {
        let Some(token) = tokens.get() else {
            return TrackOutcome::NoToken;
        };
        let info = guess_job_info(ctx.page);
        if !info.is_complete() {
            debug!("Not tracking {}: title or company unknown", self.key);
            return TrackOutcome::MissingJobInfo;
        }

        let job = TrackedJob {
            company: info.company,
            title: info.title,
            location: info.location,
            source: ctx.session.host().to_string(),
            url: ctx.session.url().to_string(),
            status: APPLIED_STATUS.to_string(),
            notes: TRACKING_NOTES.to_string(),
            jd_text: ctx.job_description().await,
        };

        match ctx.backend.track_job(&token, &job).await {
            Ok(()) => {
                info!(
                    "Tracked application: {} at {} ({}s after page load)",
                    job.title,
                    job.company,
                    ctx.session.elapsed().num_seconds()
                );
                TrackOutcome::Posted
            }
            Err(e) => {
                warn!("Tracking post failed: {}", e);
                TrackOutcome::PostFailed
            }
        }
    }
}
