//! Page agent: the page-side entry point wiring the engine to relay messages,
//! window messages, page signals and the match widget.

use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::classifier::{classify_fields, collect_candidates};
use crate::dom::{ElementId, MatchWidget};
use crate::models::job::MatchResult;
use crate::orchestrator::{answer_question, attach_question_controls, question_for, run_fill};
use crate::relay::{Relay, RelayMessage, TokenStore};
use crate::session::PageContext;
use crate::tracker::{PageSignal, TrackOutcome, Tracker};

/// Page-load match scoring needs at least this much description.
pub const MIN_WIDGET_DESCRIPTION_CHARS: usize = 60;
/// On-demand match scoring needs at least this much description.
pub const MIN_MATCH_DESCRIPTION_CHARS: usize = 20;
/// Local-storage key the dashboard leaves its token under.
pub const PAGE_TOKEN_KEY: &str = "token";
pub const WINDOW_MESSAGE_SOURCE: &str = "applyease";

pub struct PageAgent<'a> {
    ctx: PageContext<'a>,
    relay: &'a dyn Relay,
    tokens: &'a dyn TokenStore,
    tracker: Tracker,
    dashboard_url: Url,
}

impl<'a> PageAgent<'a> {
    /// Builds the agent and starts watching apply controls.
    pub fn new(
        ctx: PageContext<'a>,
        relay: &'a dyn Relay,
        tokens: &'a dyn TokenStore,
        dashboard_url: Url,
    ) -> Self {
        let tracker = Tracker::attach(ctx.page, ctx.session.tracking_key());
        Self {
            ctx,
            relay,
            tokens,
            tracker,
            dashboard_url,
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Page-load pass: question controls always; the match widget when a token
    /// exists and the description is long enough.
    pub async fn initialize(&self) -> Option<MatchResult> {
        let attached = self.on_dom_mutation();
        debug!("Attached {} question controls on load", attached);

        let token = self.tokens.get()?;
        let job_description = self.ctx.job_description().await;
        if job_description.chars().count() < MIN_WIDGET_DESCRIPTION_CHARS {
            debug!("Description too short for the match widget");
            return None;
        }

        let result = match self
            .ctx
            .backend
            .compute_match(&token, &job_description)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!("Match on load failed: {}", e);
                return None;
            }
        };
        self.ctx.session.cache_match(result.clone());
        self.ctx.page.show_match_widget(&MatchWidget {
            percent: result.display_percent(),
            tailored_resume: self
                .ctx
                .session
                .uses_tailored_resume(self.ctx.session.host()),
        });
        Some(result)
    }

    /// Answers a relay message addressed to the page.
    pub async fn handle_message(&self, message: RelayMessage) -> Value {
        match message {
            RelayMessage::FillInputFields { data } => self.fill(data).await,
            RelayMessage::GetOrSyncToken => json!({ "token": self.sync_token() }),
            RelayMessage::GetJobDescription => {
                json!({ "jd": self.ctx.job_description().await })
            }
            RelayMessage::ComputeMatch { token } => self.compute_match(token).await,
            other => {
                debug!("Page agent ignores {}", other.action());
                json!({ "ok": false, "error": format!("unsupported action {}", other.action()) })
            }
        }
    }

    async fn fill(&self, token: Option<String>) -> Value {
        let Some(token) = token.filter(|t| !t.is_empty()).or_else(|| self.tokens.get()) else {
            return json!({ "ok": false, "error": "no_token" });
        };
        match run_fill(&self.ctx, &token).await {
            Ok(report) => json!({ "ok": true, "report": report }),
            Err(e) => {
                warn!("Autofill failed: {}", e);
                json!({ "ok": false, "error": e.code() })
            }
        }
    }

    /// Token store first, then the page's own local storage (persisted when found).
    pub fn sync_token(&self) -> Option<String> {
        if let Some(token) = self.tokens.get() {
            return Some(token);
        }
        let token = self
            .ctx
            .page
            .local_storage_item(PAGE_TOKEN_KEY)
            .filter(|t| !t.trim().is_empty())?;
        self.tokens.set(&token);
        info!("Token synced from page storage");
        Some(token)
    }

    async fn compute_match(&self, token: Option<String>) -> Value {
        let job_description = self.ctx.job_description().await;
        if job_description.chars().count() < MIN_MATCH_DESCRIPTION_CHARS {
            return json!({ "ok": false, "error": "no_jd" });
        }
        let Some(token) = token.filter(|t| !t.is_empty()).or_else(|| self.tokens.get()) else {
            return json!({ "ok": false, "error": "no_token" });
        };
        match self
            .ctx
            .backend
            .compute_match(&token, &job_description)
            .await
        {
            Ok(result) => {
                self.ctx.session.cache_match(result.clone());
                json!({ "ok": true, "match": result })
            }
            Err(e) => json!({ "ok": false, "error": e.to_string() }),
        }
    }

    /// `{source: "applyease", action: "AddToken", token}` posted to the window.
    pub fn handle_window_message(&self, data: &Value) -> bool {
        let from_dashboard = data.get("source").and_then(Value::as_str) == Some(WINDOW_MESSAGE_SOURCE)
            && data.get("action").and_then(Value::as_str) == Some("AddToken");
        let token = data
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty());
        match (from_dashboard, token) {
            (true, Some(token)) => {
                self.tokens.set(token);
                info!("Token stored via window message");
                true
            }
            _ => false,
        }
    }

    /// Re-scans the page and attaches controls to new question sites.
    pub fn on_dom_mutation(&self) -> usize {
        let map = classify_fields(&collect_candidates(self.ctx.page), &[]);
        attach_question_controls(self.ctx.page, &map)
    }

    /// The fill control next to `element` was pressed.
    pub async fn activate_fill_control(&self, element: ElementId) -> bool {
        let Some(token) = self.tokens.get() else {
            warn!("Fill control pressed without a token");
            return false;
        };
        let question = question_for(self.ctx.page, element);
        answer_question(&self.ctx, &token, element, &question).await
    }

    pub async fn handle_signal(&self, signal: PageSignal) -> TrackOutcome {
        self.tracker
            .handle_signal(&self.ctx, self.tokens, signal)
            .await
    }

    /// Widget toggle: use a tailored resume for fills on this host.
    pub fn set_tailored_resume(&self, enabled: bool) {
        self.ctx
            .session
            .set_tailored_resume(self.ctx.session.host(), enabled);
        if let Some(result) = self.ctx.session.cached_match() {
            self.ctx.page.show_match_widget(&MatchWidget {
                percent: result.display_percent(),
                tailored_resume: enabled,
            });
        }
    }

    fn dashboard_link(&self, segment: &str) -> Url {
        let mut url = self.dashboard_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(segment);
        }
        url
    }

    /// Widget action: open the dashboard with the description prefilled.
    pub async fn open_custom_cv(&self) -> bool {
        let job_description = self.ctx.job_description().await;
        let mut url = self.dashboard_link("dashboard");
        url.query_pairs_mut().append_pair("jd", &job_description);
        self.send(RelayMessage::NewTab { url: url.into() }).await
    }

    pub async fn open_job_tracker(&self) -> bool {
        let url = self.dashboard_link("job-tracker");
        self.send(RelayMessage::NewTab { url: url.into() }).await
    }

    pub async fn open_popup(&self) -> bool {
        self.send(RelayMessage::OpenPopup).await
    }

    async fn send(&self, message: RelayMessage) -> bool {
        let action = message.action();
        match self.relay.send(message).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Relay {} failed: {}", action, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, HtmlPage};
    use crate::relay::{Background, LoggingTabHost, MemoryTokenStore, NoopRelay};
    use crate::session::PageSession;
    use crate::testing::{ada_profile, FakeBackend, FakeMarkupSource};
    use std::sync::Arc;

    fn url() -> Url {
        Url::parse("https://boards.greenhouse.io/acme/jobs/7").unwrap()
    }

    fn dashboard() -> Url {
        Url::parse("http://localhost:3000").unwrap()
    }

    /// Exactly 150 characters with single spaces.
    fn description_150() -> String {
        "Rust systems engineer role. ".repeat(6).chars().take(150).collect()
    }

    #[tokio::test]
    async fn test_description_cached_across_widget_and_match_message() {
        let page = HtmlPage::parse(url(), "<html><body><div id='root'></div></body></html>");
        let fetched = format!(
            "<html><body><div class='job-description'>{}</div></body></html>",
            description_150()
        );
        let markup = FakeMarkupSource::new(Some(fetched));
        let backend = FakeBackend::new(ada_profile()).with_match(71.6);
        let session = PageSession::new(url());
        let tokens = MemoryTokenStore::with_token("tok");
        let ctx = PageContext { page: &page, backend: &backend, markup: &markup, session: &session };
        let agent = PageAgent::new(ctx, &NoopRelay, &tokens, dashboard());

        let result = agent.initialize().await.unwrap();
        assert_eq!(result.display_percent(), 72);
        assert_eq!(
            page.match_widget(),
            Some(MatchWidget { percent: 72, tailored_resume: false })
        );

        let reply = agent
            .handle_message(RelayMessage::ComputeMatch { token: None })
            .await;
        assert_eq!(reply["ok"], true);
        assert_eq!(reply["match"]["matchingWords"], json!(["rust"]));

        assert_eq!(markup.fetch_count(), 1);
        assert_eq!(backend.match_descriptions(), vec![description_150(), description_150()]);
        assert_eq!(session.cached_job_description().map(|d| d.chars().count()), Some(150));
        assert!(session.cached_match().is_some());
    }

    #[tokio::test]
    async fn test_initialize_without_token_attaches_controls_only() {
        let page = HtmlPage::parse(
            url(),
            "<html><body><label for='q'>Why us?</label><textarea id='q' name='q'></textarea></body></html>",
        );
        let markup = FakeMarkupSource::new(None);
        let backend = FakeBackend::new(ada_profile()).with_match(50.0);
        let session = PageSession::new(url());
        let tokens = MemoryTokenStore::default();
        let ctx = PageContext { page: &page, backend: &backend, markup: &markup, session: &session };
        let agent = PageAgent::new(ctx, &NoopRelay, &tokens, dashboard());

        assert!(agent.initialize().await.is_none());
        assert_eq!(page.fill_control_count(), 1);
        assert!(page.match_widget().is_none());
        assert_eq!(markup.fetch_count(), 0);
        assert_eq!(agent.on_dom_mutation(), 0);
    }

    #[tokio::test]
    async fn test_compute_match_errors() {
        let page = HtmlPage::parse(url(), "<html><head><meta name='description' content='Short.'></head></html>");
        let markup = FakeMarkupSource::new(None);
        let backend = FakeBackend::new(ada_profile()).with_match(50.0);
        let session = PageSession::new(url());
        let tokens = MemoryTokenStore::default();
        let ctx = PageContext { page: &page, backend: &backend, markup: &markup, session: &session };
        let agent = PageAgent::new(ctx, &NoopRelay, &tokens, dashboard());

        let reply = agent.handle_message(RelayMessage::ComputeMatch { token: None }).await;
        assert_eq!(reply, json!({"ok": false, "error": "no_jd"}));

        // A fresh visit; the short description above is cached on the old session.
        let session = PageSession::new(url());
        let page = HtmlPage::parse(
            url(),
            "<html><head><meta name='description' content='Senior Rust engineer, storage team.'></head></html>",
        );
        let ctx = PageContext { page: &page, backend: &backend, markup: &markup, session: &session };
        let agent = PageAgent::new(ctx, &NoopRelay, &tokens, dashboard());
        let reply = agent.handle_message(RelayMessage::ComputeMatch { token: None }).await;
        assert_eq!(reply, json!({"ok": false, "error": "no_token"}));

        let reply = agent
            .handle_message(RelayMessage::ComputeMatch { token: Some("explicit".to_string()) })
            .await;
        assert_eq!(reply["ok"], true);
    }

    #[tokio::test]
    async fn test_get_job_description_message() {
        let page = HtmlPage::parse(url(), "<html><body></body></html>");
        let markup = FakeMarkupSource::new(None);
        let backend = FakeBackend::new(ada_profile());
        let session = PageSession::new(url());
        let tokens = MemoryTokenStore::default();
        let ctx = PageContext { page: &page, backend: &backend, markup: &markup, session: &session };
        let agent = PageAgent::new(ctx, &NoopRelay, &tokens, dashboard());

        let reply = agent.handle_message(RelayMessage::GetJobDescription).await;
        assert_eq!(reply, json!({"jd": ""}));
    }

    #[tokio::test]
    async fn test_token_sync_and_window_hand_off() {
        let page = HtmlPage::parse(url(), "<html><body></body></html>").with_local_storage("token", "from-page");
        let markup = FakeMarkupSource::new(None);
        let backend = FakeBackend::new(ada_profile());
        let session = PageSession::new(url());
        let tokens = MemoryTokenStore::default();
        let ctx = PageContext { page: &page, backend: &backend, markup: &markup, session: &session };
        let agent = PageAgent::new(ctx, &NoopRelay, &tokens, dashboard());

        let reply = agent.handle_message(RelayMessage::GetOrSyncToken).await;
        assert_eq!(reply, json!({"token": "from-page"}));
        assert_eq!(tokens.get().as_deref(), Some("from-page"));

        assert!(!agent.handle_window_message(&json!({"source": "other", "action": "AddToken", "token": "x"})));
        assert!(!agent.handle_window_message(&json!({"source": "applyease", "action": "AddToken"})));
        assert!(agent.handle_window_message(&json!({"source": "applyease", "action": "AddToken", "token": "fresh"})));
        assert_eq!(tokens.get().as_deref(), Some("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_message_runs_fill() {
        let page = HtmlPage::parse(
            url(),
            "<html><body><input name='email' type='email'></body></html>",
        );
        let markup = FakeMarkupSource::new(None);
        let backend = FakeBackend::new(ada_profile());
        let session = PageSession::new(url());
        let tokens = MemoryTokenStore::default();
        let ctx = PageContext { page: &page, backend: &backend, markup: &markup, session: &session };
        let agent = PageAgent::new(ctx, &NoopRelay, &tokens, dashboard());

        let reply = agent.handle_message(RelayMessage::FillInputFields { data: None }).await;
        assert_eq!(reply, json!({"ok": false, "error": "no_token"}));

        let reply = agent
            .handle_message(RelayMessage::FillInputFields { data: Some("tok".to_string()) })
            .await;
        assert_eq!(reply["ok"], true);
        assert_eq!(reply["report"]["outcomes"][0]["role"], "email");
        let email = page.select_first("input").unwrap();
        assert_eq!(page.value_of(email).as_deref(), Some("ada@x.com"));
    }

    #[tokio::test]
    async fn test_fill_message_reports_unauthorized() {
        let page = HtmlPage::parse(url(), "<html><body></body></html>");
        let markup = FakeMarkupSource::new(None);
        let backend = FakeBackend::new(ada_profile()).unauthorized();
        let session = PageSession::new(url());
        let tokens = MemoryTokenStore::with_token("stale");
        let ctx = PageContext { page: &page, backend: &backend, markup: &markup, session: &session };
        let agent = PageAgent::new(ctx, &NoopRelay, &tokens, dashboard());

        let reply = agent.handle_message(RelayMessage::FillInputFields { data: None }).await;
        assert_eq!(reply, json!({"ok": false, "error": "UNAUTHORIZED"}));
    }

    #[tokio::test]
    async fn test_widget_actions_go_through_relay() {
        let page = HtmlPage::parse(
            url(),
            "<html><head><meta name='description' content='Rust & Go'></head></html>",
        );
        let markup = FakeMarkupSource::new(None);
        let backend = FakeBackend::new(ada_profile());
        let session = PageSession::new(url());
        let tokens = MemoryTokenStore::default();
        let tabs = Arc::new(LoggingTabHost::new(None, false));
        let relay = Background::new(Arc::new(MemoryTokenStore::default()), tabs.clone()).spawn();
        let ctx = PageContext { page: &page, backend: &backend, markup: &markup, session: &session };
        let agent = PageAgent::new(ctx, &relay, &tokens, dashboard());

        assert!(agent.open_custom_cv().await);
        assert!(agent.open_job_tracker().await);
        assert!(agent.open_popup().await);
        assert_eq!(
            tabs.opened(),
            vec![
                "http://localhost:3000/dashboard?jd=Rust+%26+Go".to_string(),
                "http://localhost:3000/job-tracker".to_string(),
                "popup/popup.html".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_widget_actions_tolerate_absent_relay() {
        let page = HtmlPage::parse(url(), "<html><body></body></html>");
        let markup = FakeMarkupSource::new(None);
        let backend = FakeBackend::new(ada_profile());
        let session = PageSession::new(url());
        let tokens = MemoryTokenStore::default();
        let ctx = PageContext { page: &page, backend: &backend, markup: &markup, session: &session };
        let agent = PageAgent::new(ctx, &NoopRelay, &tokens, dashboard());

        assert!(!agent.open_popup().await);
        assert!(!agent.open_job_tracker().await);
    }

    #[tokio::test]
    async fn test_fill_control_activation_and_tailored_toggle() {
        let page = HtmlPage::parse(
            url(),
            "<html><body><label for='q'>Why us?</label><textarea id='q' name='q'></textarea></body></html>",
        );
        let markup = FakeMarkupSource::new(None);
        let backend = FakeBackend::new(ada_profile()).with_answer("Mission fit.");
        let session = PageSession::new(url());
        let tokens = MemoryTokenStore::with_token("tok");
        let ctx = PageContext { page: &page, backend: &backend, markup: &markup, session: &session };
        let agent = PageAgent::new(ctx, &NoopRelay, &tokens, dashboard());
        let q = page.element_by_dom_id("q").unwrap();

        assert!(agent.activate_fill_control(q).await);
        assert!(agent.activate_fill_control(q).await);
        assert_eq!(page.value_of(q).as_deref(), Some("Mission fit."));
        assert_eq!(backend.questions(), vec!["Why us?".to_string(), "Why us?".to_string()]);

        agent.set_tailored_resume(true);
        assert!(session.uses_tailored_resume("boards.greenhouse.io"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_signal_tracks_once() {
        let page = HtmlPage::parse(
            url(),
            "<html><head><title>Platform Engineer - Acme | Greenhouse</title></head><body><button>Submit</button></body></html>",
        );
        let markup = FakeMarkupSource::new(None);
        let backend = FakeBackend::new(ada_profile());
        let session = PageSession::new(url());
        let tokens = MemoryTokenStore::with_token("tok");
        let ctx = PageContext { page: &page, backend: &backend, markup: &markup, session: &session };
        let agent = PageAgent::new(ctx, &NoopRelay, &tokens, dashboard());
        let button = page.select_first("button").unwrap();

        assert_eq!(agent.tracker().watched(), &[button]);
        assert_eq!(agent.handle_signal(PageSignal::Click(button)).await, TrackOutcome::Posted);
        assert_eq!(agent.handle_signal(PageSignal::Submit).await, TrackOutcome::AlreadyTracked);
        assert_eq!(backend.tracked()[0].company, "Acme");
    }
}
