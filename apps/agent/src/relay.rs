//! Token/Session Bridge: the message relay between the page agent and the
//! background process, plus the background's own handlers.
//!
//! Messages are `action`-tagged JSON objects. The background owns the
//! persistent token store and the tab host; it runs as a spawned task fed by an
//! mpsc channel, each request carrying a oneshot for its reply.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Extension page opened in a tab when the host cannot open the popup directly.
pub const POPUP_PAGE: &str = "popup/popup.html";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum RelayMessage {
    #[serde(rename = "fetchToken")]
    FetchToken,
    #[serde(rename = "AddToken")]
    AddToken { token: String },
    #[serde(rename = "getTabUrl")]
    GetTabUrl,
    #[serde(rename = "newTab")]
    NewTab { url: String },
    #[serde(rename = "openPopup")]
    OpenPopup,
    #[serde(rename = "closeTab")]
    CloseTab,
    /// Page side: run a fill with the given token.
    #[serde(rename = "fillInputFields")]
    FillInputFields {
        #[serde(default)]
        data: Option<String>,
    },
    #[serde(rename = "getOrSyncToken")]
    GetOrSyncToken,
    #[serde(rename = "getJobDescription")]
    GetJobDescription,
    #[serde(rename = "computeMatch")]
    ComputeMatch {
        #[serde(default)]
        token: Option<String>,
    },
}

impl RelayMessage {
    pub fn action(&self) -> &'static str {
        match self {
            RelayMessage::FetchToken => "fetchToken",
            RelayMessage::AddToken { .. } => "AddToken",
            RelayMessage::GetTabUrl => "getTabUrl",
            RelayMessage::NewTab { .. } => "newTab",
            RelayMessage::OpenPopup => "openPopup",
            RelayMessage::CloseTab => "closeTab",
            RelayMessage::FillInputFields { .. } => "fillInputFields",
            RelayMessage::GetOrSyncToken => "getOrSyncToken",
            RelayMessage::GetJobDescription => "getJobDescription",
            RelayMessage::ComputeMatch { .. } => "computeMatch",
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("No relay is available")]
    Unavailable,

    #[error("Relay channel closed")]
    Closed,

    #[error("Action {0} is not handled here")]
    Unsupported(&'static str),
}

/// Page-side handle for sending a message and awaiting its reply.
#[async_trait(?Send)]
pub trait Relay {
    async fn send(&self, message: RelayMessage) -> Result<Value, RelayError>;
}

/// Stand-in when no background process is reachable. Every send fails with `Unavailable`.
pub struct NoopRelay;

#[async_trait(?Send)]
impl Relay for NoopRelay {
    async fn send(&self, message: RelayMessage) -> Result<Value, RelayError> {
        debug!("Dropping {} message: no relay", message.action());
        Err(RelayError::Unavailable)
    }
}

/// Persistent token storage shared by the background and the page agent.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str);
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.slot().clone().filter(|t| !t.is_empty())
    }

    fn set(&self, token: &str) {
        *self.slot() = Some(token.to_string());
    }
}

/// Browser-side tab operations the background performs.
pub trait TabHost: Send + Sync {
    fn active_tab_url(&self) -> Option<String>;
    fn open_tab(&self, url: &str);
    /// Returns `false` when the host cannot open the popup itself.
    fn open_popup(&self) -> bool;
    fn close_active_tab(&self);
}

/// Tab host that records what it was asked to do. Used by the CLI and in tests.
#[derive(Debug, Default)]
pub struct LoggingTabHost {
    active_url: Option<String>,
    popup_supported: bool,
    opened: Mutex<Vec<String>>,
    closed: Mutex<usize>,
}

impl LoggingTabHost {
    pub fn new(active_url: Option<String>, popup_supported: bool) -> Self {
        Self {
            active_url,
            popup_supported,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn closed_count(&self) -> usize {
        *self.closed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TabHost for LoggingTabHost {
    fn active_tab_url(&self) -> Option<String> {
        self.active_url.clone()
    }

    fn open_tab(&self, url: &str) {
        info!("Opening tab {}", url);
        self.opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(url.to_string());
    }

    fn open_popup(&self) -> bool {
        if self.popup_supported {
            info!("Opening popup");
        }
        self.popup_supported
    }

    fn close_active_tab(&self) {
        *self.closed.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
    }
}

type Envelope = (RelayMessage, oneshot::Sender<Result<Value, RelayError>>);

/// The background process: token store plus tab host.
pub struct Background {
    tokens: Arc<dyn TokenStore>,
    tabs: Arc<dyn TabHost>,
}

impl Background {
    pub fn new(tokens: Arc<dyn TokenStore>, tabs: Arc<dyn TabHost>) -> Self {
        Self { tokens, tabs }
    }

    /// Answers one message. Page-side actions are not handled here.
    pub fn handle(&self, message: RelayMessage) -> Result<Value, RelayError> {
        match message {
            RelayMessage::FetchToken => Ok(self.tokens.get().map_or(Value::Null, Value::String)),
            RelayMessage::AddToken { token } => {
                self.tokens.set(&token);
                info!("Token stored");
                Ok(json!({ "ok": true }))
            }
            RelayMessage::GetTabUrl => {
                Ok(self.tabs.active_tab_url().map_or(Value::Null, Value::String))
            }
            RelayMessage::NewTab { url } => {
                self.tabs.open_tab(&url);
                Ok(json!({ "ok": true }))
            }
            RelayMessage::OpenPopup => {
                if !self.tabs.open_popup() {
                    self.tabs.open_tab(POPUP_PAGE);
                }
                Ok(json!({ "ok": true }))
            }
            RelayMessage::CloseTab => {
                self.tabs.close_active_tab();
                Ok(json!({ "ok": true }))
            }
            other => Err(RelayError::Unsupported(other.action())),
        }
    }

    /// Moves the background onto its own task and returns the page-side handle.
    /// The task ends once every `ChannelRelay` clone is dropped.
    pub fn spawn(self) -> ChannelRelay {
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        tokio::spawn(async move {
            while let Some((message, reply)) = rx.recv().await {
                let action = message.action();
                if reply.send(self.handle(message)).is_err() {
                    debug!("Sender of {} went away before the reply", action);
                }
            }
            debug!("Background relay stopped");
        });
        ChannelRelay { tx }
    }
}

#[derive(Clone)]
pub struct ChannelRelay {
    tx: mpsc::UnboundedSender<Envelope>,
}

#[async_trait(?Send)]
impl Relay for ChannelRelay {
    async fn send(&self, message: RelayMessage) -> Result<Value, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((message, reply_tx))
            .map_err(|_| RelayError::Closed)?;
        reply_rx.await.map_err(|_| RelayError::Closed)?
    }
}
