//! Page capability: the only surface through which the engine reads or mutates a host page.
//!
//! `Document` is the read side (selector queries, labels, text); `Page` adds the
//! write side (value/file assignment, lifecycle events, injected controls).
//! The classifier, extractor and tracker depend on `Document` only; the injector
//! and orchestrator need a `Page`. `HtmlPage` is the markup-backed implementation
//! used by the CLI and by every test.

pub mod html;

pub use html::{HtmlPage, RecordedEvent};

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Opaque reference to one element of a page, stable for the lifetime of that page view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementId(pub usize);

/// Interactive element kinds the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Text,
    Email,
    Tel,
    Number,
    Date,
    File,
    /// `<input>` without a `type` attribute.
    Untyped,
    TextArea,
    /// Anything else (checkboxes, selects, buttons, non-form elements).
    Other,
}

impl ElementKind {
    pub fn from_tag(tag: &str, input_type: Option<&str>) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "textarea" => ElementKind::TextArea,
            "input" => match input_type.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
                None | Some("") => ElementKind::Untyped,
                Some("text") => ElementKind::Text,
                Some("email") => ElementKind::Email,
                Some("tel") => ElementKind::Tel,
                Some("number") => ElementKind::Number,
                Some("date") => ElementKind::Date,
                Some("file") => ElementKind::File,
                Some(_) => ElementKind::Other,
            },
            _ => ElementKind::Other,
        }
    }

    /// Kinds the classifier considers at all.
    pub fn is_accepted(self) -> bool {
        self != ElementKind::Other
    }

    /// Single-line kinds that take a text value.
    pub fn is_single_line(self) -> bool {
        !matches!(
            self,
            ElementKind::File | ElementKind::TextArea | ElementKind::Other
        )
    }
}

/// Snapshot of an element's identifying attributes.
#[derive(Debug, Clone)]
pub struct ElementInfo {
    pub id: ElementId,
    pub kind: ElementKind,
    pub name: Option<String>,
    pub dom_id: Option<String>,
}

/// A file handed to a file input or a drop zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl FileBlob {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Focus,
    Input,
    Change,
    Blur,
    DragEnter,
    DragOver,
    Drop,
}

/// A synthetic event dispatched into the host page.
#[derive(Debug, Clone)]
pub struct DomEvent {
    pub kind: EventKind,
    pub bubbles: bool,
    /// Data-transfer payload for drag events.
    pub files: Vec<FileBlob>,
}

impl DomEvent {
    pub fn bubbling(kind: EventKind) -> Self {
        Self {
            kind,
            bubbles: true,
            files: Vec::new(),
        }
    }

    pub fn drag(kind: EventKind, file: FileBlob) -> Self {
        Self {
            kind,
            bubbles: true,
            files: vec![file],
        }
    }
}

/// The host page refused a direct assignment (sandboxing, readonly enforcement, wrong kind).
#[derive(Debug, Clone, Error)]
#[error("assignment rejected: {reason}")]
pub struct AssignmentRejected {
    pub reason: String,
}

impl AssignmentRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// State of the floating match widget injected into the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchWidget {
    pub percent: u8,
    pub tailored_resume: bool,
}

/// Read side of a host page. Selector arguments use CSS selector-list syntax;
/// an unparsable selector matches nothing.
pub trait Document {
    fn url(&self) -> &Url;

    fn title(&self) -> String;

    /// First element in document order matching any selector in the list.
    fn select_first(&self, selector: &str) -> Option<ElementId>;

    fn select_all(&self, selector: &str) -> Vec<ElementId>;

    fn element(&self, id: ElementId) -> Option<ElementInfo>;

    fn attribute(&self, id: ElementId, name: &str) -> Option<String>;

    /// Concatenated text content of the element and its descendants.
    fn text_content(&self, id: ElementId) -> String;

    /// Nearest associated label: an explicit `for` label first, then an
    /// enclosing label, then a label inside the element's parent.
    fn nearest_label(&self, id: ElementId) -> Option<String>;

    /// Text of every label that reaches the element (`for`-linked or enclosing).
    fn linked_labels(&self, id: ElementId) -> Vec<String>;

    /// The element itself or its closest ancestor matching `selector`.
    fn closest(&self, id: ElementId, selector: &str) -> Option<ElementId>;
}

/// Write side of a host page.
pub trait Page: Document {
    fn focus(&self, id: ElementId);

    fn blur(&self, id: ElementId);

    fn assign_value(&self, id: ElementId, value: &str) -> Result<(), AssignmentRejected>;

    fn assign_files(&self, id: ElementId, files: &[FileBlob]) -> Result<(), AssignmentRejected>;

    fn dispatch(&self, id: ElementId, event: DomEvent);

    fn scroll_into_view(&self, id: ElementId);

    /// Attaches the answer-fill control next to a question field.
    /// Returns `false` when the control is already present.
    fn attach_fill_control(&self, id: ElementId) -> bool;

    fn show_match_widget(&self, widget: &MatchWidget);

    /// The page's own local-storage entry (used for token hand-off from the dashboard).
    fn local_storage_item(&self, key: &str) -> Option<String>;
}

/// Collapses whitespace runs into single spaces and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-collapsed text of the first element matching `selector`, if non-empty.
pub fn query_text<D: Document + ?Sized>(doc: &D, selector: &str) -> Option<String> {
    let id = doc.select_first(selector)?;
    let text = collapse_whitespace(&doc.text_content(id));
    (!text.is_empty()).then_some(text)
}

/// Trimmed attribute value of the first element matching `selector`, if non-empty.
pub fn query_attr<D: Document + ?Sized>(doc: &D, selector: &str, attr: &str) -> Option<String> {
    let id = doc.select_first(selector)?;
    doc.attribute(id, attr)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
