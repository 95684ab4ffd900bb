//! Markup-backed page built on `scraper`.
//!
//! The parsed tree is immutable; everything the engine writes (values, files,
//! dispatched events, injected controls) lands in an overlay so callers can
//! observe exactly what a live host page would have received.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::dom::{
    collapse_whitespace, AssignmentRejected, Document, DomEvent, ElementId, ElementInfo,
    ElementKind, EventKind, FileBlob, MatchWidget, Page,
};

/// One event as the host page saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub target: ElementId,
    pub kind: EventKind,
    pub bubbles: bool,
    pub file_names: Vec<String>,
}

#[derive(Debug, Default)]
struct Overlay {
    values: HashMap<ElementId, String>,
    files: HashMap<ElementId, Vec<FileBlob>>,
    events: Vec<RecordedEvent>,
    focused: Option<ElementId>,
    fill_controls: HashSet<ElementId>,
    scrolled: Vec<ElementId>,
    widget: Option<MatchWidget>,
}

pub struct HtmlPage {
    url: Url,
    document: Html,
    reject_file_assignment: bool,
    local_storage: HashMap<String, String>,
    overlay: RefCell<Overlay>,
}

impl HtmlPage {
    pub fn parse(url: Url, markup: &str) -> Self {
        Self {
            url,
            document: Html::parse_document(markup),
            reject_file_assignment: false,
            local_storage: HashMap::new(),
            overlay: RefCell::new(Overlay::default()),
        }
    }

    /// Makes every direct file assignment fail, as sandboxed upload widgets do.
    pub fn reject_file_assignment(mut self) -> Self {
        self.reject_file_assignment = true;
        self
    }

    pub fn with_local_storage(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.local_storage.insert(key.into(), value.into());
        self
    }

    // ── Observation helpers ────────────────────────────────────────────────

    pub fn element_by_dom_id(&self, dom_id: &str) -> Option<ElementId> {
        self.elements()
            .position(|e| e.value().attr("id") == Some(dom_id))
            .map(ElementId)
    }

    pub fn element_by_name(&self, name: &str) -> Option<ElementId> {
        self.elements()
            .position(|e| e.value().attr("name") == Some(name))
            .map(ElementId)
    }

    /// Value written by the engine, falling back to the markup's `value` attribute.
    pub fn value_of(&self, id: ElementId) -> Option<String> {
        if let Some(value) = self.overlay.borrow().values.get(&id) {
            return Some(value.clone());
        }
        self.element_ref(id)
            .and_then(|e| e.value().attr("value").map(str::to_string))
    }

    pub fn files_of(&self, id: ElementId) -> Vec<FileBlob> {
        self.overlay
            .borrow()
            .files
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.overlay.borrow().events.clone()
    }

    pub fn events_for(&self, id: ElementId) -> Vec<EventKind> {
        self.overlay
            .borrow()
            .events
            .iter()
            .filter(|e| e.target == id)
            .map(|e| e.kind)
            .collect()
    }

    /// Every value the engine wrote, in element order.
    pub fn written_values(&self) -> Vec<(ElementId, String)> {
        let overlay = self.overlay.borrow();
        let mut values: Vec<_> = overlay
            .values
            .iter()
            .map(|(id, v)| (*id, v.clone()))
            .collect();
        values.sort_by_key(|(id, _)| *id);
        values
    }

    pub fn has_fill_control(&self, id: ElementId) -> bool {
        self.overlay.borrow().fill_controls.contains(&id)
    }

    pub fn fill_control_count(&self) -> usize {
        self.overlay.borrow().fill_controls.len()
    }

    pub fn scrolled(&self) -> Vec<ElementId> {
        self.overlay.borrow().scrolled.clone()
    }

    pub fn match_widget(&self) -> Option<MatchWidget> {
        self.overlay.borrow().widget.clone()
    }

    pub fn focused(&self) -> Option<ElementId> {
        self.overlay.borrow().focused
    }

    // ── Tree access ────────────────────────────────────────────────────────

    /// All elements in document order. `ElementId` is the index into this sequence.
    fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
    }

    fn element_ref(&self, id: ElementId) -> Option<ElementRef<'_>> {
        self.elements().nth(id.0)
    }

    fn id_of(&self, target: ElementRef<'_>) -> Option<ElementId> {
        self.elements()
            .position(|e| e.id() == target.id())
            .map(ElementId)
    }

    fn labels(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.elements().filter(|e| e.value().name() == "label")
    }

    fn for_labels<'a>(&'a self, el: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        match el.value().attr("id").filter(|v| !v.is_empty()) {
            Some(dom_id) => self
                .labels()
                .filter(|l| l.value().attr("for") == Some(dom_id))
                .collect(),
            None => Vec::new(),
        }
    }

    fn kind_of(el: ElementRef<'_>) -> ElementKind {
        ElementKind::from_tag(el.value().name(), el.value().attr("type"))
    }

    fn record(&self, target: ElementId, kind: EventKind, bubbles: bool, files: &[FileBlob]) {
        self.overlay.borrow_mut().events.push(RecordedEvent {
            target,
            kind,
            bubbles,
            file_names: files.iter().map(|f| f.name.clone()).collect(),
        });
    }
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!("Ignoring unparsable selector {selector:?}: {e:?}");
            None
        }
    }
}

fn label_text(label: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&label.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}

impl Document for HtmlPage {
    fn url(&self) -> &Url {
        &self.url
    }

    fn title(&self) -> String {
        self.elements()
            .find(|e| e.value().name() == "title")
            .map(|e| collapse_whitespace(&e.text().collect::<String>()))
            .unwrap_or_default()
    }

    fn select_first(&self, selector: &str) -> Option<ElementId> {
        let selector = parse_selector(selector)?;
        self.elements()
            .position(|e| selector.matches(&e))
            .map(ElementId)
    }

    fn select_all(&self, selector: &str) -> Vec<ElementId> {
        let Some(selector) = parse_selector(selector) else {
            return Vec::new();
        };
        self.elements()
            .enumerate()
            .filter(|(_, e)| selector.matches(e))
            .map(|(i, _)| ElementId(i))
            .collect()
    }

    fn element(&self, id: ElementId) -> Option<ElementInfo> {
        let el = self.element_ref(id)?;
        let attrs = el.value();
        Some(ElementInfo {
            id,
            kind: Self::kind_of(el),
            name: attrs.attr("name").map(str::to_string),
            dom_id: attrs.attr("id").map(str::to_string),
        })
    }

    fn attribute(&self, id: ElementId, name: &str) -> Option<String> {
        self.element_ref(id)?
            .value()
            .attr(name)
            .map(str::to_string)
    }

    fn text_content(&self, id: ElementId) -> String {
        self.element_ref(id)
            .map(|e| e.text().collect::<String>())
            .unwrap_or_default()
    }

    fn nearest_label(&self, id: ElementId) -> Option<String> {
        let el = self.element_ref(id)?;

        if let Some(label) = self.for_labels(el).into_iter().next() {
            return label_text(label);
        }

        if let Some(label) = el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| a.value().name() == "label")
        {
            return label_text(label);
        }

        let parent = el.parent().and_then(ElementRef::wrap)?;
        parent
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|d| d.value().name() == "label")
            .and_then(label_text)
    }

    fn linked_labels(&self, id: ElementId) -> Vec<String> {
        let Some(el) = self.element_ref(id) else {
            return Vec::new();
        };
        self.for_labels(el)
            .into_iter()
            .chain(
                el.ancestors()
                    .filter_map(ElementRef::wrap)
                    .filter(|a| a.value().name() == "label"),
            )
            .filter_map(label_text)
            .collect()
    }

    fn closest(&self, id: ElementId, selector: &str) -> Option<ElementId> {
        let selector = parse_selector(selector)?;
        let el = self.element_ref(id)?;
        let found = std::iter::once(el)
            .chain(el.ancestors().filter_map(ElementRef::wrap))
            .find(|e| selector.matches(e))?;
        self.id_of(found)
    }
}

impl Page for HtmlPage {
    fn focus(&self, id: ElementId) {
        self.overlay.borrow_mut().focused = Some(id);
        self.record(id, EventKind::Focus, false, &[]);
    }

    fn blur(&self, id: ElementId) {
        {
            let mut overlay = self.overlay.borrow_mut();
            if overlay.focused == Some(id) {
                overlay.focused = None;
            }
        }
        self.record(id, EventKind::Blur, false, &[]);
    }

    fn assign_value(&self, id: ElementId, value: &str) -> Result<(), AssignmentRejected> {
        let el = self
            .element_ref(id)
            .ok_or_else(|| AssignmentRejected::new("element is not in the document"))?;
        if Self::kind_of(el) == ElementKind::File {
            return Err(AssignmentRejected::new("file inputs only accept a file list"));
        }
        if el.value().attr("readonly").is_some() || el.value().attr("disabled").is_some() {
            return Err(AssignmentRejected::new("element is readonly"));
        }
        self.overlay
            .borrow_mut()
            .values
            .insert(id, value.to_string());
        Ok(())
    }

    fn assign_files(&self, id: ElementId, files: &[FileBlob]) -> Result<(), AssignmentRejected> {
        let el = self
            .element_ref(id)
            .ok_or_else(|| AssignmentRejected::new("element is not in the document"))?;
        if Self::kind_of(el) != ElementKind::File {
            return Err(AssignmentRejected::new("element is not a file input"));
        }
        if self.reject_file_assignment {
            return Err(AssignmentRejected::new("host page blocks programmatic file lists"));
        }
        self.overlay.borrow_mut().files.insert(id, files.to_vec());
        Ok(())
    }

    fn dispatch(&self, id: ElementId, event: DomEvent) {
        self.record(id, event.kind, event.bubbles, &event.files);
    }

    fn scroll_into_view(&self, id: ElementId) {
        self.overlay.borrow_mut().scrolled.push(id);
    }

    fn attach_fill_control(&self, id: ElementId) -> bool {
        self.overlay.borrow_mut().fill_controls.insert(id)
    }

    fn show_match_widget(&self, widget: &MatchWidget) {
        self.overlay.borrow_mut().widget = Some(widget.clone());
    }

    fn local_storage_item(&self, key: &str) -> Option<String> {
        self.local_storage.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: &str = r#"
        <html><head><title>Apply | Acme</title></head><body>
          <form>
            <label for="first">First Name</label>
            <input id="first" name="fname" type="text">
            <label>Last Name <input id="last" name="lname"></label>
            <div class="row"><label>Phone</label><input name="phone_number" type="tel"></div>
            <input id="ro" name="ro" readonly>
            <div class="dropzone"><input id="cv" type="file" name="cv"></div>
          </form>
        </body></html>
    "#;

    fn page() -> HtmlPage {
        HtmlPage::parse(Url::parse("https://jobs.example.com/apply").unwrap(), FORM)
    }

    #[test]
    fn test_title_and_selectors() {
        let page = page();
        assert_eq!(page.title(), "Apply | Acme");
        assert_eq!(page.select_all("input").len(), 5);
        assert_eq!(page.select_first("input[name='lname']"), page.element_by_dom_id("last"));
        assert!(page.select_all("div[").is_empty());
    }

    #[test]
    fn test_label_precedence() {
        let page = page();
        let first = page.element_by_dom_id("first").unwrap();
        let last = page.element_by_dom_id("last").unwrap();
        let phone = page.element_by_name("phone_number").unwrap();
        let ro = page.element_by_dom_id("ro").unwrap();
        assert_eq!(page.nearest_label(first).as_deref(), Some("First Name"));
        assert_eq!(page.nearest_label(last).as_deref(), Some("Last Name"));
        assert_eq!(page.nearest_label(phone).as_deref(), Some("Phone"));
        // The form's first label sits inside the shared parent.
        assert_eq!(page.nearest_label(ro).as_deref(), Some("First Name"));
    }

    #[test]
    fn test_linked_labels_cover_for_and_enclosing() {
        let page = page();
        let first = page.element_by_dom_id("first").unwrap();
        let last = page.element_by_dom_id("last").unwrap();
        let phone = page.element_by_name("phone_number").unwrap();
        assert_eq!(page.linked_labels(first), vec!["First Name".to_string()]);
        assert_eq!(page.linked_labels(last), vec!["Last Name".to_string()]);
        assert!(page.linked_labels(phone).is_empty());
    }

    #[test]
    fn test_readonly_and_kind_rejections() {
        let page = page();
        let ro = page.element_by_dom_id("ro").unwrap();
        let cv = page.element_by_dom_id("cv").unwrap();
        assert!(page.assign_value(ro, "x").is_err());
        assert!(page.assign_value(cv, "x").is_err());
        let first = page.element_by_dom_id("first").unwrap();
        assert!(page.assign_files(first, &[]).is_err());
    }

    #[test]
    fn test_closest_includes_self_and_ancestors() {
        let page = page();
        let cv = page.element_by_dom_id("cv").unwrap();
        let zone = page.closest(cv, ".dropzone").unwrap();
        assert_eq!(page.attribute(zone, "class").as_deref(), Some("dropzone"));
        assert_eq!(page.closest(cv, "input"), Some(cv));
        assert_eq!(page.closest(cv, "section"), None);
    }

    #[test]
    fn test_fill_control_attach_is_idempotent() {
        let page = page();
        let first = page.element_by_dom_id("first").unwrap();
        assert!(page.attach_fill_control(first));
        assert!(!page.attach_fill_control(first));
        assert_eq!(page.fill_control_count(), 1);
    }
}
