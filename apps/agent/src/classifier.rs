//! Field Classifier: maps a page's interactive elements to semantic roles.
//!
//! Resolution runs in a fixed priority order and every element receives at
//! most one role:
//!
//! 1. first/last name pair
//! 2. full name, only when no pair was found
//! 3. email, phone, location (first match per role)
//! 4. one link field per declared profile link type
//! 5. resume file inputs
//! 6. textareas become question sites
//!
//! HARD RULE: an explicit first/last pair always suppresses the full-name
//! interpretation, for every element on the page.

use serde::Serialize;

use crate::dom::{Document, ElementId, ElementKind};
use crate::lexicon::{
    contact_patterns, first_name_pattern, full_name_pattern, last_name_pattern, link_pattern,
    resume_pattern, DEFAULT_QUESTION, FILLABLE_SELECTOR,
};
use crate::matcher::{IdentitySignal, MatchStrength, RolePattern};
use crate::models::role::Role;

/// One interactive element plus its derived identity. Rebuilt on every pass.
#[derive(Debug, Clone)]
pub struct CandidateElement {
    pub element: ElementId,
    pub kind: ElementKind,
    pub signal: IdentitySignal,
    /// Nearest label text as written on the page.
    pub label: Option<String>,
    /// Signals of every label that reaches the element.
    pub linked_labels: Vec<IdentitySignal>,
}

impl CandidateElement {
    pub fn new(
        element: ElementId,
        kind: ElementKind,
        name: Option<&str>,
        dom_id: Option<&str>,
        label: Option<&str>,
    ) -> Self {
        Self {
            element,
            kind,
            signal: IdentitySignal::from_parts([name, dom_id, label]),
            label: label.map(str::to_string),
            linked_labels: Vec::new(),
        }
    }

    pub fn with_linked_labels<'a>(mut self, labels: impl IntoIterator<Item = &'a str>) -> Self {
        self.linked_labels = labels.into_iter().map(IdentitySignal::new).collect();
        self
    }
}

/// Enumerates accepted input kinds and textareas in document order.
pub fn collect_candidates<D: Document + ?Sized>(doc: &D) -> Vec<CandidateElement> {
    doc.select_all(FILLABLE_SELECTOR)
        .into_iter()
        .filter_map(|id| doc.element(id))
        .filter(|info| info.kind.is_accepted())
        .map(|info| {
            let label = doc.nearest_label(info.id);
            let linked = doc.linked_labels(info.id);
            CandidateElement::new(
                info.id,
                info.kind,
                info.name.as_deref(),
                info.dom_id.as_deref(),
                label.as_deref(),
            )
            .with_linked_labels(linked.iter().map(String::as_str))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldAssignment {
    pub element: ElementId,
    pub role: Role,
}

/// A free-text field offered for an AI-written answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionSite {
    pub element: ElementId,
    pub question: String,
}

/// Output of one classification pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldMap {
    assignments: Vec<FieldAssignment>,
    questions: Vec<QuestionSite>,
}

impl FieldMap {
    pub fn assignments(&self) -> &[FieldAssignment] {
        &self.assignments
    }

    pub fn questions(&self) -> &[QuestionSite] {
        &self.questions
    }

    pub fn role_of(&self, element: ElementId) -> Option<&Role> {
        self.assignments
            .iter()
            .find(|a| a.element == element)
            .map(|a| &a.role)
    }

    pub fn elements_for(&self, role: &Role) -> Vec<ElementId> {
        self.assignments
            .iter()
            .filter(|a| &a.role == role)
            .map(|a| a.element)
            .collect()
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.assignments.iter().any(|a| &a.role == role)
    }

    fn is_assigned(&self, element: ElementId) -> bool {
        self.assignments.iter().any(|a| a.element == element)
    }

    fn assign(&mut self, element: ElementId, role: Role) {
        if !self.is_assigned(element) {
            self.assignments.push(FieldAssignment { element, role });
        }
    }
}

/// Classifies `candidates` for a profile declaring `link_types`.
pub fn classify_fields(candidates: &[CandidateElement], link_types: &[String]) -> FieldMap {
    let identified: Vec<&CandidateElement> =
        candidates.iter().filter(|c| !c.signal.is_empty()).collect();

    let single_line: Vec<&CandidateElement> = identified
        .iter()
        .copied()
        .filter(|c| c.kind.is_single_line())
        .collect();

    let mut map = FieldMap::default();

    if !resolve_name_pair(&single_line, &mut map) {
        resolve_full_name(&single_line, &mut map);
    }
    resolve_contact_fields(&single_line, &mut map);
    resolve_link_fields(&single_line, link_types, &mut map);
    resolve_resume_fields(&identified, &mut map);
    annotate_question_sites(&identified, &mut map);

    map
}

/// Assigns first/last names when both sets are non-empty. Returns whether a pair was found.
///
/// An element that matches both patterns ("first and last name") belongs to neither set.
fn resolve_name_pair(candidates: &[&CandidateElement], map: &mut FieldMap) -> bool {
    let first = first_name_pattern();
    let last = last_name_pattern();

    let mut firsts = Vec::new();
    let mut lasts = Vec::new();
    for c in candidates {
        match (first.matches(&c.signal), last.matches(&c.signal)) {
            (true, false) => firsts.push(c.element),
            (false, true) => lasts.push(c.element),
            _ => {}
        }
    }

    if firsts.is_empty() || lasts.is_empty() {
        return false;
    }
    for element in firsts {
        map.assign(element, Role::FirstName);
    }
    for element in lasts {
        map.assign(element, Role::LastName);
    }
    true
}

fn resolve_full_name(candidates: &[&CandidateElement], map: &mut FieldMap) {
    let pattern = full_name_pattern();
    if let Some(element) = best_unassigned(candidates, &pattern, map) {
        map.assign(element, Role::FullName);
    }
}

fn resolve_contact_fields(candidates: &[&CandidateElement], map: &mut FieldMap) {
    for pattern in contact_patterns() {
        if let Some(element) = best_unassigned(candidates, &pattern, map) {
            map.assign(element, pattern.role.clone());
        }
    }
}

fn resolve_link_fields(candidates: &[&CandidateElement], link_types: &[String], map: &mut FieldMap) {
    for kind in link_types {
        let kind = kind.trim().to_lowercase();
        if kind.is_empty() || map.has_role(&Role::Link(kind.clone())) {
            continue;
        }
        let pattern = link_pattern(&kind);
        if let Some(element) = best_unassigned(candidates, &pattern, map) {
            map.assign(element, pattern.role.clone());
        }
    }
}

/// File inputs named for a resume, united with file inputs a resume label points at.
fn resume_candidates(candidates: &[&CandidateElement]) -> Vec<ElementId> {
    let pattern = resume_pattern();
    let mut found: Vec<ElementId> = Vec::new();

    let by_identity = candidates
        .iter()
        .filter(|c| c.kind == ElementKind::File && pattern.matches(&c.signal));
    let by_label = candidates.iter().filter(|c| {
        c.kind == ElementKind::File && c.linked_labels.iter().any(|l| pattern.matches(l))
    });

    for c in by_identity.chain(by_label) {
        if !found.contains(&c.element) {
            found.push(c.element);
        }
    }
    found
}

fn resolve_resume_fields(candidates: &[&CandidateElement], map: &mut FieldMap) {
    for element in resume_candidates(candidates) {
        map.assign(element, Role::ResumeFile);
    }
}

fn annotate_question_sites(candidates: &[&CandidateElement], map: &mut FieldMap) {
    for c in candidates.iter().filter(|c| c.kind == ElementKind::TextArea) {
        let question = c
            .label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_QUESTION)
            .to_string();
        map.assign(c.element, Role::FreeTextQuestion);
        map.questions.push(QuestionSite {
            element: c.element,
            question,
        });
    }
}

/// First unassigned candidate with a whole-token match, else the first embedded match.
fn best_unassigned(
    candidates: &[&CandidateElement],
    pattern: &RolePattern,
    map: &FieldMap,
) -> Option<ElementId> {
    let mut embedded: Option<ElementId> = None;
    for c in candidates.iter().filter(|c| !map.is_assigned(c.element)) {
        match pattern.strength(&c.signal) {
            Some(MatchStrength::Token) => return Some(c.element),
            Some(MatchStrength::Embedded) if embedded.is_none() => embedded = Some(c.element),
            _ => {}
        }
    }
    embedded
}
