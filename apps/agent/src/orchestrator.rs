//! Autofill Orchestrator: runs one fill pass over a page.
//!
//! Flow: fetch profile → resolve resume → description (cached) → classify →
//!       inject text roles → tailored resume (opt-in) → inject files →
//!       attach question controls → report.
//!
//! Only the profile fetch can fail the pass. Every later step degrades to a
//! per-field outcome.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::classifier::{classify_fields, collect_candidates, FieldMap};
use crate::dom::{Document, ElementId, FileBlob, Page};
use crate::errors::AgentError;
use crate::injector::{set_file_value, set_text_value};
use crate::lexicon::DEFAULT_QUESTION;
use crate::models::profile::{Profile, ProfileSnapshot, ResumePayload, ResumeSource};
use crate::models::role::Role;
use crate::session::PageContext;

pub const TAILORED_RESUME_FILENAME: &str = "tailored_resume.pdf";
pub const TEXT_RESUME_FILENAME: &str = "resume.txt";

// ────────────────────────────────────────────────────────────────────────────
// Report
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldOutcome {
    pub role: Role,
    pub element: ElementId,
    pub filled: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FillReport {
    /// Every attempted injection, in classification order.
    pub outcomes: Vec<FieldOutcome>,
    /// Profile values that found no field on the page.
    pub unmatched: Vec<Role>,
    pub question_sites: usize,
    pub resume_source: Option<ResumeSource>,
    pub job_description_chars: usize,
}

impl FillReport {
    pub fn filled_roles(&self) -> Vec<&Role> {
        self.outcomes.iter().filter(|o| o.filled).map(|o| &o.role).collect()
    }

    pub fn failed_roles(&self) -> Vec<&Role> {
        self.outcomes.iter().filter(|o| !o.filled).map(|o| &o.role).collect()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.filled).count()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fill pass
// ────────────────────────────────────────────────────────────────────────────

pub async fn run_fill(ctx: &PageContext<'_>, token: &str) -> Result<FillReport, AgentError> {
    // Step 1: profile (the only fatal step)
    let profile = ctx.backend.fetch_profile(token).await.map_err(|e| {
        warn!("Profile fetch failed: {}", e);
        AgentError::from(e)
    })?;

    // Step 2: resume fallback chain
    let resume = resolve_resume(ctx.backend, token).await;
    let snapshot = ProfileSnapshot { profile, resume };

    // Step 3: description, cached for the visit
    let job_description = ctx.job_description().await;

    // Step 4: classify once
    let candidates = collect_candidates(ctx.page);
    let map = classify_fields(&candidates, &snapshot.profile.link_types());
    info!(
        "Classified {} of {} fields on {}",
        map.assignments().len(),
        candidates.len(),
        ctx.session.host()
    );

    let mut report = FillReport {
        unmatched: unmatched_roles(&snapshot.profile, &map),
        question_sites: map.questions().len(),
        job_description_chars: job_description.chars().count(),
        ..FillReport::default()
    };

    // Step 5: text roles
    for assignment in map.assignments() {
        if matches!(assignment.role, Role::ResumeFile | Role::FreeTextQuestion) {
            continue;
        }
        let Some(value) = snapshot.profile.value_for(&assignment.role) else {
            debug!("No profile value for {}", assignment.role);
            continue;
        };
        let filled = set_text_value(ctx.page, assignment.element, &value);
        report.outcomes.push(FieldOutcome {
            role: assignment.role.clone(),
            element: assignment.element,
            filled,
        });
    }

    // Step 6: tailored resume replaces the payload when opted in
    let resume_fields = map.elements_for(&Role::ResumeFile);
    let mut resume = snapshot.resume;
    if !resume_fields.is_empty() && ctx.session.uses_tailored_resume(ctx.session.host()) {
        if let Some(tailored) = tailored_resume(ctx.backend, token, &job_description).await {
            resume = Some(tailored);
        }
    }

    // Step 7: files
    for element in resume_fields {
        let filled = match &resume {
            Some(payload) => set_file_value(ctx.page, element, &payload.file).await,
            None => false,
        };
        report.outcomes.push(FieldOutcome {
            role: Role::ResumeFile,
            element,
            filled,
        });
    }
    report.resume_source = resume.as_ref().map(|r| r.source);

    // Step 8: question controls
    attach_question_controls(ctx.page, &map);

    info!(
        "Fill finished: {} filled, {} failed, {} unmatched",
        report.filled_roles().len(),
        report.failures(),
        report.unmatched.len()
    );
    Ok(report)
}

/// original file → server-rendered PDF → raw text as `resume.txt`; each failure falls through.
pub async fn resolve_resume(backend: &dyn Backend, token: &str) -> Option<ResumePayload> {
    match backend.fetch_resume_file(token).await {
        Ok(file) if !file.is_empty() => {
            return Some(ResumePayload {
                source: ResumeSource::OriginalFile,
                file,
            })
        }
        Ok(_) => debug!("Stored resume file is empty"),
        Err(e) => debug!("No stored resume file: {}", e),
    }

    match backend.fetch_resume_pdf(token).await {
        Ok(file) if !file.is_empty() => {
            return Some(ResumePayload {
                source: ResumeSource::RenderedPdf,
                file,
            })
        }
        Ok(_) => debug!("Rendered resume PDF is empty"),
        Err(e) => debug!("No rendered resume PDF: {}", e),
    }

    match backend.fetch_resume_text(token).await {
        Ok(text) => Some(ResumePayload {
            source: ResumeSource::PlainText,
            file: FileBlob::new(TEXT_RESUME_FILENAME, "text/plain", text.into_bytes()),
        }),
        Err(e) => {
            warn!("No resume available: {}", e);
            None
        }
    }
}

async fn tailored_resume(
    backend: &dyn Backend,
    token: &str,
    job_description: &str,
) -> Option<ResumePayload> {
    let tailored = match backend.tailored_resume(token, job_description, false).await {
        Ok(t) if !t.resume_text.trim().is_empty() => t,
        Ok(_) => {
            warn!("Tailored resume came back empty");
            return None;
        }
        Err(e) => {
            warn!("Tailored resume generation failed: {}", e);
            return None;
        }
    };
    match backend
        .render_pdf(token, &tailored.resume_text, TAILORED_RESUME_FILENAME)
        .await
    {
        Ok(file) => Some(ResumePayload {
            source: ResumeSource::Tailored,
            file,
        }),
        Err(e) => {
            warn!("Tailored resume render failed: {}", e);
            None
        }
    }
}

/// Profile values with nowhere to go. Name counts as placed when any name role was assigned.
fn unmatched_roles(profile: &Profile, map: &FieldMap) -> Vec<Role> {
    let mut roles = vec![Role::FullName, Role::Email, Role::Phone, Role::Location];
    roles.extend(profile.link_types().into_iter().map(Role::Link));

    let name_placed = [Role::FirstName, Role::LastName, Role::FullName]
        .iter()
        .any(|r| map.has_role(r));

    roles
        .into_iter()
        .filter(|role| profile.value_for(role).is_some())
        .filter(|role| match role {
            Role::FullName => !name_placed,
            other => !map.has_role(other),
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Question sites
// ────────────────────────────────────────────────────────────────────────────

/// Attaches the fill control to each question site. Returns how many were newly attached.
pub fn attach_question_controls<P: Page + ?Sized>(page: &P, map: &FieldMap) -> usize {
    map.questions()
        .iter()
        .filter(|site| page.attach_fill_control(site.element))
        .count()
}

/// Question text for a site: its nearest label, else the default prompt.
pub fn question_for<D: Document + ?Sized>(doc: &D, element: ElementId) -> String {
    doc.nearest_label(element)
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_QUESTION.to_string())
}

/// Activation of a fill control: ask for an answer and inject it. Repeatable.
pub async fn answer_question(
    ctx: &PageContext<'_>,
    token: &str,
    element: ElementId,
    question: &str,
) -> bool {
    let job_description = ctx.job_description().await;
    let answer = match ctx
        .backend
        .custom_answer(token, &job_description, question)
        .await
    {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Custom answer failed for {:?}: {}", element, e);
            return false;
        }
    };
    if answer.trim().is_empty() {
        debug!("Empty answer for {:?}", element);
        return false;
    }
    set_text_value(ctx.page, element, &answer)
}
