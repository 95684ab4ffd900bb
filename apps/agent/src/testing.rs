//! In-memory collaborators for unit tests.

use std::cell::{Cell, RefCell};

use async_trait::async_trait;
use url::Url;

use crate::backend::{Backend, BackendError};
use crate::dom::FileBlob;
use crate::errors::AgentError;
use crate::extractor::MarkupSource;
use crate::models::job::{MatchResult, TailoredResume, TrackedJob};
use crate::models::profile::{LinkEntry, Profile};

pub fn ada_profile() -> Profile {
    Profile {
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        email: Some("ada@x.com".to_string()),
        phone: None,
        location: None,
        urls: Some(vec![LinkEntry {
            kind: Some("linkedin".to_string()),
            url: Some("https://li/ada".to_string()),
        }]),
    }
}

fn not_found() -> BackendError {
    BackendError::Api {
        status: 404,
        message: "not found".to_string(),
    }
}

/// Backend answering from fixed data and recording every call.
#[derive(Default)]
pub struct FakeBackend {
    profile: Profile,
    unauthorized: bool,
    resume_file: Option<String>,
    empty_resume_file: bool,
    resume_pdf: Option<String>,
    resume_text: Option<String>,
    match_percent: Option<f64>,
    answer: String,
    tailored_text: Option<String>,
    fail_render: bool,
    fail_tracking: bool,
    calls: RefCell<Vec<&'static str>>,
    questions: RefCell<Vec<String>>,
    tracked: RefCell<Vec<TrackedJob>>,
    match_descriptions: RefCell<Vec<String>>,
}

impl FakeBackend {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    pub fn unauthorized(mut self) -> Self {
        self.unauthorized = true;
        self
    }

    pub fn with_resume_file(mut self, name: &str) -> Self {
        self.resume_file = Some(name.to_string());
        self
    }

    /// Stored original file that exists but has no bytes.
    pub fn with_empty_resume_file(mut self, name: &str) -> Self {
        self.resume_file = Some(name.to_string());
        self.empty_resume_file = true;
        self
    }

    pub fn with_resume_pdf(mut self, name: &str) -> Self {
        self.resume_pdf = Some(name.to_string());
        self
    }

    pub fn with_resume_text(mut self, text: &str) -> Self {
        self.resume_text = Some(text.to_string());
        self
    }

    pub fn with_match(mut self, percent: f64) -> Self {
        self.match_percent = Some(percent);
        self
    }

    pub fn with_answer(mut self, answer: &str) -> Self {
        self.answer = answer.to_string();
        self
    }

    pub fn with_tailored_text(mut self, text: &str) -> Self {
        self.tailored_text = Some(text.to_string());
        self
    }

    pub fn failing_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    pub fn failing_tracking(mut self) -> Self {
        self.fail_tracking = true;
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.borrow().clone()
    }

    pub fn tracked(&self) -> Vec<TrackedJob> {
        self.tracked.borrow().clone()
    }

    pub fn match_descriptions(&self) -> Vec<String> {
        self.match_descriptions.borrow().clone()
    }

    fn record(&self, call: &'static str) -> Result<(), BackendError> {
        self.calls.borrow_mut().push(call);
        if self.unauthorized {
            return Err(BackendError::Unauthorized);
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Backend for FakeBackend {
    async fn fetch_profile(&self, _token: &str) -> Result<Profile, BackendError> {
        // Profile fetches are not recorded; tests assert on the calls that follow.
        if self.unauthorized {
            return Err(BackendError::Unauthorized);
        }
        Ok(self.profile.clone())
    }

    async fn fetch_resume_file(&self, _token: &str) -> Result<FileBlob, BackendError> {
        self.record("resume_file")?;
        let name = self.resume_file.clone().ok_or_else(not_found)?;
        let bytes = if self.empty_resume_file {
            Vec::new()
        } else {
            b"%PDF-original".to_vec()
        };
        Ok(FileBlob::new(name, "application/pdf", bytes))
    }

    async fn fetch_resume_pdf(&self, _token: &str) -> Result<FileBlob, BackendError> {
        self.record("resume_pdf")?;
        let name = self.resume_pdf.clone().ok_or_else(not_found)?;
        Ok(FileBlob::new(name, "application/pdf", b"%PDF-rendered".to_vec()))
    }

    async fn fetch_resume_text(&self, _token: &str) -> Result<String, BackendError> {
        self.record("resume_text")?;
        self.resume_text.clone().ok_or(BackendError::Missing("resume text"))
    }

    async fn compute_match(
        &self,
        _token: &str,
        job_description: &str,
    ) -> Result<MatchResult, BackendError> {
        self.record("match")?;
        self.match_descriptions
            .borrow_mut()
            .push(job_description.to_string());
        let percent = self.match_percent.ok_or_else(not_found)?;
        Ok(MatchResult {
            percent,
            matching_words: ["rust".to_string()].into_iter().collect(),
            missing_words: ["kafka".to_string()].into_iter().collect(),
        })
    }

    async fn custom_answer(
        &self,
        _token: &str,
        _job_description: &str,
        question: &str,
    ) -> Result<String, BackendError> {
        self.record("custom_answer")?;
        self.questions.borrow_mut().push(question.to_string());
        Ok(self.answer.clone())
    }

    async fn tailored_resume(
        &self,
        _token: &str,
        _job_description: &str,
        _save: bool,
    ) -> Result<TailoredResume, BackendError> {
        self.record("tailored_resume")?;
        let resume_text = self.tailored_text.clone().ok_or_else(not_found)?;
        Ok(TailoredResume {
            resume_text,
            matching_words: None,
            missing_words: None,
        })
    }

    async fn render_pdf(
        &self,
        _token: &str,
        text: &str,
        filename: &str,
    ) -> Result<FileBlob, BackendError> {
        self.record("render_pdf")?;
        if self.fail_render {
            return Err(BackendError::Api {
                status: 500,
                message: "render failed".to_string(),
            });
        }
        Ok(FileBlob::new(filename, "application/pdf", text.as_bytes().to_vec()))
    }

    async fn track_job(&self, _token: &str, job: &TrackedJob) -> Result<(), BackendError> {
        self.record("track_job")?;
        self.tracked.borrow_mut().push(job.clone());
        if self.fail_tracking {
            return Err(BackendError::Api {
                status: 500,
                message: "db down".to_string(),
            });
        }
        Ok(())
    }
}

/// Markup source serving one fixed document, or failing like a dropped connection.
pub struct FakeMarkupSource {
    markup: Option<String>,
    fetches: Cell<usize>,
}

impl FakeMarkupSource {
    pub fn new(markup: Option<String>) -> Self {
        Self {
            markup,
            fetches: Cell::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

#[async_trait(?Send)]
impl MarkupSource for FakeMarkupSource {
    async fn fetch_page(&self, page_url: &Url) -> Result<String, AgentError> {
        self.fetches.set(self.fetches.get() + 1);
        self.markup
            .clone()
            .ok_or_else(|| AgentError::Markup(format!("connection reset fetching {page_url}")))
    }
}
