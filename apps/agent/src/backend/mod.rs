/// Backend client: the single entry point for every call to the ApplyEase API.
///
/// RULE: no other module talks HTTP to the backend. The engine depends on the
/// `Backend` trait; `HttpBackend` is the production implementation.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::dom::FileBlob;
use crate::models::job::{MatchResult, TailoredResume, TrackedJob};
use crate::models::profile::{Profile, ProfileEnvelope};

pub const DEFAULT_RESUME_FILENAME: &str = "resume.pdf";
const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Response missing {0}")]
    Missing(&'static str),
}

/// Everything the engine asks of the backend. Every call carries the bearer token.
#[async_trait(?Send)]
pub trait Backend {
    async fn fetch_profile(&self, token: &str) -> Result<Profile, BackendError>;

    /// The originally uploaded resume file.
    async fn fetch_resume_file(&self, token: &str) -> Result<FileBlob, BackendError>;

    /// A server-rendered PDF of the stored resume.
    async fn fetch_resume_pdf(&self, token: &str) -> Result<FileBlob, BackendError>;

    /// The raw resume text.
    async fn fetch_resume_text(&self, token: &str) -> Result<String, BackendError>;

    async fn compute_match(&self, token: &str, job_description: &str)
        -> Result<MatchResult, BackendError>;

    async fn custom_answer(
        &self,
        token: &str,
        job_description: &str,
        question: &str,
    ) -> Result<String, BackendError>;

    async fn tailored_resume(
        &self,
        token: &str,
        job_description: &str,
        save: bool,
    ) -> Result<TailoredResume, BackendError>;

    async fn render_pdf(
        &self,
        token: &str,
        text: &str,
        filename: &str,
    ) -> Result<FileBlob, BackendError>;

    async fn track_job(&self, token: &str, job: &TrackedJob) -> Result<(), BackendError>;
}

#[derive(Debug, Serialize)]
struct MatchRequest<'a> {
    #[serde(rename = "jobDescription")]
    job_description: &'a str,
}

#[derive(Debug, Serialize)]
struct CustomAnswerRequest<'a> {
    #[serde(rename = "jobDescription")]
    job_description: &'a str,
    #[serde(rename = "applicationQuestion")]
    application_question: &'a str,
}

#[derive(Debug, Deserialize)]
struct CustomAnswerResponse {
    #[serde(default)]
    answer: Option<String>,
}

#[derive(Debug, Serialize)]
struct TailoredResumeRequest<'a> {
    #[serde(rename = "jobDescription")]
    job_description: &'a str,
    save: bool,
}

#[derive(Debug, Serialize)]
struct RenderPdfRequest<'a> {
    text: &'a str,
    filename: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResumeTextResponse {
    #[serde(default)]
    resume_text: Option<String>,
    #[serde(default)]
    resume: Option<String>,
}

/// reqwest-backed client for the ApplyEase API.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base: String,
}

impl HttpBackend {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str, token: &str) -> Result<Response, BackendError> {
        let response = self
            .client
            .get(self.endpoint(path))
            .bearer_auth(token)
            .send()
            .await?;
        check_status(path, response).await
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<Response, BackendError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        check_status(path, response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self.post(path, token, body).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// 401/403 become `Unauthorized`; any other non-2xx becomes `Api` with the body as message.
async fn check_status(path: &str, response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        warn!("Backend rejected the token on {}", path);
        return Err(BackendError::Unauthorized);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        debug!("Backend {} returned {}: {}", path, status, message);
        return Err(BackendError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

/// Filename from a `Content-Disposition` header (`filename=...`, quotes stripped).
pub fn filename_from_disposition(disposition: &str) -> Option<String> {
    let lower = disposition.to_ascii_lowercase();
    let start = lower.find("filename=")? + "filename=".len();
    let raw = disposition[start..].split(';').next().unwrap_or_default();
    let name = raw.replace('"', "").trim().to_string();
    (!name.is_empty()).then_some(name)
}

fn header_str(response: &Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait(?Send)]
impl Backend for HttpBackend {
    async fn fetch_profile(&self, token: &str) -> Result<Profile, BackendError> {
        let response = self.get("/user", token).await?;
        let bytes = response.bytes().await?;
        let envelope: ProfileEnvelope = serde_json::from_slice(&bytes)?;
        Ok(envelope.into_profile())
    }

    async fn fetch_resume_file(&self, token: &str) -> Result<FileBlob, BackendError> {
        let response = self.get("/resume_file", token).await?;
        let content_type = header_str(&response, header::CONTENT_TYPE)
            .unwrap_or_else(|| PDF_CONTENT_TYPE.to_string());
        let name = header_str(&response, header::CONTENT_DISPOSITION)
            .and_then(|d| filename_from_disposition(&d))
            .unwrap_or_else(|| DEFAULT_RESUME_FILENAME.to_string());
        let bytes = response.bytes().await?;
        Ok(FileBlob::new(name, content_type, bytes))
    }

    async fn fetch_resume_pdf(&self, token: &str) -> Result<FileBlob, BackendError> {
        let response = self.get("/resume_pdf", token).await?;
        let bytes = response.bytes().await?;
        Ok(FileBlob::new(DEFAULT_RESUME_FILENAME, PDF_CONTENT_TYPE, bytes))
    }

    async fn fetch_resume_text(&self, token: &str) -> Result<String, BackendError> {
        let response = self.get("/resume", token).await?;
        let bytes = response.bytes().await?;
        let body: ResumeTextResponse = serde_json::from_slice(&bytes)?;
        body.resume_text
            .or(body.resume)
            .filter(|t| !t.trim().is_empty())
            .ok_or(BackendError::Missing("resume text"))
    }

    async fn compute_match(
        &self,
        token: &str,
        job_description: &str,
    ) -> Result<MatchResult, BackendError> {
        let result: MatchResult = self
            .post_json("/match", token, &MatchRequest { job_description })
            .await?;
        debug!("Match computed: {:.1}%", result.percent);
        Ok(result)
    }

    async fn custom_answer(
        &self,
        token: &str,
        job_description: &str,
        question: &str,
    ) -> Result<String, BackendError> {
        let body = CustomAnswerRequest {
            job_description,
            application_question: question,
        };
        let response: CustomAnswerResponse =
            self.post_json("/custom-answer", token, &body).await?;
        Ok(response.answer.unwrap_or_default())
    }

    async fn tailored_resume(
        &self,
        token: &str,
        job_description: &str,
        save: bool,
    ) -> Result<TailoredResume, BackendError> {
        let body = TailoredResumeRequest {
            job_description,
            save,
        };
        self.post_json("/tailored_resume", token, &body).await
    }

    async fn render_pdf(
        &self,
        token: &str,
        text: &str,
        filename: &str,
    ) -> Result<FileBlob, BackendError> {
        let response = self
            .post("/render_pdf", token, &RenderPdfRequest { text, filename })
            .await?;
        let bytes = response.bytes().await?;
        Ok(FileBlob::new(filename, PDF_CONTENT_TYPE, bytes))
    }

    async fn track_job(&self, token: &str, job: &TrackedJob) -> Result<(), BackendError> {
        self.post("/jobs", token, job).await?;
        Ok(())
    }
}
