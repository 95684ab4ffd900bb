use serde::{Deserialize, Serialize};

use crate::dom::FileBlob;
use crate::models::role::Role;

/// One (type, url) pair from the user's profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkEntry {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// The user's form data as returned by `GET /user`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub urls: Option<Vec<LinkEntry>>,
}

/// `GET /user` answers either with the profile itself or wrapped as `{ "user": {...} }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ProfileEnvelope {
    Wrapped { user: Profile },
    Flat(Profile),
}

impl ProfileEnvelope {
    pub fn into_profile(self) -> Profile {
        match self {
            ProfileEnvelope::Wrapped { user } => user,
            ProfileEnvelope::Flat(profile) => profile,
        }
    }
}

impl Profile {
    pub fn links(&self) -> &[LinkEntry] {
        self.urls.as_deref().unwrap_or_default()
    }

    /// Distinct, lower-cased link types in profile order.
    pub fn link_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        for kind in self.links().iter().filter_map(|l| l.kind.as_deref()) {
            let kind = kind.trim().to_lowercase();
            if !kind.is_empty() && !types.contains(&kind) {
                types.push(kind);
            }
        }
        types
    }

    /// The value to inject for `role`, or `None` when the profile has nothing non-empty.
    pub fn value_for(&self, role: &Role) -> Option<String> {
        let value = match role {
            Role::FirstName => self.first_name.clone(),
            Role::LastName => self.last_name.clone(),
            Role::FullName => Some(
                format!(
                    "{} {}",
                    self.first_name.as_deref().unwrap_or_default(),
                    self.last_name.as_deref().unwrap_or_default()
                )
                .trim()
                .to_string(),
            ),
            Role::Email => self.email.clone(),
            Role::Phone => self.phone.clone(),
            Role::Location => self.location.clone(),
            Role::Link(kind) => self
                .links()
                .iter()
                .find(|l| {
                    l.kind
                        .as_deref()
                        .is_some_and(|k| k.trim().eq_ignore_ascii_case(kind))
                })
                .and_then(|l| l.url.clone()),
            Role::ResumeFile | Role::FreeTextQuestion => None,
        };
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Which step of the resume fallback chain produced the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeSource {
    OriginalFile,
    RenderedPdf,
    PlainText,
    Tailored,
}

#[derive(Debug, Clone)]
pub struct ResumePayload {
    pub source: ResumeSource,
    pub file: FileBlob,
}

/// Immutable per-fill snapshot: profile fields plus the resolved resume.
#[derive(Debug, Clone)]
pub struct ProfileSnapshot {
    pub profile: Profile,
    pub resume: Option<ResumePayload>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ada() -> Profile {
        serde_json::from_value(json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@x.com",
            "phone": null,
            "urls": [
                {"type": "LinkedIn", "url": "https://li/ada"},
                {"type": "github", "url": "https://gh/ada"},
                {"type": "linkedin", "url": "https://li/dup"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_envelope_accepts_wrapped_and_flat() {
        let wrapped: ProfileEnvelope =
            serde_json::from_value(json!({"user": {"first_name": "Ada"}})).unwrap();
        let flat: ProfileEnvelope = serde_json::from_value(json!({"first_name": "Ada"})).unwrap();
        assert_eq!(wrapped.into_profile().first_name.as_deref(), Some("Ada"));
        assert_eq!(flat.into_profile().first_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_link_types_are_distinct_and_lowercased() {
        assert_eq!(ada().link_types(), vec!["linkedin", "github"]);
    }

    #[test]
    fn test_value_for_roles() {
        let profile = ada();
        assert_eq!(profile.value_for(&Role::FullName).as_deref(), Some("Ada Lovelace"));
        assert_eq!(
            profile.value_for(&Role::Link("linkedin".to_string())).as_deref(),
            Some("https://li/ada")
        );
        assert_eq!(profile.value_for(&Role::Phone), None);
        assert_eq!(profile.value_for(&Role::ResumeFile), None);
    }

    #[test]
    fn test_full_name_with_missing_parts() {
        let profile = Profile {
            last_name: Some("Lovelace".to_string()),
            ..Profile::default()
        };
        assert_eq!(profile.value_for(&Role::FullName).as_deref(), Some("Lovelace"));
        assert_eq!(Profile::default().value_for(&Role::FullName), None);
    }

    #[test]
    fn test_null_urls_yield_no_links() {
        let profile: Profile = serde_json::from_value(json!({"urls": null})).unwrap();
        assert!(profile.links().is_empty());
    }
}
