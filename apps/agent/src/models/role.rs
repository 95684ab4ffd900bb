use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic category a form field may be classified into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    FirstName,
    LastName,
    FullName,
    Email,
    Phone,
    Location,
    /// Profile link of an open-ended type ("linkedin", "github", "portfolio", ...).
    Link(String),
    ResumeFile,
    FreeTextQuestion,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::FirstName => write!(f, "first_name"),
            Role::LastName => write!(f, "last_name"),
            Role::FullName => write!(f, "full_name"),
            Role::Email => write!(f, "email"),
            Role::Phone => write!(f, "phone"),
            Role::Location => write!(f, "location"),
            Role::Link(kind) => write!(f, "link[{kind}]"),
            Role::ResumeFile => write!(f, "resume_file"),
            Role::FreeTextQuestion => write!(f, "free_text_question"),
        }
    }
}
