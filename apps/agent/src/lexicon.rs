//! Selector and keyword tables.
//!
//! These are hand-maintained per hosting platform and drift as third-party
//! markup changes. The algorithms elsewhere only walk them in order; edit the
//! tables here, not the code that consumes them.

use crate::matcher::{Keyword, RolePattern};
use crate::models::role::Role;

/// A group of structural selectors for one hiring-platform family.
#[derive(Debug, Clone, Copy)]
pub struct SelectorGroup {
    pub platform: &'static str,
    /// Host fragments that promote this group ahead of the generic order.
    pub hosts: &'static [&'static str],
    /// CSS selector list; the first element matching any of them is used.
    pub selectors: &'static str,
}

impl SelectorGroup {
    pub fn applies_to(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| host.contains(h))
    }
}

pub const JOB_DESCRIPTION_SELECTORS: &[SelectorGroup] = &[
    SelectorGroup {
        platform: "indeed",
        hosts: &["indeed."],
        selectors: "[data-qa='job-description']",
    },
    SelectorGroup {
        platform: "linkedin",
        hosts: &["linkedin.com"],
        selectors: "div.jobs-description__container, div.jobs-unified-top-card__content--two-pane",
    },
    SelectorGroup {
        platform: "linkedin",
        hosts: &["linkedin.com"],
        selectors: "div.jobs-box__html-content",
    },
    SelectorGroup {
        platform: "workday",
        hosts: &["myworkdayjobs.com", "workday"],
        selectors: "div[data-automation-id='jobPostingDescription'], [data-automation-id='jobPostingHeader'] ~ div",
    },
    SelectorGroup {
        platform: "lever",
        hosts: &["lever.co"],
        selectors: "div.posting div.content, div.section div.content",
    },
    SelectorGroup {
        platform: "greenhouse",
        hosts: &["greenhouse.io"],
        selectors: "section#content .content, .opening .content, .job .content, .content",
    },
    SelectorGroup {
        platform: "ashby",
        hosts: &["ashbyhq.com"],
        selectors: "div[data-ui='job-description'], [data-ui='job-view'], [data-testid='job-description']",
    },
    SelectorGroup {
        platform: "smartrecruiters",
        hosts: &["smartrecruiters.com", "indeed."],
        selectors: ".job-sections, .job-description, .description__text, #jobDescriptionText",
    },
    SelectorGroup {
        platform: "generic",
        hosts: &[],
        selectors: "article, main",
    },
];

pub const META_DESCRIPTION_SELECTOR: &str =
    "meta[name='description'], meta[property='og:description']";

pub const TITLE_SELECTORS: &[&str] = &[
    "h1[data-automation-id='jobPostingHeader']",
    ".jobs-unified-top-card__job-title",
    "h1.job-title, h1.title, h1",
    "[data-testid='job-title'], [data-qa='job-title']",
];

pub const COMPANY_SELECTORS: &[&str] = &[
    ".jobs-unified-top-card__company-name a, .jobs-unified-top-card__company-name",
    "a[data-tn-element='companyName'], .icl-u-lg-mr--sm",
    "[data-automation-id='companyName'], [data-company], [data-company-name]",
    ".company, .job-company, .posting-company, .topcard__org-name-link",
];

pub const LOCATION_SELECTORS: &[&str] = &[
    "[data-automation-id='job-location'], [data-qa='location']",
    ".jobs-unified-top-card__bullet, .job-location, .location",
];

/// Hosting platforms that show up in page titles but are never the employer.
pub const HOSTING_PLATFORMS: &[&str] = &[
    "linkedin",
    "indeed",
    "lever",
    "greenhouse",
    "workday",
    "ashby",
    "smartrecruiters",
];

/// Separators between the posting and the site name in a page title.
pub const TITLE_SITE_SEPARATORS: &[char] = &['|', '·'];

/// Separators between job title and company inside the posting part of a title.
pub const TITLE_PART_SEPARATORS: &[&str] = &[" - ", " – ", " — ", " at "];

/// Elements whose clicks may mean "I applied".
pub const APPLY_CONTROL_SELECTOR: &str = "button, input[type=submit], a, [role='button']";

pub const FILLABLE_SELECTOR: &str = "input, textarea";

/// Containers upload widgets listen on for drag-and-drop, most specific first.
pub const DROP_ZONE_SELECTORS: &[&str] = &[
    ".dropzone",
    "[data-testid*='drop']",
    "[data-qa*='drop']",
    "[data-automation-id*='drop']",
    ".upload-dropzone",
    ".file-dropzone",
    "[aria-label*='drop']",
];

/// Tokens that disqualify a field from the full-name interpretation.
pub const NAME_PART_TOKENS: &[&str] = &["first", "last", "given", "family", "surname"];

/// Words that make a "name" field about something other than the applicant.
pub const NAME_QUALIFIER_TOKENS: &[&str] = &[
    "company", "employer", "business", "organization", "organisation", "school",
    "university", "college", "user", "account", "reference", "referrer", "file",
    "middle", "nick", "preferred", "job", "project", "manager", "recruiter",
];

pub const DEFAULT_QUESTION: &str = "Application question";

pub fn first_name_pattern() -> RolePattern {
    RolePattern::new(
        Role::FirstName,
        vec![
            Keyword::phrase("first name"),
            Keyword::phrase("given name"),
            Keyword::stem("forename"),
            Keyword::token("fname"),
        ],
    )
}

pub fn last_name_pattern() -> RolePattern {
    RolePattern::new(
        Role::LastName,
        vec![
            Keyword::phrase("last name"),
            Keyword::phrase("family name"),
            Keyword::stem("surname"),
            Keyword::token("lname"),
        ],
    )
}

pub fn full_name_pattern() -> RolePattern {
    RolePattern::new(
        Role::FullName,
        vec![
            Keyword::phrase("full name"),
            Keyword::phrase("legal name"),
            Keyword::phrase("your name"),
            Keyword::token("name"),
        ],
    )
    .excluding(
        NAME_PART_TOKENS
            .iter()
            .map(|t| Keyword::stem(t))
            .chain(NAME_QUALIFIER_TOKENS.iter().map(|t| Keyword::token(t)))
            .collect(),
    )
}

/// Email, phone and location, in resolution order.
pub fn contact_patterns() -> Vec<RolePattern> {
    vec![
        RolePattern::new(
            Role::Email,
            vec![Keyword::stem("email"), Keyword::phrase("e mail")],
        ),
        RolePattern::new(
            Role::Phone,
            vec![
                Keyword::stem("phone"),
                Keyword::token("mobile"),
                Keyword::token("tel"),
            ],
        ),
        RolePattern::new(
            Role::Location,
            vec![
                Keyword::stem("location"),
                Keyword::token("city"),
                Keyword::stem("address"),
            ],
        )
        .excluding(vec![Keyword::stem("email"), Keyword::phrase("e mail")]),
    ]
}

pub fn resume_pattern() -> RolePattern {
    RolePattern::new(
        Role::ResumeFile,
        vec![
            Keyword::stem("resume"),
            Keyword::stem("résumé"),
            Keyword::token("cv"),
            Keyword::phrase("curriculum vitae"),
        ],
    )
}

/// Link fields match on the profile's own link type, embedded or whole.
pub fn link_pattern(kind: &str) -> RolePattern {
    RolePattern::new(Role::Link(kind.to_string()), vec![Keyword::stem(kind)])
}

/// Visible text of controls that submit or advance an application.
pub fn apply_control_keywords() -> Vec<Keyword> {
    vec![
        Keyword::stem("apply"),
        Keyword::stem("submit"),
        Keyword::phrase("send application"),
        Keyword::token("continue"),
        Keyword::token("next"),
    ]
}
