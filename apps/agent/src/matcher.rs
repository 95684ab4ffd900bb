//! Text Normalizer & Matcher: turns raw field identities into token signals and
//! decides which role keywords they satisfy.
//!
//! Matching is token-first: a keyword matches when every one of its tokens is
//! present as a whole token of the signal, in any order. Compound keywords
//! ("first name") may additionally match their joined form ("firstname")
//! embedded in the signal, but a whole-token hit always outranks an embedded
//! one. This is what keeps "last name" away from a "Last Login" field.

use crate::models::role::Role;

/// Normalized identity of a field: its tokens plus their separator-free concatenation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySignal {
    tokens: Vec<String>,
    compact: String,
}

impl IdentitySignal {
    pub fn new(raw: &str) -> Self {
        let tokens = tokenize(raw);
        let compact = tokens.concat();
        Self { tokens, compact }
    }

    /// Builds a signal from name, id and label, skipping absent parts.
    pub fn from_parts<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        let joined = parts.into_iter().flatten().collect::<Vec<_>>().join(" ");
        Self::new(&joined)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn compact(&self) -> &str {
        &self.compact
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }
}

/// Lower-cases and splits on non-alphanumeric separators and camelCase boundaries.
pub fn tokenize(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in raw.chars() {
        if !ch.is_alphanumeric() {
            flush(&mut tokens, &mut current);
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower {
            flush(&mut tokens, &mut current);
        }
        current.extend(ch.to_lowercase());
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
    }
    flush(&mut tokens, &mut current);
    tokens
}

fn flush(tokens: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

/// How strongly a keyword matched. Ordered so `Token > Embedded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchStrength {
    Embedded,
    Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Containment {
    /// Whole tokens only.
    Tokens,
    /// Whole tokens, or the joined form anywhere in the compact signal.
    Embedded,
}

#[derive(Debug, Clone)]
pub struct Keyword {
    tokens: Vec<String>,
    compact: String,
    containment: Containment,
}

impl Keyword {
    fn build(text: &str, containment: Containment) -> Self {
        let tokens = tokenize(text);
        let compact = tokens.concat();
        Self {
            tokens,
            compact,
            containment,
        }
    }

    /// Multi-word keyword; also matches its joined form ("first name" ~ "firstname").
    pub fn phrase(text: &str) -> Self {
        let containment = if tokenize(text).len() > 1 {
            Containment::Embedded
        } else {
            Containment::Tokens
        };
        Self::build(text, containment)
    }

    /// Must appear as a whole token ("cv", "tel", "fname").
    pub fn token(text: &str) -> Self {
        Self::build(text, Containment::Tokens)
    }

    /// May appear embedded in a longer token ("email" in "emailaddress").
    pub fn stem(text: &str) -> Self {
        Self::build(text, Containment::Embedded)
    }

    pub fn strength(&self, signal: &IdentitySignal) -> Option<MatchStrength> {
        if self.tokens.is_empty() || signal.is_empty() {
            return None;
        }
        if self.tokens.iter().all(|t| signal.has_token(t)) {
            Some(MatchStrength::Token)
        } else if self.containment == Containment::Embedded
            && signal.compact().contains(&self.compact)
        {
            Some(MatchStrength::Embedded)
        } else {
            None
        }
    }
}

/// Keywords that select a role, plus keywords that veto it.
#[derive(Debug, Clone)]
pub struct RolePattern {
    pub role: Role,
    keywords: Vec<Keyword>,
    excludes: Vec<Keyword>,
}

impl RolePattern {
    pub fn new(role: Role, keywords: Vec<Keyword>) -> Self {
        Self {
            role,
            keywords,
            excludes: Vec::new(),
        }
    }

    pub fn excluding(mut self, excludes: Vec<Keyword>) -> Self {
        self.excludes = excludes;
        self
    }

    pub fn strength(&self, signal: &IdentitySignal) -> Option<MatchStrength> {
        if self.excludes.iter().any(|k| k.strength(signal).is_some()) {
            return None;
        }
        self.keywords.iter().filter_map(|k| k.strength(signal)).max()
    }

    pub fn matches(&self, signal: &IdentitySignal) -> bool {
        self.strength(signal).is_some()
    }
}

/// Picks the role whose pattern matches `signal` most strongly; earlier patterns win ties.
pub fn classify_identity(signal: &IdentitySignal, patterns: &[RolePattern]) -> Option<Role> {
    let mut best: Option<(MatchStrength, &RolePattern)> = None;
    for pattern in patterns {
        if let Some(strength) = pattern.strength(signal) {
            if best.map_or(true, |(current, _)| strength > current) {
                best = Some((strength, pattern));
            }
        }
    }
    best.map(|(_, pattern)| pattern.role.clone())
}
