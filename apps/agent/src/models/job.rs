use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Externally computed resume/posting overlap. Word lists are sets; order carries no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub percent: f64,
    #[serde(rename = "matchingWords", default)]
    pub matching_words: BTreeSet<String>,
    #[serde(rename = "missingWords", default)]
    pub missing_words: BTreeSet<String>,
}

impl MatchResult {
    /// Percent clamped to 0–100 and rounded for display.
    pub fn display_percent(&self) -> u8 {
        if self.percent.is_nan() {
            return 0;
        }
        self.percent.clamp(0.0, 100.0).round() as u8
    }
}

/// `POST /tailored_resume` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailoredResume {
    pub resume_text: String,
    #[serde(default)]
    pub matching_words: Option<Vec<String>>,
    #[serde(default)]
    pub missing_words: Option<Vec<String>>,
}

/// Body of `POST /jobs`: one tracked application event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedJob {
    pub company: String,
    pub title: String,
    pub location: String,
    pub source: String,
    pub url: String,
    pub status: String,
    pub notes: String,
    pub jd_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_match_result_wire_names() {
        let result: MatchResult = serde_json::from_value(json!({
            "score": 0.71,
            "percent": 71.4,
            "matchingWords": ["rust", "tokio", "rust"],
            "missingWords": ["kafka"]
        }))
        .unwrap();
        assert_eq!(result.display_percent(), 71);
        assert_eq!(result.matching_words.len(), 2);
        assert!(result.missing_words.contains("kafka"));

        let back = serde_json::to_value(&result).unwrap();
        assert!(back.get("matchingWords").is_some());
    }

    #[test]
    fn test_display_percent_clamps() {
        let mut result = MatchResult {
            percent: 140.0,
            matching_words: BTreeSet::new(),
            missing_words: BTreeSet::new(),
        };
        assert_eq!(result.display_percent(), 100);
        result.percent = -3.0;
        assert_eq!(result.display_percent(), 0);
    }

    #[test]
    fn test_tailored_resume_optional_keyword_lists() {
        let tailored: TailoredResume =
            serde_json::from_value(json!({"resume_text": "Ada Lovelace\nAnalyst"})).unwrap();
        assert!(tailored.matching_words.is_none());
    }
}
