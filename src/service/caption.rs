//! Caption and hashtag generation.
//!
//! Output is byte-stable:
//!
//! ```text
//! 🚨 Recall Alert! 🚨
//! {brand} is recalling {description} {reason clause}. {safety advice}
//! 🔗 More info: {detail url}
//! {hashtags...} {fixed block}
//! ```

use crate::domain::models::RecallRecord;
use crate::domain::settings::{AdviceRule, RecallSettings, TagRule};

const MARKER: &str = "due to";
const FALLBACK_PREFIX: &str = "due to a safety concern: ";

#[derive(Debug, Clone)]
pub struct CaptionGenerator {
    tags: Vec<TagRule>,
    fixed_hashtags: String,
    advice: Vec<AdviceRule>,
    default_advice: String,
}

impl CaptionGenerator {
    pub fn new(settings: &RecallSettings) -> Self {
        Self::from_rules(
            settings.allergen_tags.clone(),
            settings.fixed_hashtags.clone(),
            settings.safety_advice.clone(),
            settings.default_safety_advice.clone(),
        )
    }

    pub fn from_rules(
        tags: Vec<TagRule>,
        fixed_hashtags: String,
        advice: Vec<AdviceRule>,
        default_advice: String,
    ) -> Self {
        let lower = |s: String| s.to_lowercase();
        Self {
            tags: tags
                .into_iter()
                .map(|t| TagRule {
                    keyword: lower(t.keyword),
                    hashtag: t.hashtag,
                })
                .collect(),
            fixed_hashtags: fixed_hashtags.trim().to_string(),
            advice: advice
                .into_iter()
                .map(|a| AdviceRule {
                    keyword: lower(a.keyword),
                    advice: a.advice,
                })
                .collect(),
            default_advice,
        }
    }

    /// `"due to ..."` built from the text after the first "due to" marker,
    /// or a generic safety-concern clause around the raw reason.
    pub fn reason_clause(raw_reason: &str) -> String {
        // ASCII lowercasing keeps byte offsets aligned with `raw_reason`.
        let lower = raw_reason.to_ascii_lowercase();
        match lower.find(MARKER) {
            Some(idx) => format!("{MARKER} {}", raw_reason[idx + MARKER.len()..].trim()),
            None => format!("{FALLBACK_PREFIX}{raw_reason}"),
        }
    }

    /// Hashtags for every keyword present in `clause`, once each, in rule order.
    pub fn hashtags<'a>(&'a self, clause: &str) -> Vec<&'a str> {
        let clause = clause.to_lowercase();
        let mut out: Vec<&str> = Vec::new();
        for rule in &self.tags {
            if clause.contains(&rule.keyword) && !out.contains(&rule.hashtag.as_str()) {
                out.push(&rule.hashtag);
            }
        }
        out
    }

    /// First advice rule whose keyword appears in `clause`, else the default.
    pub fn safety_advice<'a>(&'a self, clause: &str) -> &'a str {
        let clause = clause.to_lowercase();
        self.advice
            .iter()
            .find(|rule| clause.contains(&rule.keyword))
            .map(|rule| rule.advice.as_str())
            .unwrap_or(&self.default_advice)
    }

    pub fn caption(&self, record: &RecallRecord) -> String {
        let clause = Self::reason_clause(&record.recall_reason);
        let advice = self.safety_advice(&clause);

        let mut tag_line: Vec<&str> = self.hashtags(&clause);
        if !self.fixed_hashtags.is_empty() {
            tag_line.push(&self.fixed_hashtags);
        }

        format!(
            "🚨 Recall Alert! 🚨\n{} is recalling {} {}. {}\n🔗 More info: {}\n{}",
            record.brand_name,
            record.product_description,
            clause,
            advice,
            record.detail_page_url,
            tag_line.join(" ")
        )
    }

    pub fn finalize(&self, record: RecallRecord) -> RecallRecord {
        let caption = self.caption(&record);
        record.finalize(caption)
    }
}
