//! Intent classification.
//!
//! Scores a question against a [`RuleTable`] and reports the winning
//! category, the union of implied data requirements, and a confidence.
//! Classification never fails: unmatched questions fall back to "general".

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::rules::RuleTable;
use crate::types::{AnalysisResult, DataRequirement, Requirements};

/// Fallback category when no rule matches.
pub const GENERAL_CATEGORY: &str = "general";
/// Confidence reported for the fallback.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;
/// Confidence multiplier when facility data is required but no facility was given.
pub const MISSING_FACILITY_PENALTY: f64 = 0.7;
/// Time window used when the question gives no hint.
pub const DEFAULT_TIME_RANGE_MONTHS: u32 = 6;

static TIME_RANGE_RULES: LazyLock<Vec<(Regex, u32)>> = LazyLock::new(|| {
    [
        (r"(?i)\b(recent|last|current|latest)\b", 3),
        (r"(?i)\b(trends?|historical|over\s+time)\b", 12),
        (r"(?i)\b(year|annual|yearly)\b", 12),
        (r"(?i)\b(month|monthly)\b", 6),
    ]
    .into_iter()
    .map(|(pat, months)| (Regex::new(pat).expect("Invalid time range regex"), months))
    .collect()
});

/// Suggest a historical window in months from temporal words in the question.
///
/// First matching rule wins.
pub fn infer_time_range(question: &str) -> u32 {
    TIME_RANGE_RULES
        .iter()
        .find(|(re, _)| re.is_match(question))
        .map(|(_, months)| *months)
        .unwrap_or(DEFAULT_TIME_RANGE_MONTHS)
}

/// Keyword scoring classifier over a rule table.
pub struct IntentClassifier {
    table: RuleTable,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(RuleTable::standard())
    }
}

impl IntentClassifier {
    pub fn new(table: RuleTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Classify a question.
    ///
    /// `has_facility_id` lowers confidence when the question needs data
    /// but the caller gave no facility to fetch it for.
    pub fn classify(&self, question: &str, has_facility_id: bool) -> AnalysisResult {
        let time_range = infer_time_range(question);
        let word_count = question.split_whitespace().count().max(1);

        let mut scored: Vec<(&str, f64)> = Vec::new();
        let mut requirements = Requirements::new();
        let mut best: Option<(&str, f64)> = None;

        for rule in self.table.rules() {
            let score = rule.score(question);
            if score <= 0.0 {
                continue;
            }
            scored.push((rule.name, score));
            requirements.extend(rule.requirements.iter().copied());
            // strict comparison keeps the earlier category on ties
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((rule.name, score));
            }
        }

        let Some((category, score)) = best else {
            debug!(word_count, "No category matched, falling back to general");
            return AnalysisResult {
                question_type: GENERAL_CATEGORY.to_string(),
                data_requirements: [DataRequirement::None].into_iter().collect(),
                confidence: FALLBACK_CONFIDENCE,
                reasoning: "No specific patterns matched, defaulting to general".to_string(),
                suggested_time_range_months: Some(time_range),
            };
        };

        if requirements.len() > 1 {
            requirements.remove(&DataRequirement::None);
        }

        let mut confidence = (score / word_count as f64).min(1.0);
        let needs_data = !requirements.contains(&DataRequirement::None);
        if needs_data && !has_facility_id {
            confidence *= MISSING_FACILITY_PENALTY;
        }

        let reasoning = format!(
            "Matched patterns: {}",
            scored
                .iter()
                .map(|(name, s)| format!("{name} (score: {s:.2})"))
                .collect::<Vec<_>>()
                .join(", ")
        );

        debug!(
            category,
            score,
            confidence,
            requirements = ?requirements,
            "Question classified"
        );

        AnalysisResult {
            question_type: category.to_string(),
            data_requirements: requirements,
            confidence,
            reasoning,
            suggested_time_range_months: Some(time_range),
        }
    }
}
