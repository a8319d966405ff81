//! Upload readiness rules for stored titles and descriptions.
//!
//! Stored values only have to pass their field validator. Whether an item
//! can actually be uploaded is a stricter, read-only question answered by
//! a chain of [`UploadRule`]s. A field that is missing or blank reports
//! only that it is required; the other rules for it are skipped.

use crate::core::{Record, Result, StoreError};
use crate::registry::FieldKind;
use regex::Regex;
use serde::Serialize;

pub const TITLE_MAX_LENGTH: usize = 100;
pub const DESCRIPTION_MAX_LENGTH: usize = 5000;
pub const MAX_CONSECUTIVE_CAPS: usize = 10;
pub const MAX_PUNCTUATION: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleViolation {
    pub field: FieldKind,
    pub message: String,
}

/// One check applied to the trimmed value of a present field.
pub trait UploadRule: Send + Sync {
    fn check(&self, value: &str) -> std::result::Result<(), String>;
}

#[derive(Debug, Clone, Copy)]
pub struct MaxLengthRule {
    pub max: usize,
}

impl UploadRule for MaxLengthRule {
    fn check(&self, value: &str) -> std::result::Result<(), String> {
        if value.chars().count() > self.max {
            return Err(format!("must be {} characters or less", self.max));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConsecutiveCapsRule {
    max: usize,
    pattern: Regex,
}

impl ConsecutiveCapsRule {
    pub fn new(max: usize) -> Result<Self> {
        let pattern = Regex::new(&format!("[A-Z]{{{},}}", max))
            .map_err(|e| StoreError::InvalidConfig(format!("caps rule: {}", e)))?;
        Ok(Self { max, pattern })
    }
}

impl UploadRule for ConsecutiveCapsRule {
    fn check(&self, value: &str) -> std::result::Result<(), String> {
        if self.pattern.is_match(value) {
            return Err(format!(
                "contains too many consecutive capital letters (max: {})",
                self.max
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PunctuationRule {
    pub max: usize,
}

impl UploadRule for PunctuationRule {
    fn check(&self, value: &str) -> std::result::Result<(), String> {
        let exclamations = value.matches('!').count();
        let questions = value.matches('?').count();
        if exclamations > self.max || questions > self.max {
            return Err(format!(
                "contains too many punctuation marks (max: {})",
                self.max
            ));
        }
        Ok(())
    }
}

pub struct UploadRules {
    required: Vec<FieldKind>,
    rules: Vec<(FieldKind, Box<dyn UploadRule>)>,
}

impl UploadRules {
    pub fn new(required: Vec<FieldKind>) -> Self {
        Self {
            required,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, field: FieldKind, rule: impl UploadRule + 'static) -> Self {
        self.rules.push((field, Box::new(rule)));
        self
    }

    /// YouTube's limits for titles and descriptions.
    pub fn youtube() -> Result<Self> {
        Ok(Self::new(vec![FieldKind::Title, FieldKind::Description])
            .with_rule(FieldKind::Title, MaxLengthRule { max: TITLE_MAX_LENGTH })
            .with_rule(FieldKind::Title, ConsecutiveCapsRule::new(MAX_CONSECUTIVE_CAPS)?)
            .with_rule(FieldKind::Title, PunctuationRule { max: MAX_PUNCTUATION })
            .with_rule(
                FieldKind::Description,
                MaxLengthRule {
                    max: DESCRIPTION_MAX_LENGTH,
                },
            ))
    }

    /// All violations for one item's record, in rule order. An absent
    /// record is treated as empty.
    pub fn check(&self, record: Option<&Record>) -> Vec<RuleViolation> {
        let value_of = |field: FieldKind| {
            record
                .and_then(|record| record.get(field.key()))
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let mut violations = Vec::new();
        for field in &self.required {
            if value_of(*field).is_none() {
                violations.push(RuleViolation {
                    field: *field,
                    message: "is required".to_string(),
                });
            }
        }

        for (field, rule) in &self.rules {
            let Some(value) = value_of(*field) else {
                continue;
            };
            if let Err(message) = rule.check(value) {
                violations.push(RuleViolation {
                    field: *field,
                    message,
                });
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, description: &str) -> Record {
        [("title", title), ("description", description)]
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .collect()
    }

    #[test]
    fn test_valid_record_has_no_violations() {
        let rules = UploadRules::youtube().unwrap();
        let record = record("My holiday clip", "Filmed in the Alps.");
        assert!(rules.check(Some(&record)).is_empty());
    }

    #[test]
    fn test_missing_fields_are_required() {
        let rules = UploadRules::youtube().unwrap();
        let violations = rules.check(None);
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.message == "is required"));
    }

    #[test]
    fn test_title_limits() {
        let rules = UploadRules::youtube().unwrap();

        let long = "a".repeat(TITLE_MAX_LENGTH + 1);
        let violations = rules.check(Some(&record(&long, "ok")));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, FieldKind::Title);

        let shouting = rules.check(Some(&record("THIS IS AMAZINGGGGGG", "ok")));
        assert_eq!(shouting.len(), 1);
        assert!(shouting[0].message.contains("capital"));

        let excited = rules.check(Some(&record("wow!!!!", "ok")));
        assert_eq!(excited.len(), 1);
        assert!(excited[0].message.contains("punctuation"));

        assert!(rules.check(Some(&record("wow!!! really???", "ok"))).is_empty());
    }

    #[test]
    fn test_description_length_counts_characters() {
        let rules = UploadRules::youtube().unwrap();
        let exactly_max = "é".repeat(DESCRIPTION_MAX_LENGTH);
        assert!(rules.check(Some(&record("t", &exactly_max))).is_empty());

        let too_long = "é".repeat(DESCRIPTION_MAX_LENGTH + 1);
        let violations = rules.check(Some(&record("t", &too_long)));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, FieldKind::Description);
    }
}
