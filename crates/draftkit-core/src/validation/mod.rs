//! Step validation schemas
//!
//! A `StepSchema` lists the rules for the fields a step owns. Fields not named
//! in the schema are ignored by validation and never stripped from the values.

use regex::Regex;
use serde_json::{Map, Value};
use validator::{ValidateEmail, ValidateUrl};

use crate::error::{FieldErrors, WizardError};

#[derive(Debug, Clone)]
pub enum FieldRule {
    /// Present, not null, not blank, not an empty list
    Required,
    MinLength(usize),
    MaxLength(usize),
    /// Numeric bounds, inclusive. Numeric strings are accepted.
    Range {
        min: Option<f64>,
        max: Option<f64>,
    },
    Pattern {
        regex: Regex,
        message: String,
    },
    Email,
    Url,
    MinItems(usize),
}

impl FieldRule {
    pub fn pattern(pattern: &str, message: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(FieldRule::Pattern {
            regex: Regex::new(pattern)?,
            message: message.into(),
        })
    }

    /// Message for `value`, or `None` when the rule holds.
    fn check(&self, label: &str, value: &Value) -> Option<String> {
        match self {
            FieldRule::Required => is_blank(value).then(|| format!("{} is required", label)),
            FieldRule::MinLength(min) => match value.as_str() {
                Some(s) if s.chars().count() < *min => Some(format!(
                    "{} must be at least {} characters",
                    label, min
                )),
                Some(_) => None,
                None => Some(format!("{} must be text", label)),
            },
            FieldRule::MaxLength(max) => match value.as_str() {
                Some(s) if s.chars().count() > *max => Some(format!(
                    "{} must be at most {} characters",
                    label, max
                )),
                Some(_) => None,
                None => Some(format!("{} must be text", label)),
            },
            FieldRule::Range { min, max } => {
                let Some(number) = as_number(value) else {
                    return Some(format!("{} must be a number", label));
                };
                if let Some(min) = min {
                    if number < *min {
                        return Some(format!("{} must be at least {}", label, min));
                    }
                }
                if let Some(max) = max {
                    if number > *max {
                        return Some(format!("{} must be at most {}", label, max));
                    }
                }
                None
            }
            FieldRule::Pattern { regex, message } => match value.as_str() {
                Some(s) if regex.is_match(s) => None,
                _ => Some(message.clone()),
            },
            FieldRule::Email => match value.as_str() {
                Some(s) if s.validate_email() => None,
                _ => Some(format!("{} must be a valid email address", label)),
            },
            FieldRule::Url => match value.as_str() {
                Some(s) if s.validate_url() => None,
                _ => Some(format!("{} must be a valid URL", label)),
            },
            FieldRule::MinItems(min) => match value.as_array() {
                Some(items) if items.len() < *min => Some(format!(
                    "{} needs at least {} item(s)",
                    label, min
                )),
                Some(_) => None,
                None => Some(format!("{} must be a list", label)),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct FieldSchema {
    name: String,
    label: String,
    rules: Vec<FieldRule>,
}

/// Rules for the fields one step owns.
#[derive(Debug, Clone, Default)]
pub struct StepSchema {
    fields: Vec<FieldSchema>,
}

impl StepSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(self, name: &str, rules: impl IntoIterator<Item = FieldRule>) -> Self {
        let label = humanize(name);
        self.labelled(name, &label, rules)
    }

    pub fn labelled(
        mut self,
        name: &str,
        label: &str,
        rules: impl IntoIterator<Item = FieldRule>,
    ) -> Self {
        self.fields.push(FieldSchema {
            name: name.to_string(),
            label: label.to_string(),
            rules: rules.into_iter().collect(),
        });
        self
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Run every rule against `values`.
    ///
    /// Rules other than `Required` are skipped for absent or blank values so an
    /// optional field may stay empty.
    pub fn validate(&self, values: &Map<String, Value>) -> ValidationResult {
        let mut errors = FieldErrors::new();

        for field in &self.fields {
            let value = values.get(&field.name).unwrap_or(&Value::Null);
            let blank = is_blank(value);

            let messages: Vec<String> = field
                .rules
                .iter()
                .filter(|rule| matches!(rule, FieldRule::Required) || !blank)
                .filter_map(|rule| rule.check(&field.label, value))
                .collect();

            if !messages.is_empty() {
                errors.insert(field.name.clone(), messages);
            }
        }

        ValidationResult { errors }
    }
}

/// Outcome of validating one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: FieldErrors,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), WizardError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(WizardError::Validation(self.errors))
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// "businessGoal" -> "Business goal"
fn humanize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for (i, c) in name.chars().enumerate() {
        if i == 0 {
            out.extend(c.to_uppercase());
        } else if c == '_' {
            out.push(' ');
        } else {
            if c.is_uppercase() && prev_lower {
                out.push(' ');
            }
            out.extend(c.to_lowercase());
        }
        prev_lower = c.is_lowercase();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_required_field_missing() {
        let schema = StepSchema::new().field("name", [FieldRule::Required]);
        let result = schema.validate(&values(json!({})));
        assert!(!result.is_ok());
        assert_eq!(result.errors["name"], vec!["Name is required".to_string()]);

        let result = schema.validate(&values(json!({"name": "   "})));
        assert!(!result.is_ok());
    }

    #[test]
    fn test_optional_rules_skip_blank_values() {
        let schema = StepSchema::new()
            .field("contactEmail", [FieldRule::Email])
            .field("budget", [FieldRule::Range { min: Some(0.0), max: None }]);
        assert!(schema.validate(&values(json!({"contactEmail": ""}))).is_ok());
    }

    #[test]
    fn test_email_and_url() {
        let schema = StepSchema::new()
            .field("contactEmail", [FieldRule::Email])
            .field("landingPage", [FieldRule::Url]);

        let result = schema.validate(&values(json!({
            "contactEmail": "not-an-email",
            "landingPage": "https://example.com/launch"
        })));
        assert_eq!(
            result.errors["contactEmail"],
            vec!["Contact email must be a valid email address".to_string()]
        );
        assert!(!result.errors.contains_key("landingPage"));
    }

    #[test]
    fn test_length_and_range() {
        let schema = StepSchema::new()
            .field("name", [FieldRule::MinLength(3), FieldRule::MaxLength(5)])
            .field("budget", [FieldRule::Range { min: Some(10.0), max: Some(20.0) }]);

        let result = schema.validate(&values(json!({"name": "ab", "budget": "25"})));
        assert_eq!(result.errors["name"].len(), 1);
        assert_eq!(
            result.errors["budget"],
            vec!["Budget must be at most 20".to_string()]
        );

        assert!(schema
            .validate(&values(json!({"name": "abcd", "budget": 15})))
            .is_ok());
    }

    #[test]
    fn test_pattern_rule() {
        let schema = StepSchema::new().field(
            "hashtag",
            [FieldRule::pattern(r"^#\w+$", "Hashtag must start with #").unwrap()],
        );
        let result = schema.validate(&values(json!({"hashtag": "launch"})));
        assert_eq!(
            result.errors["hashtag"],
            vec!["Hashtag must start with #".to_string()]
        );
    }

    #[test]
    fn test_min_items_and_unknown_fields_ignored() {
        let schema = StepSchema::new().field("assets", [FieldRule::Required, FieldRule::MinItems(1)]);
        let result = schema.validate(&values(json!({"assets": [], "serverOnly": 1})));
        assert!(result.errors.contains_key("assets"));
        assert!(!result.errors.contains_key("serverOnly"));

        let ok = schema.validate(&values(json!({"assets": [{"id": "a"}]})));
        assert!(ok.into_result().is_ok());
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("businessGoal"), "Business goal");
        assert_eq!(humanize("start_date"), "Start date");
        assert_eq!(humanize("primaryKPI"), "Primary kpi");
    }
}
