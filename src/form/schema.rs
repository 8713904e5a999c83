//! Schema definitions for multi-step forms

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use super::FieldKey;

/// A complete form: ordered steps plus the per-field rule table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSchema {
    /// Stable form key (e.g. "teacher-registration"), also used for the draft key
    pub key: String,
    /// Display name of the form
    pub name: String,
    /// Brief description shown before the first step
    #[serde(default)]
    pub description: String,
    /// Ordered steps, ids 1..=N
    pub steps: Vec<StepDefinition>,
    /// Rule for every field used by the steps
    pub fields: Vec<FieldRule>,
}

/// One screen of the wizard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: u32,
    pub name: String,
    pub fields: Vec<FieldKey>,
    /// Rules spanning several fields of this step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<StepConstraint>,
}

/// Kind of input a field accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text
    Text,
    /// Numeric input, optionally bounded and clamped
    Number,
    /// Yes/no toggle
    Boolean,
    /// Single choice from `options`
    Select,
    /// Ordered subset of `options`
    MultiSelect,
    /// File picked by the user
    File,
}

/// Built-in text formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    Email,
    /// Digits with optional leading `+`, spaces and dashes; 7-15 digits
    Phone,
    /// Calendar date, YYYY-MM-DD
    Date,
    /// Digits only
    Digits,
}

/// Numeric bounds for number fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumberRule {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    /// Reject values with a fractional part
    #[serde(default)]
    pub integer: bool,
    /// Pull out-of-range values back into bounds instead of reporting them
    #[serde(default)]
    pub clamp: bool,
}

impl NumberRule {
    /// Apply the clamping policy. Returns the value unchanged unless `clamp` is set.
    pub fn apply(&self, n: f64) -> f64 {
        if !self.clamp {
            return n;
        }
        let mut n = n;
        if let Some(max) = self.max {
            n = n.min(max);
        }
        if let Some(min) = self.min {
            n = n.max(min);
        }
        n
    }
}

/// Validation rule for a single field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    pub key: FieldKey,
    /// Human label used in messages (falls back to the key)
    #[serde(default)]
    pub label: Option<String>,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// A populated identity field (name, email, ...) makes the draft worth saving
    #[serde(default)]
    pub identity: bool,
    #[serde(default)]
    pub format: Option<TextFormat>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Regular expression the whole (trimmed) text must match
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub number: Option<NumberRule>,
    /// Allowed choices for select and multi-select fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Minimum number of choices for multi-select fields
    #[serde(default)]
    pub min_items: Option<usize>,
    /// Maximum file size in bytes
    #[serde(default)]
    pub max_bytes: Option<u64>,
    /// Message used instead of the generic format/pattern message
    #[serde(default)]
    pub message: Option<String>,
}

impl FieldRule {
    /// Minimal rule of the given kind; the remaining knobs are set by the caller
    pub fn new(key: impl Into<FieldKey>, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            label: None,
            kind,
            required: false,
            identity: false,
            format: None,
            min_length: None,
            max_length: None,
            pattern: None,
            number: None,
            options: Vec::new(),
            min_items: None,
            max_bytes: None,
            message: None,
        }
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(self.key.as_str())
    }
}

/// Cross-field rule evaluated on a whole step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum StepConstraint {
    /// At least one of the fields must be filled. The error is reported on the first field.
    AtLeastOneOf {
        fields: Vec<FieldKey>,
        message: String,
    },
    /// `field` must equal `other` (e.g. email confirmation). Reported on `field`.
    Matches {
        field: FieldKey,
        other: FieldKey,
        message: String,
    },
}

impl StepConstraint {
    /// Fields the constraint reads
    pub fn fields(&self) -> Vec<&FieldKey> {
        match self {
            StepConstraint::AtLeastOneOf { fields, .. } => fields.iter().collect(),
            StepConstraint::Matches { field, other, .. } => vec![field, other],
        }
    }
}

/// Consistency problems in a form definition
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("form must have at least one step")]
    NoSteps,
    #[error("step ids must be contiguous from 1: expected {expected}, found {found}")]
    NonContiguousStepIds { expected: u32, found: u32 },
    #[error("field '{field}' appears in step {first} and step {second}")]
    FieldInSeveralSteps {
        field: FieldKey,
        first: u32,
        second: u32,
    },
    #[error("field '{0}' is used by a step but has no rule")]
    MissingRule(FieldKey),
    #[error("rule for '{0}' does not belong to any step")]
    UnassignedField(FieldKey),
    #[error("field '{0}' has more than one rule")]
    DuplicateRule(FieldKey),
    #[error("constraint in step {step} references '{field}', which is not part of that step")]
    ConstraintOutsideStep { step: u32, field: FieldKey },
    #[error("field '{0}' has min greater than max")]
    InvalidBounds(FieldKey),
    #[error("field '{0}' must declare options")]
    MissingOptions(FieldKey),
    #[error("field '{field}' has an invalid pattern: {message}")]
    InvalidPattern { field: FieldKey, message: String },
    #[error("no field is marked as identity, drafts would never be saved")]
    NoIdentityField,
}

/// All consistency problems found in one schema
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaErrors(pub Vec<SchemaError>);

impl fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for SchemaErrors {}

impl FormSchema {
    /// Create a form schema from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Create a form schema from TOML
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Convert to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Storage key for this form's draft
    pub fn draft_key(&self) -> String {
        format!("{}-draft", self.key)
    }

    /// Number of steps (N)
    pub fn step_count(&self) -> u32 {
        self.steps.len() as u32
    }

    pub fn step(&self, id: u32) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn rule(&self, key: &FieldKey) -> Option<&FieldRule> {
        self.fields.iter().find(|r| &r.key == key)
    }

    /// Step that owns the field
    pub fn step_of(&self, key: &FieldKey) -> Option<u32> {
        self.steps
            .iter()
            .find(|s| s.fields.contains(key))
            .map(|s| s.id)
    }

    pub fn contains_field(&self, key: &FieldKey) -> bool {
        self.rule(key).is_some()
    }

    pub fn identity_fields(&self) -> impl Iterator<Item = &FieldKey> {
        self.fields.iter().filter(|r| r.identity).map(|r| &r.key)
    }

    /// Validate the schema for consistency
    pub fn validate(&self) -> Result<(), SchemaErrors> {
        let mut errors = Vec::new();

        if self.steps.is_empty() {
            errors.push(SchemaError::NoSteps);
        }

        for (index, step) in self.steps.iter().enumerate() {
            let expected = index as u32 + 1;
            if step.id != expected {
                errors.push(SchemaError::NonContiguousStepIds {
                    expected,
                    found: step.id,
                });
                break;
            }
        }

        let mut owner: BTreeMap<&FieldKey, u32> = BTreeMap::new();
        for step in &self.steps {
            for field in &step.fields {
                if let Some(first) = owner.get(field) {
                    errors.push(SchemaError::FieldInSeveralSteps {
                        field: field.clone(),
                        first: *first,
                        second: step.id,
                    });
                } else {
                    owner.insert(field, step.id);
                }
            }

            for constraint in &step.constraints {
                for field in constraint.fields() {
                    if !step.fields.contains(field) {
                        errors.push(SchemaError::ConstraintOutsideStep {
                            step: step.id,
                            field: field.clone(),
                        });
                    }
                }
            }
        }

        let mut ruled: BTreeSet<&FieldKey> = BTreeSet::new();
        for rule in &self.fields {
            if !ruled.insert(&rule.key) {
                errors.push(SchemaError::DuplicateRule(rule.key.clone()));
            }
            if !owner.contains_key(&rule.key) {
                errors.push(SchemaError::UnassignedField(rule.key.clone()));
            }
            if let Some(number) = &rule.number {
                if let (Some(min), Some(max)) = (number.min, number.max) {
                    if min > max {
                        errors.push(SchemaError::InvalidBounds(rule.key.clone()));
                    }
                }
            }
            if matches!(rule.kind, FieldKind::Select | FieldKind::MultiSelect)
                && rule.options.is_empty()
            {
                errors.push(SchemaError::MissingOptions(rule.key.clone()));
            }
            if let Some(pattern) = &rule.pattern {
                if let Err(e) = Regex::new(pattern) {
                    errors.push(SchemaError::InvalidPattern {
                        field: rule.key.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        for field in owner.keys() {
            if !ruled.contains(field) {
                errors.push(SchemaError::MissingRule((*field).clone()));
            }
        }

        if self.identity_fields().next().is_none() {
            errors.push(SchemaError::NoIdentityField);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaErrors(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step_schema() -> FormSchema {
        let mut name = FieldRule::new("name", FieldKind::Text);
        name.required = true;
        name.identity = true;
        FormSchema {
            key: "demo".to_string(),
            name: "Demo".to_string(),
            description: String::new(),
            steps: vec![
                StepDefinition {
                    id: 1,
                    name: "Identity".to_string(),
                    fields: vec!["name".into()],
                    constraints: vec![],
                },
                StepDefinition {
                    id: 2,
                    name: "Contact".to_string(),
                    fields: vec!["phone".into(), "email".into()],
                    constraints: vec![StepConstraint::AtLeastOneOf {
                        fields: vec!["phone".into(), "email".into()],
                        message: "Give a phone or an email".to_string(),
                    }],
                },
            ],
            fields: vec![
                name,
                FieldRule::new("phone", FieldKind::Text),
                FieldRule::new("email", FieldKind::Text),
            ],
        }
    }

    #[test]
    fn test_valid_schema_passes() {
        assert!(two_step_schema().validate().is_ok());
    }

    #[test]
    fn test_non_contiguous_ids_rejected() {
        let mut schema = two_step_schema();
        schema.steps[1].id = 3;
        let errors = schema.validate().unwrap_err();
        assert!(errors.0.contains(&SchemaError::NonContiguousStepIds {
            expected: 2,
            found: 3
        }));
    }

    #[test]
    fn test_field_in_two_steps_rejected() {
        let mut schema = two_step_schema();
        schema.steps[1].fields.push("name".into());
        let errors = schema.validate().unwrap_err();
        assert!(errors.0.iter().any(|e| matches!(
            e,
            SchemaError::FieldInSeveralSteps { first: 1, second: 2, .. }
        )));
    }

    #[test]
    fn test_missing_and_unassigned_rules() {
        let mut schema = two_step_schema();
        schema.fields.push(FieldRule::new("orphan", FieldKind::Text));
        schema.steps[0].fields.push("ghost".into());
        let errors = schema.validate().unwrap_err();
        assert!(errors
            .0
            .contains(&SchemaError::UnassignedField("orphan".into())));
        assert!(errors.0.contains(&SchemaError::MissingRule("ghost".into())));
    }

    #[test]
    fn test_constraint_outside_step_rejected() {
        let mut schema = two_step_schema();
        schema.steps[0].constraints.push(StepConstraint::Matches {
            field: "name".into(),
            other: "email".into(),
            message: "must match".to_string(),
        });
        let errors = schema.validate().unwrap_err();
        assert!(errors.0.contains(&SchemaError::ConstraintOutsideStep {
            step: 1,
            field: "email".into()
        }));
    }

    #[test]
    fn test_identity_field_required() {
        let mut schema = two_step_schema();
        schema.fields[0].identity = false;
        let errors = schema.validate().unwrap_err();
        assert!(errors.0.contains(&SchemaError::NoIdentityField));
    }

    #[test]
    fn test_bad_pattern_and_bounds() {
        let mut schema = two_step_schema();
        schema.fields[1].pattern = Some("([".to_string());
        schema.fields[2].kind = FieldKind::Number;
        schema.fields[2].number = Some(NumberRule {
            min: Some(10.0),
            max: Some(1.0),
            ..NumberRule::default()
        });
        let errors = schema.validate().unwrap_err();
        assert!(errors
            .0
            .iter()
            .any(|e| matches!(e, SchemaError::InvalidPattern { .. })));
        assert!(errors.0.contains(&SchemaError::InvalidBounds("email".into())));
    }

    #[test]
    fn test_step_lookup_helpers() {
        let schema = two_step_schema();
        assert_eq!(schema.step_count(), 2);
        assert_eq!(schema.step_of(&"email".into()), Some(2));
        assert_eq!(schema.step_of(&"missing".into()), None);
        assert_eq!(schema.draft_key(), "demo-draft");
    }

    #[test]
    fn test_number_rule_clamp() {
        let rule = NumberRule {
            min: Some(0.0),
            max: Some(100.0),
            integer: false,
            clamp: true,
        };
        assert_eq!(rule.apply(120.0), 100.0);
        assert_eq!(rule.apply(-3.0), 0.0);
        assert_eq!(rule.apply(55.5), 55.5);

        let strict = NumberRule {
            clamp: false,
            ..rule
        };
        assert_eq!(strict.apply(120.0), 120.0);
    }

    #[test]
    fn test_constraint_from_json() {
        let json = r#"{"rule":"at_least_one_of","fields":["a","b"],"message":"need one"}"#;
        let c: StepConstraint = serde_json::from_str(json).unwrap();
        assert_eq!(c.fields().len(), 2);
    }
}
