//! Schema validation for wizard steps and whole submissions
//!
//! Every check goes through the same per-field rule evaluation, so the
//! debounced inline check ([`Validator::validate_field`]), the step gate
//! ([`Validator::validate_step`]) and the submission check
//! ([`Validator::validate_all`]) cannot disagree. Failures are returned as
//! data; nothing here panics on user input.

use chrono::NaiveDate;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

use crate::form::schema::{
    FieldKind, FieldRule, FormSchema, SchemaErrors, StepConstraint, TextFormat,
};
use crate::form::{format_number, FieldKey, FieldValue, FormValues};

/// Message used when a value cannot be interpreted for its field kind
pub const INVALID_INPUT: &str = "Invalid input";

/// Field key -> message, only for fields that currently fail
pub type FieldErrors = BTreeMap<FieldKey, String>;

/// Validator bound to one form schema
#[derive(Debug, Clone)]
pub struct Validator {
    schema: Arc<FormSchema>,
    patterns: Arc<HashMap<FieldKey, Regex>>,
}

impl Validator {
    /// Check the schema for consistency and compile its patterns
    pub fn new(schema: FormSchema) -> Result<Self, SchemaErrors> {
        Self::from_shared(Arc::new(schema))
    }

    pub fn from_shared(schema: Arc<FormSchema>) -> Result<Self, SchemaErrors> {
        schema.validate()?;

        let patterns = schema
            .fields
            .iter()
            .filter_map(|rule| {
                let pattern = rule.pattern.as_ref()?;
                let anchored = Regex::new(&format!("^(?:{pattern})$")).ok()?;
                Some((rule.key.clone(), anchored))
            })
            .collect();

        Ok(Self {
            schema,
            patterns: Arc::new(patterns),
        })
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn shared_schema(&self) -> Arc<FormSchema> {
        Arc::clone(&self.schema)
    }

    /// Transform applied when a value is written. Only clamping happens here;
    /// trimming and coercion wait for submission so typing is not disturbed.
    ///
    /// Non-finite numbers have no JSON form, so they are kept as their text
    /// and reported as invalid input by the checks.
    pub fn transform_input(&self, key: &FieldKey, value: FieldValue) -> FieldValue {
        let value = match value {
            FieldValue::Number(n) if !n.is_finite() => FieldValue::Text(n.to_string()),
            other => other,
        };
        let Some(rule) = self.schema.rule(key) else {
            return value;
        };
        if rule.kind != FieldKind::Number {
            return value;
        }
        let Some(number) = rule.number.as_ref().filter(|n| n.clamp) else {
            return value;
        };

        let (parsed, is_number) = match &value {
            FieldValue::Number(n) => (Some(*n), true),
            FieldValue::Text(s) => (parse_number(s), false),
            _ => (None, false),
        };

        match parsed {
            Some(n) if is_number || number.apply(n) != n => FieldValue::Number(number.apply(n)),
            _ => value,
        }
    }

    /// Single-field check used for inline feedback
    pub fn validate_field(&self, key: &FieldKey, value: Option<&FieldValue>) -> Option<String> {
        match self.schema.rule(key) {
            Some(rule) => self.check_value(rule, value),
            None => Some(INVALID_INPUT.to_string()),
        }
    }

    /// Check the fields and cross-field constraints of one step
    pub fn validate_step(&self, step_id: u32, values: &FormValues) -> FieldErrors {
        let mut errors = FieldErrors::new();

        let Some(step) = self.schema.step(step_id) else {
            warn!(step = step_id, form = %self.schema.key, "validate_step called for unknown step");
            return errors;
        };

        for key in &step.fields {
            if let Some(message) = self.validate_field(key, values.get(key)) {
                errors.insert(key.clone(), message);
            }
        }

        for constraint in &step.constraints {
            if let Some((key, message)) = self.check_constraint(constraint, values) {
                errors.entry(key).or_insert(message);
            }
        }

        errors
    }

    /// Run every step's rules over the merged values.
    ///
    /// Returns the normalized values (trimmed, coerced, clamped, unknown keys
    /// dropped) or every error found, first error per field. Optional fields
    /// left blank are undefined and do not appear in the result.
    pub fn validate_all(&self, values: &FormValues) -> Result<FormValues, FieldErrors> {
        let mut errors = FieldErrors::new();
        for step in &self.schema.steps {
            for (key, message) in self.validate_step(step.id, values) {
                errors.entry(key).or_insert(message);
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let normalized = values
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .filter_map(|(key, value)| {
                let rule = self.schema.rule(key)?;
                let value = normalize(rule, value).unwrap_or_else(|_| value.clone());
                (!value.is_empty()).then(|| (key.clone(), value))
            })
            .collect();

        Ok(normalized)
    }

    /// Lowest step id owning any of the errored fields
    pub fn first_step_with_error(&self, errors: &FieldErrors) -> Option<u32> {
        errors
            .keys()
            .filter_map(|key| self.schema.step_of(key))
            .min()
    }

    fn check_value(&self, rule: &FieldRule, value: Option<&FieldValue>) -> Option<String> {
        let value = match value {
            Some(v) if !v.is_empty() => v,
            _ => return rule.required.then(|| required_message(rule)),
        };

        let normalized = match normalize(rule, value) {
            Ok(v) => v,
            Err(message) => return Some(message),
        };

        if normalized.is_empty() {
            return rule.required.then(|| required_message(rule));
        }

        match &normalized {
            FieldValue::Text(text) => self.check_text(rule, text),
            FieldValue::Number(n) => check_number(rule, *n),
            FieldValue::Bool(accepted) => (rule.required && !accepted).then(|| {
                rule.message
                    .clone()
                    .unwrap_or_else(|| format!("{} must be accepted", rule.label()))
            }),
            FieldValue::Multi(items) => check_choices(rule, items),
            FieldValue::File(file) => match rule.max_bytes {
                Some(max) if file.size > max => Some(format!(
                    "{} must be smaller than {}",
                    rule.label(),
                    format_bytes(max)
                )),
                _ => None,
            },
        }
    }

    fn check_text(&self, rule: &FieldRule, text: &str) -> Option<String> {
        let length = text.chars().count();
        if let Some(min) = rule.min_length {
            if length < min {
                return Some(format!(
                    "{} must be at least {} characters",
                    rule.label(),
                    min
                ));
            }
        }
        if let Some(max) = rule.max_length {
            if length > max {
                return Some(format!(
                    "{} must be at most {} characters",
                    rule.label(),
                    max
                ));
            }
        }

        if let Some(format) = rule.format {
            if !matches_format(format, text) {
                return Some(
                    rule.message
                        .clone()
                        .unwrap_or_else(|| format_message(format, rule.label())),
                );
            }
        }

        if let Some(re) = self.patterns.get(&rule.key) {
            if !re.is_match(text) {
                return Some(
                    rule.message
                        .clone()
                        .unwrap_or_else(|| format!("{} has an invalid format", rule.label())),
                );
            }
        }

        if rule.kind == FieldKind::Select && !rule.options.iter().any(|o| o == text) {
            return Some(format!("Choose a valid {}", rule.label().to_lowercase()));
        }

        None
    }

    fn check_constraint(
        &self,
        constraint: &StepConstraint,
        values: &FormValues,
    ) -> Option<(FieldKey, String)> {
        match constraint {
            StepConstraint::AtLeastOneOf { fields, message } => {
                let none_filled = fields
                    .iter()
                    .all(|f| values.get(f).map_or(true, FieldValue::is_empty));
                if none_filled {
                    fields.first().map(|first| (first.clone(), message.clone()))
                } else {
                    None
                }
            }
            StepConstraint::Matches {
                field,
                other,
                message,
            } => {
                let left = values.get(field).filter(|v| !v.is_empty())?;
                let left = self.normalized_or_raw(field, left);
                let right = values
                    .get(other)
                    .filter(|v| !v.is_empty())
                    .map(|v| self.normalized_or_raw(other, v));
                (Some(left) != right).then(|| (field.clone(), message.clone()))
            }
        }
    }

    fn normalized_or_raw(&self, key: &FieldKey, value: &FieldValue) -> FieldValue {
        self.schema
            .rule(key)
            .and_then(|rule| normalize(rule, value).ok())
            .unwrap_or_else(|| value.clone())
    }
}

/// Coerce a raw value into the canonical shape for its field kind
fn normalize(rule: &FieldRule, value: &FieldValue) -> Result<FieldValue, String> {
    let invalid = || INVALID_INPUT.to_string();

    match rule.kind {
        FieldKind::Text | FieldKind::Select => match value {
            FieldValue::Text(s) => Ok(FieldValue::Text(s.trim().to_string())),
            FieldValue::Number(n) => Ok(FieldValue::Text(format_number(*n))),
            _ => Err(invalid()),
        },
        FieldKind::Number => {
            let n = match value {
                FieldValue::Number(n) if n.is_finite() => *n,
                FieldValue::Text(s) => parse_number(s).ok_or_else(invalid)?,
                _ => return Err(invalid()),
            };
            Ok(FieldValue::Number(
                rule.number.as_ref().map_or(n, |number| number.apply(n)),
            ))
        }
        FieldKind::Boolean => match value {
            FieldValue::Bool(b) => Ok(FieldValue::Bool(*b)),
            FieldValue::Text(s) => parse_bool(s).map(FieldValue::Bool).ok_or_else(invalid),
            _ => Err(invalid()),
        },
        FieldKind::MultiSelect => match value {
            FieldValue::Multi(items) => Ok(FieldValue::Multi(
                items
                    .iter()
                    .map(|i| i.trim().to_string())
                    .filter(|i| !i.is_empty())
                    .collect(),
            )),
            FieldValue::Text(s) => Ok(FieldValue::Multi(vec![s.trim().to_string()])),
            _ => Err(invalid()),
        },
        FieldKind::File => match value {
            FieldValue::File(file) => Ok(FieldValue::File(file.clone())),
            _ => Err(invalid()),
        },
    }
}

fn check_number(rule: &FieldRule, n: f64) -> Option<String> {
    let number = rule.number.as_ref()?;
    if number.integer && n.fract() != 0.0 {
        return Some(format!("{} must be a whole number", rule.label()));
    }
    if let Some(min) = number.min {
        if n < min {
            return Some(format!(
                "{} must be at least {}",
                rule.label(),
                format_number(min)
            ));
        }
    }
    if let Some(max) = number.max {
        if n > max {
            return Some(format!(
                "{} must be at most {}",
                rule.label(),
                format_number(max)
            ));
        }
    }
    None
}

fn check_choices(rule: &FieldRule, items: &[String]) -> Option<String> {
    if let Some(min) = rule.min_items {
        if items.len() < min {
            return Some(format!(
                "Select at least {} {}",
                min,
                rule.label().to_lowercase()
            ));
        }
    }
    if !rule.options.is_empty() {
        if let Some(unknown) = items.iter().find(|i| !rule.options.contains(i)) {
            return Some(format!("'{}' is not a valid choice", unknown));
        }
    }
    None
}

fn required_message(rule: &FieldRule) -> String {
    format!("{} is required", rule.label())
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn matches_format(format: TextFormat, text: &str) -> bool {
    match format {
        TextFormat::Email => is_email(text),
        TextFormat::Phone => {
            let allowed = text
                .chars()
                .enumerate()
                .all(|(i, c)| c.is_ascii_digit() || c == ' ' || c == '-' || (c == '+' && i == 0));
            let digits = text.chars().filter(char::is_ascii_digit).count();
            allowed && (7..=15).contains(&digits)
        }
        TextFormat::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok(),
        TextFormat::Digits => text.chars().all(|c| c.is_ascii_digit()),
    }
}

fn is_email(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, _)| !host.is_empty())
        && !domain.ends_with('.')
}

fn format_message(format: TextFormat, label: &str) -> String {
    match format {
        TextFormat::Email => "Enter a valid email address".to_string(),
        TextFormat::Phone => "Enter a valid phone number".to_string(),
        TextFormat::Date => format!("{} must be a date in the format YYYY-MM-DD", label),
        TextFormat::Digits => format!("{} must contain digits only", label),
    }
}

fn format_bytes(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    const KB: u64 = 1024;
    if bytes >= MB && bytes % MB == 0 {
        format!("{} MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{} KB", bytes / KB)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::builtin::BuiltinForm;
    use crate::form::FileHandle;

    fn teacher_validator() -> Validator {
        Validator::new(BuiltinForm::TeacherRegistration.schema().unwrap()).unwrap()
    }

    fn values(pairs: &[(&str, FieldValue)]) -> FormValues {
        pairs
            .iter()
            .map(|(k, v)| (FieldKey::from(*k), v.clone()))
            .collect()
    }

    fn complete_teacher_values() -> FormValues {
        values(&[
            ("first_name", FieldValue::text(" Ana ")),
            ("last_name", FieldValue::text("Silva")),
            ("date_of_birth", FieldValue::text("1990-04-12")),
            ("email", FieldValue::text("ana@school.edu")),
            ("confirm_email", FieldValue::text("ana@school.edu")),
            ("phone", FieldValue::text("+351 912-345-678")),
            ("address", FieldValue::text("Rua Central 10")),
            ("city", FieldValue::text("Porto")),
            ("highest_degree", FieldValue::text("Master")),
            ("university", FieldValue::text("University of Porto")),
            ("graduation_year", FieldValue::text("2014")),
            ("degree_score", FieldValue::Number(91.0)),
            ("subjects", FieldValue::multi(["Mathematics", " Science "])),
            ("employment_type", FieldValue::text("Full-time")),
            (
                "resume",
                FieldValue::File(FileHandle {
                    name: "resume.pdf".to_string(),
                    size: 120_000,
                    mime: Some("application/pdf".to_string()),
                }),
            ),
            ("consent", FieldValue::Bool(true)),
        ])
    }

    #[test]
    fn test_required_field_message() {
        let v = teacher_validator();
        assert_eq!(
            v.validate_field(&"first_name".into(), None),
            Some("First name is required".to_string())
        );
        assert_eq!(
            v.validate_field(&"first_name".into(), Some(&FieldValue::text("   "))),
            Some("First name is required".to_string())
        );
        assert_eq!(
            v.validate_field(&"first_name".into(), Some(&FieldValue::text("Ana"))),
            None
        );
    }

    #[test]
    fn test_optional_empty_field_is_valid() {
        let v = teacher_validator();
        assert_eq!(v.validate_field(&"gender".into(), None), None);
        assert_eq!(
            v.validate_field(&"postal_code".into(), Some(&FieldValue::text(""))),
            None
        );
    }

    #[test]
    fn test_formats() {
        let v = teacher_validator();
        assert!(v
            .validate_field(&"email".into(), Some(&FieldValue::text("not-an-email")))
            .is_some());
        assert!(v
            .validate_field(&"email".into(), Some(&FieldValue::text("a@b.co")))
            .is_none());
        assert!(v
            .validate_field(&"date_of_birth".into(), Some(&FieldValue::text("12/04/1990")))
            .is_some());
        assert!(v
            .validate_field(&"phone".into(), Some(&FieldValue::text("12ab")))
            .is_some());
        assert!(v
            .validate_field(&"postal_code".into(), Some(&FieldValue::text("40-00")))
            .is_some());
    }

    #[test]
    fn test_unparseable_number_is_invalid_input() {
        let v = teacher_validator();
        assert_eq!(
            v.validate_field(&"graduation_year".into(), Some(&FieldValue::text("twenty"))),
            Some(INVALID_INPUT.to_string())
        );
        assert_eq!(
            v.validate_field(&"consent".into(), Some(&FieldValue::multi(["x"]))),
            Some(INVALID_INPUT.to_string())
        );
    }

    #[test]
    fn test_number_bounds_without_clamp() {
        let v = teacher_validator();
        assert_eq!(
            v.validate_field(&"graduation_year".into(), Some(&FieldValue::Number(1900.0))),
            Some("Graduation year must be at least 1950".to_string())
        );
        assert_eq!(
            v.validate_field(&"graduation_year".into(), Some(&FieldValue::Number(2001.5))),
            Some("Graduation year must be a whole number".to_string())
        );
    }

    #[test]
    fn test_clamped_score_never_errors() {
        let v = teacher_validator();
        assert_eq!(
            v.validate_field(&"degree_score".into(), Some(&FieldValue::Number(140.0))),
            None
        );
        assert_eq!(
            v.transform_input(&"degree_score".into(), FieldValue::Number(140.0)),
            FieldValue::Number(100.0)
        );
        assert_eq!(
            v.transform_input(&"degree_score".into(), FieldValue::text("250")),
            FieldValue::Number(100.0)
        );
        // In-range text is left as typed
        assert_eq!(
            v.transform_input(&"degree_score".into(), FieldValue::text("8")),
            FieldValue::text("8")
        );
        // Fields without clamping are untouched
        assert_eq!(
            v.transform_input(&"graduation_year".into(), FieldValue::Number(3000.0)),
            FieldValue::Number(3000.0)
        );
    }

    #[test]
    fn test_boolean_required_must_be_true() {
        let v = teacher_validator();
        assert_eq!(
            v.validate_field(&"consent".into(), Some(&FieldValue::Bool(false))),
            Some("You must accept the terms to register".to_string())
        );
        assert_eq!(
            v.validate_field(&"consent".into(), Some(&FieldValue::text("yes"))),
            None
        );
    }

    #[test]
    fn test_select_and_multi_select() {
        let v = teacher_validator();
        assert!(v
            .validate_field(&"employment_type".into(), Some(&FieldValue::text("Volunteer")))
            .is_some());
        assert_eq!(
            v.validate_field(&"subjects".into(), Some(&FieldValue::multi(["Cooking"]))),
            Some("'Cooking' is not a valid choice".to_string())
        );
        assert_eq!(
            v.validate_field(&"subjects".into(), Some(&FieldValue::Multi(vec![]))),
            Some("Subjects is required".to_string())
        );
    }

    #[test]
    fn test_file_size_limit() {
        let v = teacher_validator();
        let big = FieldValue::File(FileHandle {
            name: "huge.pdf".to_string(),
            size: 10 * 1024 * 1024,
            mime: None,
        });
        assert_eq!(
            v.validate_field(&"resume".into(), Some(&big)),
            Some("Resume must be smaller than 5 MB".to_string())
        );
    }

    #[test]
    fn test_step_constraints() {
        let v = teacher_validator();
        let vals = values(&[
            ("email", FieldValue::text("ana@school.edu")),
            ("confirm_email", FieldValue::text("ana@school.org")),
        ]);
        let errors = v.validate_step(2, &vals);
        assert_eq!(
            errors.get(&FieldKey::from("confirm_email")),
            Some(&"Email addresses do not match".to_string())
        );
        assert_eq!(
            errors.get(&FieldKey::from("phone")),
            Some(&"Provide a phone or WhatsApp number".to_string())
        );
        assert!(!errors.contains_key(&FieldKey::from("whatsapp")));
    }

    #[test]
    fn test_match_constraint_ignores_surrounding_whitespace() {
        let v = teacher_validator();
        let vals = values(&[
            ("email", FieldValue::text("ana@school.edu")),
            ("confirm_email", FieldValue::text(" ana@school.edu ")),
            ("whatsapp", FieldValue::text("912345678")),
        ]);
        assert!(v.validate_step(2, &vals).is_empty());
    }

    #[test]
    fn test_field_rule_wins_over_constraint_message() {
        let v = teacher_validator();
        let vals = values(&[
            ("email", FieldValue::text("ana@school.edu")),
            ("confirm_email", FieldValue::text("broken")),
            ("phone", FieldValue::text("912345678")),
        ]);
        let errors = v.validate_step(2, &vals);
        assert_eq!(
            errors.get(&FieldKey::from("confirm_email")),
            Some(&"Enter a valid email address".to_string())
        );
    }

    #[test]
    fn test_step_only_checks_its_own_fields() {
        let v = teacher_validator();
        let errors = v.validate_step(1, &FormValues::new());
        assert!(errors.keys().all(|k| v.schema().step_of(k) == Some(1)));
        assert!(errors.contains_key(&FieldKey::from("first_name")));
        assert!(!errors.contains_key(&FieldKey::from("email")));
    }

    #[test]
    fn test_unknown_step_yields_no_errors() {
        let v = teacher_validator();
        assert!(v.validate_step(42, &FormValues::new()).is_empty());
    }

    #[test]
    fn test_validate_all_normalizes() {
        let v = teacher_validator();
        let mut vals = complete_teacher_values();
        vals.insert("unknown_field".into(), FieldValue::text("dropped"));

        let normalized = v.validate_all(&vals).unwrap();
        assert_eq!(
            normalized.get(&FieldKey::from("first_name")),
            Some(&FieldValue::text("Ana"))
        );
        assert_eq!(
            normalized.get(&FieldKey::from("graduation_year")),
            Some(&FieldValue::Number(2014.0))
        );
        assert_eq!(
            normalized.get(&FieldKey::from("subjects")),
            Some(&FieldValue::multi(["Mathematics", "Science"]))
        );
        assert!(!normalized.contains_key(&FieldKey::from("unknown_field")));
    }

    #[test]
    fn test_validate_all_leaves_blank_optional_fields_out() {
        let v = teacher_validator();
        let mut vals = complete_teacher_values();
        vals.insert("postal_code".into(), FieldValue::text("   "));
        vals.insert("degree_score".into(), FieldValue::text(""));
        vals.insert("gender".into(), FieldValue::text(""));

        let normalized = v.validate_all(&vals).unwrap();
        assert!(!normalized.contains_key(&FieldKey::from("postal_code")));
        assert!(!normalized.contains_key(&FieldKey::from("degree_score")));
        assert!(!normalized.contains_key(&FieldKey::from("gender")));
        assert!(normalized.values().all(|value| !value.is_empty()));
    }

    #[test]
    fn test_non_finite_numbers_become_invalid_input() {
        let v = teacher_validator();
        let written =
            v.transform_input(&"graduation_year".into(), FieldValue::Number(f64::INFINITY));
        assert_eq!(written, FieldValue::text("inf"));
        assert_eq!(
            v.validate_field(&"graduation_year".into(), Some(&written)),
            Some(INVALID_INPUT.to_string())
        );

        let written =
            v.transform_input(&"degree_score".into(), FieldValue::Number(f64::NAN));
        assert_eq!(written, FieldValue::text("NaN"));
        assert_eq!(
            v.validate_field(&"degree_score".into(), Some(&FieldValue::text("-inf"))),
            Some(INVALID_INPUT.to_string())
        );
    }

    #[test]
    fn test_validate_all_collects_across_steps() {
        let v = teacher_validator();
        let mut vals = complete_teacher_values();
        vals.remove(&FieldKey::from("city"));
        vals.insert("consent".into(), FieldValue::Bool(false));

        let errors = v.validate_all(&vals).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains_key(&FieldKey::from("city")));
        assert!(errors.contains_key(&FieldKey::from("consent")));
        assert_eq!(v.first_step_with_error(&errors), Some(3));
    }

    #[test]
    fn test_field_and_step_agree() {
        let v = teacher_validator();
        let vals = values(&[
            ("first_name", FieldValue::text("A")),
            ("date_of_birth", FieldValue::text("1990-02-30")),
            ("gender", FieldValue::text("Unknown")),
        ]);
        let step_errors = v.validate_step(1, &vals);
        for key in &v.schema().step(1).unwrap().fields {
            assert_eq!(
                step_errors.get(key).cloned(),
                v.validate_field(key, vals.get(key))
            );
        }
    }

    #[test]
    fn test_unknown_field_is_invalid() {
        let v = teacher_validator();
        assert_eq!(
            v.validate_field(&"nope".into(), Some(&FieldValue::text("x"))),
            Some(INVALID_INPUT.to_string())
        );
    }

    #[test]
    fn test_inconsistent_schema_rejected() {
        let mut schema = BuiltinForm::StudentRegistration.schema().unwrap();
        schema.steps.clear();
        assert!(Validator::new(schema).is_err());
    }

    #[test]
    fn test_pattern_is_anchored() {
        let mut schema = BuiltinForm::StudentRegistration.schema().unwrap();
        let rule = schema
            .fields
            .iter_mut()
            .find(|r| r.key.as_str() == "previous_school")
            .unwrap();
        rule.pattern = Some("[A-Z][a-z]+".to_string());
        let v = Validator::new(schema).unwrap();

        assert!(v
            .validate_field(&"previous_school".into(), Some(&FieldValue::text("Lincoln")))
            .is_none());
        assert_eq!(
            v.validate_field(
                &"previous_school".into(),
                Some(&FieldValue::text("Lincoln High"))
            ),
            Some("Previous school has an invalid format".to_string())
        );
    }
}
