//! Form definitions bundled with the binary

use once_cell::sync::Lazy;
use tracing::warn;

use super::schema::FormSchema;

/// Bundled forms, parsed once on first use
static PARSED_FORMS: Lazy<Vec<FormSchema>> = Lazy::new(parse_all);

/// Forms shipped with regwiz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinForm {
    TeacherRegistration,
    StudentRegistration,
}

impl BuiltinForm {
    /// Returns all bundled forms in display order
    pub fn all() -> &'static [BuiltinForm] {
        &[
            BuiltinForm::TeacherRegistration,
            BuiltinForm::StudentRegistration,
        ]
    }

    /// Form key as used on the command line and in draft keys
    pub fn key(&self) -> &'static str {
        match self {
            BuiltinForm::TeacherRegistration => "teacher-registration",
            BuiltinForm::StudentRegistration => "student-registration",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|f| f.key() == key)
    }

    /// Raw JSON definition
    pub fn definition(&self) -> &'static str {
        match self {
            BuiltinForm::TeacherRegistration => include_str!("forms/teacher_registration.json"),
            BuiltinForm::StudentRegistration => include_str!("forms/student_registration.json"),
        }
    }

    pub fn schema(&self) -> Result<FormSchema, serde_json::Error> {
        FormSchema::from_json(self.definition())
    }
}

/// Every bundled form that parses
pub fn load_all() -> Vec<FormSchema> {
    PARSED_FORMS.clone()
}

/// Parse every bundled form, skipping (and logging) any that fail to parse
fn parse_all() -> Vec<FormSchema> {
    BuiltinForm::all()
        .iter()
        .filter_map(|form| match form.schema() {
            Ok(schema) => Some(schema),
            Err(e) => {
                warn!("Failed to parse builtin form {}: {}", form.key(), e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_forms_parse_and_validate() {
        for form in BuiltinForm::all() {
            let schema = form.schema().unwrap();
            assert_eq!(schema.key, form.key());
            schema.validate().unwrap();
        }
    }

    #[test]
    fn test_teacher_form_has_six_steps() {
        let schema = BuiltinForm::TeacherRegistration.schema().unwrap();
        assert_eq!(schema.step_count(), 6);
        assert_eq!(schema.draft_key(), "teacher-registration-draft");
    }

    #[test]
    fn test_from_key() {
        assert_eq!(
            BuiltinForm::from_key("student-registration"),
            Some(BuiltinForm::StudentRegistration)
        );
        assert_eq!(BuiltinForm::from_key("unknown"), None);
    }

    #[test]
    fn test_load_all_returns_every_form() {
        assert_eq!(load_all().len(), BuiltinForm::all().len());
    }
}
