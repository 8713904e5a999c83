//! Draft persistence across sessions with the file-backed store

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

use regwiz::draft::{Draft, DraftStore, FileDraftStore};
use regwiz::form::builtin::BuiltinForm;
use regwiz::form::{FieldKey, FieldValue, FormValues};
use regwiz::restoration::{RestorationFlow, Resolution};
use regwiz::schedule::ManualClock;
use regwiz::wizard::{WizardContext, WizardOptions};

fn session(dir: &TempDir, clock: &ManualClock) -> (RestorationFlow, FileDraftStore) {
    let schema = BuiltinForm::StudentRegistration.schema().unwrap();
    let store = FileDraftStore::new(dir.path().join("drafts"), &schema.draft_key());
    let context = WizardContext::for_schema(
        schema,
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
        WizardOptions::default(),
    )
    .unwrap();
    (RestorationFlow::start(context), store)
}

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2026, 8, 20, 15, 0, 0).unwrap())
}

#[test]
fn test_draft_file_uses_form_key() {
    let dir = TempDir::new().unwrap();
    let (_, store) = session(&dir, &clock());
    assert!(store
        .path()
        .ends_with("drafts/student-registration-draft.json"));
}

#[test]
fn test_autosave_then_restore_in_new_session() {
    let dir = TempDir::new().unwrap();
    let clock = clock();

    let (flow, store) = session(&dir, &clock);
    let mut wizard = flow.into_wizard().unwrap();
    wizard
        .set_field("first_name", FieldValue::text("Leo"))
        .unwrap();
    wizard
        .set_field("last_exam_score", FieldValue::Number(91.5))
        .unwrap();
    wizard
        .set_field("previous_school", FieldValue::text(""))
        .unwrap();
    clock.advance_ms(1_000);
    wizard.poll();
    wizard.unmount();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(raw["step"], 1);
    assert_eq!(raw["data"]["first_name"], "Leo");
    assert_eq!(raw["data"]["previous_school"], "");
    assert!(raw["data"].get("guardian_name").is_none());
    assert!(raw["savedAt"].is_string());

    let (mut flow, _) = session(&dir, &clock);
    assert!(flow.is_prompting());
    assert!(flow.restore());
    let wizard = flow.into_wizard().unwrap();
    assert_eq!(
        wizard.value(&FieldKey::from("last_exam_score")),
        Some(&FieldValue::Number(91.5))
    );
    // Empty stays empty, undefined stays undefined
    assert_eq!(
        wizard.value(&FieldKey::from("previous_school")),
        Some(&FieldValue::text(""))
    );
    assert_eq!(wizard.value(&FieldKey::from("guardian_name")), None);
}

#[test]
fn test_saving_twice_loads_the_same() {
    let dir = TempDir::new().unwrap();
    let (_, store) = session(&dir, &clock());
    let mut values = FormValues::new();
    values.insert(FieldKey::from("first_name"), FieldValue::text("Leo"));
    let draft = Draft::new(2, values, Utc.with_ymd_and_hms(2026, 8, 20, 14, 0, 0).unwrap());

    assert!(store.save(&draft));
    let first = store.load();
    assert!(store.save(&draft));
    assert_eq!(store.load(), first);
    assert_eq!(first, Some(draft));
}

#[test]
fn test_corrupt_file_starts_fresh_without_prompt() {
    let dir = TempDir::new().unwrap();
    let (_, store) = session(&dir, &clock());
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), "{\"step\": 2, \"data\": ").unwrap();

    let (flow, _) = session(&dir, &clock());
    assert_eq!(flow.resolution(), Some(Resolution::NoDraft));
    assert_eq!(flow.wizard().unwrap().current_step(), 1);
}

#[test]
fn test_discard_deletes_file() {
    let dir = TempDir::new().unwrap();
    let clock = clock();
    let (_, store) = session(&dir, &clock);
    let mut values = FormValues::new();
    values.insert(FieldKey::from("guardian_name"), FieldValue::text("Marta"));
    store.save(&Draft::new(2, values, Utc.with_ymd_and_hms(2026, 8, 20, 9, 0, 0).unwrap()));

    let (mut flow, store) = session(&dir, &clock);
    assert!(flow.discard());
    assert!(!store.path().exists());
    assert_eq!(flow.resolution(), Some(Resolution::Discarded));
}
