//! Filesystem loading for form definitions

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use super::builtin;
use super::schema::FormSchema;

/// Load a single form definition, choosing the parser by file extension
pub fn load_form_file(path: &Path) -> Result<FormSchema> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read form file: {}", path.display()))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => FormSchema::from_json(&contents)
            .with_context(|| format!("Failed to parse form JSON: {}", path.display())),
        Some("toml") => FormSchema::from_toml(&contents)
            .with_context(|| format!("Failed to parse form TOML: {}", path.display())),
        _ => bail!(
            "Unsupported form file extension (expected .json or .toml): {}",
            path.display()
        ),
    }
}

/// Load user-defined forms from a directory
///
/// Scans for *.json and *.toml files. Files that fail to parse or fail the
/// consistency check are logged and skipped.
pub fn load_user_forms(path: &Path) -> Result<BTreeMap<String, FormSchema>> {
    let mut forms = BTreeMap::new();

    if !path.exists() {
        debug!("User forms directory does not exist: {}", path.display());
        return Ok(forms);
    }

    let entries = fs::read_dir(path)
        .with_context(|| format!("Failed to read forms directory: {}", path.display()))?;

    for entry in entries {
        let file_path = entry?.path();

        if file_path.is_dir()
            || !file_path
                .extension()
                .is_some_and(|e| e == "json" || e == "toml")
        {
            continue;
        }

        match load_form_file(&file_path) {
            Ok(schema) => {
                if let Err(e) = schema.validate() {
                    warn!(
                        "Skipping inconsistent form {} from {}: {}",
                        schema.key,
                        file_path.display(),
                        e
                    );
                    continue;
                }
                debug!(
                    "Loaded user form: {} from {}",
                    schema.key,
                    file_path.display()
                );
                forms.insert(schema.key.clone(), schema);
            }
            Err(e) => {
                warn!("Failed to load form from {}: {:#}", file_path.display(), e);
            }
        }
    }

    Ok(forms)
}

/// Bundled forms overlaid with user forms (user definitions win on key clash)
pub fn load_forms(user_dir: &Path) -> Result<BTreeMap<String, FormSchema>> {
    let mut forms: BTreeMap<String, FormSchema> = builtin::load_all()
        .into_iter()
        .map(|schema| (schema.key.clone(), schema))
        .collect();

    for (key, schema) in load_user_forms(user_dir)? {
        if forms.contains_key(&key) {
            debug!("User form {} overrides the bundled definition", key);
        }
        forms.insert(key, schema);
    }

    Ok(forms)
}
