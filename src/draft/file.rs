//! JSON-file draft store, one file per draft key

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{Draft, DraftError, DraftStore};

/// Stores a draft as `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write through a temporary file and rename, so a crash mid-write leaves
    /// the previous draft intact.
    fn try_save(&self, draft: &Draft) -> Result<(), DraftError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(draft)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DraftStore for FileDraftStore {
    fn save(&self, draft: &Draft) -> bool {
        match self.try_save(draft) {
            Ok(()) => {
                debug!(path = %self.path.display(), step = draft.step_index, "Draft saved");
                true
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Draft not saved: {}", e);
                false
            }
        }
    }

    fn load(&self) -> Option<Draft> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to read draft: {}", e);
                return None;
            }
        };

        match Draft::from_json(&contents) {
            Ok(draft) => Some(draft),
            Err(e) => {
                warn!(path = %self.path.display(), "Ignoring corrupt draft: {}", e);
                None
            }
        }
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Draft cleared"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to clear draft: {}", e),
        }
    }
}
