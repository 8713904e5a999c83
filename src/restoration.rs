//! Restoration flow
//!
//! Decides, once per session, whether a wizard starts fresh or from a saved
//! draft. When a usable draft exists the user must pick [`RestorationFlow::restore`]
//! or [`RestorationFlow::discard`] before the wizard becomes reachable.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::draft::Draft;
use crate::wizard::{Wizard, WizardContext, WizardError};

/// How the session was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No usable draft: started fresh without asking
    NoDraft,
    /// User chose to continue the draft
    Restored,
    /// User chose to start over; the draft was cleared
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestorationPhase {
    /// Not checked yet
    Checking,
    /// A draft was found and the user has to decide
    Prompting { step: u32, saved_at: DateTime<Utc> },
    /// The wizard is available
    Ready(Resolution),
}

pub struct RestorationFlow {
    context: WizardContext,
    phase: RestorationPhase,
    draft: Option<Draft>,
    wizard: Option<Wizard>,
}

impl RestorationFlow {
    /// Create the flow without touching the store
    pub fn new(context: WizardContext) -> Self {
        Self {
            context,
            phase: RestorationPhase::Checking,
            draft: None,
            wizard: None,
        }
    }

    /// Create the flow and run the draft check
    pub fn start(context: WizardContext) -> Self {
        let mut flow = Self::new(context);
        flow.check();
        flow
    }

    /// Look for a draft. Only the first call has an effect.
    pub fn check(&mut self) {
        if self.phase != RestorationPhase::Checking {
            return;
        }

        let form = self.context.validator.schema().key.clone();
        let Some(draft) = self.context.store.load() else {
            if self.context.store.exists() {
                warn!(form = %form, "Saved draft is unreadable, starting fresh");
            } else {
                debug!(form = %form, "No saved draft");
            }
            self.resolve_fresh(Resolution::NoDraft);
            return;
        };

        let now = self.context.clock.now();
        if let Some(max_age) = self.context.options.max_draft_age {
            if draft.is_stale(now, max_age) {
                info!(form = %form, saved_at = %draft.saved_at, "Discarding expired draft");
                self.context.store.clear();
                self.resolve_fresh(Resolution::NoDraft);
                return;
            }
        }

        info!(form = %form, step = draft.step_index, saved_at = %draft.saved_at, "Found saved draft");
        self.phase = RestorationPhase::Prompting {
            step: draft.step_index,
            saved_at: draft.saved_at,
        };
        self.draft = Some(draft);
    }

    pub fn phase(&self) -> &RestorationPhase {
        &self.phase
    }

    pub fn is_prompting(&self) -> bool {
        matches!(self.phase, RestorationPhase::Prompting { .. })
    }

    pub fn resolution(&self) -> Option<Resolution> {
        match self.phase {
            RestorationPhase::Ready(resolution) => Some(resolution),
            _ => None,
        }
    }

    /// Continue from the saved draft. Returns false unless the flow was prompting.
    pub fn restore(&mut self) -> bool {
        if !self.is_prompting() {
            return false;
        }
        let Some(draft) = self.draft.take() else {
            return false;
        };

        info!(step = draft.step_index, "Restoring saved draft");
        self.wizard = Some(Wizard::from_draft(self.context.clone(), draft));
        self.phase = RestorationPhase::Ready(Resolution::Restored);
        true
    }

    /// Clear the saved draft and start over. Returns false unless the flow was prompting.
    pub fn discard(&mut self) -> bool {
        if !self.is_prompting() {
            return false;
        }

        info!("Discarding saved draft");
        self.draft = None;
        self.context.store.clear();
        self.resolve_fresh(Resolution::Discarded);
        true
    }

    fn resolve_fresh(&mut self, resolution: Resolution) {
        self.wizard = Some(Wizard::fresh(self.context.clone()));
        self.phase = RestorationPhase::Ready(resolution);
    }

    /// The wizard, once the flow has resolved
    pub fn wizard(&self) -> Result<&Wizard, WizardError> {
        self.wizard.as_ref().ok_or(WizardError::RestorationPending)
    }

    pub fn wizard_mut(&mut self) -> Result<&mut Wizard, WizardError> {
        self.wizard.as_mut().ok_or(WizardError::RestorationPending)
    }

    /// Hand the wizard over, or get the flow back if it is still undecided
    pub fn into_wizard(self) -> Result<Wizard, Self> {
        match self.wizard {
            Some(wizard) => Ok(wizard),
            None => Err(self),
        }
    }
}

impl std::fmt::Debug for RestorationFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestorationFlow")
            .field("form", &self.context.validator.schema().key)
            .field("phase", &self.phase)
            .field("wizard", &self.wizard)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{DraftStore, MemoryDraftStore};
    use crate::form::builtin::BuiltinForm;
    use crate::form::{FieldKey, FieldValue, FormValues};
    use crate::schedule::ManualClock;
    use crate::validation::Validator;
    use crate::wizard::{Origin, WizardOptions};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 11, 18, 0, 0).unwrap()
    }

    fn context(store: &MemoryDraftStore) -> WizardContext {
        let schema = BuiltinForm::TeacherRegistration.schema().unwrap();
        WizardContext::new(
            Validator::new(schema).unwrap(),
            Arc::new(store.clone()),
            Arc::new(ManualClock::new(now())),
            WizardOptions::default(),
        )
    }

    fn draft(step: u32, saved_at: DateTime<Utc>) -> Draft {
        let mut values = FormValues::new();
        values.insert(FieldKey::from("first_name"), FieldValue::text("Ana"));
        Draft::new(step, values, saved_at)
    }

    #[test]
    fn test_no_draft_starts_fresh() {
        let store = MemoryDraftStore::new();
        let flow = RestorationFlow::start(context(&store));

        assert_eq!(flow.resolution(), Some(Resolution::NoDraft));
        let wizard = flow.wizard().unwrap();
        assert_eq!(wizard.current_step(), 1);
        assert!(wizard.values().is_empty());
    }

    #[test]
    fn test_draft_found_prompts_and_blocks_wizard() {
        let saved_at = now() - chrono::Duration::hours(1);
        let store = MemoryDraftStore::with_draft(&draft(3, saved_at));
        let mut flow = RestorationFlow::start(context(&store));

        assert_eq!(
            flow.phase(),
            &RestorationPhase::Prompting { step: 3, saved_at }
        );
        assert!(matches!(flow.wizard(), Err(WizardError::RestorationPending)));
        assert!(flow.wizard_mut().is_err());
    }

    #[test]
    fn test_restore_rehydrates() {
        let saved_at = now() - chrono::Duration::hours(1);
        let store = MemoryDraftStore::with_draft(&draft(3, saved_at));
        let mut flow = RestorationFlow::start(context(&store));

        assert!(flow.restore());
        let wizard = flow.into_wizard().unwrap();
        assert_eq!(wizard.current_step(), 3);
        assert_eq!(
            wizard.value(&FieldKey::from("first_name")),
            Some(&FieldValue::text("Ana"))
        );
        assert_eq!(wizard.origin(), Origin::Restored { saved_at });
        assert!(store.exists());
    }

    #[test]
    fn test_discard_clears_and_starts_fresh() {
        let store = MemoryDraftStore::with_draft(&draft(3, now()));
        let mut flow = RestorationFlow::start(context(&store));

        assert!(flow.discard());
        assert!(!store.exists());
        assert_eq!(flow.resolution(), Some(Resolution::Discarded));
        assert_eq!(flow.wizard().unwrap().current_step(), 1);
    }

    #[test]
    fn test_first_decision_wins() {
        let store = MemoryDraftStore::with_draft(&draft(2, now()));
        let mut flow = RestorationFlow::start(context(&store));
        assert!(flow.restore());
        assert!(!flow.discard());
        assert!(!flow.restore());
        assert_eq!(flow.resolution(), Some(Resolution::Restored));
        assert!(store.exists());

        let store = MemoryDraftStore::with_draft(&draft(2, now()));
        let mut flow = RestorationFlow::start(context(&store));
        assert!(flow.discard());
        assert!(!flow.restore());
        assert_eq!(flow.wizard().unwrap().origin(), Origin::Fresh);
    }

    #[test]
    fn test_corrupt_draft_is_no_draft() {
        let store = MemoryDraftStore::with_raw("{\"step\": \"three\"");
        let flow = RestorationFlow::start(context(&store));
        assert_eq!(flow.resolution(), Some(Resolution::NoDraft));
        assert_eq!(flow.wizard().unwrap().current_step(), 1);
    }

    #[test]
    fn test_expired_draft_is_cleared() {
        let saved_at = now() - chrono::Duration::days(8);
        let store = MemoryDraftStore::with_draft(&draft(4, saved_at));
        let flow = RestorationFlow::start(context(&store));

        assert_eq!(flow.resolution(), Some(Resolution::NoDraft));
        assert!(!store.exists());
    }

    #[test]
    fn test_check_runs_once() {
        let store = MemoryDraftStore::new();
        let mut flow = RestorationFlow::new(context(&store));
        assert_eq!(flow.phase(), &RestorationPhase::Checking);
        assert!(flow.wizard().is_err());

        flow.check();
        store.save(&draft(2, now()));
        flow.check();
        assert_eq!(flow.resolution(), Some(Resolution::NoDraft));
    }

    #[test]
    fn test_into_wizard_returns_flow_while_prompting() {
        let store = MemoryDraftStore::with_draft(&draft(2, now()));
        let flow = RestorationFlow::start(context(&store));
        let mut flow = flow.into_wizard().unwrap_err();
        assert!(flow.restore());
        assert!(flow.into_wizard().is_ok());
    }
}
