//! Wizard controller
//!
//! Walks the user through the steps of a [`FormSchema`], gating `next()` on
//! step validation, running debounced inline checks, and auto-saving drafts
//! to an injected [`DraftStore`]. Timers are not real threads: the host calls
//! [`Wizard::poll`] (for example on every UI tick) to fire whatever is due.

mod state;


pub use state::*;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::WizardConfig;
use crate::draft::{Draft, DraftStore};
use crate::form::schema::{FormSchema, SchemaErrors, StepDefinition};
use crate::form::{FieldKey, FieldValue, FormValues};
use crate::schedule::{Clock, Timers};
use crate::submit::Submitter;
use crate::validation::{FieldErrors, Validator};

/// Errors from wizard operations. Validation failures are not errors; they
/// show up in [`Wizard::errors`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WizardError {
    #[error("invalid form schema: {0}")]
    Schema(#[from] SchemaErrors),
    #[error("unknown field '{0}'")]
    UnknownField(FieldKey),
    #[error("step {step} does not exist (the form has {count} steps)")]
    UnknownStep { step: u32, count: u32 },
    #[error("step {0} has not been visited yet")]
    StepNotVisited(u32),
    #[error("the form has already been submitted")]
    AlreadySubmitted,
    #[error("a saved draft is waiting for a restore or discard decision")]
    RestorationPending,
}

/// Timing knobs for a wizard session
#[derive(Debug, Clone, PartialEq)]
pub struct WizardOptions {
    /// Quiet period before an inline field check runs
    pub debounce: chrono::Duration,
    /// Delay between the first unsaved edit and the auto-save
    pub autosave_delay: chrono::Duration,
    /// Drafts older than this are discarded at startup (`None` keeps them forever)
    pub max_draft_age: Option<chrono::Duration>,
}

impl Default for WizardOptions {
    fn default() -> Self {
        Self {
            debounce: chrono::Duration::milliseconds(300),
            autosave_delay: chrono::Duration::milliseconds(1000),
            max_draft_age: Some(chrono::Duration::days(7)),
        }
    }
}

/// Longest accepted debounce or auto-save delay, in days
const MAX_DELAY_DAYS: i64 = 1;
/// Longest accepted draft age, in days
const MAX_DRAFT_AGE_DAYS: i64 = 36_500;

/// Convert a configured count with `unit`. Values above `max` fall back to `default`.
fn bounded(
    setting: &str,
    count: u64,
    unit: fn(i64) -> Option<chrono::Duration>,
    max: chrono::Duration,
    default: chrono::Duration,
) -> chrono::Duration {
    match i64::try_from(count).ok().and_then(unit) {
        Some(duration) if duration <= max => duration,
        _ => {
            warn!(setting, count, "Setting out of range, using the default");
            default
        }
    }
}

impl From<&WizardConfig> for WizardOptions {
    fn from(config: &WizardConfig) -> Self {
        let defaults = Self::default();
        Self {
            debounce: bounded(
                "debounce_ms",
                config.debounce_ms,
                chrono::Duration::try_milliseconds,
                chrono::Duration::days(MAX_DELAY_DAYS),
                defaults.debounce,
            ),
            autosave_delay: bounded(
                "autosave_delay_ms",
                config.autosave_delay_ms,
                chrono::Duration::try_milliseconds,
                chrono::Duration::days(MAX_DELAY_DAYS),
                defaults.autosave_delay,
            ),
            max_draft_age: (config.max_draft_age_hours > 0).then(|| {
                bounded(
                    "max_draft_age_hours",
                    config.max_draft_age_hours,
                    chrono::Duration::try_hours,
                    chrono::Duration::days(MAX_DRAFT_AGE_DAYS),
                    chrono::Duration::days(7),
                )
            }),
        }
    }
}

/// Scheduled work
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum TimerKey {
    Validate(FieldKey),
    AutoSave,
}

/// Everything a wizard needs besides its state
#[derive(Clone)]
pub struct WizardContext {
    pub validator: Validator,
    pub store: Arc<dyn DraftStore>,
    pub clock: Arc<dyn Clock>,
    pub options: WizardOptions,
}

impl WizardContext {
    pub fn new(
        validator: Validator,
        store: Arc<dyn DraftStore>,
        clock: Arc<dyn Clock>,
        options: WizardOptions,
    ) -> Self {
        Self {
            validator,
            store,
            clock,
            options,
        }
    }

    /// Build the context from a schema, refusing inconsistent ones
    pub fn for_schema(
        schema: FormSchema,
        store: Arc<dyn DraftStore>,
        clock: Arc<dyn Clock>,
        options: WizardOptions,
    ) -> Result<Self, WizardError> {
        let validator = Validator::new(schema)?;
        Ok(Self::new(validator, store, clock, options))
    }
}

/// One active wizard session
pub struct Wizard {
    validator: Validator,
    store: Arc<dyn DraftStore>,
    clock: Arc<dyn Clock>,
    options: WizardOptions,
    state: WizardState,
    phase: WizardPhase,
    origin: Origin,
    timers: Timers<TimerKey>,
    saved_tx: watch::Sender<Option<DateTime<Utc>>>,
}

impl Wizard {
    /// Start at step 1 with no values
    pub fn fresh(context: WizardContext) -> Self {
        Self::with_state(context, WizardState::fresh(), Origin::Fresh)
    }

    /// Rehydrate from a draft. The step is clamped into range and values for
    /// fields the schema does not declare are dropped.
    pub fn from_draft(context: WizardContext, draft: Draft) -> Self {
        let schema = context.validator.schema();
        let step = draft.step_index.clamp(1, schema.step_count().max(1));
        if step != draft.step_index {
            warn!(
                saved = draft.step_index,
                restored = step,
                "Draft step out of range, clamped"
            );
        }

        let total = draft.values.len();
        let values: FormValues = draft
            .values
            .into_iter()
            .filter(|(key, _)| schema.contains_field(key))
            .collect();
        if values.len() != total {
            warn!(
                dropped = total - values.len(),
                "Draft contained fields the form does not declare"
            );
        }

        let state = WizardState {
            current_step: step,
            touched: values.keys().cloned().collect(),
            values,
            errors: FieldErrors::new(),
            furthest_step: step,
        };
        let origin = Origin::Restored {
            saved_at: draft.saved_at,
        };

        let wizard = Self::with_state(context, state, origin);
        wizard.saved_tx.send_replace(Some(draft.saved_at));
        wizard
    }

    fn with_state(context: WizardContext, state: WizardState, origin: Origin) -> Self {
        let (saved_tx, _) = watch::channel(None);
        Self {
            validator: context.validator,
            store: context.store,
            clock: context.clock,
            options: context.options,
            state,
            phase: WizardPhase::Editing,
            origin,
            timers: Timers::new(),
            saved_tx,
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn schema(&self) -> &FormSchema {
        self.validator.schema()
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn current_step(&self) -> u32 {
        self.state.current_step
    }

    pub fn current_step_definition(&self) -> Option<&StepDefinition> {
        self.schema().step(self.state.current_step)
    }

    pub fn step_count(&self) -> u32 {
        self.schema().step_count()
    }

    pub fn values(&self) -> &FormValues {
        &self.state.values
    }

    pub fn value(&self, key: &FieldKey) -> Option<&FieldValue> {
        self.state.values.get(key)
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.state.errors
    }

    pub fn phase(&self) -> &WizardPhase {
        &self.phase
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_first_step(&self) -> bool {
        self.state.current_step == 1
    }

    pub fn is_last_step(&self) -> bool {
        self.state.current_step >= self.step_count()
    }

    /// `current / N * 100`, always derived from the current step
    pub fn progress_percent(&self) -> f64 {
        let total = self.step_count();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.state.current_step) / f64::from(total) * 100.0
    }

    pub fn field_status(&self, key: &FieldKey) -> FieldStatus {
        if let Some(message) = self.state.errors.get(key) {
            FieldStatus::Invalid(message.clone())
        } else if self.timers.is_pending(&TimerKey::Validate(key.clone())) {
            FieldStatus::Checking
        } else if self.state.touched.contains(key) {
            FieldStatus::Valid
        } else {
            FieldStatus::Untouched
        }
    }

    /// Timestamp of the last successful save, if any
    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        *self.saved_tx.borrow()
    }

    /// Receive the timestamp of every successful save
    pub fn subscribe_saves(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.saved_tx.subscribe()
    }

    /// When the host should call [`Wizard::poll`] next
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    pub fn has_pending_autosave(&self) -> bool {
        self.timers.is_pending(&TimerKey::AutoSave)
    }

    // ─── Editing ────────────────────────────────────────────────────────────

    /// Write a field value, mark it touched and schedule its inline check and
    /// an auto-save.
    pub fn set_field(
        &mut self,
        key: impl Into<FieldKey>,
        value: FieldValue,
    ) -> Result<(), WizardError> {
        let key = key.into();
        self.ensure_known(&key)?;
        self.ensure_editable()?;

        let value = self.validator.transform_input(&key, value);
        self.state.values.insert(key.clone(), value);
        self.after_edit(key);
        Ok(())
    }

    /// Make a field undefined again
    pub fn clear_field(&mut self, key: impl Into<FieldKey>) -> Result<(), WizardError> {
        let key = key.into();
        self.ensure_known(&key)?;
        self.ensure_editable()?;

        self.state.values.remove(&key);
        self.after_edit(key);
        Ok(())
    }

    fn after_edit(&mut self, key: FieldKey) {
        let now = self.clock.now();
        self.state.touched.insert(key.clone());
        self.timers
            .schedule(TimerKey::Validate(key), now + self.options.debounce);
        self.schedule_autosave(now);
    }

    /// Auto-save is throttled rather than debounced: the first unsaved edit
    /// sets the deadline and later edits ride along with it.
    fn schedule_autosave(&mut self, now: DateTime<Utc>) {
        if self.has_identity() && !self.timers.is_pending(&TimerKey::AutoSave) {
            self.timers
                .schedule(TimerKey::AutoSave, now + self.options.autosave_delay);
        }
    }

    /// Whether any identity field holds a value
    fn has_identity(&self) -> bool {
        self.schema().identity_fields().any(|key| {
            self.state
                .values
                .get(key)
                .is_some_and(|value| !value.is_empty())
        })
    }

    /// Fire every due timer. Returns how many ran.
    pub fn poll(&mut self) -> usize {
        let due = self.timers.take_due(self.clock.now());
        let fired = due.len();
        for task in due {
            match task {
                TimerKey::Validate(key) => self.revalidate_field(&key),
                TimerKey::AutoSave => {
                    self.save_now();
                }
            }
        }
        fired
    }

    fn revalidate_field(&mut self, key: &FieldKey) {
        match self.validator.validate_field(key, self.state.values.get(key)) {
            Some(message) => {
                debug!(field = %key, %message, "Inline check failed");
                self.state.errors.insert(key.clone(), message);
            }
            None => {
                self.state.errors.remove(key);
            }
        }
    }

    /// Save a draft immediately. Returns whether the store accepted it.
    pub fn save_now(&mut self) -> bool {
        self.timers.cancel(&TimerKey::AutoSave);

        if self.phase.is_accepted() {
            return false;
        }
        if !self.has_identity() {
            debug!("Auto-save skipped: no identity field filled");
            return false;
        }

        let now = self.clock.now();
        let draft = Draft::new(self.state.current_step, self.state.values.clone(), now);
        if self.store.save(&draft) {
            self.saved_tx.send_replace(Some(now));
            debug!(step = draft.step_index, "Draft auto-saved");
            true
        } else {
            debug!("Auto-save failed, will retry on the next edit");
            false
        }
    }

    /// Run a pending auto-save now; does nothing when none is pending
    pub fn flush_autosave(&mut self) -> bool {
        if self.timers.is_pending(&TimerKey::AutoSave) {
            self.save_now()
        } else {
            false
        }
    }

    // ─── Navigation ─────────────────────────────────────────────────────────

    /// Validate the current step and advance if it passes
    pub fn next(&mut self) -> Result<Advance, WizardError> {
        self.ensure_editable()?;

        let current = self.state.current_step;
        let step_fields: Vec<FieldKey> = self
            .schema()
            .step(current)
            .map(|s| s.fields.clone())
            .unwrap_or_default();

        let errors = self.validator.validate_step(current, &self.state.values);
        if !errors.is_empty() {
            let count = errors.len();
            // A stale inline check must not erase the step-level result
            for key in &step_fields {
                self.timers.cancel(&TimerKey::Validate(key.clone()));
            }
            self.state.errors.extend(errors);
            debug!(step = current, errors = count, "Step blocked by validation");
            return Ok(Advance::Blocked { errors: count });
        }

        self.state
            .errors
            .retain(|key, _| !step_fields.contains(key));

        if current >= self.step_count() {
            debug!(step = current, "Last step complete");
            return Ok(Advance::Complete);
        }

        let to = current + 1;
        self.state.current_step = to;
        self.state.furthest_step = self.state.furthest_step.max(to);
        self.schedule_autosave(self.clock.now());
        debug!(from = current, to, "Advanced to next step");
        Ok(Advance::Moved { from: current, to })
    }

    /// Go back one step. Never validates.
    pub fn previous(&mut self) -> Result<u32, WizardError> {
        self.ensure_editable()?;

        let from = self.state.current_step;
        let to = from.saturating_sub(1).max(1);
        if to != from {
            self.state.current_step = to;
            self.schedule_autosave(self.clock.now());
            debug!(from, to, "Went back a step");
        }
        Ok(to)
    }

    /// Jump to a step that has already been reached
    pub fn jump_to(&mut self, step: u32) -> Result<(), WizardError> {
        let count = self.step_count();
        if step == 0 || step > count {
            return Err(WizardError::UnknownStep { step, count });
        }
        if step > self.state.furthest_step {
            return Err(WizardError::StepNotVisited(step));
        }
        self.ensure_editable()?;

        if step != self.state.current_step {
            debug!(from = self.state.current_step, to = step, "Jumped to step");
            self.state.current_step = step;
            self.schedule_autosave(self.clock.now());
        }
        Ok(())
    }

    // ─── Submission ─────────────────────────────────────────────────────────

    /// Validate everything and hand the normalized values to `submitter`.
    ///
    /// On validation failure the wizard jumps to the first step with an error
    /// and stays editable. On submitter failure the values and the draft are
    /// kept and `submit` may be called again.
    pub async fn submit(
        &mut self,
        submitter: &dyn Submitter,
    ) -> Result<SubmitOutcome, WizardError> {
        if self.phase.is_accepted() {
            return Err(WizardError::AlreadySubmitted);
        }
        self.cancel_field_checks();

        let normalized = match self.validator.validate_all(&self.state.values) {
            Ok(normalized) => normalized,
            Err(errors) => {
                let step = self
                    .validator
                    .first_step_with_error(&errors)
                    .unwrap_or(self.state.current_step);
                let count = errors.len();
                self.state.errors = errors;
                self.state.current_step = step;
                self.state.furthest_step = self.state.furthest_step.max(step);
                self.phase = WizardPhase::Editing;
                info!(step, errors = count, "Submission blocked by validation");
                return Ok(SubmitOutcome::Invalid {
                    step,
                    errors: count,
                });
            }
        };

        self.state.errors.clear();
        // Make sure a failed hand-off leaves the latest answers on disk
        self.save_now();
        self.phase = WizardPhase::Submitted(SubmissionStatus::Pending);
        info!(form = %self.schema().key, fields = normalized.len(), "Submitting form");

        match submitter.submit(&normalized).await {
            Ok(ack) => {
                self.store.clear();
                self.timers.cancel_all();
                self.state.values = normalized;
                self.phase = WizardPhase::Submitted(SubmissionStatus::Accepted {
                    message: ack.message.clone(),
                });
                info!(form = %self.schema().key, "Submission accepted, draft cleared");
                Ok(SubmitOutcome::Accepted(ack))
            }
            Err(e) => {
                warn!(form = %self.schema().key, "Submission failed: {}", e);
                self.phase = WizardPhase::Submitted(SubmissionStatus::Failed {
                    message: e.user_message(),
                });
                Ok(SubmitOutcome::Failed(e))
            }
        }
    }

    /// Tear the session down, cancelling pending timers. Returns how many were dropped.
    pub fn unmount(mut self) -> usize {
        let cancelled = self.timers.cancel_all();
        debug!(cancelled, "Wizard unmounted");
        cancelled
    }

    // ─── Guards ─────────────────────────────────────────────────────────────

    fn ensure_known(&self, key: &FieldKey) -> Result<(), WizardError> {
        if self.schema().contains_field(key) {
            Ok(())
        } else {
            Err(WizardError::UnknownField(key.clone()))
        }
    }

    /// Accepted is terminal; editing after a failed or abandoned hand-off
    /// returns the wizard to `Editing`.
    fn ensure_editable(&mut self) -> Result<(), WizardError> {
        match &self.phase {
            WizardPhase::Editing => Ok(()),
            WizardPhase::Submitted(SubmissionStatus::Accepted { .. }) => {
                Err(WizardError::AlreadySubmitted)
            }
            WizardPhase::Submitted(_) => {
                self.phase = WizardPhase::Editing;
                Ok(())
            }
        }
    }

    fn cancel_field_checks(&mut self) {
        let keys: Vec<FieldKey> = self.state.touched.iter().cloned().collect();
        for key in keys {
            self.timers.cancel(&TimerKey::Validate(key));
        }
    }
}

impl std::fmt::Debug for Wizard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wizard")
            .field("form", &self.schema().key)
            .field("state", &self.state)
            .field("phase", &self.phase)
            .field("origin", &self.origin)
            .field("pending_timers", &self.timers.len())
            .finish()
    }
}
