//! Wizard session state and transition outcomes

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::form::{FieldKey, FormValues};
use crate::submit::{SubmitAck, SubmitError};
use crate::validation::FieldErrors;

/// Mutable state of one wizard session
#[derive(Debug, Clone, PartialEq)]
pub struct WizardState {
    /// Step being shown (1-based)
    pub current_step: u32,
    /// Everything entered so far, across all steps
    pub values: FormValues,
    /// Fields that currently fail their rule
    pub errors: FieldErrors,
    /// Fields the user has interacted with
    pub touched: BTreeSet<FieldKey>,
    /// Furthest step reached; `jump_to` may target any step up to this one
    pub furthest_step: u32,
}

impl WizardState {
    pub fn fresh() -> Self {
        Self {
            current_step: 1,
            values: FormValues::new(),
            errors: FieldErrors::new(),
            touched: BTreeSet::new(),
            furthest_step: 1,
        }
    }
}

/// Outcome of the hand-off to the submission collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Waiting for the collaborator
    Pending,
    /// The collaborator failed; values and draft are kept for a retry
    Failed { message: String },
    /// Accepted; the draft has been cleared
    Accepted { message: String },
}

/// Where the wizard is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardPhase {
    Editing,
    Submitted(SubmissionStatus),
}

impl WizardPhase {
    pub fn is_editing(&self) -> bool {
        matches!(self, WizardPhase::Editing)
    }

    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            WizardPhase::Submitted(SubmissionStatus::Accepted { .. })
        )
    }

    /// Message to show for the submission, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            WizardPhase::Submitted(
                SubmissionStatus::Failed { message } | SubmissionStatus::Accepted { message },
            ) => Some(message),
            _ => None,
        }
    }
}

/// How the wizard state came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Fresh,
    Restored { saved_at: DateTime<Utc> },
}

/// Result of `next()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The step validated and the wizard moved on
    Moved { from: u32, to: u32 },
    /// The step has errors; the wizard stayed put
    Blocked { errors: usize },
    /// The last step validated; nothing left but to submit
    Complete,
}

/// Result of `submit()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Validation failed; the wizard jumped to `step`
    Invalid { step: u32, errors: usize },
    Accepted(SubmitAck),
    Failed(SubmitError),
}

/// Affordance to show next to a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldStatus {
    /// Never touched: show nothing
    Untouched,
    /// Edited, inline check not run yet
    Checking,
    Valid,
    Invalid(String),
}
