//! regwiz - multi-step registration wizard engine
//!
//! A form is described by a [`form::schema::FormSchema`]: ordered steps, a
//! rule per field and per-step constraints. A [`wizard::Wizard`] walks the
//! user through it, validating each step, auto-saving drafts through a
//! [`draft::DraftStore`], and handing the normalized values to a
//! [`submit::Submitter`]. [`restoration::RestorationFlow`] decides whether a
//! session resumes from a saved draft.

pub mod config;
pub mod console;
pub mod draft;
pub mod form;
pub mod indicator;
pub mod logging;
pub mod restoration;
pub mod schedule;
pub mod submit;
pub mod validation;
pub mod wizard;
