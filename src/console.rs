//! Line-oriented interactive host for a wizard session
//!
//! Reads one command per line, drives the [`Wizard`] and renders the current
//! step. Input and output are generic so sessions can be scripted in tests.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::form::schema::{FieldKind, FieldRule};
use crate::form::{FieldKey, FieldValue, FileHandle, FormValues};
use crate::indicator::{ConnectivityEvent, ConnectivityIndicator};
use crate::restoration::{RestorationFlow, RestorationPhase};
use crate::schedule::Clock;
use crate::submit::{SubmitAck, SubmitError, Submitter};
use crate::wizard::{Advance, FieldStatus, SubmitOutcome, Wizard};

const HELP: &str = "\
Commands:
  set <field> <value>   write a field (lists: comma separated, files: a path)
  clear <field>         make a field empty
  next | n              validate this step and continue
  back | b              previous step
  jump <step>           go to a step you have already reached
  status | s            show the current step
  submit                validate everything and send
  online | offline      report connectivity
  help | ?              this text
  quit | q              leave; the draft is kept";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("type a command, or `help`")]
    Empty,
    #[error("unknown command '{0}', type `help` for the list")]
    Unknown(String),
    #[error("`{command}` needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("'{0}' is not a step number")]
    InvalidStep(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { field: String, value: String },
    Clear(String),
    Next,
    Back,
    Jump(u32),
    Status,
    Submit,
    Online,
    Offline,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "set" => {
                let (field, value) = match rest.split_once(char::is_whitespace) {
                    Some((field, value)) => (field, value.trim()),
                    None => (rest, ""),
                };
                if field.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "set",
                        argument: "a field name",
                    });
                }
                Ok(Command::Set {
                    field: field.to_string(),
                    value: value.to_string(),
                })
            }
            "clear" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "clear",
                        argument: "a field name",
                    });
                }
                Ok(Command::Clear(rest.to_string()))
            }
            "next" | "n" => Ok(Command::Next),
            "back" | "b" => Ok(Command::Back),
            "jump" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "jump",
                        argument: "a step number",
                    });
                }
                rest.parse()
                    .map(Command::Jump)
                    .map_err(|_| CommandError::InvalidStep(rest.to_string()))
            }
            "status" | "s" => Ok(Command::Status),
            "submit" => Ok(Command::Submit),
            "online" => Ok(Command::Online),
            "offline" => Ok(Command::Offline),
            "help" | "?" => Ok(Command::Help),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Turn typed text into a value of the field's kind.
///
/// Text that does not parse as the kind is kept as text, so the validator
/// reports it instead of the input layer.
pub fn parse_input(rule: &FieldRule, raw: &str) -> Result<FieldValue, String> {
    let raw = raw.trim_end();
    match rule.kind {
        FieldKind::Text | FieldKind::Select => Ok(FieldValue::text(raw)),
        FieldKind::Number => Ok(raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map_or_else(|| FieldValue::text(raw), FieldValue::Number)),
        FieldKind::Boolean => Ok(match raw.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "on" | "1" => FieldValue::Bool(true),
            "no" | "n" | "false" | "off" | "0" => FieldValue::Bool(false),
            _ => FieldValue::text(raw),
        }),
        FieldKind::MultiSelect => Ok(FieldValue::multi(
            raw.split(',').map(str::trim).filter(|item| !item.is_empty()),
        )),
        FieldKind::File => file_handle(Path::new(raw.trim())).map(FieldValue::File),
    }
}

fn file_handle(path: &Path) -> Result<FileHandle, String> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    if !metadata.is_file() {
        return Err(format!("{} is not a file", path.display()));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mime = path
        .extension()
        .and_then(|ext| mime_for_extension(&ext.to_string_lossy().to_ascii_lowercase()))
        .map(str::to_string);
    Ok(FileHandle {
        name,
        size: metadata.len(),
        mime,
    })
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "doc" => Some("application/msword"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

/// Submitter used when no endpoint is configured: prints the registration
pub struct StdoutSubmitter;

#[async_trait]
impl Submitter for StdoutSubmitter {
    async fn submit(&self, values: &FormValues) -> Result<SubmitAck, SubmitError> {
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| SubmitError::rejected(format!("Could not encode registration: {e}")))?;
        println!("{json}");
        Ok(SubmitAck::new("Registration printed (no submit endpoint configured)"))
    }
}

/// How an interactive session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The registration was accepted
    Submitted,
    /// The user left (or input ended); any draft is kept
    Quit,
}

pub struct Console<R, W> {
    input: R,
    output: W,
    clock: Arc<dyn Clock>,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W, clock: Arc<dyn Clock>) -> Self {
        Self {
            input,
            output,
            clock,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Run a session to completion: resolve the restoration prompt, then
    /// process commands until the user submits or quits.
    pub async fn run(
        &mut self,
        mut flow: RestorationFlow,
        submitter: &dyn Submitter,
    ) -> Result<SessionEnd> {
        if !self.resolve_restoration(&mut flow)? {
            return Ok(SessionEnd::Quit);
        }
        let mut wizard = flow
            .into_wizard()
            .map_err(|_| anyhow!("restoration was not resolved"))?;
        let mut indicator = ConnectivityIndicator::new(wizard.subscribe_saves());

        writeln!(
            self.output,
            "{} ({} steps). Type `help` for commands.",
            wizard.schema().name,
            wizard.step_count()
        )?;
        self.render_step(&wizard)?;

        loop {
            wizard.poll();
            self.report_save(&mut indicator)?;

            write!(
                self.output,
                "[{}/{}] > ",
                wizard.current_step(),
                wizard.step_count()
            )?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                return self.leave(wizard);
            };
            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(CommandError::Empty) => continue,
                Err(e) => {
                    writeln!(self.output, "{e}")?;
                    continue;
                }
            };
            debug!(?command, "Console command");

            match command {
                Command::Set { field, value } => self.set(&mut wizard, &field, &value)?,
                Command::Clear(field) => {
                    if let Err(e) = wizard.clear_field(field.as_str()) {
                        writeln!(self.output, "{e}")?;
                    }
                }
                Command::Next => match wizard.next() {
                    Ok(Advance::Moved { .. }) => self.render_step(&wizard)?,
                    Ok(Advance::Blocked { errors }) => {
                        writeln!(self.output, "{errors} field(s) need attention:")?;
                        self.render_errors(&wizard)?;
                    }
                    Ok(Advance::Complete) => writeln!(
                        self.output,
                        "All steps complete. Type `submit` to send your registration."
                    )?,
                    Err(e) => writeln!(self.output, "{e}")?,
                },
                Command::Back => match wizard.previous() {
                    Ok(_) => self.render_step(&wizard)?,
                    Err(e) => writeln!(self.output, "{e}")?,
                },
                Command::Jump(step) => match wizard.jump_to(step) {
                    Ok(()) => self.render_step(&wizard)?,
                    Err(e) => writeln!(self.output, "{e}")?,
                },
                Command::Status => {
                    self.render_step(&wizard)?;
                    writeln!(self.output, "{}", indicator.status_line(self.clock.now()))?;
                }
                Command::Submit => {
                    if self.submit(&mut wizard, &mut indicator, submitter).await? {
                        return Ok(SessionEnd::Submitted);
                    }
                }
                Command::Online => {
                    indicator.handle(ConnectivityEvent::Online);
                    writeln!(self.output, "{}", indicator.status_line(self.clock.now()))?;
                }
                Command::Offline => {
                    indicator.handle(ConnectivityEvent::Offline);
                    writeln!(self.output, "{}", indicator.status_line(self.clock.now()))?;
                }
                Command::Help => writeln!(self.output, "{HELP}")?,
                Command::Quit => return self.leave(wizard),
            }
        }
    }

    /// Ask restore-or-discard when a draft exists. Returns false if input ended first.
    fn resolve_restoration(&mut self, flow: &mut RestorationFlow) -> Result<bool> {
        let RestorationPhase::Prompting { step, saved_at } = flow.phase().clone() else {
            return Ok(true);
        };

        writeln!(
            self.output,
            "Found a saved draft from {} (step {}).",
            saved_at.format("%Y-%m-%d %H:%M UTC"),
            step
        )?;
        loop {
            write!(self.output, "Continue where you left off? [r]estore / [d]iscard: ")?;
            self.output.flush()?;

            let Some(answer) = self.read_line()? else {
                return Ok(false);
            };
            match answer.trim().to_ascii_lowercase().as_str() {
                "r" | "restore" => {
                    flow.restore();
                    return Ok(true);
                }
                "d" | "discard" => {
                    flow.discard();
                    return Ok(true);
                }
                _ => writeln!(self.output, "Please answer `r` or `d`.")?,
            }
        }
    }

    fn set(&mut self, wizard: &mut Wizard, field: &str, raw: &str) -> Result<()> {
        let key = FieldKey::from(field);
        let Some(rule) = wizard.schema().rule(&key).cloned() else {
            writeln!(self.output, "unknown field '{field}'")?;
            return Ok(());
        };

        let value = match parse_input(&rule, raw) {
            Ok(value) => value,
            Err(message) => {
                writeln!(self.output, "{message}")?;
                return Ok(());
            }
        };
        if let Err(e) = wizard.set_field(key, value) {
            writeln!(self.output, "{e}")?;
        }
        Ok(())
    }

    /// Returns true once the registration is accepted
    async fn submit(
        &mut self,
        wizard: &mut Wizard,
        indicator: &mut ConnectivityIndicator,
        submitter: &dyn Submitter,
    ) -> Result<bool> {
        if !indicator.snapshot().is_online {
            writeln!(self.output, "You appear to be offline; trying anyway.")?;
        }

        match wizard.submit(submitter).await {
            Ok(SubmitOutcome::Invalid { step, errors }) => {
                writeln!(
                    self.output,
                    "{errors} field(s) need attention. Back to step {step}."
                )?;
                self.render_step(wizard)?;
                Ok(false)
            }
            Ok(SubmitOutcome::Accepted(ack)) => {
                writeln!(self.output, "{}", ack.message)?;
                Ok(true)
            }
            Ok(SubmitOutcome::Failed(e)) => {
                writeln!(self.output, "{}", e.user_message())?;
                writeln!(self.output, "Type `submit` to try again.")?;
                self.report_save(indicator)?;
                Ok(false)
            }
            Err(e) => {
                writeln!(self.output, "{e}")?;
                Ok(false)
            }
        }
    }

    fn leave(&mut self, mut wizard: Wizard) -> Result<SessionEnd> {
        if wizard.flush_autosave() {
            writeln!(self.output, "Draft saved.")?;
        }
        if wizard.last_saved().is_some() {
            writeln!(self.output, "Your answers are kept; run the same form again to continue.")?;
        }
        wizard.unmount();
        Ok(SessionEnd::Quit)
    }

    fn report_save(&mut self, indicator: &mut ConnectivityIndicator) -> Result<()> {
        if indicator.take_save_notification() {
            writeln!(self.output, "(draft saved)")?;
        }
        Ok(())
    }

    fn render_step(&mut self, wizard: &Wizard) -> Result<()> {
        let Some(step) = wizard.current_step_definition() else {
            return Ok(());
        };
        writeln!(
            self.output,
            "\nStep {} of {}: {} ({:.0}%)",
            step.id,
            wizard.step_count(),
            step.name,
            wizard.progress_percent()
        )?;

        for key in &step.fields {
            let Some(rule) = wizard.schema().rule(key) else {
                continue;
            };
            let marker = if rule.required { "*" } else { " " };
            let value = wizard
                .value(key)
                .map(FieldValue::display)
                .unwrap_or_default();
            let note = match wizard.field_status(key) {
                FieldStatus::Invalid(message) => format!("  <- {message}"),
                _ => String::new(),
            };
            let choices = if rule.options.is_empty() {
                String::new()
            } else {
                format!(" [{}]", rule.options.join(", "))
            };
            writeln!(
                self.output,
                " {marker} {:<22} {:<24} {value}{note}",
                key.as_str(),
                format!("{}{}", rule.label(), choices_hint(rule.kind)),
            )?;
            if !choices.is_empty() {
                writeln!(self.output, "   {:<22} {}", "", choices.trim())?;
            }
        }
        Ok(())
    }

    fn render_errors(&mut self, wizard: &Wizard) -> Result<()> {
        for (key, message) in wizard.errors() {
            writeln!(self.output, "  {key}: {message}")?;
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read input")?;
        if read == 0 {
            Ok(None)
        } else {
            Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
        }
    }
}

fn choices_hint(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Boolean => " (yes/no)",
        FieldKind::MultiSelect => " (list)",
        FieldKind::File => " (file)",
        _ => "",
    }
}
