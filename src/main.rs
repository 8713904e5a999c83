use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regwiz::config::Config;
use regwiz::console::{Console, SessionEnd, StdoutSubmitter};
use regwiz::draft::{DraftStore, FileDraftStore};
use regwiz::form::loader::{load_form_file, load_forms};
use regwiz::form::schema::FormSchema;
use regwiz::logging;
use regwiz::restoration::RestorationFlow;
use regwiz::schedule::SystemClock;
use regwiz::submit::{HttpSubmitter, Submitter};
use regwiz::wizard::{WizardContext, WizardOptions};

#[derive(Parser)]
#[command(name = "regwiz")]
#[command(about = "Multi-step registration wizard with draft auto-save")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the state and forms directories and write ./regwiz.toml
    Init {
        /// Overwrite an existing regwiz.toml
        #[arg(long)]
        force: bool,
    },

    /// List available forms
    Forms,

    /// Check a form definition file for consistency
    Check {
        /// Path to a .json or .toml form definition
        file: PathBuf,
    },

    /// Fill in a form interactively
    Fill {
        /// Form key (see `regwiz forms`)
        form: String,
    },

    /// Inspect or delete a saved draft
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },
}

#[derive(Subcommand)]
enum DraftAction {
    /// Print the saved draft
    Show {
        /// Form key
        form: String,
    },
    /// Delete the saved draft
    Clear {
        /// Form key
        form: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;

    let logging_handle = logging::init_logging(&config, cli.debug)?;

    match cli.command {
        Commands::Init { force } => cmd_init(&config, force)?,
        Commands::Forms => cmd_forms(&config)?,
        Commands::Check { file } => cmd_check(&file)?,
        Commands::Fill { form } => cmd_fill(&config, &form).await?,
        Commands::Draft { action } => match action {
            DraftAction::Show { form } => cmd_draft_show(&config, &form)?,
            DraftAction::Clear { form } => cmd_draft_clear(&config, &form)?,
        },
    }

    if let Some(log_path) = logging_handle.log_file_path {
        if log_path.metadata().map(|m| m.len() > 0).unwrap_or(false) {
            eprintln!("Session log: {}", log_path.display());
        }
    }

    Ok(())
}

fn available_forms(config: &Config) -> Result<BTreeMap<String, FormSchema>> {
    load_forms(&config.forms_path())
}

fn find_form(config: &Config, key: &str) -> Result<FormSchema> {
    let mut forms = available_forms(config)?;
    match forms.remove(key) {
        Some(schema) => Ok(schema),
        None => {
            let known: Vec<&str> = forms.keys().map(String::as_str).collect();
            bail!("Unknown form '{}'. Available: {}", key, known.join(", "))
        }
    }
}

fn draft_store(config: &Config, schema: &FormSchema) -> FileDraftStore {
    FileDraftStore::new(config.drafts_path(), &schema.draft_key())
}

fn cmd_init(config: &Config, force: bool) -> Result<()> {
    let config_path = Config::local_config_path();
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    for dir in [config.drafts_path(), config.forms_path()] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    // Save config (after directories are created)
    config.save()?;

    println!("Wrote {}", config_path.display());
    println!("Drafts: {}", config.drafts_path().display());
    println!("Forms:  {}", config.forms_path().display());
    Ok(())
}

fn cmd_forms(config: &Config) -> Result<()> {
    let forms = available_forms(config)?;
    if forms.is_empty() {
        println!("No forms available");
        return Ok(());
    }

    println!("Forms ({})", forms.len());
    println!("{}", "─".repeat(60));
    for schema in forms.values() {
        let draft = if draft_store(config, schema).exists() {
            "  [draft saved]"
        } else {
            ""
        };
        println!(
            "{:<24} {} ({} steps){}",
            schema.key,
            schema.name,
            schema.step_count(),
            draft
        );
        if !schema.description.is_empty() {
            println!("{:<24} {}", "", schema.description);
        }
    }
    Ok(())
}

fn cmd_check(file: &Path) -> Result<()> {
    let schema = load_form_file(file)?;
    match schema.validate() {
        Ok(()) => {
            println!(
                "{}: OK ({} steps, {} fields)",
                schema.key,
                schema.step_count(),
                schema.fields.len()
            );
            Ok(())
        }
        Err(errors) => {
            eprintln!("{}: {} problem(s)", schema.key, errors.0.len());
            for error in &errors.0 {
                eprintln!("  - {}", error);
            }
            bail!("Form definition {} is inconsistent", file.display())
        }
    }
}

async fn cmd_fill(config: &Config, key: &str) -> Result<()> {
    let schema = find_form(config, key)?;
    let store = Arc::new(draft_store(config, &schema));
    let clock = Arc::new(SystemClock);
    let context = WizardContext::for_schema(
        schema,
        store,
        clock.clone(),
        WizardOptions::from(&config.wizard),
    )?;

    let submitter: Box<dyn Submitter> = match &config.submit.endpoint {
        Some(endpoint) => Box::new(HttpSubmitter::new(endpoint, config.submit.timeout())?),
        None => Box::new(StdoutSubmitter),
    };

    let flow = RestorationFlow::start(context);
    let stdin = std::io::stdin();
    let mut console = Console::new(stdin.lock(), std::io::stdout(), clock);
    match console.run(flow, submitter.as_ref()).await? {
        SessionEnd::Submitted => tracing::info!(form = key, "Session ended with submission"),
        SessionEnd::Quit => tracing::info!(form = key, "Session left without submitting"),
    }
    Ok(())
}

fn cmd_draft_show(config: &Config, key: &str) -> Result<()> {
    let schema = find_form(config, key)?;
    let store = draft_store(config, &schema);

    let Some(draft) = store.load() else {
        if store.exists() {
            println!("Draft at {} is unreadable", store.path().display());
        } else {
            println!("No saved draft for {}", key);
        }
        return Ok(());
    };

    println!(
        "Draft for {} (step {} of {}, saved {})",
        schema.name,
        draft.step_index,
        schema.step_count(),
        draft.saved_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!("{}", "─".repeat(60));
    for (field, value) in &draft.values {
        let label = schema.rule(field).map_or(field.as_str(), |r| r.label());
        println!("{:<28} {}", label, value.display());
    }
    Ok(())
}

fn cmd_draft_clear(config: &Config, key: &str) -> Result<()> {
    let schema = find_form(config, key)?;
    let store = draft_store(config, &schema);
    if !store.exists() {
        println!("No saved draft for {}", key);
        return Ok(());
    }
    store.clear();
    if store.exists() {
        bail!("Could not delete {}", store.path().display());
    }
    println!("Draft for {} deleted", key);
    Ok(())
}
