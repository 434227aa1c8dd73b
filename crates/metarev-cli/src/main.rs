//! Metarev CLI
//!
//! Drives the versioned-metadata engine against a JSON state file:
//! - creating records and editing their attributes
//! - saving (which captures a revision or an autosave)
//! - previewing, restoring and comparing snapshots

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use metarev::{RevisionsConfig, Revisions, SaveContext};
use metarev_store::{AttributeStore, MemoryHost, RecordCatalog, RecordId, StoreConfig};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod output;

/// Config file picked up from the working directory when `--config` is not given.
const DEFAULT_CONFIG: &str = "metarev.json";

#[derive(Parser)]
#[command(name = "metarev")]
#[command(author, version, about = "Metarev: versioned metadata for revisions and autosaves")]
struct Cli {
    /// JSON state file of the host store
    #[arg(long, global = true, default_value = "./metarev-store.json")]
    store: PathBuf,

    /// Tracked fields per record type (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a live record
    New {
        /// Record type, e.g. `post`
        record_type: String,
    },

    /// Set one attribute (replaces every existing value)
    Set {
        id: RecordId,
        key: String,
        /// JSON value; anything that is not valid JSON is stored as a string
        value: String,
    },

    /// Print every value of one attribute
    Get { id: RecordId, key: String },

    /// Save a record: capture its tracked fields, then create a revision or autosave
    Save {
        id: RecordId,
        /// Incoming write (JSON object); empty when omitted
        #[arg(long)]
        payload: Option<PathBuf>,
        /// Save as an autosave instead of a revision
        #[arg(long)]
        autosave: bool,
    },

    /// List a record's revisions and its autosave
    Revisions { id: RecordId },

    /// Print the aggregate meta recorded on a revision
    Show { revision: RecordId },

    /// Restore a record's tracked fields from a revision
    Restore { record: RecordId, revision: RecordId },

    /// Compare the tracked fields of two snapshots
    Diff {
        /// Older snapshot; compares against nothing when omitted
        #[arg(long)]
        from: Option<RecordId>,
        to: RecordId,
        /// Side-by-side tables (implies --html)
        #[arg(long)]
        split: bool,
        /// Print the rendered HTML tables
        #[arg(long)]
        html: bool,
    },

    /// Read an attribute the way a preview render of the record sees it
    Preview { id: RecordId, key: String },
}

struct Session {
    host: Arc<MemoryHost>,
    revisions: Revisions<MemoryHost>,
}

impl Session {
    fn open(store: &Path, config: Option<&Path>, split_view: bool) -> Result<Self> {
        let host = MemoryHost::open(&StoreConfig::new(store))
            .with_context(|| format!("opening store {}", store.display()))?;
        let host = Arc::new(host);

        let mut config = load_config(config)?;
        config.split_view |= split_view;
        let revisions = Revisions::from_config(Arc::clone(&host), &config)
            .context("building engines from config")?;

        Ok(Self { host, revisions })
    }

    fn persist(&self) -> Result<()> {
        self.host.save().context("saving store")
    }
}

fn load_config(path: Option<&Path>) -> Result<RevisionsConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG);
            if !fallback.exists() {
                tracing::warn!("no config given and no {DEFAULT_CONFIG} found; nothing is tracked");
                return Ok(RevisionsConfig::default());
            }
            fallback
        }
    };
    RevisionsConfig::from_path(&path).with_context(|| format!("reading config {}", path.display()))
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let split_view = matches!(cli.command, Commands::Diff { split: true, .. });
    let session = Session::open(&cli.store, cli.config.as_deref(), split_view)?;

    match cli.command {
        Commands::New { record_type } => {
            let id = session.host.create_record(&record_type);
            session.persist()?;
            println!("{} {} {}", "created".green().bold(), record_type, id.to_string().bold());
        }
        Commands::Set { id, key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            session.host.set(id, &key, value)?;
            session.persist()?;
        }
        Commands::Get { id, key } => {
            output::values(&session.host.get_all(id, &key)?);
        }
        Commands::Save {
            id,
            payload,
            autosave,
        } => cmd_save(&session, id, payload.as_deref(), autosave)?,
        Commands::Revisions { id } => cmd_revisions(&session, id)?,
        Commands::Show { revision } => match session.revisions.revision_field_value(revision)? {
            Some(text) => println!("{text}"),
            None => println!("{}", "(no meta recorded)".dimmed()),
        },
        Commands::Restore { record, revision } => {
            match session.revisions.snapshot_restored(record, revision)? {
                Some(report) => {
                    session.persist()?;
                    output::restore_report(&report);
                }
                None => println!("{} record {record} is not of a tracked type", "info:".yellow().bold()),
            }
        }
        Commands::Diff {
            from,
            to,
            split,
            html,
        } => {
            let mut sections = Vec::new();
            session.revisions.compare_snapshots(from, to, &mut sections)?;
            output::diff_sections(&sections, html || split);
        }
        Commands::Preview { id, key } => {
            let values = session
                .revisions
                .render_preview(id, |meta| meta.get_meta(id, &key))??;
            output::values(&values);
        }
    }

    Ok(())
}

fn cmd_save(session: &Session, id: RecordId, payload: Option<&Path>, autosave: bool) -> Result<()> {
    let incoming = match payload {
        Some(path) => read_json(path)?,
        None => Value::Object(Default::default()),
    };
    let record_type = session
        .host
        .record_type(id)?
        .ok_or_else(|| anyhow!("unknown record {id}"))?;

    let ctx = if autosave {
        SaveContext::autosave()
    } else {
        SaveContext::default()
    };
    session.revisions.record_saved(id, &incoming, ctx)?;

    if autosave {
        let snapshot = session.host.create_autosave(id)?;
        session.revisions.snapshot_created(snapshot, &incoming)?;
        println!("{} {}", "autosaved".green().bold(), snapshot.to_string().bold());
    } else if session.revisions.check_for_changes(&record_type, true) {
        // Records carry no content of their own here, so a type without
        // tracked fields never has anything worth a revision.
        println!("{} no changes to revision", "info:".yellow().bold());
    } else {
        let snapshot = session.host.create_revision(id)?;
        session.revisions.snapshot_created(snapshot, &incoming)?;
        println!("{} {}", "revision".green().bold(), snapshot.to_string().bold());
    }

    session.persist()
}

fn cmd_revisions(session: &Session, id: RecordId) -> Result<()> {
    let info = session
        .host
        .record(id)
        .ok_or_else(|| anyhow!("unknown record {id}"))?;
    output::record_line(&info, false);

    let chain = session.host.revisions(id);
    let latest = chain.last().copied();
    for revision in chain.iter().rev() {
        if let Some(info) = session.host.record(*revision) {
            output::record_line(&info, Some(*revision) == latest);
        }
    }
    if let Some(autosave) = session.host.current_autosave(id)? {
        if let Some(info) = session.host.record(autosave) {
            output::record_line(&info, false);
        }
    }
    Ok(())
}
