//! fieldmap: merge JSON files along declared field connections
//!
//! Usage:
//!   # Merge two files joined on users.id = orders.user_id, pretty JSON to stdout
//!   fieldmap merge users.json orders.json --connect users#id=orders#user_id
//!
//!   # Chain a third file and write NDJSON to a file
//!   fieldmap merge users.json orders.json products.json \
//!       -c users#id=orders#user_id -c orders#sku=products#sku \
//!       --exclude orders#internal_note --ndjson -o merged.jsonl
//!
//!   # Everything declared in a mapping file
//!   fieldmap merge --config mapping.toml
//!
//!   # Show the fields a file offers for connecting
//!   fieldmap structure users.json

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use fieldmap::config::{ConnectionSpec, FieldRef, MappingConfig};
use fieldmap::{FileId, OutputFormat, RecordWriter, Session};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fieldmap", version)]
#[command(about = "Merge JSON files along declared field connections", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge files into one dataset starting from a primary file
    Merge(MergeArgs),
    /// Print the flattened field structure of a file
    Structure(StructureArgs),
}

#[derive(Args, Debug)]
struct MergeArgs {
    /// Input JSON files, added after any listed in the mapping file
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Connection between two fields, FILE#FIELD=FILE#FIELD
    /// (files by name, name without extension, or position)
    #[arg(long = "connect", short = 'c', value_name = "FILE#FIELD=FILE#FIELD")]
    connections: Vec<ConnectionSpec>,

    /// TOML mapping file with files, connections and output settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// File to start from (default: first file)
    #[arg(long)]
    primary: Option<String>,

    /// Field to leave out of the output, FILE#FIELD
    #[arg(long, value_name = "FILE#FIELD")]
    exclude: Vec<FieldRef>,

    /// Output file (stdout if omitted)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Write newline-delimited JSON instead of a JSON array
    #[arg(long)]
    ndjson: bool,

    /// Compact JSON output (no pretty-printing)
    #[arg(long)]
    compact: bool,
}

#[derive(Args, Debug)]
struct StructureArgs {
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Merge(args) => run_merge(args),
        Command::Structure(args) => run_structure(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fieldmap={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_merge(args: MergeArgs) -> Result<()> {
    let mapping = match &args.config {
        Some(path) => MappingConfig::load(path)
            .with_context(|| format!("Failed to load mapping file {}", path.display()))?,
        None => MappingConfig::default(),
    };

    let mut files = mapping.files.clone();
    files.extend(args.files.iter().cloned());
    if files.is_empty() {
        bail!("No input files given");
    }

    let mut connections = mapping.connection_specs()?;
    connections.extend(args.connections.iter().cloned());
    let mut exclusions = mapping.exclusions()?;
    exclusions.extend(args.exclude.iter().cloned());

    let mut session = Session::new();
    let mut inputs = InputFiles::default();
    for path in &files {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = display_name(path);
        if session.files().iter().any(|file| file.name == name) {
            warn!(file = %path.display(), "another input has the same name; refer to it by position");
        }
        // A malformed file is skipped; the merge continues with the rest
        match session.ingest_bytes(name, &bytes) {
            Ok(id) => inputs.push(path, Some(id)),
            Err(err) => {
                warn!("{}", err);
                inputs.push(path, None);
            }
        }
    }

    for spec in &connections {
        let source = inputs
            .resolve(&session, &spec.source.file)
            .with_context(|| format!("Bad file in connection: {}", spec.source.file))?;
        let target = inputs
            .resolve(&session, &spec.target.file)
            .with_context(|| format!("Bad file in connection: {}", spec.target.file))?;
        session.add_connection(&source, spec.source.field.as_str(), &target, spec.target.field.as_str())?;
    }

    for field in &exclusions {
        let file = inputs.resolve(&session, &field.file)?;
        session
            .set_selection(&file, &field.field, false)
            .with_context(|| format!("Cannot exclude {}#{}", field.file, field.field))?;
    }

    let primary = match args.primary.as_deref().or(mapping.primary.as_deref()) {
        Some(reference) => Some(inputs.resolve(&session, reference)?),
        None => None,
    };

    let output = session.merge(primary.as_ref()).context("Merge failed")?;
    for file in &output.report.unreachable_files {
        if let Some(dataset) = session.file(file) {
            warn!(file = %dataset.name, "file is not connected to the primary file and was left out");
        }
    }

    let format = if args.ndjson { OutputFormat::Ndjson } else { mapping.output.format };
    let pretty = mapping.output.pretty && !args.compact;
    let written = match args.output.or(mapping.output.path) {
        Some(path) => {
            let mut writer = RecordWriter::create(&path, format)
                .with_context(|| format!("Failed to create {}", path.display()))?
                .pretty(pretty);
            let written = writer.write_records(&output.records)?;
            writer.flush()?;
            info!(path = %path.display(), "wrote merged data");
            written
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = RecordWriter::new(stdout.lock(), format).pretty(pretty);
            let written = writer.write_records(&output.records)?;
            writer.flush()?;
            written
        }
    };

    info!(
        records = written,
        files = output.report.merged_files.len(),
        "merged data successfully"
    );
    Ok(())
}

fn run_structure(args: StructureArgs) -> Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let rendered = render_structure(&args.file, &bytes, args.compact)?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", rendered)?;
    Ok(())
}

/// Ingest one file and render its structure as JSON
fn render_structure(path: &Path, bytes: &[u8], compact: bool) -> Result<String> {
    let mut session = Session::new();
    let id = session.ingest_bytes(display_name(path), bytes)?;
    let Some(dataset) = session.file(&id) else {
        bail!("File vanished after ingestion: {}", path.display());
    };

    if dataset.structure.is_empty() {
        warn!(file = %path.display(), "no fields found");
    }

    let rendered = if compact {
        serde_json::to_string(&dataset.structure)?
    } else {
        serde_json::to_string_pretty(&dataset.structure)?
    };
    Ok(rendered)
}

/// Input files in the order given, with the id of each one that ingested.
///
/// Positional references count every input, including ones that failed to
/// parse, so a skipped file never shifts the positions of later ones.
#[derive(Debug, Default)]
struct InputFiles {
    slots: Vec<(PathBuf, Option<FileId>)>,
}

impl InputFiles {
    fn push(&mut self, path: &Path, id: Option<FileId>) {
        self.slots.push((path.to_path_buf(), id));
    }

    /// Resolve a file id, name, stem or input position
    fn resolve(&self, session: &Session, reference: &str) -> Result<FileId> {
        if let Some(file) = session.find_file(reference)? {
            return Ok(file.id.clone());
        }
        let Ok(position) = reference.parse::<usize>() else {
            bail!("Unknown file: {}", reference);
        };
        match self.slots.get(position) {
            Some((_, Some(id))) => Ok(id.clone()),
            Some((path, None)) => bail!(
                "Input {} ({}) was skipped because it could not be parsed",
                position,
                path.display()
            ),
            None => bail!("Input position {} out of range ({} inputs)", position, self.slots.len()),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
