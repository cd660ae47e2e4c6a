//! importkit CLI: declarative CSV/XML record importer.
//!
//! Usage:
//!   importkit run --spec books.yaml books.csv [--db path] [--dry-run] [--json]
//!   importkit tasks daily.csv [--db path] [--today YYYY-MM-DD] [--dry-run]
//!   importkit fetch <url> <dest>
//!   importkit count <model> [--db path]

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use importkit::fetch::download_file;
use importkit::importer::{ImportSpec, Importer, SourceFormat};
use importkit::tasks::{ensure_categories, task_importer};
use importkit::{
    CsvAdapter, FieldValue, OpenStore, RecordStore, SourceAdapter, SqliteStore, XmlAdapter,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "importkit", version, about = "Import CSV and XML sources into a record store")]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an import described by a YAML spec
    Run {
        /// Path to the YAML import spec
        #[arg(long)]
        spec: PathBuf,
        /// CSV or XML file to import
        source: PathBuf,
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
        /// Parse and resolve every item without saving
        #[arg(long)]
        dry_run: bool,
        /// Print the summary and error log as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a daily task sheet
    Tasks {
        /// CSV task sheet
        source: PathBuf,
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
        /// Reference date for resolving "<weekday> <day>" dates
        #[arg(long)]
        today: Option<NaiveDate>,
        /// Parse and resolve every item without saving
        #[arg(long)]
        dry_run: bool,
    },
    /// Download a source file
    Fetch {
        url: String,
        dest: PathBuf,
    },
    /// Count stored records of a model
    Count {
        model: String,
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Get the default database path (~/.local/share/importkit/importkit.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let dir = data_dir.join("importkit");
    std::fs::create_dir_all(&dir).ok();
    dir.join("importkit.db")
}

fn open_store(db: Option<PathBuf>) -> Result<Arc<dyn RecordStore>, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    let store = SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(store))
}

fn run_import<A: SourceAdapter>(mut importer: Importer<A>, json: bool) -> i32 {
    let result = importer.parse();
    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: {}", importkit::importer::format_trace(&e));
            return 1;
        }
    };

    if json {
        let report = serde_json::json!({
            "summary": summary,
            "errors": importer.errors(),
        });
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
        return 0;
    }

    for entry in importer.errors() {
        eprintln!("Error importing item {}:\n{}", entry.index, entry.trace);
    }
    println!(
        "Processed {} items: {} created, {} updated, {} failed",
        summary.processed, summary.created, summary.updated, summary.failed
    );
    0
}

fn cmd_run(spec_path: &Path, source: &Path, db: Option<PathBuf>, dry_run: bool, json: bool) -> i32 {
    let spec = match ImportSpec::from_path(spec_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let store = match open_store(db) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let outcome = match spec.source.format {
        SourceFormat::Csv => spec
            .config::<CsvAdapter>()
            .map_err(|e| e.to_string())
            .and_then(|config| {
                let adapter = spec.csv_adapter().map_err(|e| e.to_string())?;
                Ok(Importer::new(config, adapter, store, source).with_commit(!dry_run))
            })
            .map(|importer| run_import(importer, json)),
        SourceFormat::Xml => spec
            .config::<XmlAdapter>()
            .map_err(|e| e.to_string())
            .map(|config| {
                let importer = Importer::new(config, spec.xml_adapter(), store, source);
                run_import(importer.with_commit(!dry_run), json)
            }),
    };

    outcome.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        1
    })
}

fn cmd_tasks(source: &Path, db: Option<PathBuf>, today: Option<NaiveDate>, dry_run: bool) -> i32 {
    let store = match open_store(db) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Err(e) = ensure_categories(store.as_ref()) {
        eprintln!("Error: {}", e);
        return 1;
    }

    let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());
    let config = match task_importer(Arc::clone(&store), today) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let mut importer = Importer::new(config, CsvAdapter::new(), store, source).with_commit(!dry_run);
    let summary = match importer.parse() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", importkit::importer::format_trace(&e));
            return 1;
        }
    };

    for entry in importer.errors() {
        let description = entry
            .data
            .get("description")
            .map(FieldValue::to_string)
            .unwrap_or_default();
        eprintln!("Error importing item: description={}", description);
        eprintln!("{}", entry.trace);
    }
    println!(
        "Imported {} tasks ({} new, {} updated, {} failed)",
        summary.saved(),
        summary.created,
        summary.updated,
        summary.failed
    );
    0
}

fn cmd_fetch(url: &str, dest: &Path) -> i32 {
    match download_file(url, dest) {
        Ok(bytes) => {
            println!("Downloaded {} bytes to {}", bytes, dest.display());
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_count(model: &str, db: Option<PathBuf>) -> i32 {
    let store = match open_store(db) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match store.count(model) {
        Ok(n) => {
            println!("{}", n);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let code = match cli.command {
        Commands::Run {
            spec,
            source,
            db,
            dry_run,
            json,
        } => cmd_run(&spec, &source, db, dry_run, json),
        Commands::Tasks {
            source,
            db,
            today,
            dry_run,
        } => cmd_tasks(&source, db, today, dry_run),
        Commands::Fetch { url, dest } => cmd_fetch(&url, &dest),
        Commands::Count { model, db } => cmd_count(&model, db),
    };
    std::process::exit(code);
}
