use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use micro_measure::logging::init_logging;
use micro_measure::{
    detect_csv_kind, file_fingerprint, scan_directory, AppConfig, CsvKind, Exporter, Importer,
    LedgerEntry, Registry, SqliteMirror, StatisticsEngine,
};

/// Lab sample, image and measurement registry with CSV/JSON import and export
#[derive(Debug, Parser)]
#[command(name = "micro-measure", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (TOML); falls back to MICRO_MEASURE_CONFIG, then defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List importable files (.csv / .json) in a directory
    Scan { dir: PathBuf },

    /// Import files and report what was admitted; with a mirror, resume from its contents
    Ingest {
        /// Files to import; defaults to every file in the configured watch_dir
        paths: Vec<PathBuf>,

        /// Write all exports after importing
        #[arg(long)]
        export: bool,

        /// Export destination (implies --export)
        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// SQLite mirror file, overrides the configured one
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    let level = if cli.verbose { "debug" } else { config.log_level.as_str() };
    // A subscriber may already be installed; logging is best effort here
    let _ = init_logging(level);

    match cli.command {
        Command::Scan { dir } => run_scan(&dir),
        Command::Ingest {
            paths,
            export,
            export_dir,
            database,
        } => {
            let export_dir = match export_dir {
                Some(dir) => Some(dir),
                None if export => Some(config.export_dir.clone()),
                None => None,
            };
            let database = database.or_else(|| config.database.clone());
            run_ingest(&config, paths, export_dir.as_deref(), database.as_deref())
        }
    }
}

fn run_scan(dir: &Path) -> Result<()> {
    let files = scan_directory(dir);
    println!("🔍 {} importable file(s) in {}", files.len(), dir.display());
    for file in files {
        println!("   {}", file.display());
    }
    Ok(())
}

/// Microscope CSVs go first so measurement imports can link to real microscopes
fn ingest_order(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let (mut microscopes, rest): (Vec<PathBuf>, Vec<PathBuf>) = paths
        .into_iter()
        .partition(|p| matches!(detect_csv_kind(p), Ok(Some(CsvKind::Microscopes))));
    microscopes.extend(rest);
    microscopes
}

fn run_ingest(
    config: &AppConfig,
    paths: Vec<PathBuf>,
    export_dir: Option<&Path>,
    database: Option<&Path>,
) -> Result<()> {
    println!("🔬 Micro Measure v{} - ingest", micro_measure::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let paths = if paths.is_empty() {
        scan_directory(&config.watch_dir)
    } else {
        paths
    };
    if paths.is_empty() {
        println!("ℹ️  Nothing to import");
        return Ok(());
    }

    let mut mirror = match database {
        Some(path) => Some(SqliteMirror::open(path)?),
        None => None,
    };

    // Earlier runs' entities must resolve, or placeholders would replace them
    let mut registry = match &mirror {
        Some(db) => db.load_registry()?,
        None => Registry::new(),
    };
    let mut ledger = Vec::new();

    println!("\n📂 Importing {} file(s)...", paths.len());
    for path in ingest_order(paths) {
        let fingerprint = match &mirror {
            Some(_) => Some(file_fingerprint(&path)?),
            None => None,
        };
        if let (Some(db), Some(fp)) = (&mirror, &fingerprint) {
            if db.already_imported(fp)? {
                println!("⏭️  {} (already imported)", path.display());
                continue;
            }
        }

        let mut importer = Importer::new(&mut registry, &config.import);
        match importer.import_file(&path) {
            Ok(report) => {
                println!("✓ {}", report);
                for warning in &report.warnings {
                    println!("   ⚠️  {}", warning);
                }
                if let Some(fingerprint) = fingerprint {
                    ledger.push(LedgerEntry {
                        fingerprint,
                        path: path.clone(),
                        imported: report.imported,
                    });
                }
            }
            Err(err) => println!("❌ {}: {}", path.display(), err),
        }
    }

    print_statistics(&registry);

    // Ledger entries land in the same transaction as the rows they describe
    if let Some(db) = mirror.as_mut() {
        let report = db.commit_ingest(&registry, &ledger)?;
        println!("\n💾 Mirrored {} row(s) to SQLite", report.total());
        if report.conflicts > 0 {
            println!("   ⚠️  {} row(s) conflicted and were skipped", report.conflicts);
        }
    }

    if let Some(dir) = export_dir {
        export_all(&registry, dir)?;
    }

    Ok(())
}

fn print_statistics(registry: &Registry) {
    let stats = StatisticsEngine::new(registry);

    println!("\n📊 Statistics");
    println!("   {}", stats.counts());
    println!("   Mean area:  {:.4}", stats.mean_area());
    println!("   Total area: {:.4}", stats.total_area());
    match stats.max_area_measurement() {
        Some(max) => println!("   Max area:   {:.4} ({})", max.area, max.id),
        None => println!("   Max area:   -"),
    }

    let issues = registry.integrity_issues();
    if !issues.is_empty() {
        println!("   ⚠️  {} dangling reference(s)", issues.len());
    }
}

fn export_all(registry: &Registry, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;

    let exporter = Exporter::new(registry);
    let results = [
        ("measurements.csv", exporter.export_measurements_csv(&dir.join("measurements.csv"))),
        ("measurements.json", exporter.export_measurements_json(&dir.join("measurements.json"))),
        ("samples.csv", exporter.export_samples_csv(&dir.join("samples.csv"))),
        ("samples.json", exporter.export_samples_json(&dir.join("samples.json"))),
        ("microscopes.csv", exporter.export_microscopes_csv(&dir.join("microscopes.csv"))),
    ];

    println!("\n📤 Exports in {}", dir.display());
    for (name, ok) in results {
        println!("   {} {}", if ok { "✓" } else { "❌" }, name);
    }
    Ok(())
}
