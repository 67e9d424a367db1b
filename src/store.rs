// 💾 SQLite Mirror - optional durable copy of the registry
//
// One table per entity kind keyed by the entity id, plus an import ledger.
// The mirror stores rows; it does not validate or resolve references. The
// registry stays the authority for both.

use crate::entities::{
    format_timestamp, parse_timestamp, Entity, EntityKind, Image, Measurement, Microscope,
    Operator, Sample, SampleStatus,
};
use crate::registry::{Registered, Registry};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ============================================================================
// ROW MAPPING
// ============================================================================

/// Maps an entity to one row of its table. The first column is the id.
pub trait MirrorRow: Entity {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    /// Values in `COLUMNS` order
    fn to_values(&self) -> Vec<Value>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn optional_text(value: Option<&str>) -> Value {
    value.map(text).unwrap_or(Value::Null)
}

fn timestamp(ts: &NaiveDateTime) -> Value {
    Value::Text(format_timestamp(ts))
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

impl MirrorRow for Operator {
    const TABLE: &'static str = "operators";
    const COLUMNS: &'static [&'static str] = &["id", "name", "email", "access_level"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(&self.id),
            text(&self.name),
            text(&self.email),
            text(&self.access_level),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Operator {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            access_level: row.get(3)?,
        })
    }
}

impl MirrorRow for Microscope {
    const TABLE: &'static str = "microscopes";
    const COLUMNS: &'static [&'static str] = &["id", "model", "resolution", "scale"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(&self.id),
            text(&self.model),
            text(&self.resolution),
            Value::Real(self.scale),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Microscope {
            id: row.get(0)?,
            model: row.get(1)?,
            resolution: row.get(2)?,
            scale: row.get(3)?,
        })
    }
}

impl MirrorRow for Sample {
    const TABLE: &'static str = "samples";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "sample_type",
        "collected_at",
        "responsible_operator",
        "status",
    ];

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(&self.id),
            text(&self.name),
            text(&self.sample_type),
            timestamp(&self.collected_at),
            text(&self.responsible_operator),
            text(self.status.as_str()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get(5)?;
        Ok(Sample {
            id: row.get(0)?,
            name: row.get(1)?,
            sample_type: row.get(2)?,
            collected_at: timestamp_at(row, 3)?,
            responsible_operator: row.get(4)?,
            status: SampleStatus::parse(&status).unwrap_or_default(),
        })
    }
}

impl MirrorRow for Image {
    const TABLE: &'static str = "images";
    const COLUMNS: &'static [&'static str] = &["id", "filename", "captured_at", "microscope_id"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(&self.id),
            text(&self.filename),
            timestamp(&self.captured_at),
            optional_text(self.microscope_id.as_deref()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Image {
            id: row.get(0)?,
            filename: row.get(1)?,
            captured_at: timestamp_at(row, 2)?,
            microscope_id: row.get(3)?,
        })
    }
}

impl MirrorRow for Measurement {
    const TABLE: &'static str = "measurements";
    const COLUMNS: &'static [&'static str] = &["id", "sample_id", "area", "measured_at", "image_id"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(&self.id),
            text(&self.sample_id),
            Value::Real(self.area),
            timestamp(&self.measured_at),
            optional_text(self.image_id.as_deref()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Measurement {
            id: row.get(0)?,
            sample_id: row.get(1)?,
            area: row.get(2)?,
            measured_at: timestamp_at(row, 3)?,
            image_id: row.get(4)?,
        })
    }
}

// ============================================================================
// SQL BUILDERS
// ============================================================================

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

fn insert_sql<T: MirrorRow>() -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        T::TABLE,
        T::COLUMNS.join(", "),
        placeholders(T::COLUMNS.len())
    )
}

fn update_sql<T: MirrorRow>() -> String {
    let assignments: Vec<String> = T::COLUMNS
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, col)| format!("{} = ?{}", col, i + 1))
        .collect();
    format!("UPDATE {} SET {} WHERE id = ?1", T::TABLE, assignments.join(", "))
}

fn upsert_sql<T: MirrorRow>() -> String {
    let assignments: Vec<String> = T::COLUMNS
        .iter()
        .skip(1)
        .map(|col| format!("{} = excluded.{}", col, col))
        .collect();
    format!(
        "{} ON CONFLICT(id) DO UPDATE SET {}",
        insert_sql::<T>(),
        assignments.join(", ")
    )
}

fn select_sql<T: MirrorRow>() -> String {
    format!("SELECT {} FROM {} WHERE id = ?1", T::COLUMNS.join(", "), T::TABLE)
}

fn select_all_sql<T: MirrorRow>() -> String {
    format!("SELECT {} FROM {} ORDER BY rowid", T::COLUMNS.join(", "), T::TABLE)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Rows written. Rows refused by a secondary constraint (operator email)
/// are counted in `conflicts` instead.
fn upsert_all<T: MirrorRow + Registered>(
    conn: &Connection,
    registry: &Registry,
    conflicts: &mut usize,
) -> Result<usize> {
    let mut stmt = conn.prepare(&upsert_sql::<T>())?;
    let mut written = 0;
    for entity in registry.iter::<T>() {
        // A failed statement is undone on its own; the transaction stays open
        match stmt.execute(params_from_iter(entity.to_values())) {
            Ok(_) => written += 1,
            Err(err) if is_constraint_violation(&err) => {
                warn!(
                    entity = %T::KIND,
                    id = entity.id(),
                    reason = %err,
                    "row conflicts with mirror, skipped"
                );
                *conflicts += 1;
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to mirror {} '{}'", T::KIND, entity.id()))
            }
        }
    }
    Ok(written)
}

fn insert_ledger_entry(conn: &Connection, entry: &LedgerEntry) -> Result<bool> {
    let result = conn.execute(
        "INSERT INTO import_log (fingerprint, path, imported, imported_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            entry.fingerprint,
            entry.path.display().to_string(),
            entry.imported as i64,
            format_timestamp(&Local::now().naive_local()),
        ],
    );

    match result {
        Ok(_) => Ok(true),
        Err(err) if is_constraint_violation(&err) => Ok(false),
        Err(err) => Err(err).context("Failed to record import"),
    }
}

fn load_into<T: MirrorRow + Registered>(
    mirror: &SqliteMirror,
    registry: &mut Registry,
) -> Result<usize> {
    let mut loaded = 0;
    for entity in mirror.list::<T>()? {
        if registry.register(entity) {
            loaded += 1;
        }
    }
    Ok(loaded)
}

// ============================================================================
// MIRROR
// ============================================================================

/// Rows written per table by `mirror_registry`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub operators: usize,
    pub microscopes: usize,
    pub samples: usize,
    pub images: usize,
    pub measurements: usize,

    /// Rows refused by a constraint other than the id (not in `total`)
    pub conflicts: usize,

    /// Ledger entries newly recorded in the same transaction
    pub ledger: usize,
}

/// One processed input file, recorded in the import ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub fingerprint: String,
    pub path: PathBuf,
    pub imported: usize,
}

impl MirrorReport {
    pub fn total(&self) -> usize {
        self.operators + self.microscopes + self.samples + self.images + self.measurements
    }
}

pub struct SqliteMirror {
    conn: Connection,
}

impl SqliteMirror {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        let mirror = SqliteMirror { conn };
        mirror.setup_schema()?;
        Ok(mirror)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let mirror = SqliteMirror { conn };
        mirror.setup_schema()?;
        Ok(mirror)
    }

    pub fn setup_schema(&self) -> Result<()> {
        // WAL for crash recovery
        self.conn.pragma_update(None, "journal_mode", "WAL")?;

        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS operators (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                access_level TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS microscopes (
                id TEXT PRIMARY KEY,
                model TEXT NOT NULL,
                resolution TEXT NOT NULL,
                scale REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS samples (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                sample_type TEXT NOT NULL,
                collected_at TEXT NOT NULL,
                responsible_operator TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'ACTIVE'
            );
            CREATE TABLE IF NOT EXISTS images (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                captured_at TEXT NOT NULL,
                microscope_id TEXT
            );
            CREATE TABLE IF NOT EXISTS measurements (
                id TEXT PRIMARY KEY,
                sample_id TEXT NOT NULL,
                area REAL NOT NULL,
                measured_at TEXT NOT NULL,
                image_id TEXT
            );
            CREATE TABLE IF NOT EXISTS import_log (
                fingerprint TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                imported INTEGER NOT NULL,
                imported_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_measurements_sample ON measurements(sample_id);
            CREATE INDEX IF NOT EXISTS idx_images_microscope ON images(microscope_id);",
        )
        .context("Failed to create schema")?;

        Ok(())
    }

    /// `Ok(false)` when a row with the same key already exists
    pub fn insert<T: MirrorRow>(&self, entity: &T) -> Result<bool> {
        match self
            .conn
            .execute(&insert_sql::<T>(), params_from_iter(entity.to_values()))
        {
            Ok(_) => Ok(true),
            Err(err) if is_constraint_violation(&err) => {
                debug!(entity = %T::KIND, id = entity.id(), "row already present");
                Ok(false)
            }
            Err(err) => Err(err)
                .with_context(|| format!("Failed to insert {} '{}'", T::KIND, entity.id())),
        }
    }

    /// `Ok(false)` when no row has this id
    pub fn update<T: MirrorRow>(&self, entity: &T) -> Result<bool> {
        let changed = self
            .conn
            .execute(&update_sql::<T>(), params_from_iter(entity.to_values()))
            .with_context(|| format!("Failed to update {} '{}'", T::KIND, entity.id()))?;
        Ok(changed > 0)
    }

    pub fn find<T: MirrorRow>(&self, id: &str) -> Result<Option<T>> {
        let found = self
            .conn
            .query_row(&select_sql::<T>(), params![id], |row| T::from_row(row))
            .optional()
            .with_context(|| format!("Failed to load {} '{}'", T::KIND, id))?;
        Ok(found)
    }

    /// Remove a row. Samples are archived instead of removed.
    pub fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let changed = match kind {
            EntityKind::Sample => self.conn.execute(
                "UPDATE samples SET status = ?2 WHERE id = ?1",
                params![id, SampleStatus::Archived.as_str()],
            ),
            other => self.conn.execute(
                &format!("DELETE FROM {} WHERE id = ?1", table_for(other)),
                params![id],
            ),
        }
        .with_context(|| format!("Failed to delete {} '{}'", kind, id))?;
        Ok(changed > 0)
    }

    pub fn count(&self, kind: EntityKind) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table_for(kind)),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Every row of one table, oldest first
    pub fn list<T: MirrorRow>(&self) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(&select_all_sql::<T>())?;
        let rows = stmt
            .query_map([], |row| T::from_row(row))?
            .collect::<rusqlite::Result<Vec<T>>>()
            .with_context(|| format!("Failed to load {} rows", T::KIND))?;
        Ok(rows)
    }

    /// Rebuild a registry from the mirrored rows.
    ///
    /// Kinds load in dependency order so references resolve. A row the
    /// registry refuses is logged and left out.
    pub fn load_registry(&self) -> Result<Registry> {
        let mut registry = Registry::new();
        let loaded = load_into::<Operator>(self, &mut registry)?
            + load_into::<Microscope>(self, &mut registry)?
            + load_into::<Sample>(self, &mut registry)?
            + load_into::<Image>(self, &mut registry)?
            + load_into::<Measurement>(self, &mut registry)?;
        info!(rows = loaded, "registry loaded from SQLite");
        Ok(registry)
    }

    /// Upsert every registry entity in one transaction
    pub fn mirror_registry(&mut self, registry: &Registry) -> Result<MirrorReport> {
        self.commit_ingest(registry, &[])
    }

    /// Upsert every registry entity and record `ledger` in one transaction.
    /// Either all of it lands or none of it does.
    pub fn commit_ingest(
        &mut self,
        registry: &Registry,
        ledger: &[LedgerEntry],
    ) -> Result<MirrorReport> {
        let tx = self.conn.transaction()?;

        let mut conflicts = 0;
        let mut report = MirrorReport {
            operators: upsert_all::<Operator>(&tx, registry, &mut conflicts)?,
            microscopes: upsert_all::<Microscope>(&tx, registry, &mut conflicts)?,
            samples: upsert_all::<Sample>(&tx, registry, &mut conflicts)?,
            images: upsert_all::<Image>(&tx, registry, &mut conflicts)?,
            measurements: upsert_all::<Measurement>(&tx, registry, &mut conflicts)?,
            conflicts: 0,
            ledger: 0,
        };
        report.conflicts = conflicts;

        for entry in ledger {
            if insert_ledger_entry(&tx, entry)? {
                report.ledger += 1;
            }
        }

        tx.commit().context("Failed to commit registry mirror")?;
        info!(
            rows = report.total(),
            conflicts = report.conflicts,
            ledger = report.ledger,
            "registry mirrored to SQLite"
        );
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Import ledger
    // ------------------------------------------------------------------------

    /// `false` when this fingerprint was already recorded
    pub fn record_import(&self, fingerprint: &str, path: &Path, imported: usize) -> Result<bool> {
        insert_ledger_entry(
            &self.conn,
            &LedgerEntry {
                fingerprint: fingerprint.to_string(),
                path: path.to_path_buf(),
                imported,
            },
        )
    }

    pub fn already_imported(&self, fingerprint: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM import_log WHERE fingerprint = ?1",
                params![fingerprint],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn table_for(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Operator => Operator::TABLE,
        EntityKind::Microscope => Microscope::TABLE,
        EntityKind::Sample => Sample::TABLE,
        EntityKind::Image => Image::TABLE,
        EntityKind::Measurement => Measurement::TABLE,
    }
}
