// 🔄 Import/Export Pipeline - flat files ⇄ registry entities
//
// Flow per import record:
//   parse (typed candidate) → resolve/auto-create references → register
//
// Failure semantics:
// - one bad record: skipped, logged at warn, recorded in the ImportReport
// - unreadable file: terminal for that call only (0 / Err)
// - nothing here panics or aborts the hosting process

pub mod csv_import;
pub mod export;
pub mod json_import;
pub mod scan;

pub use csv_import::{detect_csv_kind, CsvKind};
pub use export::Exporter;
pub use scan::{file_fingerprint, scan_directory};

use crate::entities::{
    format_timestamp, parse_timestamp, Entity, Image, Measurement, Microscope, Sample,
};
use crate::error::{PipelineError, PipelineResult};
use crate::registry::{Registry, Resolution};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Header of measurement CSV files, in field order
pub const MEASUREMENT_HEADER: [&str; 6] =
    ["id", "sampleId", "area", "timestamp", "imageId", "imageFilename"];

/// Header of microscope CSV files, in field order
pub const MICROSCOPE_HEADER: [&str; 4] = ["id", "model", "resolution", "scale"];

/// Header of sample CSV exports, in field order
pub const SAMPLE_HEADER: [&str; 6] = [
    "id",
    "name",
    "type",
    "collectionTimestamp",
    "responsibleOperator",
    "measurementCount",
];

// Placeholder values for entities synthesized during import
const PLACEHOLDER_SAMPLE_PREFIX: &str = "Sample_";
const PLACEHOLDER_SAMPLE_TYPE: &str = "Imported";
const PLACEHOLDER_OPERATOR: &str = "System";
const TEMPORARY_MICROSCOPE_ID: &str = "TEMP_001";
const TEMPORARY_MICROSCOPE_MODEL: &str = "Temporary";

// ============================================================================
// IMPORT SETTINGS
// ============================================================================

/// Defaults used when import has to synthesize a microscope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub default_scale: f64,
    pub default_resolution: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            default_scale: 10.0,
            default_resolution: "1920x1080".to_string(),
        }
    }
}

// ============================================================================
// IMPORT REPORT
// ============================================================================

/// One skipped record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportWarning {
    /// "line 7" for CSV, "record 3" for JSON
    pub location: String,
    pub reason: String,
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.reason)
    }
}

/// Per-call outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub source: String,
    pub imported: usize,
    pub skipped: usize,
    pub created_samples: usize,
    pub created_images: usize,
    pub created_microscopes: usize,
    pub warnings: Vec<ImportWarning>,
}

impl ImportReport {
    pub fn new(source: impl Into<String>) -> Self {
        ImportReport {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Record and log a skipped record
    pub(crate) fn skip(&mut self, location: impl Into<String>, reason: impl Into<String>) {
        let warning = ImportWarning {
            location: location.into(),
            reason: reason.into(),
        };
        warn!(
            source = %self.source,
            location = %warning.location,
            reason = %warning.reason,
            "skipping import record"
        );
        self.skipped += 1;
        self.warnings.push(warning);
    }

    pub fn created_total(&self) -> usize {
        self.created_samples + self.created_images + self.created_microscopes
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} imported, {} skipped, {} auto-created",
            self.source,
            self.imported,
            self.skipped,
            self.created_total()
        )
    }
}

// ============================================================================
// FLAT RECORDS
// ============================================================================

/// Flat measurement record shared by CSV and JSON, import and export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    pub id: String,
    pub sample_id: String,
    pub area: f64,
    pub timestamp: String,
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub image_filename: Option<String>,
}

impl MeasurementRecord {
    pub fn from_measurement(measurement: &Measurement, registry: &Registry) -> Self {
        let image_filename = measurement
            .image_id
            .as_deref()
            .and_then(|id| registry.find::<Image>(id))
            .map(|image| image.filename.clone());

        MeasurementRecord {
            id: measurement.id.clone(),
            sample_id: measurement.sample_id.clone(),
            area: measurement.area,
            timestamp: format_timestamp(&measurement.measured_at),
            image_id: measurement.image_id.clone(),
            image_filename,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicroscopeRecord {
    pub id: String,
    pub model: String,
    pub resolution: String,
    pub scale: f64,
}

impl From<&Microscope> for MicroscopeRecord {
    fn from(mic: &Microscope) -> Self {
        MicroscopeRecord {
            id: mic.id.clone(),
            model: mic.model.clone(),
            resolution: mic.resolution.clone(),
            scale: mic.scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sample_type: String,
    pub collection_timestamp: String,
    pub responsible_operator: String,
    pub measurement_count: usize,
}

impl SampleRecord {
    pub fn from_sample(sample: &Sample, registry: &Registry) -> Self {
        SampleRecord {
            id: sample.id.clone(),
            name: sample.name.clone(),
            sample_type: sample.sample_type.clone(),
            collection_timestamp: format_timestamp(&sample.collected_at),
            responsible_operator: sample.responsible_operator.clone(),
            measurement_count: registry.measurement_count_for_sample(&sample.id),
        }
    }
}

/// Empty or whitespace-only optional fields mean "absent"
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// IMPORTER
// ============================================================================

/// Runs imports against one registry.
///
/// Holds the registry mutably for its whole lifetime; with a `SharedRegistry`
/// build it inside `write(..)` so the batch is one critical section.
pub struct Importer<'a> {
    registry: &'a mut Registry,
    config: ImportConfig,
}

impl<'a> Importer<'a> {
    pub fn new(registry: &'a mut Registry, config: &ImportConfig) -> Self {
        Importer {
            registry,
            config: config.clone(),
        }
    }

    /// Import any supported file, picking the reader from extension and header
    pub fn import_file(&mut self, path: &Path) -> PipelineResult<ImportReport> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => self.import_measurements_json_report(path),
            Some("csv") => match detect_csv_kind(path)? {
                Some(CsvKind::Microscopes) => self.import_microscopes_csv_report(path),
                Some(CsvKind::Measurements) => self.import_measurements_csv_report(path),
                None => Err(PipelineError::MalformedRecord {
                    location: format!("{} header", path.display()),
                    reason: "header matches neither measurements nor microscopes".to_string(),
                }),
            },
            _ => Err(PipelineError::MalformedRecord {
                location: path.display().to_string(),
                reason: "unsupported file extension".to_string(),
            }),
        }
    }

    /// Resolve references, auto-create what is missing, then register.
    /// Returns true when the measurement was admitted.
    fn admit_measurement(
        &mut self,
        record: MeasurementRecord,
        location: &str,
        report: &mut ImportReport,
    ) -> bool {
        let measured_at = match parse_timestamp(&record.timestamp) {
            Ok(ts) => ts,
            Err(err) => {
                report.skip(location, format!("bad timestamp '{}': {}", record.timestamp, err));
                return false;
            }
        };

        let sample_id = record.sample_id.trim().to_string();
        let placeholder_sample = || {
            Sample::new(
                &sample_id,
                &format!("{}{}", PLACEHOLDER_SAMPLE_PREFIX, sample_id),
                PLACEHOLDER_SAMPLE_TYPE,
                measured_at,
                PLACEHOLDER_OPERATOR,
            )
        };
        match self.registry.resolve_or_create(&sample_id, placeholder_sample) {
            Ok(Resolution::Created) => report.created_samples += 1,
            Ok(Resolution::Existing) => {}
            Err(err) => {
                report.skip(location, format!("cannot resolve sample: {}", err));
                return false;
            }
        }

        let image_id = present(record.image_id);
        if let Some(image_id) = &image_id {
            if let Err(reason) =
                self.resolve_image(image_id, record.image_filename, measured_at, report)
            {
                report.skip(location, reason);
                return false;
            }
        }

        let measurement = Measurement::new(
            &record.id,
            &sample_id,
            record.area,
            measured_at,
            image_id.as_deref(),
        );
        match self.registry.try_register(measurement) {
            Ok(()) => {
                report.imported += 1;
                true
            }
            Err(err) => {
                report.skip(location, err.to_string());
                false
            }
        }
    }

    fn resolve_image(
        &mut self,
        image_id: &str,
        filename: Option<String>,
        captured_at: chrono::NaiveDateTime,
        report: &mut ImportReport,
    ) -> Result<(), String> {
        if self.registry.contains::<Image>(image_id) {
            return Ok(());
        }

        let microscope_id = self.default_microscope(report)?;
        let filename = present(filename).unwrap_or_default();
        let image = || Image::new(image_id, &filename, captured_at, Some(&microscope_id));

        match self.registry.resolve_or_create(image_id, image) {
            Ok(_) => {
                report.created_images += 1;
                Ok(())
            }
            Err(err) => Err(format!("cannot auto-create image '{}': {}", image_id, err)),
        }
    }

    /// First registered microscope, or a synthesized temporary one
    fn default_microscope(&mut self, report: &mut ImportReport) -> Result<String, String> {
        if let Some(first) = self.registry.iter::<Microscope>().next() {
            return Ok(first.id().to_string());
        }

        let resolution = self.config.default_resolution.clone();
        let scale = self.config.default_scale;
        let temporary = || {
            Microscope::new(
                TEMPORARY_MICROSCOPE_ID,
                TEMPORARY_MICROSCOPE_MODEL,
                &resolution,
                scale,
            )
        };
        match self.registry.resolve_or_create(TEMPORARY_MICROSCOPE_ID, temporary) {
            Ok(Resolution::Created) => {
                info!(microscope = TEMPORARY_MICROSCOPE_ID, "synthesized temporary microscope");
                report.created_microscopes += 1;
                Ok(TEMPORARY_MICROSCOPE_ID.to_string())
            }
            Ok(Resolution::Existing) => Ok(TEMPORARY_MICROSCOPE_ID.to_string()),
            Err(err) => Err(format!("cannot synthesize default microscope: {}", err)),
        }
    }

    fn admit_microscope(
        &mut self,
        record: MicroscopeRecord,
        location: &str,
        report: &mut ImportReport,
    ) -> bool {
        let mic = Microscope::new(&record.id, &record.model, &record.resolution, record.scale);
        match self.registry.try_register(mic) {
            Ok(()) => {
                report.imported += 1;
                true
            }
            Err(err) => {
                report.skip(location, err.to_string());
                false
            }
        }
    }
}
