// 📥 CSV Import - tolerant, record-at-a-time readers for measurements and microscopes
//
// The header line is always skipped. Each data line is handled on its own:
// short lines and unparseable numbers are skipped with a warning, and only
// an I/O failure on the underlying file ends the call early.

use super::{ImportReport, Importer, MeasurementRecord, MicroscopeRecord};
use crate::error::{PipelineError, PipelineResult};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{error, info};

const MEASUREMENT_FIELDS: usize = 6;
const MICROSCOPE_FIELDS: usize = 4;

/// What a CSV file holds, judged from its header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvKind {
    Measurements,
    Microscopes,
}

impl CsvKind {
    /// Classify a header row (case-insensitive, order-insensitive)
    pub fn from_header(header: &StringRecord) -> Option<CsvKind> {
        let names: Vec<String> = header.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        let has = |name: &str| names.iter().any(|n| n == name);

        if has("sampleid") && has("area") {
            Some(CsvKind::Measurements)
        } else if has("model") && has("scale") {
            Some(CsvKind::Microscopes)
        } else {
            None
        }
    }
}

/// Read only the header of a CSV file and classify it
pub fn detect_csv_kind(path: &Path) -> PipelineResult<Option<CsvKind>> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);

    let header = rdr.headers()?;
    Ok(CsvKind::from_header(header))
}

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(source)
}

fn line_of(record: &StringRecord) -> String {
    match record.position() {
        Some(pos) => format!("line {}", pos.line()),
        None => "line ?".to_string(),
    }
}

/// Walk every data record; per-record CSV errors are skipped, I/O errors stop the walk.
fn for_each_record<R, F>(source: R, report: &mut ImportReport, mut handle: F) -> PipelineResult<()>
where
    R: Read,
    F: FnMut(StringRecord, String, &mut ImportReport),
{
    let mut rdr = reader(source);

    for result in rdr.records() {
        match result {
            Ok(record) => {
                let location = line_of(&record);
                handle(record, location, report);
            }
            Err(err) if err.is_io_error() => return Err(PipelineError::Csv(err)),
            Err(err) => {
                let location = err
                    .position()
                    .map(|pos| format!("line {}", pos.line()))
                    .unwrap_or_else(|| "line ?".to_string());
                report.skip(location, err.to_string());
            }
        }
    }

    Ok(())
}

/// `inf`, `NaN` and overflowing literals like `1e999` parse as floats but are not values
fn parse_finite(raw: &str) -> Result<f64, String> {
    let value = raw.parse::<f64>().map_err(|e| e.to_string())?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err("not a finite number".to_string())
    }
}

fn parse_measurement(record: &StringRecord) -> Result<MeasurementRecord, String> {
    if record.len() < MEASUREMENT_FIELDS {
        return Err(format!(
            "malformed line: expected {} fields, found {}",
            MEASUREMENT_FIELDS,
            record.len()
        ));
    }

    let field = |i: usize| record.get(i).unwrap_or_default().to_string();
    let area_raw = field(2);
    let area = parse_finite(&area_raw).map_err(|e| format!("bad area '{}': {}", area_raw, e))?;

    Ok(MeasurementRecord {
        id: field(0),
        sample_id: field(1),
        area,
        timestamp: field(3),
        image_id: Some(field(4)),
        image_filename: Some(field(5)),
    })
}

fn parse_microscope(record: &StringRecord) -> Result<MicroscopeRecord, String> {
    if record.len() < MICROSCOPE_FIELDS {
        return Err(format!(
            "malformed line: expected {} fields, found {}",
            MICROSCOPE_FIELDS,
            record.len()
        ));
    }

    let field = |i: usize| record.get(i).unwrap_or_default().to_string();
    let scale_raw = field(3);
    let scale = parse_finite(&scale_raw).map_err(|e| format!("bad scale '{}': {}", scale_raw, e))?;

    Ok(MicroscopeRecord {
        id: field(0),
        model: field(1),
        resolution: field(2),
        scale,
    })
}

impl<'a> Importer<'a> {
    // ------------------------------------------------------------------------
    // Measurements
    // ------------------------------------------------------------------------

    /// Number of measurements admitted; 0 (logged) when the file is unreadable
    pub fn import_measurements_csv(&mut self, path: &Path) -> usize {
        match self.import_measurements_csv_report(path) {
            Ok(report) => report.imported,
            Err(err) => {
                error!(path = %path.display(), error = %err, "measurement CSV import failed");
                0
            }
        }
    }

    pub fn import_measurements_csv_report(&mut self, path: &Path) -> PipelineResult<ImportReport> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        self.import_measurements_from_reader(file, &path.display().to_string())
    }

    pub fn import_measurements_from_reader<R: Read>(
        &mut self,
        source: R,
        source_name: &str,
    ) -> PipelineResult<ImportReport> {
        let mut report = ImportReport::new(source_name);

        for_each_record(source, &mut report, |record, location, report| {
            match parse_measurement(&record) {
                Ok(candidate) => {
                    self.admit_measurement(candidate, &location, report);
                }
                Err(reason) => report.skip(location, reason),
            }
        })?;

        info!(
            source = source_name,
            imported = report.imported,
            skipped = report.skipped,
            "measurement CSV import finished"
        );
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Microscopes
    // ------------------------------------------------------------------------

    pub fn import_microscopes_csv(&mut self, path: &Path) -> usize {
        match self.import_microscopes_csv_report(path) {
            Ok(report) => report.imported,
            Err(err) => {
                error!(path = %path.display(), error = %err, "microscope CSV import failed");
                0
            }
        }
    }

    pub fn import_microscopes_csv_report(&mut self, path: &Path) -> PipelineResult<ImportReport> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        self.import_microscopes_from_reader(file, &path.display().to_string())
    }

    pub fn import_microscopes_from_reader<R: Read>(
        &mut self,
        source: R,
        source_name: &str,
    ) -> PipelineResult<ImportReport> {
        let mut report = ImportReport::new(source_name);

        for_each_record(source, &mut report, |record, location, report| {
            match parse_microscope(&record) {
                Ok(candidate) => {
                    self.admit_microscope(candidate, &location, report);
                }
                Err(reason) => report.skip(location, reason),
            }
        })?;

        info!(
            source = source_name,
            imported = report.imported,
            skipped = report.skipped,
            "microscope CSV import finished"
        );
        Ok(report)
    }
}

// ============================================================================
// TESTS
// ============================================================================
