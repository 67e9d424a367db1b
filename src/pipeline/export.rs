// 📤 Export - registry snapshots to fixed-header CSV and fixed-shape JSON
//
// Export only reads the registry. Field names match the importers so an
// exported file can be fed straight back in.

use super::{
    MeasurementRecord, MicroscopeRecord, SampleRecord, MEASUREMENT_HEADER, MICROSCOPE_HEADER,
    SAMPLE_HEADER,
};
use crate::entities::{Measurement, Microscope, Sample};
use crate::error::{PipelineError, PipelineResult};
use crate::registry::Registry;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{error, info};

#[derive(Serialize)]
struct MeasurementDocument<'r> {
    measurements: &'r [MeasurementRecord],
}

#[derive(Serialize)]
struct SampleDocument<'r> {
    samples: &'r [SampleRecord],
}

fn write_csv<W, T>(writer: W, header: &[&str], rows: &[T]) -> PipelineResult<usize>
where
    W: Write,
    T: Serialize,
{
    // Header written by hand so an empty export still carries it
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(header)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(rows.len())
}

fn write_json<W: Write, T: Serialize>(mut writer: W, document: &T) -> PipelineResult<()> {
    serde_json::to_writer_pretty(&mut writer, document)?;
    writer.write_all(b"\n").map_err(serde_json::Error::io)?;
    writer.flush().map_err(serde_json::Error::io)?;
    Ok(())
}

pub struct Exporter<'r> {
    registry: &'r Registry,
}

impl<'r> Exporter<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Exporter { registry }
    }

    fn measurement_records(&self) -> Vec<MeasurementRecord> {
        self.registry
            .iter::<Measurement>()
            .map(|m| MeasurementRecord::from_measurement(m, self.registry))
            .collect()
    }

    fn sample_records(&self) -> Vec<SampleRecord> {
        self.registry
            .iter::<Sample>()
            .map(|s| SampleRecord::from_sample(s, self.registry))
            .collect()
    }

    fn microscope_records(&self) -> Vec<MicroscopeRecord> {
        self.registry
            .iter::<Microscope>()
            .map(MicroscopeRecord::from)
            .collect()
    }

    // ------------------------------------------------------------------------
    // Writer variants
    // ------------------------------------------------------------------------

    pub fn export_measurements_csv_to_writer<W: Write>(&self, writer: W) -> PipelineResult<usize> {
        write_csv(writer, &MEASUREMENT_HEADER, &self.measurement_records())
    }

    pub fn export_samples_csv_to_writer<W: Write>(&self, writer: W) -> PipelineResult<usize> {
        write_csv(writer, &SAMPLE_HEADER, &self.sample_records())
    }

    pub fn export_microscopes_csv_to_writer<W: Write>(&self, writer: W) -> PipelineResult<usize> {
        write_csv(writer, &MICROSCOPE_HEADER, &self.microscope_records())
    }

    pub fn export_measurements_json_to_writer<W: Write>(&self, writer: W) -> PipelineResult<usize> {
        let records = self.measurement_records();
        write_json(writer, &MeasurementDocument { measurements: &records })?;
        Ok(records.len())
    }

    pub fn export_samples_json_to_writer<W: Write>(&self, writer: W) -> PipelineResult<usize> {
        let records = self.sample_records();
        write_json(writer, &SampleDocument { samples: &records })?;
        Ok(records.len())
    }

    // ------------------------------------------------------------------------
    // Path variants: false (logged) on any failure
    // ------------------------------------------------------------------------

    pub fn export_measurements_csv(&self, path: &Path) -> bool {
        self.to_path(path, "measurements CSV", |w| self.export_measurements_csv_to_writer(w))
    }

    pub fn export_samples_csv(&self, path: &Path) -> bool {
        self.to_path(path, "samples CSV", |w| self.export_samples_csv_to_writer(w))
    }

    pub fn export_microscopes_csv(&self, path: &Path) -> bool {
        self.to_path(path, "microscopes CSV", |w| self.export_microscopes_csv_to_writer(w))
    }

    pub fn export_measurements_json(&self, path: &Path) -> bool {
        self.to_path(path, "measurements JSON", |w| self.export_measurements_json_to_writer(w))
    }

    pub fn export_samples_json(&self, path: &Path) -> bool {
        self.to_path(path, "samples JSON", |w| self.export_samples_json_to_writer(w))
    }

    fn to_path<F>(&self, path: &Path, what: &str, write: F) -> bool
    where
        F: FnOnce(BufWriter<File>) -> PipelineResult<usize>,
    {
        let result = File::create(path)
            .map_err(|e| PipelineError::io(path, e))
            .and_then(|file| write(BufWriter::new(file)));

        match result {
            Ok(rows) => {
                info!(path = %path.display(), rows, "exported {}", what);
                true
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "failed to export {}", what);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{parse_timestamp, Image};
    use crate::pipeline::{ImportConfig, Importer};
    use tempfile::TempDir;

    fn populated() -> Registry {
        let ts = parse_timestamp("2024-01-15 10:30:00").unwrap();
        let mut registry = Registry::new();
        assert!(registry.register(Microscope::new("MIC_001", "Zeiss", "1920x1080", 10.0)));
        assert!(registry.register(Sample::new("S1", "Tissue A", "Biopsy", ts, "Dr. Lima")));
        assert!(registry.register(Sample::new("S2", "Tissue B", "Blood", ts, "Dr. Lima")));
        assert!(registry.register(Image::new("IMG_1", "s1.png", ts, Some("MIC_001"))));
        assert!(registry.register(Measurement::new("M1", "S1", 150.75, ts, Some("IMG_1"))));
        assert!(registry.register(Measurement::new("M2", "S1", 0.1 + 0.2, ts, None)));
        assert!(registry.register(Measurement::new("M3", "S2", 1.0 / 3.0, ts, None)));
        registry
    }

    #[test]
    fn test_measurements_csv_shape() {
        let registry = populated();
        let mut out = Vec::new();

        let rows = Exporter::new(&registry)
            .export_measurements_csv_to_writer(&mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(rows, 3);
        assert_eq!(lines.next(), Some("id,sampleId,area,timestamp,imageId,imageFilename"));
        assert_eq!(lines.next(), Some("M1,S1,150.75,2024-01-15 10:30:00,IMG_1,s1.png"));
        assert!(text.contains("M2,S1,"));
    }

    #[test]
    fn test_empty_export_still_has_header() {
        let registry = Registry::new();
        let mut out = Vec::new();

        let rows = Exporter::new(&registry)
            .export_samples_csv_to_writer(&mut out)
            .unwrap();

        assert_eq!(rows, 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "id,name,type,collectionTimestamp,responsibleOperator,measurementCount\n"
        );
    }

    #[test]
    fn test_samples_csv_counts_measurements() {
        let registry = populated();
        let mut out = Vec::new();

        Exporter::new(&registry).export_samples_csv_to_writer(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("S1,Tissue A,Biopsy,2024-01-15 10:30:00,Dr. Lima,2"));
        assert!(text.contains("S2,Tissue B,Blood,2024-01-15 10:30:00,Dr. Lima,1"));
    }

    #[test]
    fn test_json_documents() {
        let registry = populated();
        let exporter = Exporter::new(&registry);

        let mut out = Vec::new();
        exporter.export_measurements_json_to_writer(&mut out).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let items = doc["measurements"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["sampleId"], "S1");
        assert_eq!(items[0]["imageFilename"], "s1.png");
        assert!(items[1]["imageId"].is_null());

        let mut out = Vec::new();
        exporter.export_samples_json_to_writer(&mut out).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["samples"][0]["type"], "Biopsy");
        assert_eq!(doc["samples"][0]["measurementCount"], 2);
    }

    #[test]
    fn test_unwritable_path_returns_false() {
        let registry = populated();
        let exporter = Exporter::new(&registry);

        assert!(!exporter.export_measurements_csv(Path::new("/no/such/dir/out.csv")));
        assert!(!exporter.export_samples_json(Path::new("/no/such/dir/out.json")));
    }

    #[test]
    fn test_csv_round_trip_restores_measurements() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("measurements.csv");
        let mut registry = populated();
        let original = registry.list_all::<Measurement>();

        assert!(Exporter::new(&registry).export_measurements_csv(&path));
        registry.clear::<Measurement>();
        assert_eq!(registry.count::<Measurement>(), 0);

        let imported = Importer::new(&mut registry, &ImportConfig::default())
            .import_measurements_csv(&path);

        assert_eq!(imported, original.len());
        for before in &original {
            let after = registry.find::<Measurement>(&before.id).unwrap();
            assert!((after.area - before.area).abs() < 1e-6);
            assert_eq!(after.sample_id, before.sample_id);
            assert_eq!(after.image_id, before.image_id);
        }
    }

    #[test]
    fn test_json_round_trip_restores_measurements() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("measurements.json");
        let mut registry = populated();

        assert!(Exporter::new(&registry).export_measurements_json(&path));
        registry.clear::<Measurement>();

        let imported = Importer::new(&mut registry, &ImportConfig::default())
            .import_measurements_json(&path);

        assert_eq!(imported, 3);
        assert!((registry.find::<Measurement>("M3").unwrap().area - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_microscopes_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("microscopes.csv");
        let registry = populated();

        assert!(Exporter::new(&registry).export_microscopes_csv(&path));

        let mut fresh = Registry::new();
        let imported = Importer::new(&mut fresh, &ImportConfig::default())
            .import_microscopes_csv(&path);
        assert_eq!(imported, 1);
        assert_eq!(fresh.find::<Microscope>("MIC_001").unwrap().resolution, "1920x1080");
    }
}
