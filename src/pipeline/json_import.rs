// 📥 JSON Import - `{ "measurements": [ {...}, ... ] }`
//
// The document is parsed structurally. A missing `measurements` key means
// an empty file (zero imported, no error). Each array element is decoded on
// its own, so one bad element only skips that element.

use super::{ImportReport, Importer, MeasurementRecord};
use crate::error::{PipelineError, PipelineResult};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{error, info, warn};

const MEASUREMENTS_KEY: &str = "measurements";

impl<'a> Importer<'a> {
    /// Number of measurements admitted; 0 (logged) when the file is unreadable
    pub fn import_measurements_json(&mut self, path: &Path) -> usize {
        match self.import_measurements_json_report(path) {
            Ok(report) => report.imported,
            Err(err) => {
                error!(path = %path.display(), error = %err, "measurement JSON import failed");
                0
            }
        }
    }

    pub fn import_measurements_json_report(&mut self, path: &Path) -> PipelineResult<ImportReport> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        self.import_measurements_json_from_reader(BufReader::new(file), &path.display().to_string())
    }

    pub fn import_measurements_json_from_reader<R: Read>(
        &mut self,
        source: R,
        source_name: &str,
    ) -> PipelineResult<ImportReport> {
        let document: Value = serde_json::from_reader(source)?;
        let mut report = ImportReport::new(source_name);

        let items = match document.get(MEASUREMENTS_KEY) {
            None => {
                info!(source = source_name, "no measurements key, nothing to import");
                return Ok(report);
            }
            Some(Value::Array(items)) => items,
            Some(other) => {
                warn!(
                    source = source_name,
                    found = json_type(other),
                    "measurements is not an array, nothing to import"
                );
                return Ok(report);
            }
        };

        for (index, item) in items.iter().enumerate() {
            let location = format!("record {}", index);
            match MeasurementRecord::deserialize(item) {
                Ok(candidate) => {
                    self.admit_measurement(candidate, &location, &mut report);
                }
                Err(err) => report.skip(location, format!("malformed record: {}", err)),
            }
        }

        info!(
            source = source_name,
            imported = report.imported,
            skipped = report.skipped,
            "measurement JSON import finished"
        );
        Ok(report)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Measurement, Sample};
    use crate::pipeline::ImportConfig;
    use crate::registry::Registry;

    fn import(json: &str, registry: &mut Registry) -> PipelineResult<ImportReport> {
        Importer::new(registry, &ImportConfig::default())
            .import_measurements_json_from_reader(json.as_bytes(), "inline.json")
    }

    #[test]
    fn test_imports_every_record() {
        let json = r#"{
            "measurements": [
                {"id": "M1", "sampleId": "S1", "area": 10.5, "timestamp": "2024-01-15 10:30:00", "imageId": null, "imageFilename": null},
                {"id": "M2", "sampleId": "S1", "area": 20.0, "timestamp": "2024-01-15 10:31:00"},
                {"id": "M3", "sampleId": "S2", "area": 30.0, "timestamp": "2024-01-15 10:32:00", "imageId": "IMG_1", "imageFilename": "img_1.tif"}
            ]
        }"#;
        let mut registry = Registry::new();

        let report = import(json, &mut registry).unwrap();

        assert_eq!(report.imported, 3);
        assert_eq!(registry.count::<Measurement>(), 3);
        assert_eq!(registry.count::<Sample>(), 2);
        assert_eq!(
            registry.find::<Measurement>("M3").unwrap().image_id.as_deref(),
            Some("IMG_1")
        );
    }

    #[test]
    fn test_missing_key_is_empty_not_error() {
        let mut registry = Registry::new();

        let report = import(r#"{"samples": []}"#, &mut registry).unwrap();

        assert_eq!(report.imported, 0);
        assert_eq!(report.skipped, 0);
        assert_eq!(registry.count::<Measurement>(), 0);
    }

    #[test]
    fn test_non_array_measurements_imports_nothing() {
        let mut registry = Registry::new();

        let report = import(r#"{"measurements": "soon"}"#, &mut registry).unwrap();

        assert_eq!(report.imported, 0);
    }

    #[test]
    fn test_bad_element_is_skipped() {
        let json = r#"{"measurements": [
            {"id": "M1", "sampleId": "S1", "area": "big", "timestamp": "2024-01-15 10:30:00"},
            {"id": "M2", "sampleId": "S1", "area": 5.0, "timestamp": "2024-01-15 10:31:00"},
            {"id": "M3", "sampleId": "S1", "area": -1.0, "timestamp": "2024-01-15 10:32:00"}
        ]}"#;
        let mut registry = Registry::new();

        let report = import(json, &mut registry).unwrap();

        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.warnings[0].location, "record 0");
        assert_eq!(report.warnings[1].location, "record 2");
    }

    #[test]
    fn test_unparseable_document_is_an_error() {
        let mut registry = Registry::new();

        let result = import("{ not json", &mut registry);

        assert!(matches!(result, Err(PipelineError::Json(_))));
        assert_eq!(registry.count::<Measurement>(), 0);
    }
}
