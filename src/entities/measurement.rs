// 📏 Measurement Entity - an area computed from an image of a sample
//
// Relationships:
// - sample_id → Sample (required, must resolve at admission)
// - image_id  → Image  (optional, must resolve when present)

use super::{timestamp_format, Entity, EntityKind};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: String,

    /// Owning sample (foreign key)
    pub sample_id: String,

    /// Computed area, must be > 0
    pub area: f64,

    #[serde(with = "timestamp_format")]
    pub measured_at: NaiveDateTime,

    /// Source image (foreign key), `None` when not yet linked
    pub image_id: Option<String>,
}

impl Measurement {
    pub fn new(
        id: &str,
        sample_id: &str,
        area: f64,
        measured_at: NaiveDateTime,
        image_id: Option<&str>,
    ) -> Self {
        Measurement {
            id: id.trim().to_string(),
            sample_id: sample_id.trim().to_string(),
            area,
            measured_at,
            image_id: image_id.map(|i| i.trim().to_string()),
        }
    }

    /// Area multiplied by a unit conversion factor
    pub fn scaled_area(&self, factor: f64) -> f64 {
        self.area * factor
    }
}

impl Entity for Measurement {
    const KIND: EntityKind = EntityKind::Measurement;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::parse_timestamp;

    #[test]
    fn test_measurement_creation() {
        let ts = parse_timestamp("2024-01-15 10:30:00").unwrap();
        let m = Measurement::new("MEAS_001", " SAMPLE_001 ", 150.75, ts, Some("IMG_001"));

        assert_eq!(m.sample_id, "SAMPLE_001");
        assert_eq!(m.image_id.as_deref(), Some("IMG_001"));
        assert_eq!(m.scaled_area(2.0), 301.5);
    }
}
