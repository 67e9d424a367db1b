// 🖼️ Image Entity - a digital-microscope capture
//
// The microscope reference is optional: an unassociated image is a valid
// transient state. When present it must resolve at admission time.

use super::{timestamp_format, Entity, EntityKind, Microscope};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// File extensions accepted for captures (compared case-insensitively)
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,

    /// Source filename as produced by the capture process
    pub filename: String,

    #[serde(with = "timestamp_format")]
    pub captured_at: NaiveDateTime,

    /// Owning microscope, `None` while unassociated
    pub microscope_id: Option<String>,
}

impl Image {
    pub fn new(
        id: &str,
        filename: &str,
        captured_at: NaiveDateTime,
        microscope_id: Option<&str>,
    ) -> Self {
        Image {
            id: id.trim().to_string(),
            filename: filename.trim().to_string(),
            captured_at,
            microscope_id: microscope_id.map(|m| m.trim().to_string()),
        }
    }

    /// Lower-cased extension, if the filename has one
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.filename.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }

    /// Upper-cased format label ("JPG", "TIFF"), "Unknown" without extension
    pub fn format(&self) -> String {
        self.extension()
            .map(|ext| ext.to_uppercase())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn has_supported_format(&self) -> bool {
        self.extension()
            .map(|ext| SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    pub fn is_associated(&self) -> bool {
        self.microscope_id.is_some()
    }

    /// Area of a width x height pixel region
    pub fn pixel_area(width_px: u32, height_px: u32) -> u64 {
        u64::from(width_px) * u64::from(height_px)
    }

    /// Area of a pixel region in square micrometers using the microscope scale.
    ///
    /// Returns `None` when the scale is not positive.
    pub fn micrometer_area(width_px: u32, height_px: u32, microscope: &Microscope) -> Option<f64> {
        if microscope.scale <= 0.0 {
            return None;
        }
        let pixels = Self::pixel_area(width_px, height_px) as f64;
        Some(pixels / (microscope.scale * microscope.scale))
    }
}

impl Entity for Image {
    const KIND: EntityKind = EntityKind::Image;

    fn id(&self) -> &str {
        &self.id
    }
}

// ============================================================================
// TESTS
// ============================================================================
