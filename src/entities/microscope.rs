// 🔬 Microscope Entity - capture device with a pixel/micrometer scale

use super::{Entity, EntityKind};
use serde::{Deserialize, Serialize};

// ============================================================================
// QUALITY RATING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MicroscopeQuality {
    Excellent,
    Good,
    Fair,
    Basic,
}

impl MicroscopeQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            MicroscopeQuality::Excellent => "Excellent",
            MicroscopeQuality::Good => "Good",
            MicroscopeQuality::Fair => "Fair",
            MicroscopeQuality::Basic => "Basic",
        }
    }
}

// ============================================================================
// MICROSCOPE ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Microscope {
    pub id: String,

    /// Model name
    pub model: String,

    /// Camera resolution as "WxH" (e.g. "1920x1080")
    pub resolution: String,

    /// Pixels per micrometer, must be > 0
    pub scale: f64,
}

impl Microscope {
    pub fn new(id: &str, model: &str, resolution: &str, scale: f64) -> Self {
        Microscope {
            id: id.trim().to_string(),
            model: model.trim().to_string(),
            resolution: resolution.trim().to_string(),
            scale,
        }
    }

    /// Parse the resolution into (width, height).
    ///
    /// Returns `None` unless both sides are positive integers.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let (w, h) = self.resolution.split_once(['x', 'X'])?;
        let width: u32 = w.trim().parse().ok()?;
        let height: u32 = h.trim().parse().ok()?;

        if width == 0 || height == 0 {
            return None;
        }
        Some((width, height))
    }

    /// Total sensor pixels, 0 when the resolution is malformed
    pub fn total_pixels(&self) -> u64 {
        self.dimensions()
            .map(|(w, h)| u64::from(w) * u64::from(h))
            .unwrap_or(0)
    }

    pub fn quality(&self) -> MicroscopeQuality {
        let pixels = self.total_pixels();

        if pixels >= 8_000_000 && self.scale >= 10.0 {
            MicroscopeQuality::Excellent
        } else if pixels >= 2_000_000 && self.scale >= 5.0 {
            MicroscopeQuality::Good
        } else if pixels >= 1_000_000 && self.scale >= 2.0 {
            MicroscopeQuality::Fair
        } else {
            MicroscopeQuality::Basic
        }
    }

    pub fn pixels_to_micrometers(&self, pixels: f64) -> f64 {
        if self.scale > 0.0 {
            pixels / self.scale
        } else {
            0.0
        }
    }

    pub fn micrometers_to_pixels(&self, micrometers: f64) -> i64 {
        (micrometers * self.scale).round() as i64
    }
}

impl Entity for Microscope {
    const KIND: EntityKind = EntityKind::Microscope;

    fn id(&self) -> &str {
        &self.id
    }
}

// ============================================================================
// TESTS
// ============================================================================
