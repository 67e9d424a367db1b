// ✅ Validation Rules - per-entity shape checks run before admission
//
// Rules are conservative: they check presence and shape, never semantic
// correctness. A failed rule is an enumerated issue in the report, not an
// error value, so the registry can log and return every reason at once.
//
// Reference resolution (does the sample exist?) is NOT checked here; that
// needs the registry and lives in `registry::Registered::references`.

use crate::entities::{
    AccessLevel, Entity, EntityKind, Image, Measurement, Microscope, Operator, Sample,
    SUPPORTED_IMAGE_EXTENSIONS,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9+_.\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
        .expect("email pattern is a valid regex")
});

// ============================================================================
// VALIDATION ISSUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationIssue {
    /// Identifier is empty or whitespace
    EmptyId,

    /// A required text field is empty
    EmptyField { field: String },

    /// Email does not match local@domain.tld
    InvalidEmail { email: String },

    /// Access level is not ADMIN, TECHNICIAN or OPERATOR
    UnknownAccessLevel { level: String },

    /// Resolution is not "WxH" with two positive integers
    MalformedResolution { resolution: String },

    /// Scale must be finite and strictly positive
    NonPositiveScale { scale: f64 },

    /// Filename extension is not one of the supported formats
    UnsupportedImageFormat { filename: String },

    /// Area must be finite and strictly positive
    NonPositiveArea { area: f64 },
}

impl ValidationIssue {
    fn empty(field: &str) -> Self {
        ValidationIssue::EmptyField {
            field: field.to_string(),
        }
    }

    /// Field the issue is about
    pub fn field(&self) -> &str {
        match self {
            ValidationIssue::EmptyId => "id",
            ValidationIssue::EmptyField { field } => field,
            ValidationIssue::InvalidEmail { .. } => "email",
            ValidationIssue::UnknownAccessLevel { .. } => "access_level",
            ValidationIssue::MalformedResolution { .. } => "resolution",
            ValidationIssue::NonPositiveScale { .. } => "scale",
            ValidationIssue::UnsupportedImageFormat { .. } => "filename",
            ValidationIssue::NonPositiveArea { .. } => "area",
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyId => write!(f, "id is empty"),
            ValidationIssue::EmptyField { field } => write!(f, "{} is empty", field),
            ValidationIssue::InvalidEmail { email } => write!(f, "invalid email '{}'", email),
            ValidationIssue::UnknownAccessLevel { level } => {
                write!(f, "unknown access level '{}'", level)
            }
            ValidationIssue::MalformedResolution { resolution } => {
                write!(f, "resolution '{}' is not WxH", resolution)
            }
            ValidationIssue::NonPositiveScale { scale } => {
                write!(f, "scale must be finite and > 0, got {}", scale)
            }
            ValidationIssue::UnsupportedImageFormat { filename } => write!(
                f,
                "unsupported image format '{}' (expected one of {})",
                filename,
                SUPPORTED_IMAGE_EXTENSIONS.join(", ")
            ),
            ValidationIssue::NonPositiveArea { area } => write!(f, "area must be finite and > 0, got {}", area),
        }
    }
}

// ============================================================================
// VALIDATION REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub kind: EntityKind,
    pub id: String,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn for_entity<T: Entity>(entity: &T) -> Self {
        ValidationReport {
            kind: T::KIND,
            id: entity.id().to_string(),
            issues: Vec::new(),
        }
    }

    fn check(&mut self, passed: bool, issue: impl FnOnce() -> ValidationIssue) {
        if !passed {
            self.issues.push(issue());
        }
    }

    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_issue_for(&self, field: &str) -> bool {
        self.issues.iter().any(|i| i.field() == field)
    }

    /// One-line summary, e.g. "scale must be > 0, got 0; area is empty"
    pub fn summary(&self) -> String {
        self.issues
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn present(value: &str) -> bool {
    !value.trim().is_empty()
}

// ============================================================================
// RULE SETS
// ============================================================================

/// Finite and > 0. Rejects NaN and both infinities.
pub fn is_positive_finite(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email.trim())
}

pub fn validate_operator(op: &Operator) -> ValidationReport {
    let mut report = ValidationReport::for_entity(op);

    report.check(present(&op.id), || ValidationIssue::EmptyId);
    report.check(present(&op.name), || ValidationIssue::empty("name"));
    report.check(is_valid_email(&op.email), || ValidationIssue::InvalidEmail {
        email: op.email.clone(),
    });
    report.check(AccessLevel::parse(&op.access_level).is_some(), || {
        ValidationIssue::UnknownAccessLevel {
            level: op.access_level.clone(),
        }
    });

    report
}

pub fn validate_microscope(mic: &Microscope) -> ValidationReport {
    let mut report = ValidationReport::for_entity(mic);

    report.check(present(&mic.id), || ValidationIssue::EmptyId);
    report.check(present(&mic.model), || ValidationIssue::empty("model"));
    report.check(mic.dimensions().is_some(), || {
        ValidationIssue::MalformedResolution {
            resolution: mic.resolution.clone(),
        }
    });
    report.check(is_positive_finite(mic.scale), || ValidationIssue::NonPositiveScale {
        scale: mic.scale,
    });

    report
}

pub fn validate_sample(sample: &Sample) -> ValidationReport {
    let mut report = ValidationReport::for_entity(sample);

    report.check(present(&sample.id), || ValidationIssue::EmptyId);
    report.check(present(&sample.name), || ValidationIssue::empty("name"));
    report.check(present(&sample.sample_type), || ValidationIssue::empty("type"));

    report
}

pub fn validate_image(image: &Image) -> ValidationReport {
    let mut report = ValidationReport::for_entity(image);

    report.check(present(&image.id), || ValidationIssue::EmptyId);
    report.check(image.has_supported_format(), || {
        ValidationIssue::UnsupportedImageFormat {
            filename: image.filename.clone(),
        }
    });
    if let Some(mic) = &image.microscope_id {
        report.check(present(mic), || ValidationIssue::empty("microscope_id"));
    }

    report
}

pub fn validate_measurement(m: &Measurement) -> ValidationReport {
    let mut report = ValidationReport::for_entity(m);

    report.check(present(&m.id), || ValidationIssue::EmptyId);
    report.check(present(&m.sample_id), || ValidationIssue::empty("sample_id"));
    report.check(is_positive_finite(m.area), || ValidationIssue::NonPositiveArea { area: m.area });
    if let Some(image) = &m.image_id {
        report.check(present(image), || ValidationIssue::empty("image_id"));
    }

    report
}

// ============================================================================
// TESTS
// ============================================================================
