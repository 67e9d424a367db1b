// Micro Measure - Core Library
// Sample / microscope / measurement registry with CSV + JSON import/export

pub mod config;
pub mod entities;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod statistics;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use config::AppConfig;
pub use entities::{
    AccessLevel, Entity, EntityKind, Image, Measurement, Microscope, MicroscopeQuality,
    Operation, Operator, Sample, SampleStatus,
};
pub use error::{ConfigError, PipelineError, RegistryError};
pub use pipeline::{
    detect_csv_kind, file_fingerprint, scan_directory, CsvKind, Exporter, ImportConfig,
    ImportReport, ImportWarning, Importer,
};
pub use registry::{IntegrityIssue, Registered, Registry, Resolution, SharedRegistry};
pub use statistics::{EntityCounts, StatisticsEngine};
pub use store::{LedgerEntry, MirrorReport, SqliteMirror};
pub use validation::{ValidationIssue, ValidationReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
