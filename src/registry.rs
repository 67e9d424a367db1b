// 🗂️ Entity Registry - sole owner of the five entity collections
//
// Storage per collection: an insertion-ordered Vec plus an id → position map.
// Both are updated together on the single admission path (`try_register`), so
// lookups are O(1) while `list_all` and exports keep insertion order.
//
// Admission order of checks:
// 1. empty id            → Validation
// 2. id already present  → DuplicateIdentifier
// 3. rule set fails      → Validation
// 4. kind-specific clash → e.g. DuplicateEmail
// 5. dangling reference  → UnresolvedReference
// Nothing is mutated unless every check passes.

use crate::entities::{
    AccessLevel, Entity, EntityKind, Image, Measurement, Microscope, Operator, Sample,
    SampleStatus,
};
use crate::error::{RegistryError, RegistryResult};
use crate::validation::{self, ValidationReport};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

// ============================================================================
// COLLECTION
// ============================================================================

/// Insertion-ordered collection keyed by entity id
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Collection {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Entity> Collection<T> {
    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&pos| &self.items[pos])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        match self.index.get(id) {
            Some(&pos) => self.items.get_mut(pos),
            None => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Caller guarantees the id is not present yet
    fn push(&mut self, item: T) {
        self.index.insert(item.id().to_string(), self.items.len());
        self.items.push(item);
    }

    fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }
}

// ============================================================================
// REGISTERED TRAIT
// ============================================================================

/// Binds an entity type to its collection, rule set and foreign references.
pub trait Registered: Entity + Sized {
    fn collection(registry: &Registry) -> &Collection<Self>;

    fn collection_mut(registry: &mut Registry) -> &mut Collection<Self>;

    /// Shape rules from `validation`
    fn validate(&self) -> ValidationReport;

    /// Foreign references that must resolve at admission
    fn references(&self) -> Vec<(EntityKind, &str)> {
        Vec::new()
    }

    /// Kind-specific uniqueness beyond the id
    fn conflict(&self, _registry: &Registry) -> Option<RegistryError> {
        None
    }
}

impl Registered for Operator {
    fn collection(registry: &Registry) -> &Collection<Self> {
        &registry.operators
    }

    fn collection_mut(registry: &mut Registry) -> &mut Collection<Self> {
        &mut registry.operators
    }

    fn validate(&self) -> ValidationReport {
        validation::validate_operator(self)
    }

    fn conflict(&self, registry: &Registry) -> Option<RegistryError> {
        registry
            .find_operator_by_email(&self.email)
            .map(|_| RegistryError::DuplicateEmail {
                email: self.email.clone(),
            })
    }
}

impl Registered for Microscope {
    fn collection(registry: &Registry) -> &Collection<Self> {
        &registry.microscopes
    }

    fn collection_mut(registry: &mut Registry) -> &mut Collection<Self> {
        &mut registry.microscopes
    }

    fn validate(&self) -> ValidationReport {
        validation::validate_microscope(self)
    }
}

impl Registered for Sample {
    fn collection(registry: &Registry) -> &Collection<Self> {
        &registry.samples
    }

    fn collection_mut(registry: &mut Registry) -> &mut Collection<Self> {
        &mut registry.samples
    }

    fn validate(&self) -> ValidationReport {
        validation::validate_sample(self)
    }
}

impl Registered for Image {
    fn collection(registry: &Registry) -> &Collection<Self> {
        &registry.images
    }

    fn collection_mut(registry: &mut Registry) -> &mut Collection<Self> {
        &mut registry.images
    }

    fn validate(&self) -> ValidationReport {
        validation::validate_image(self)
    }

    fn references(&self) -> Vec<(EntityKind, &str)> {
        self.microscope_id
            .as_deref()
            .map(|mic| vec![(EntityKind::Microscope, mic)])
            .unwrap_or_default()
    }
}

impl Registered for Measurement {
    fn collection(registry: &Registry) -> &Collection<Self> {
        &registry.measurements
    }

    fn collection_mut(registry: &mut Registry) -> &mut Collection<Self> {
        &mut registry.measurements
    }

    fn validate(&self) -> ValidationReport {
        validation::validate_measurement(self)
    }

    fn references(&self) -> Vec<(EntityKind, &str)> {
        let mut refs = vec![(EntityKind::Sample, self.sample_id.as_str())];
        if let Some(image) = self.image_id.as_deref() {
            refs.push((EntityKind::Image, image));
        }
        refs
    }
}

/// Outcome of `resolve_or_create`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The id was already registered
    Existing,
    /// A placeholder was synthesized and admitted
    Created,
}

/// A stored reference that no longer resolves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityIssue {
    pub kind: EntityKind,
    pub id: String,
    pub target: EntityKind,
    pub target_id: String,
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Registry {
    operators: Collection<Operator>,
    microscopes: Collection<Microscope>,
    samples: Collection<Sample>,
    images: Collection<Image>,
    measurements: Collection<Measurement>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Uniform surface (any entity type)
    // ------------------------------------------------------------------------

    /// Admit an entity, returning the reason on failure. Never mutates on error.
    pub fn try_register<T: Registered>(&mut self, entity: T) -> RegistryResult<()> {
        let report = entity.validate();

        if entity.id().trim().is_empty() {
            return Err(RegistryError::Validation(report));
        }

        if T::collection(self).contains(entity.id()) {
            return Err(RegistryError::DuplicateIdentifier {
                kind: T::KIND,
                id: entity.id().to_string(),
            });
        }

        if !report.is_valid() {
            return Err(RegistryError::Validation(report));
        }

        if let Some(conflict) = entity.conflict(self) {
            return Err(conflict);
        }

        for (target, target_id) in entity.references() {
            if !self.resolves(target, target_id) {
                return Err(RegistryError::UnresolvedReference {
                    kind: T::KIND,
                    id: entity.id().to_string(),
                    target,
                    target_id: target_id.to_string(),
                });
            }
        }

        debug!(entity = %T::KIND, id = entity.id(), "registered");
        T::collection_mut(self).push(entity);
        Ok(())
    }

    /// Admit an entity; `false` (with a logged reason) on any failure
    pub fn register<T: Registered>(&mut self, entity: T) -> bool {
        let id = entity.id().to_string();
        match self.try_register(entity) {
            Ok(()) => true,
            Err(err) => {
                warn!(entity = %T::KIND, id = %id, reason = %err, "registration rejected");
                false
            }
        }
    }

    pub fn find<T: Registered>(&self, id: &str) -> Option<&T> {
        T::collection(self).get(id)
    }

    pub fn contains<T: Registered>(&self, id: &str) -> bool {
        T::collection(self).contains(id)
    }

    /// All matches in insertion order
    pub fn find_where<T, P>(&self, predicate: P) -> Vec<T>
    where
        T: Registered,
        P: Fn(&T) -> bool,
    {
        T::collection(self)
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    /// Owned copy of a whole collection, in insertion order
    pub fn list_all<T: Registered>(&self) -> Vec<T> {
        T::collection(self).iter().cloned().collect()
    }

    /// Borrowing view over a collection (read-only)
    pub fn iter<T: Registered>(&self) -> std::slice::Iter<'_, T> {
        T::collection(self).iter()
    }

    pub fn count<T: Registered>(&self) -> usize {
        T::collection(self).len()
    }

    /// Drop every entity of one kind.
    ///
    /// Does not cascade: references held by other collections are left as
    /// they are and show up in `integrity_issues`.
    pub fn clear<T: Registered>(&mut self) {
        let removed = T::collection(self).len();
        T::collection_mut(self).clear();
        info!(entity = %T::KIND, removed, "collection cleared");
    }

    /// Look up `id`; when absent, build a placeholder with `make` and admit it.
    ///
    /// Resolution that creates is a mutation, so it is explicit here rather
    /// than hidden inside a lookup. The placeholder must carry the requested id.
    pub fn resolve_or_create<T, F>(&mut self, id: &str, make: F) -> RegistryResult<Resolution>
    where
        T: Registered,
        F: FnOnce() -> T,
    {
        if self.contains::<T>(id) {
            return Ok(Resolution::Existing);
        }

        let placeholder = make();
        if placeholder.id() != id {
            return Err(RegistryError::NotFound {
                kind: T::KIND,
                id: id.to_string(),
            });
        }

        self.try_register(placeholder)?;
        info!(entity = %T::KIND, id, "auto-created placeholder");
        Ok(Resolution::Created)
    }

    fn resolves(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Operator => self.operators.contains(id),
            EntityKind::Microscope => self.microscopes.contains(id),
            EntityKind::Sample => self.samples.contains(id),
            EntityKind::Image => self.images.contains(id),
            EntityKind::Measurement => self.measurements.contains(id),
        }
    }

    // ------------------------------------------------------------------------
    // Typed queries
    // ------------------------------------------------------------------------

    /// Case-insensitive email lookup
    pub fn find_operator_by_email(&self, email: &str) -> Option<&Operator> {
        let wanted = email.trim();
        self.operators
            .iter()
            .find(|op| op.email.eq_ignore_ascii_case(wanted))
    }

    pub fn operators_by_access_level(&self, level: AccessLevel) -> Vec<Operator> {
        self.find_where(|op: &Operator| op.level() == Some(level))
    }

    /// Case-insensitive type match
    pub fn samples_by_type(&self, sample_type: &str) -> Vec<Sample> {
        let wanted = sample_type.trim();
        self.find_where(|s: &Sample| s.sample_type.eq_ignore_ascii_case(wanted))
    }

    pub fn measurements_by_sample(&self, sample_id: &str) -> Vec<Measurement> {
        self.find_where(|m: &Measurement| m.sample_id == sample_id)
    }

    pub fn measurements_by_image(&self, image_id: &str) -> Vec<Measurement> {
        self.find_where(|m: &Measurement| m.image_id.as_deref() == Some(image_id))
    }

    pub fn measurement_count_for_sample(&self, sample_id: &str) -> usize {
        self.measurements
            .iter()
            .filter(|m| m.sample_id == sample_id)
            .count()
    }

    // ------------------------------------------------------------------------
    // Amendments (in place, id never changes)
    // ------------------------------------------------------------------------

    pub fn amend_sample_type(&mut self, sample_id: &str, new_type: &str) -> bool {
        let Some(sample) = self.samples.get_mut(sample_id) else {
            warn!(sample = sample_id, "cannot amend type of unknown sample");
            return false;
        };

        let previous = sample.sample_type.clone();
        if !sample.amend_type(new_type) {
            warn!(sample = sample_id, "refusing blank sample type");
            return false;
        }
        info!(sample = sample_id, from = %previous, to = %sample.sample_type, "sample type amended");
        true
    }

    /// Samples are never deleted, only flagged as archived
    pub fn archive_sample(&mut self, sample_id: &str) -> bool {
        match self.samples.get_mut(sample_id) {
            Some(sample) => {
                sample.status = SampleStatus::Archived;
                info!(sample = sample_id, "sample archived");
                true
            }
            None => {
                warn!(sample = sample_id, "cannot archive unknown sample");
                false
            }
        }
    }

    pub fn recalibrate_microscope(&mut self, microscope_id: &str, new_scale: f64) -> bool {
        if !validation::is_positive_finite(new_scale) {
            warn!(microscope = microscope_id, scale = new_scale, "scale must be finite and > 0");
            return false;
        }
        match self.microscopes.get_mut(microscope_id) {
            Some(mic) => {
                let previous = mic.scale;
                mic.scale = new_scale;
                info!(microscope = microscope_id, from = previous, to = new_scale, "recalibrated");
                true
            }
            None => {
                warn!(microscope = microscope_id, "cannot recalibrate unknown microscope");
                false
            }
        }
    }

    /// Attach an image to a registered microscope
    pub fn associate_microscope(&mut self, image_id: &str, microscope_id: &str) -> bool {
        if !self.microscopes.contains(microscope_id) {
            warn!(image = image_id, microscope = microscope_id, "unknown microscope");
            return false;
        }
        match self.images.get_mut(image_id) {
            Some(image) => {
                image.microscope_id = Some(microscope_id.to_string());
                true
            }
            None => {
                warn!(image = image_id, "cannot associate unknown image");
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------------

    /// Re-check every stored reference. Empty unless a collection was cleared
    /// while other entities still pointed into it.
    pub fn integrity_issues(&self) -> Vec<IntegrityIssue> {
        let mut issues = Vec::new();
        self.collect_dangling::<Image>(&mut issues);
        self.collect_dangling::<Measurement>(&mut issues);
        issues
    }

    fn collect_dangling<T: Registered>(&self, issues: &mut Vec<IntegrityIssue>) {
        for entity in T::collection(self).iter() {
            for (target, target_id) in entity.references() {
                if !self.resolves(target, target_id) {
                    issues.push(IntegrityIssue {
                        kind: T::KIND,
                        id: entity.id().to_string(),
                        target,
                        target_id: target_id.to_string(),
                    });
                }
            }
        }
    }
}

// ============================================================================
// SHARED REGISTRY
// ============================================================================

/// Registry handle for concurrent callers.
///
/// One lock guards the whole registry: mutations (registration, bulk import)
/// are serialized and readers never observe a half-admitted entity or a
/// half-finished batch.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<Registry>>,
}

impl SharedRegistry {
    pub fn new(registry: Registry) -> Self {
        SharedRegistry {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Run `f` under the exclusive lock (use for whole import batches)
    pub fn write<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn register<T: Registered>(&self, entity: T) -> bool {
        self.write(|registry| registry.register(entity))
    }

    pub fn find<T: Registered>(&self, id: &str) -> Option<T> {
        self.read(|registry| registry.find::<T>(id).cloned())
    }

    pub fn list_all<T: Registered>(&self) -> Vec<T> {
        self.read(|registry| registry.list_all::<T>())
    }

    pub fn count<T: Registered>(&self) -> usize {
        self.read(|registry| registry.count::<T>())
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> Registry {
        self.read(|registry| registry.clone())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::parse_timestamp;
    use chrono::NaiveDateTime;

    fn ts() -> NaiveDateTime {
        parse_timestamp("2024-01-15 10:30:00").unwrap()
    }

    fn sample(id: &str, sample_type: &str) -> Sample {
        Sample::new(id, &format!("Sample {}", id), sample_type, ts(), "Dr. Lima")
    }

    fn seeded() -> Registry {
        let mut registry = Registry::new();
        assert!(registry.register(Microscope::new("MIC_001", "Zeiss Axio", "1920x1080", 10.0)));
        assert!(registry.register(sample("SAMPLE_001", "Biopsy")));
        assert!(registry.register(Image::new("IMG_001", "sample_001.jpg", ts(), Some("MIC_001"))));
        registry
    }

    #[test]
    fn test_register_and_find() {
        let registry = seeded();

        assert_eq!(registry.count::<Sample>(), 1);
        let found = registry.find::<Sample>("SAMPLE_001").unwrap();
        assert_eq!(found.sample_type, "Biopsy");
        assert!(registry.find::<Sample>("SAMPLE_999").is_none());
    }

    #[test]
    fn test_duplicate_id_rejected_for_every_kind() {
        let mut registry = seeded();
        assert!(registry.register(Operator::new("OP001", "Ana", "ana@lab.org", "ADMIN")));
        assert!(registry.register(Measurement::new("MEAS_001", "SAMPLE_001", 10.0, ts(), None)));

        assert!(!registry.register(Operator::new("OP001", "Bia", "bia@lab.org", "OPERATOR")));
        assert!(!registry.register(Microscope::new("MIC_001", "Other", "640x480", 1.0)));
        assert!(!registry.register(sample("SAMPLE_001", "Other")));
        assert!(!registry.register(Image::new("IMG_001", "other.png", ts(), None)));
        assert!(!registry.register(Measurement::new("MEAS_001", "SAMPLE_001", 99.0, ts(), None)));

        assert_eq!(registry.count::<Operator>(), 1);
        assert_eq!(registry.count::<Microscope>(), 1);
        assert_eq!(registry.count::<Sample>(), 1);
        assert_eq!(registry.count::<Image>(), 1);
        assert_eq!(registry.count::<Measurement>(), 1);

        // First admission wins
        assert_eq!(registry.find::<Measurement>("MEAS_001").unwrap().area, 10.0);
    }

    #[test]
    fn test_try_register_reports_reason() {
        let mut registry = seeded();

        let err = registry.try_register(sample("SAMPLE_001", "Biopsy")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateIdentifier {
                kind: EntityKind::Sample,
                id: "SAMPLE_001".to_string()
            }
        );

        let err = registry
            .try_register(Microscope::new("MIC_002", "Broken", "wide", -1.0))
            .unwrap_err();
        match err {
            RegistryError::Validation(report) => {
                assert!(report.has_issue_for("resolution"));
                assert!(report.has_issue_for("scale"));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_id_rejected() {
        let mut registry = Registry::new();
        let err = registry.try_register(sample("  ", "Biopsy")).unwrap_err();

        match err {
            RegistryError::Validation(report) => assert!(report.has_issue_for("id")),
            other => panic!("expected validation failure, got {:?}", other),
        }
        assert_eq!(registry.count::<Sample>(), 0);
    }

    #[test]
    fn test_measurement_with_unknown_sample_rejected() {
        let mut registry = seeded();

        let err = registry
            .try_register(Measurement::new("MEAS_001", "SAMPLE_X", 42.0, ts(), None))
            .unwrap_err();

        assert!(matches!(
            err,
            RegistryError::UnresolvedReference { target: EntityKind::Sample, .. }
        ));
        assert_eq!(registry.count::<Measurement>(), 0);
        assert!(registry.find::<Measurement>("MEAS_001").is_none());
    }

    #[test]
    fn test_measurement_with_unknown_image_rejected() {
        let mut registry = seeded();

        assert!(!registry.register(Measurement::new(
            "MEAS_001",
            "SAMPLE_001",
            42.0,
            ts(),
            Some("IMG_404")
        )));
        assert!(registry.register(Measurement::new(
            "MEAS_002",
            "SAMPLE_001",
            42.0,
            ts(),
            Some("IMG_001")
        )));
        assert_eq!(registry.count::<Measurement>(), 1);
    }

    #[test]
    fn test_image_microscope_reference() {
        let mut registry = seeded();

        // Unassociated is a valid state
        assert!(registry.register(Image::new("IMG_002", "loose.png", ts(), None)));
        // Dangling microscope is not
        assert!(!registry.register(Image::new("IMG_003", "ghost.png", ts(), Some("MIC_404"))));

        assert!(registry.associate_microscope("IMG_002", "MIC_001"));
        assert!(!registry.associate_microscope("IMG_002", "MIC_404"));
        assert_eq!(
            registry.find::<Image>("IMG_002").unwrap().microscope_id.as_deref(),
            Some("MIC_001")
        );
    }

    #[test]
    fn test_operator_email_must_be_unique() {
        let mut registry = Registry::new();
        assert!(registry.register(Operator::new("OP001", "Ana", "ana@lab.org", "ADMIN")));

        let err = registry
            .try_register(Operator::new("OP002", "Ana Two", "ANA@lab.org", "OPERATOR"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateEmail { .. }));
        assert_eq!(registry.count::<Operator>(), 1);
    }

    #[test]
    fn test_list_all_is_a_copy_in_insertion_order() {
        let mut registry = Registry::new();
        for id in ["S3", "S1", "S2"] {
            assert!(registry.register(sample(id, "Biopsy")));
        }

        let mut listed = registry.list_all::<Sample>();
        let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["S3", "S1", "S2"]);

        // Mutating the copy leaves the registry untouched
        listed[0].name = "tampered".to_string();
        listed.clear();
        assert_eq!(registry.count::<Sample>(), 3);
        assert_eq!(registry.find::<Sample>("S3").unwrap().name, "Sample S3");
    }

    #[test]
    fn test_filters() {
        let mut registry = Registry::new();
        assert!(registry.register(sample("S1", "Biopsy")));
        assert!(registry.register(sample("S2", "Blood")));
        assert!(registry.register(sample("S3", "biopsy")));
        assert!(registry.register(Operator::new("OP1", "A", "a@lab.org", "ADMIN")));
        assert!(registry.register(Operator::new("OP2", "B", "b@lab.org", "operator")));
        assert!(registry.register(Measurement::new("M1", "S1", 1.0, ts(), None)));
        assert!(registry.register(Measurement::new("M2", "S2", 2.0, ts(), None)));
        assert!(registry.register(Measurement::new("M3", "S1", 3.0, ts(), None)));

        let biopsies: Vec<String> = registry.samples_by_type("BIOPSY").into_iter().map(|s| s.id).collect();
        assert_eq!(biopsies, vec!["S1", "S3"]);

        assert_eq!(registry.operators_by_access_level(AccessLevel::Operator).len(), 1);
        assert_eq!(registry.find_operator_by_email("A@LAB.ORG").unwrap().id, "OP1");

        let for_s1: Vec<String> = registry.measurements_by_sample("S1").into_iter().map(|m| m.id).collect();
        assert_eq!(for_s1, vec!["M1", "M3"]);
        assert_eq!(registry.measurement_count_for_sample("S2"), 1);
    }

    #[test]
    fn test_resolve_or_create() {
        let mut registry = Registry::new();

        let first = registry
            .resolve_or_create("SAMPLE_X", || sample("SAMPLE_X", "Imported"))
            .unwrap();
        let second = registry
            .resolve_or_create("SAMPLE_X", || sample("SAMPLE_X", "Should not be used"))
            .unwrap();

        assert_eq!(first, Resolution::Created);
        assert_eq!(second, Resolution::Existing);
        assert_eq!(registry.find::<Sample>("SAMPLE_X").unwrap().sample_type, "Imported");

        // Placeholder with a different id is refused
        let mismatch = registry.resolve_or_create("SAMPLE_Y", || sample("SAMPLE_Z", "Imported"));
        assert!(mismatch.is_err());
        assert_eq!(registry.count::<Sample>(), 1);
    }

    #[test]
    fn test_amend_archive_recalibrate() {
        let mut registry = seeded();

        assert!(registry.amend_sample_type("SAMPLE_001", "Histology"));
        assert!(!registry.amend_sample_type("SAMPLE_001", "  "));
        assert!(!registry.amend_sample_type("SAMPLE_404", "Histology"));
        assert_eq!(registry.find::<Sample>("SAMPLE_001").unwrap().sample_type, "Histology");

        assert!(registry.archive_sample("SAMPLE_001"));
        assert!(registry.find::<Sample>("SAMPLE_001").unwrap().is_archived());
        assert_eq!(registry.count::<Sample>(), 1);

        assert!(registry.recalibrate_microscope("MIC_001", 12.5));
        assert!(!registry.recalibrate_microscope("MIC_001", 0.0));
        assert!(!registry.recalibrate_microscope("MIC_001", f64::NAN));
        assert!(!registry.recalibrate_microscope("MIC_001", f64::INFINITY));
        assert_eq!(registry.find::<Microscope>("MIC_001").unwrap().scale, 12.5);
    }

    #[test]
    fn test_clear_does_not_cascade_and_audit_finds_dangling() {
        let mut registry = seeded();
        assert!(registry.register(Measurement::new(
            "MEAS_001",
            "SAMPLE_001",
            5.0,
            ts(),
            Some("IMG_001")
        )));
        assert!(registry.integrity_issues().is_empty());

        registry.clear::<Image>();

        assert_eq!(registry.count::<Image>(), 0);
        assert_eq!(registry.count::<Measurement>(), 1);
        let issues = registry.integrity_issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].target, EntityKind::Image);
        assert_eq!(issues[0].target_id, "IMG_001");

        // Ids are free again after a clear
        assert!(registry.register(Image::new("IMG_001", "again.png", ts(), None)));
    }

    #[test]
    fn test_shared_registry_serializes_writers() {
        use std::thread;

        let shared = SharedRegistry::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for n in 0..25 {
                        // Every worker races for the same 25 ids
                        let id = format!("S{}", n);
                        shared.register(sample(&id, &format!("worker-{}", worker)));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(shared.count::<Sample>(), 25);
        assert!(shared.find::<Sample>("S7").is_some());
        assert_eq!(shared.snapshot().list_all::<Sample>().len(), 25);
    }
}
