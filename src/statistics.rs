// 📊 Statistics Engine - aggregate queries over the measurement collection
//
// Plain O(n) scans in insertion order, no caching. Every operation is total:
// empty input gives 0.0 or `None`, never NaN or an error.

use crate::entities::{Image, Measurement, Microscope, Operator, Sample};
use crate::registry::Registry;
use serde::Serialize;
use std::fmt;

/// Size of every collection at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub operators: usize,
    pub microscopes: usize,
    pub samples: usize,
    pub images: usize,
    pub measurements: usize,
}

impl EntityCounts {
    pub fn total(&self) -> usize {
        self.operators + self.microscopes + self.samples + self.images + self.measurements
    }
}

impl fmt::Display for EntityCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operators={} microscopes={} samples={} images={} measurements={}",
            self.operators, self.microscopes, self.samples, self.images, self.measurements
        )
    }
}

// ============================================================================
// SLICE HELPERS
// ============================================================================

/// Mean area, 0.0 on empty input
pub fn mean_area<'a, I>(measurements: I) -> f64
where
    I: IntoIterator<Item = &'a Measurement>,
{
    let (count, sum) = measurements
        .into_iter()
        .fold((0usize, 0.0), |(count, sum), m| (count + 1, sum + m.area));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

pub fn total_area<'a, I>(measurements: I) -> f64
where
    I: IntoIterator<Item = &'a Measurement>,
{
    measurements.into_iter().map(|m| m.area).sum()
}

/// Largest area; on ties the earliest entry wins
pub fn max_area<'a, I>(measurements: I) -> Option<&'a Measurement>
where
    I: IntoIterator<Item = &'a Measurement>,
{
    let mut best: Option<&Measurement> = None;
    for m in measurements {
        match best {
            Some(current) if m.area <= current.area => {}
            _ => best = Some(m),
        }
    }
    best
}

// ============================================================================
// ENGINE
// ============================================================================

/// Read-only view over a registry
pub struct StatisticsEngine<'a> {
    registry: &'a Registry,
}

impl<'a> StatisticsEngine<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        StatisticsEngine { registry }
    }

    pub fn mean_area(&self) -> f64 {
        mean_area(self.registry.iter::<Measurement>())
    }

    pub fn max_area_measurement(&self) -> Option<Measurement> {
        max_area(self.registry.iter::<Measurement>()).cloned()
    }

    pub fn total_area(&self) -> f64 {
        total_area(self.registry.iter::<Measurement>())
    }

    /// Mean over one sample's measurements, 0.0 when it has none
    pub fn mean_area_for_sample(&self, sample_id: &str) -> f64 {
        mean_area(&self.registry.measurements_by_sample(sample_id))
    }

    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            operators: self.registry.count::<Operator>(),
            microscopes: self.registry.count::<Microscope>(),
            samples: self.registry.count::<Sample>(),
            images: self.registry.count::<Image>(),
            measurements: self.registry.count::<Measurement>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::parse_timestamp;

    fn registry_with_areas(areas: &[f64]) -> Registry {
        let ts = parse_timestamp("2024-01-15 10:30:00").unwrap();
        let mut registry = Registry::new();
        assert!(registry.register(Sample::new("S1", "Tissue", "Biopsy", ts, "Dr. Lima")));
        for (n, area) in areas.iter().enumerate() {
            let id = format!("M{}", n + 1);
            assert!(registry.register(Measurement::new(&id, "S1", *area, ts, None)));
        }
        registry
    }

    #[test]
    fn test_empty_statistics() {
        let registry = Registry::new();
        let stats = StatisticsEngine::new(&registry);

        assert_eq!(stats.mean_area(), 0.0);
        assert!(!stats.mean_area().is_nan());
        assert!(stats.max_area_measurement().is_none());
        assert_eq!(stats.total_area(), 0.0);
        assert_eq!(stats.mean_area_for_sample("S1"), 0.0);
        assert_eq!(stats.counts().total(), 0);
    }

    #[test]
    fn test_max_tie_keeps_first_occurrence() {
        let registry = registry_with_areas(&[50.0, 75.0, 75.0]);
        let stats = StatisticsEngine::new(&registry);

        let max = stats.max_area_measurement().unwrap();
        assert_eq!(max.id, "M2");
        assert_eq!(max.area, 75.0);
    }

    #[test]
    fn test_mean_and_total() {
        let registry = registry_with_areas(&[10.0, 20.0, 45.0]);
        let stats = StatisticsEngine::new(&registry);

        assert!((stats.mean_area() - 25.0).abs() < 1e-9);
        assert!((stats.total_area() - 75.0).abs() < 1e-9);
        assert!((stats.mean_area_for_sample("S1") - 25.0).abs() < 1e-9);
        assert_eq!(stats.mean_area_for_sample("S404"), 0.0);
    }

    #[test]
    fn test_counts() {
        let registry = registry_with_areas(&[1.0, 2.0]);
        let counts = StatisticsEngine::new(&registry).counts();

        assert_eq!(counts.samples, 1);
        assert_eq!(counts.measurements, 2);
        assert_eq!(counts.total(), 3);
        assert!(counts.to_string().contains("measurements=2"));
    }

    #[test]
    fn test_slice_helpers() {
        let empty: &[Measurement] = &[];
        assert_eq!(mean_area(empty), 0.0);
        assert_eq!(total_area(empty), 0.0);
        assert!(max_area(empty).is_none());
    }

    #[test]
    fn test_engine_and_helpers_agree() {
        let registry = registry_with_areas(&[1.5, 2.5, 8.0]);
        let stats = StatisticsEngine::new(&registry);
        let all = registry.list_all::<Measurement>();

        assert_eq!(stats.mean_area(), mean_area(&all));
        assert_eq!(stats.total_area(), total_area(&all));
        assert_eq!(stats.mean_area_for_sample("S1"), mean_area(&all));
    }
}
