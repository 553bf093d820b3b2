//! Isochrone aggregation: which points fall inside a reachability polygon,
//! tallied per category.
//!
//! Containment uses `geo::Contains`, which follows DE-9IM: a point lying
//! exactly on the polygon boundary is *not* contained.

use geo::{Contains, Geometry, MultiPolygon, Polygon};
use serde::Serialize;

use crate::data::model::{Feature, FeatureCollection};
use crate::error::{VizError, VizResult};

// ---------------------------------------------------------------------------
// Category tally
// ---------------------------------------------------------------------------

/// Counts per declared category label, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTally {
    counts: Vec<(String, usize)>,
}

impl CategoryTally {
    /// All declared labels at 0. Duplicate labels are kept once.
    pub fn zeroed<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut counts: Vec<(String, usize)> = Vec::with_capacity(labels.len());
        for label in labels {
            let label = label.as_ref();
            if !counts.iter().any(|(l, _)| l == label) {
                counts.push((label.to_string(), 0));
            }
        }
        Self { counts }
    }

    /// Count one occurrence; labels outside the declared set are ignored.
    fn record(&mut self, label: &str) -> bool {
        match self.counts.iter_mut().find(|(l, _)| l == label) {
            Some((_, n)) => {
                *n += 1;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.counts
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, n)| *n)
    }

    /// `(label, count)` pairs in declaration order.
    pub fn entries(&self) -> &[(String, usize)] {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }

    /// Simpson's diversity index `1 - Σ p²` over the declared labels,
    /// 0 when nothing was counted.
    pub fn simpson_diversity(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let total = total as f64;
        let sum_sq: f64 = self
            .counts
            .iter()
            .map(|(_, n)| (*n as f64 / total).powi(2))
            .sum();
        1.0 - sum_sq
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Validate a reachability geometry and turn it into a multipolygon.
pub fn reachability_area(geometry: &Geometry<f64>) -> VizResult<MultiPolygon<f64>> {
    let area = match geometry {
        Geometry::Polygon(p) => MultiPolygon::new(vec![p.clone()]),
        Geometry::MultiPolygon(mp) => mp.clone(),
        other => {
            return Err(VizError::invalid_geometry(format!(
                "expected a polygon, got {}",
                geometry_kind(other)
            )))
        }
    };
    if area.0.is_empty() || area.0.iter().any(is_degenerate) {
        return Err(VizError::invalid_geometry("polygon has no area"));
    }
    Ok(area)
}

fn is_degenerate(polygon: &Polygon<f64>) -> bool {
    let ring = &polygon.exterior().0;
    ring.len() < 4 || ring.iter().any(|c| !c.x.is_finite() || !c.y.is_finite())
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Features whose representative point lies inside `area`, in input order.
/// Features without geometry are skipped.
pub fn features_within<'a>(
    area: &MultiPolygon<f64>,
    features: &'a FeatureCollection,
) -> Vec<&'a Feature> {
    features
        .features
        .iter()
        .filter(|f| {
            f.representative_point()
                .is_some_and(|point| area.contains(&point))
        })
        .collect()
}

/// Tally the contained features by `category_attribute` over the declared
/// labels. Null or non-string categories are not counted.
pub fn tally_within<S: AsRef<str>>(
    polygon: &Geometry<f64>,
    features: &FeatureCollection,
    category_attribute: &str,
    declared_labels: &[S],
) -> VizResult<CategoryTally> {
    let area = reachability_area(polygon)?;
    let within = features_within(&area, features);

    let mut tally = CategoryTally::zeroed(declared_labels);
    let mut undeclared = 0usize;
    for feature in &within {
        if let Some(label) = feature.get(category_attribute).as_str() {
            if !tally.record(label) {
                undeclared += 1;
            }
        }
    }

    log::debug!(
        "{} of {} features within isochrone, {} with undeclared {category_attribute}",
        within.len(),
        features.len(),
        undeclared
    );
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::AttributeValue;
    use geo::{line_string, point, polygon, Geometry};

    fn square() -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0)
        ])
    }

    fn place(x: f64, y: f64, category: &str) -> Feature {
        Feature::new(Some(Geometry::Point(point!(x: x, y: y)))).with("GehlCategory", category)
    }

    #[test]
    fn test_tally_declared_labels_only() {
        let fc = FeatureCollection::from_features(vec![
            place(1.0, 1.0, "a"),
            place(2.0, 2.0, "a"),
            place(3.0, 3.0, "c"),
            place(50.0, 50.0, "b"),
        ]);
        let tally = tally_within(&square(), &fc, "GehlCategory", &["a", "b"]).unwrap();
        assert_eq!(
            tally.entries(),
            &[("a".to_string(), 2), ("b".to_string(), 0)]
        );
        assert_eq!(tally.get("c"), None);
    }

    #[test]
    fn test_tally_keeps_declaration_order() {
        let fc = FeatureCollection::from_features(vec![
            place(1.0, 1.0, "social"),
            place(1.0, 2.0, "social"),
            place(1.0, 3.0, "other"),
        ]);
        let labels = ["other", "necessary", "social"];
        let tally = tally_within(&square(), &fc, "GehlCategory", &labels).unwrap();
        let order: Vec<&str> = tally.entries().iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(order, labels);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn test_null_category_not_counted() {
        let fc = FeatureCollection::from_features(vec![
            place(1.0, 1.0, "a"),
            Feature::new(Some(Geometry::Point(point!(x: 2.0, y: 2.0))))
                .with("GehlCategory", AttributeValue::Null),
            Feature::new(None).with("GehlCategory", "a"),
        ]);
        let tally = tally_within(&square(), &fc, "GehlCategory", &["a"]).unwrap();
        assert_eq!(tally.get("a"), Some(1));
    }

    #[test]
    fn test_boundary_point_is_excluded() {
        let fc = FeatureCollection::from_features(vec![place(0.0, 5.0, "a")]);
        let tally = tally_within(&square(), &fc, "GehlCategory", &["a"]).unwrap();
        assert_eq!(tally.get("a"), Some(0));
    }

    #[test]
    fn test_invalid_geometry_short_circuits() {
        let fc = FeatureCollection::from_features(vec![place(1.0, 1.0, "a")]);
        let line = Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]);
        let err = tally_within(&line, &fc, "GehlCategory", &["a"]).unwrap_err();
        assert!(matches!(err, VizError::InvalidGeometry { .. }));

        let empty = Geometry::MultiPolygon(MultiPolygon::new(vec![]));
        assert!(tally_within(&empty, &fc, "GehlCategory", &["a"]).is_err());
    }

    #[test]
    fn test_simpson_diversity() {
        let mut tally = CategoryTally::zeroed(&["a", "b"]);
        assert_eq!(tally.simpson_diversity(), 0.0);
        tally.record("a");
        tally.record("b");
        assert!((tally.simpson_diversity() - 0.5).abs() < 1e-12);
        tally.record("a");
        tally.record("a");
        // p = (0.75, 0.25)
        assert!((tally.simpson_diversity() - 0.375).abs() < 1e-12);
    }

    #[test]
    fn test_zeroed_dedups_labels() {
        let tally = CategoryTally::zeroed(&["a", "a", "b"]);
        assert_eq!(tally.entries().len(), 2);
    }
}
