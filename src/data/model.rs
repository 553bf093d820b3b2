use std::collections::{BTreeMap, BTreeSet};

use geo::{Centroid, Geometry, Point};

// ---------------------------------------------------------------------------
// AttributeValue – a single named property of a feature
// ---------------------------------------------------------------------------

/// A dynamically-typed GeoJSON property value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Number(v)
    }
}

impl AttributeValue {
    /// The value as a finite number, if it is one.
    ///
    /// `NaN` and infinities count as "not a number" so they never reach
    /// min/max or sort computations.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// JSON form, used when a value is embedded in a renderer expression.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttributeValue::String(s) => serde_json::Value::String(s.clone()),
            AttributeValue::Number(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            AttributeValue::Bool(b) => serde_json::Value::Bool(*b),
            AttributeValue::Null => serde_json::Value::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// Feature – one GeoJSON feature
// ---------------------------------------------------------------------------

/// A geometry plus named attributes. Never mutated once loaded.
#[derive(Debug, Clone, Default)]
pub struct Feature {
    /// `None` for GeoJSON features with a null geometry.
    pub geometry: Option<Geometry<f64>>,
    /// Attribute name → value.
    pub properties: BTreeMap<String, AttributeValue>,
}

impl Feature {
    pub fn new(geometry: Option<Geometry<f64>>) -> Self {
        Self {
            geometry,
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter.
    pub fn with(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Property lookup; an absent key reads as [`AttributeValue::Null`].
    pub fn get(&self, name: &str) -> &AttributeValue {
        static NULL: AttributeValue = AttributeValue::Null;
        self.properties.get(name).unwrap_or(&NULL)
    }

    /// Finite numeric value of a property.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).as_f64()
    }

    /// The point used for containment tests: the coordinate itself for
    /// points, the centroid for everything else.
    pub fn representative_point(&self) -> Option<Point<f64>> {
        match self.geometry.as_ref()? {
            Geometry::Point(p) => Some(*p),
            other => other.centroid(),
        }
    }
}

// ---------------------------------------------------------------------------
// FeatureCollection – the complete loaded dataset
// ---------------------------------------------------------------------------

/// An ordered, immutable sequence of features plus the property names seen.
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    /// All features in file order.
    pub features: Vec<Feature>,
    /// Sorted list of every property name seen.
    pub column_names: Vec<String>,
}

impl FeatureCollection {
    pub fn from_features(features: Vec<Feature>) -> Self {
        let column_names: BTreeSet<&String> = features
            .iter()
            .flat_map(|f| f.properties.keys())
            .collect();
        let column_names = column_names.into_iter().cloned().collect();
        FeatureCollection {
            features,
            column_names,
        }
    }

    /// The valid sample of an attribute: every finite numeric value, in
    /// feature order. Nulls, absent keys, strings and NaN are dropped.
    pub fn numbers(&self, attribute: &str) -> Vec<f64> {
        self.features
            .iter()
            .filter_map(|f| f.number(attribute))
            .collect()
    }

    /// Distinct string values of a categorical attribute, e.g. for a
    /// purpose-of-use dropdown.
    pub fn categories(&self, attribute: &str) -> Vec<String> {
        let distinct: BTreeSet<&str> = self
            .features
            .iter()
            .filter_map(|f| f.get(attribute).as_str())
            .collect();
        distinct.into_iter().map(str::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
