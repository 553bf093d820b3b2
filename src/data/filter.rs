use serde_json::{json, Value as JsonValue};

use super::model::{AttributeValue, Feature, FeatureCollection};

/// Control value meaning "no category filtering".
pub const ALL_SENTINEL: &str = "all";

// ---------------------------------------------------------------------------
// Category selection: the dropdown state
// ---------------------------------------------------------------------------

/// Which category the user picked; `All` disables category filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorySelection {
    All,
    Only(String),
}

impl CategorySelection {
    /// Interpret a raw control value, mapping the `"all"` sentinel.
    pub fn from_control(value: &str) -> Self {
        if value == ALL_SENTINEL {
            CategorySelection::All
        } else {
            CategorySelection::Only(value.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Visibility predicate
// ---------------------------------------------------------------------------

/// A composable feature predicate, evaluable locally and exportable as a
/// renderer filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Every feature passes.
    Always,
    /// `attribute == value`, exact match.
    Equals { attribute: String, value: AttributeValue },
    /// The attribute holds a finite number; null, absent, strings and
    /// booleans all fail.
    HasNumber { attribute: String },
    /// Logical AND of all parts.
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn matches(&self, feature: &Feature) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Equals { attribute, value } => feature.get(attribute) == value,
            Predicate::HasNumber { attribute } => feature.number(attribute).is_some(),
            Predicate::All(parts) => parts.iter().all(|p| p.matches(feature)),
        }
    }

    /// Logical AND; flattens nested conjunctions and drops `Always`.
    pub fn and(self, other: Predicate) -> Predicate {
        let mut parts = Vec::new();
        for p in [self, other] {
            match p {
                Predicate::Always => {}
                Predicate::All(inner) => parts.extend(inner),
                p => parts.push(p),
            }
        }
        match parts.len() {
            0 => Predicate::Always,
            1 => parts.remove(0),
            _ => Predicate::All(parts),
        }
    }

    /// MapLibre-style filter expression; `None` clears the layer filter.
    pub fn to_expression(&self) -> Option<JsonValue> {
        match self {
            Predicate::Always => None,
            Predicate::Equals { attribute, value } => {
                Some(json!(["==", ["get", attribute], value.to_json()]))
            }
            Predicate::HasNumber { attribute } => {
                Some(json!(["==", ["typeof", ["get", attribute]], "number"]))
            }
            Predicate::All(parts) => {
                let mut expr = vec![json!("all")];
                expr.extend(parts.iter().filter_map(Predicate::to_expression));
                Some(JsonValue::Array(expr))
            }
        }
    }
}

/// The category part of the layer filter.
pub fn category_predicate(selection: &CategorySelection, category_attribute: &str) -> Predicate {
    match selection {
        CategorySelection::All => Predicate::Always,
        CategorySelection::Only(value) => Predicate::Equals {
            attribute: category_attribute.to_string(),
            value: AttributeValue::String(value.clone()),
        },
    }
}

/// Full layer filter: the category selection AND a numeric guard on the
/// attribute currently driving the visual channel.
///
/// Must be re-derived whenever the metric changes, otherwise features
/// without a number for the new metric would render as 0 instead of being
/// hidden.
pub fn visibility_predicate(
    selection: &CategorySelection,
    category_attribute: &str,
    metric_attribute: &str,
) -> Predicate {
    category_predicate(selection, category_attribute).and(Predicate::HasNumber {
        attribute: metric_attribute.to_string(),
    })
}

/// Return indices of features passing the predicate.
pub fn filtered_indices(collection: &FeatureCollection, predicate: &Predicate) -> Vec<usize> {
    collection
        .features
        .iter()
        .enumerate()
        .filter(|(_, f)| predicate.matches(f))
        .map(|(i, _)| i)
        .collect()
}
