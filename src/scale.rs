//! Scale normalization: raw attribute → visual channel value.
//!
//! One parameterized normalizer replaces the per-visualization variants
//! (direct height, linear, log, percentile). The produced [`ScaleRule`] is
//! a plain value; applying it to a layer is the render surface's job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::data::model::{Feature, FeatureCollection};
use crate::error::{VizError, VizResult};

// ---------------------------------------------------------------------------
// Scale mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMode {
    /// The attribute already is the channel value (e.g. a height in metres).
    Direct,
    /// `min → 0` to `max → output_max`.
    Linear,
    /// Linear in `ln` space over strictly positive values.
    Logarithmic,
    /// Rank of each distinct value, spread evenly over `[0, output_max]`.
    Percentile,
}

impl FromStr for ScaleMode {
    type Err = VizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(ScaleMode::Direct),
            "linear" => Ok(ScaleMode::Linear),
            "log" | "logarithmic" => Ok(ScaleMode::Logarithmic),
            "percentile" => Ok(ScaleMode::Percentile),
            other => Err(VizError::Config(format!("unknown scale mode: {other}"))),
        }
    }
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScaleMode::Direct => "direct",
            ScaleMode::Linear => "linear",
            ScaleMode::Logarithmic => "logarithmic",
            ScaleMode::Percentile => "percentile",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Scale rule
// ---------------------------------------------------------------------------

/// One interpolation breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub input: f64,
    pub output: f64,
}

impl Stop {
    pub fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }
}

/// Transform applied to the raw value before looking it up in the stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputTransform {
    Identity,
    /// `ln(value + 1)`, only for `value > 0`; everything else outputs 0.
    LnPlusOne,
}

/// A derived mapping from attribute value to visual channel value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScaleRule {
    /// Use the attribute's number as-is, 0 when absent.
    Passthrough { attribute: String },
    /// Piecewise-linear table over the (transformed) attribute, clamped at
    /// both ends. Stops are never empty and non-decreasing in `input`.
    Interpolate {
        attribute: String,
        transform: InputTransform,
        stops: Vec<Stop>,
    },
}

impl ScaleRule {
    /// A caller-declared table, e.g. traffic `(0 → 0), (15000 → 1)`.
    pub fn from_stops(attribute: &str, stops: &[(f64, f64)]) -> VizResult<Self> {
        if stops.is_empty() {
            return Err(VizError::InvalidStops {
                reason: "no stops given".into(),
            });
        }
        if stops.iter().any(|(i, o)| !i.is_finite() || !o.is_finite()) {
            return Err(VizError::InvalidStops {
                reason: "stops must be finite".into(),
            });
        }
        if stops.windows(2).any(|w| w[1].0 < w[0].0) {
            return Err(VizError::InvalidStops {
                reason: "stop inputs must be non-decreasing".into(),
            });
        }
        Ok(ScaleRule::Interpolate {
            attribute: attribute.to_string(),
            transform: InputTransform::Identity,
            stops: stops.iter().map(|&(i, o)| Stop::new(i, o)).collect(),
        })
    }

    pub fn attribute(&self) -> &str {
        match self {
            ScaleRule::Passthrough { attribute } | ScaleRule::Interpolate { attribute, .. } => {
                attribute
            }
        }
    }

    /// Interpolation breakpoints; empty for a passthrough rule.
    pub fn stops(&self) -> &[Stop] {
        match self {
            ScaleRule::Passthrough { .. } => &[],
            ScaleRule::Interpolate { stops, .. } => stops,
        }
    }

    /// Channel value for one feature.
    pub fn evaluate(&self, feature: &Feature) -> f64 {
        self.evaluate_value(feature.number(self.attribute()))
    }

    /// Channel value for a raw attribute value; `None` (null, absent, NaN)
    /// maps to 0.
    pub fn evaluate_value(&self, raw: Option<f64>) -> f64 {
        let Some(value) = raw else {
            return 0.0;
        };
        match self {
            ScaleRule::Passthrough { .. } => value,
            ScaleRule::Interpolate {
                transform, stops, ..
            } => {
                let x = match transform {
                    InputTransform::Identity => value,
                    InputTransform::LnPlusOne => {
                        if value <= 0.0 {
                            return 0.0;
                        }
                        (value + 1.0).ln()
                    }
                };
                interpolate(stops, x)
            }
        }
    }

    /// MapLibre-style paint expression, null-guarded with a 0 fallback.
    pub fn to_expression(&self) -> JsonValue {
        let get = json!(["get", self.attribute()]);
        let not_null = json!(["!=", get, null]);
        match self {
            ScaleRule::Passthrough { .. } => json!(["case", not_null, ["to-number", get], 0]),
            ScaleRule::Interpolate {
                transform, stops, ..
            } => {
                let (guard, input) = match transform {
                    InputTransform::Identity => (not_null, get),
                    InputTransform::LnPlusOne => (
                        json!(["all", not_null, [">", get, 0]]),
                        json!(["ln", ["+", get, 1]]),
                    ),
                };
                let mut interp = vec![json!("interpolate"), json!(["linear"]), input];
                for stop in stops {
                    interp.push(json!(stop.input));
                    interp.push(json!(stop.output));
                }
                json!(["case", guard, interp, 0])
            }
        }
    }
}

/// Clamped piecewise-linear lookup. `stops` must be non-empty.
fn interpolate(stops: &[Stop], x: f64) -> f64 {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return 0.0;
    };
    if x <= first.input {
        return first.output;
    }
    if x >= last.input {
        return last.output;
    }
    for w in stops.windows(2) {
        let (lo, hi) = (w[0], w[1]);
        if x >= lo.input && x <= hi.input {
            let span = hi.input - lo.input;
            if span == 0.0 {
                return hi.output;
            }
            let t = (x - lo.input) / span;
            return lo.output + t * (hi.output - lo.output);
        }
    }
    last.output
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Build a [`ScaleRule`] for `attribute` sampled over `features`.
///
/// Fails with [`VizError::NoValidData`] when no feature carries a finite
/// number for the attribute (for `Logarithmic`: a strictly positive one).
/// A single-valued domain is not an error: every input maps to 0.
pub fn normalize(
    features: &FeatureCollection,
    attribute: &str,
    mode: ScaleMode,
    output_max: f64,
) -> VizResult<ScaleRule> {
    normalize_sample(&features.numbers(attribute), attribute, mode, output_max)
}

/// Same as [`normalize`], over an already extracted sample. Non-finite
/// entries are ignored.
pub fn normalize_sample(
    sample: &[f64],
    attribute: &str,
    mode: ScaleMode,
    output_max: f64,
) -> VizResult<ScaleRule> {
    let valid: Vec<f64> = sample.iter().copied().filter(|v| v.is_finite()).collect();
    if valid.is_empty() {
        return Err(VizError::no_valid_data(attribute));
    }

    let rule = match mode {
        ScaleMode::Direct => ScaleRule::Passthrough {
            attribute: attribute.to_string(),
        },
        ScaleMode::Linear => {
            let (min, max) = min_max(&valid);
            ScaleRule::Interpolate {
                attribute: attribute.to_string(),
                transform: InputTransform::Identity,
                stops: two_point_stops(min, max, output_max),
            }
        }
        ScaleMode::Logarithmic => {
            let positive: Vec<f64> = valid.into_iter().filter(|v| *v > 0.0).collect();
            if positive.is_empty() {
                return Err(VizError::no_valid_data(attribute));
            }
            let (min, max) = min_max(&positive);
            ScaleRule::Interpolate {
                attribute: attribute.to_string(),
                transform: InputTransform::LnPlusOne,
                stops: two_point_stops(min.ln(), max.ln(), output_max),
            }
        }
        ScaleMode::Percentile => ScaleRule::Interpolate {
            attribute: attribute.to_string(),
            transform: InputTransform::Identity,
            stops: rank_stops(valid, output_max),
        },
    };

    log::debug!(
        "{mode} scale for {attribute}: {} stops",
        rule.stops().len()
    );
    Ok(rule)
}

fn min_max(values: &[f64]) -> (f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (min, max)
}

fn two_point_stops(min: f64, max: f64, output_max: f64) -> Vec<Stop> {
    if min == max {
        vec![Stop::new(min, 0.0)]
    } else {
        vec![Stop::new(min, 0.0), Stop::new(max, output_max)]
    }
}

/// Distinct values ascending, the i-th of n mapped to `i / (n - 1) * output_max`.
fn rank_stops(mut values: Vec<f64>, output_max: f64) -> Vec<Stop> {
    values.sort_by(f64::total_cmp);
    values.dedup();
    let n = values.len();
    if n == 1 {
        return vec![Stop::new(values[0], 0.0)];
    }
    let last = (n - 1) as f64;
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| Stop::new(v, i as f64 / last * output_max))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::AttributeValue;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn collection(attribute: &str, values: &[Option<f64>]) -> FeatureCollection {
        FeatureCollection::from_features(
            values
                .iter()
                .map(|v| match v {
                    Some(v) => Feature::new(None).with(attribute, *v),
                    None => Feature::new(None).with(attribute, AttributeValue::Null),
                })
                .collect(),
        )
    }

    #[test]
    fn test_linear_end_to_end() {
        let fc = collection("h", &[Some(100.0), Some(200.0), Some(300.0)]);
        let rule = normalize(&fc, "h", ScaleMode::Linear, 150.0).unwrap();
        assert_eq!(rule.stops(), &[Stop::new(100.0, 0.0), Stop::new(300.0, 150.0)]);
        assert!(close(rule.evaluate_value(Some(200.0)), 75.0));
    }

    #[test]
    fn test_linear_clamps_outside_domain() {
        let rule = normalize_sample(&[10.0, 20.0], "h", ScaleMode::Linear, 1.0).unwrap();
        assert_eq!(rule.evaluate_value(Some(-5.0)), 0.0);
        assert_eq!(rule.evaluate_value(Some(500.0)), 1.0);
    }

    #[test]
    fn test_linear_single_value_maps_to_zero() {
        let rule = normalize_sample(&[7.0, 7.0], "h", ScaleMode::Linear, 300.0).unwrap();
        assert_eq!(rule.stops(), &[Stop::new(7.0, 0.0)]);
        assert_eq!(rule.evaluate_value(Some(7.0)), 0.0);
        assert_eq!(rule.evaluate_value(Some(100.0)), 0.0);
    }

    #[test]
    fn test_min_to_zero_max_to_output_max() {
        let sample = [3.0, 1.0, 8.0, 5.0, 8.0];
        for mode in [ScaleMode::Linear, ScaleMode::Logarithmic, ScaleMode::Percentile] {
            let rule = normalize_sample(&sample, "v", mode, 300.0).unwrap();
            let stops = rule.stops();
            assert_eq!(stops.first().unwrap().output, 0.0, "{mode}");
            assert_eq!(stops.last().unwrap().output, 300.0, "{mode}");
            assert_eq!(rule.evaluate_value(Some(8.0)), 300.0, "{mode}");
        }
        let linear = normalize_sample(&sample, "v", ScaleMode::Linear, 300.0).unwrap();
        assert_eq!(linear.evaluate_value(Some(1.0)), 0.0);
        let pct = normalize_sample(&sample, "v", ScaleMode::Percentile, 300.0).unwrap();
        assert_eq!(pct.evaluate_value(Some(1.0)), 0.0);
    }

    #[test]
    fn test_percentile_ignores_duplicates() {
        let a = normalize_sample(&[10.0, 10.0, 20.0], "v", ScaleMode::Percentile, 1.0).unwrap();
        let b = normalize_sample(&[10.0, 20.0], "v", ScaleMode::Percentile, 1.0).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.stops(), &[Stop::new(10.0, 0.0), Stop::new(20.0, 1.0)]);
    }

    #[test]
    fn test_percentile_is_rank_based() {
        let rule = normalize_sample(&[1.0, 2.0, 1000.0], "v", ScaleMode::Percentile, 100.0).unwrap();
        assert_eq!(
            rule.stops(),
            &[Stop::new(1.0, 0.0), Stop::new(2.0, 50.0), Stop::new(1000.0, 100.0)]
        );
    }

    #[test]
    fn test_percentile_single_distinct_value() {
        let rule = normalize_sample(&[4.0, 4.0, 4.0], "v", ScaleMode::Percentile, 100.0).unwrap();
        assert_eq!(rule.stops(), &[Stop::new(4.0, 0.0)]);
        assert_eq!(rule.evaluate_value(Some(4.0)), 0.0);
    }

    #[test]
    fn test_log_guards_non_positive_inputs() {
        let rule = normalize_sample(&[-3.0, 0.0, 10.0, 1000.0], "v", ScaleMode::Logarithmic, 300.0)
            .unwrap();
        assert_eq!(
            rule.stops(),
            &[Stop::new(10f64.ln(), 0.0), Stop::new(1000f64.ln(), 300.0)]
        );
        assert_eq!(rule.evaluate_value(Some(0.0)), 0.0);
        assert_eq!(rule.evaluate_value(Some(-1.0)), 0.0);
        assert!(rule.evaluate_value(Some(100.0)).is_finite());
    }

    #[test]
    fn test_log_sample_minimum_sits_just_above_zero() {
        // Lookup is at ln(v + 1) against a first breakpoint at ln(min).
        let rule = normalize_sample(&[10.0, 1000.0], "v", ScaleMode::Logarithmic, 300.0).unwrap();
        let expected = (11f64.ln() - 10f64.ln()) / (1000f64.ln() - 10f64.ln()) * 300.0;
        let at_min = rule.evaluate_value(Some(10.0));
        assert!(at_min > 0.0);
        assert!(close(at_min, expected));
        assert!(at_min < 10.0);
        assert_eq!(rule.evaluate_value(Some(1000.0)), 300.0);
    }

    #[test]
    fn test_log_without_positive_values_fails() {
        let err = normalize_sample(&[0.0, -2.0], "v", ScaleMode::Logarithmic, 1.0).unwrap_err();
        assert!(matches!(err, VizError::NoValidData { .. }));
    }

    #[test]
    fn test_no_valid_data() {
        let mut fc = collection("v", &[None, None]);
        fc.features.push(Feature::new(None).with("v", f64::NAN));
        for mode in [
            ScaleMode::Direct,
            ScaleMode::Linear,
            ScaleMode::Logarithmic,
            ScaleMode::Percentile,
        ] {
            let err = normalize(&fc, "v", mode, 1.0).unwrap_err();
            assert!(matches!(err, VizError::NoValidData { ref attribute } if attribute == "v"));
        }
    }

    #[test]
    fn test_direct_passthrough() {
        let fc = collection("assumed_height", &[Some(9.9), None]);
        let rule = normalize(&fc, "assumed_height", ScaleMode::Direct, 300.0).unwrap();
        assert!(rule.stops().is_empty());
        assert_eq!(rule.evaluate(&fc.features[0]), 9.9);
        assert_eq!(rule.evaluate(&fc.features[1]), 0.0);
    }

    #[test]
    fn test_from_stops_validation() {
        assert!(ScaleRule::from_stops("p", &[]).is_err());
        assert!(ScaleRule::from_stops("p", &[(10.0, 0.0), (5.0, 1.0)]).is_err());
        let rule = ScaleRule::from_stops("passengers", &[(1.0, 2.0), (3000.0, 20.0)]).unwrap();
        assert_eq!(rule.evaluate_value(Some(0.0)), 2.0);
        assert_eq!(rule.evaluate_value(Some(5000.0)), 20.0);
    }

    #[test]
    fn test_expression_shapes() {
        let linear = normalize_sample(&[1.0, 2.0], "h", ScaleMode::Linear, 10.0).unwrap();
        assert_eq!(
            linear.to_expression(),
            json!([
                "case",
                ["!=", ["get", "h"], null],
                ["interpolate", ["linear"], ["get", "h"], 1.0, 0.0, 2.0, 10.0],
                0
            ])
        );

        let direct = ScaleRule::Passthrough { attribute: "h".into() };
        assert_eq!(
            direct.to_expression(),
            json!(["case", ["!=", ["get", "h"], null], ["to-number", ["get", "h"]], 0])
        );

        let log = normalize_sample(&[1.0, 10.0], "a", ScaleMode::Logarithmic, 5.0).unwrap();
        let expr = log.to_expression();
        assert_eq!(
            expr[1],
            json!(["all", ["!=", ["get", "a"], null], [">", ["get", "a"], 0]])
        );
        assert_eq!(expr[2][2], json!(["ln", ["+", ["get", "a"], 1]]));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("log".parse::<ScaleMode>().unwrap(), ScaleMode::Logarithmic);
        assert_eq!("Percentile".parse::<ScaleMode>().unwrap(), ScaleMode::Percentile);
        assert!("cubic".parse::<ScaleMode>().is_err());
    }
}
