use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};
use serde_json::{json, Value as JsonValue};

use crate::error::{VizError, VizResult};
use crate::scale::{InputTransform, ScaleRule};

/// `#rrggbb` form used in style expressions.
pub fn hex(color: Srgb<u8>) -> String {
    format!("#{color:x}")
}

pub fn parse_hex(text: &str) -> VizResult<Srgb<u8>> {
    text.parse::<Srgb<u8>>()
        .map_err(|e| VizError::Config(format!("invalid colour {text:?}: {e}")))
}

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Srgb<u8>> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            rgb.into_format()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Category colours: declared label → colour
// ---------------------------------------------------------------------------

/// Maps the declared category labels to distinct colours, in label order.
#[derive(Debug, Clone)]
pub struct CategoryColors {
    mapping: Vec<(String, Srgb<u8>)>,
    default_color: Srgb<u8>,
}

impl CategoryColors {
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Self {
        let palette = generate_palette(labels.len());
        let mapping = labels
            .iter()
            .zip(palette)
            .map(|(label, c)| (label.as_ref().to_string(), c))
            .collect();

        CategoryColors {
            mapping,
            default_color: Srgb::new(128, 128, 128),
        }
    }

    /// Look up the colour for a label; undeclared labels are grey.
    pub fn color_for(&self, label: &str) -> Srgb<u8> {
        self.mapping
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, c)| *c)
            .unwrap_or(self.default_color)
    }

    /// Legend entries (label → `#rrggbb`).
    pub fn legend_entries(&self) -> Vec<(String, String)> {
        self.mapping
            .iter()
            .map(|(label, c)| (label.clone(), hex(*c)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Colour ramp: channel fraction → colour
// ---------------------------------------------------------------------------

/// Two-stop ramp, blended in linear RGB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorRamp {
    pub low: Srgb<u8>,
    pub high: Srgb<u8>,
}

impl ColorRamp {
    pub fn new(low: Srgb<u8>, high: Srgb<u8>) -> Self {
        Self { low, high }
    }

    pub fn from_hex(low: &str, high: &str) -> VizResult<Self> {
        Ok(Self::new(parse_hex(low)?, parse_hex(high)?))
    }

    /// Colour at `fraction`, clamped to `[0, 1]`.
    pub fn at(&self, fraction: f64) -> Srgb<u8> {
        let t = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0) as f32
        } else {
            0.0
        };
        let low: LinSrgb = self.low.into_format::<f32>().into_linear();
        let high: LinSrgb = self.high.into_format::<f32>().into_linear();
        let mixed: Srgb = Srgb::from_linear(low.mix(high, t));
        mixed.into_format()
    }

    /// Colour expression for a rule whose outputs span `[0, output_max]`.
    ///
    /// A passthrough rule is ramped over `0..output_max` of the raw value.
    pub fn expression(&self, rule: &ScaleRule, output_max: f64) -> JsonValue {
        let fraction = |output: f64| {
            if output_max > 0.0 {
                output / output_max
            } else {
                0.0
            }
        };
        let attribute = rule.attribute();
        let get = json!(["get", attribute]);
        let fallback = json!(hex(self.at(0.0)));

        let (guard, input, stops) = match rule {
            ScaleRule::Passthrough { .. } => (
                json!(["!=", get, null]),
                json!(["to-number", get]),
                vec![(0.0, 0.0), (output_max, output_max)],
            ),
            ScaleRule::Interpolate {
                transform, stops, ..
            } => {
                let stops: Vec<(f64, f64)> = stops.iter().map(|s| (s.input, s.output)).collect();
                match transform {
                    InputTransform::Identity => (json!(["!=", get, null]), get.clone(), stops),
                    InputTransform::LnPlusOne => (
                        json!(["all", ["!=", get, null], [">", get, 0]]),
                        json!(["ln", ["+", get, 1]]),
                        stops,
                    ),
                }
            }
        };

        let mut interp = vec![json!("interpolate"), json!(["linear"]), input];
        for (input, output) in stops {
            interp.push(json!(input));
            interp.push(json!(hex(self.at(fraction(output)))));
        }
        json!(["case", guard, interp, fallback])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::{normalize_sample, ScaleMode};

    #[test]
    fn test_palette_is_distinct() {
        let colors = generate_palette(4);
        assert_eq!(colors.len(), 4);
        for i in 0..colors.len() {
            for j in (i + 1)..colors.len() {
                assert_ne!(colors[i], colors[j]);
            }
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn test_hex_round_trip() {
        let c = parse_hex("#fe4a49").unwrap();
        assert_eq!(c, Srgb::new(0xfe, 0x4a, 0x49));
        assert_eq!(hex(c), "#fe4a49");
        assert!(parse_hex("not a colour").is_err());
    }

    #[test]
    fn test_category_colors_follow_labels() {
        let colors = CategoryColors::new(&["social", "necessary"]);
        let legend = colors.legend_entries();
        assert_eq!(legend[0].0, "social");
        assert_eq!(legend[1].0, "necessary");
        assert_eq!(colors.color_for("elsewhere"), Srgb::new(128, 128, 128));
    }

    #[test]
    fn test_ramp_endpoints_and_clamp() {
        let ramp = ColorRamp::from_hex("#000000", "#ffffff").unwrap();
        assert_eq!(ramp.at(0.0), Srgb::new(0, 0, 0));
        assert_eq!(ramp.at(1.0), Srgb::new(255, 255, 255));
        assert_eq!(ramp.at(-3.0), ramp.at(0.0));
        assert_eq!(ramp.at(7.0), ramp.at(1.0));
    }

    #[test]
    fn test_ramp_expression_uses_rule_stops() {
        let ramp = ColorRamp::from_hex("#000000", "#ffffff").unwrap();
        let rule = normalize_sample(&[0.0, 10.0], "v", ScaleMode::Linear, 1.0).unwrap();
        let expr = ramp.expression(&rule, 1.0);
        assert_eq!(expr[0], json!("case"));
        assert_eq!(expr[2][3], json!(0.0));
        assert_eq!(expr[2][4], json!("#000000"));
        assert_eq!(expr[2][6], json!("#ffffff"));
        assert_eq!(expr[3], json!("#000000"));
    }
}
