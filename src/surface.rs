//! Capability interfaces towards the map renderer and the chart library.
//!
//! The core only ever produces rules, predicates and series; a surface
//! decides how they are drawn. The document surfaces here record what would
//! be applied as MapLibre-style JSON, which is what the CLI prints.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::color::{hex, CategoryColors, ColorRamp};
use crate::data::filter::Predicate;
use crate::scale::ScaleRule;
use crate::series::LabeledValue;

pub trait RenderSurface {
    /// Replace the encoding of one visual channel of a layer.
    fn set_visual_property(&mut self, layer_id: &str, channel: &str, rule: &ScaleRule);

    /// Replace the visibility filter of a layer.
    fn set_visibility_predicate(&mut self, layer_id: &str, predicate: &Predicate);
}

pub trait ChartSurface {
    /// Replace the series shown in `container`, drawn in the given order.
    fn render_series(&mut self, container: &str, series: &[LabeledValue]);
}

// ---------------------------------------------------------------------------
// Style document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct LayerStyle {
    pub paint: BTreeMap<String, JsonValue>,
    /// `None` means the layer is unfiltered.
    pub filter: Option<JsonValue>,
}

/// Records paint and filter expressions per layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StyleDocument {
    pub layers: BTreeMap<String, LayerStyle>,
    #[serde(skip)]
    ramps: BTreeMap<String, (ColorRamp, f64)>,
}

impl StyleDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render rules set on `channel` as colours instead of numbers.
    pub fn with_color_ramp(mut self, channel: &str, ramp: ColorRamp, output_max: f64) -> Self {
        self.ramps.insert(channel.to_string(), (ramp, output_max));
        self
    }

    pub fn layer(&self, layer_id: &str) -> Option<&LayerStyle> {
        self.layers.get(layer_id)
    }
}

impl RenderSurface for StyleDocument {
    fn set_visual_property(&mut self, layer_id: &str, channel: &str, rule: &ScaleRule) {
        let expression = match self.ramps.get(channel) {
            Some((ramp, output_max)) => ramp.expression(rule, *output_max),
            None => rule.to_expression(),
        };
        self.layers
            .entry(layer_id.to_string())
            .or_default()
            .paint
            .insert(channel.to_string(), expression);
    }

    fn set_visibility_predicate(&mut self, layer_id: &str, predicate: &Predicate) {
        self.layers.entry(layer_id.to_string()).or_default().filter = predicate.to_expression();
    }
}

// ---------------------------------------------------------------------------
// Chart document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartBar {
    pub label: String,
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Records the latest series per chart container.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartDocument {
    pub charts: BTreeMap<String, Vec<ChartBar>>,
    #[serde(skip)]
    colors: Option<CategoryColors>,
}

impl ChartDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Colour bars by label.
    pub fn with_colors(mut self, colors: CategoryColors) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn chart(&self, container: &str) -> Option<&[ChartBar]> {
        self.charts.get(container).map(Vec::as_slice)
    }
}

impl ChartSurface for ChartDocument {
    fn render_series(&mut self, container: &str, series: &[LabeledValue]) {
        let bars = series
            .iter()
            .map(|point| ChartBar {
                label: point.label.clone(),
                value: point.value,
                color: self
                    .colors
                    .as_ref()
                    .map(|colors| hex(colors.color_for(&point.label))),
            })
            .collect();
        self.charts.insert(container.to_string(), bars);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_style_document_replaces_channel() {
        let mut doc = StyleDocument::new();
        let first = ScaleRule::Passthrough { attribute: "a".into() };
        let second = ScaleRule::Passthrough { attribute: "b".into() };
        doc.set_visual_property("buildings3d", "fill-extrusion-height", &first);
        doc.set_visual_property("buildings3d", "fill-extrusion-height", &second);
        let layer = doc.layer("buildings3d").unwrap();
        assert_eq!(layer.paint.len(), 1);
        assert_eq!(layer.paint["fill-extrusion-height"], second.to_expression());
    }

    #[test]
    fn test_style_document_filter() {
        let mut doc = StyleDocument::new();
        doc.set_visibility_predicate("l", &Predicate::HasNumber { attribute: "h".into() });
        assert_eq!(
            doc.layer("l").unwrap().filter,
            Some(json!(["==", ["typeof", ["get", "h"]], "number"]))
        );
        doc.set_visibility_predicate("l", &Predicate::Always);
        assert_eq!(doc.layer("l").unwrap().filter, None);
    }

    #[test]
    fn test_style_document_color_channel() {
        let ramp = ColorRamp::from_hex("#000000", "#ffffff").unwrap();
        let mut doc = StyleDocument::new().with_color_ramp("fill-extrusion-color", ramp, 1.0);
        let rule = ScaleRule::from_stops("v", &[(0.0, 0.0), (1.0, 1.0)]).unwrap();
        doc.set_visual_property("l", "fill-extrusion-color", &rule);
        let expr = &doc.layer("l").unwrap().paint["fill-extrusion-color"];
        assert_eq!(expr[2][4], json!("#000000"));
    }

    #[test]
    fn test_chart_document_colors() {
        let colors = CategoryColors::new(&["a", "b"]);
        let expected = hex(colors.color_for("b"));
        let mut charts = ChartDocument::new().with_colors(colors);
        charts.render_series(
            "barChart1",
            &[LabeledValue::new("a", Some(2.0)), LabeledValue::new("b", Some(0.0))],
        );
        let bars = charts.chart("barChart1").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].color.as_deref(), Some(expected.as_str()));
    }
}
