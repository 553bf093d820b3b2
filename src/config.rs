//! Per-visualization settings.
//!
//! Each map instance is described by one [`VisualizationConfig`]; the four
//! shipped maps are available as presets, and any of them can be replaced
//! by a JSON file with the same shape.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{VizError, VizResult};
use crate::isochrone::TravelMode;
use crate::scale::{ScaleMode, ScaleRule};

/// Environment variable overriding the isochrone service key.
pub const API_KEY_ENV: &str = "ORS_API_KEY";

pub const PRESET_NAMES: [&str; 4] = ["buildings", "traffic", "boardings", "isochrone"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomLevels {
    pub min: f64,
    pub default: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    /// `[lon, lat]`
    pub center: [f64; 2],
    pub zoom: ZoomLevels,
    /// `[[west, south], [east, north]]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bounds: Option<[[f64; 2]; 2]>,
}

/// Scale mode for every metric whose name starts with `attribute_prefix`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricMode {
    pub attribute_prefix: String,
    pub mode: ScaleMode,
}

impl MetricMode {
    fn new(attribute_prefix: &str, mode: ScaleMode) -> Self {
        Self {
            attribute_prefix: attribute_prefix.to_string(),
            mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsochroneService {
    /// URL template; `{mode}` is replaced by the travel mode profile.
    pub endpoint: String,
    pub travel_mode: TravelMode,
    pub minutes: u32,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl IsochroneService {
    /// The configured key, overridden by `ORS_API_KEY` when set.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone())
    }

    pub fn url_for(&self, mode: TravelMode) -> String {
        self.endpoint.replace("{mode}", mode.profile())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationConfig {
    pub name: String,
    pub view: MapView,
    /// Dataset path or URL.
    pub dataset: String,
    pub layer_id: String,
    /// Paint property driven by the scale rule.
    pub channel: String,
    pub output_max: f64,
    #[serde(default)]
    pub category_attribute: Option<String>,
    /// Default metric shown before the user picks one.
    #[serde(default)]
    pub metric: Option<String>,
    /// First matching prefix wins; unmatched metrics use Linear.
    #[serde(default)]
    pub metric_modes: Vec<MetricMode>,
    /// Hand-declared table replacing normalization, e.g. traffic opacity.
    #[serde(default)]
    pub fixed_stops: Option<Vec<(f64, f64)>>,
    #[serde(default)]
    pub series_prefix: Option<String>,
    #[serde(default)]
    pub series_years: Vec<u16>,
    #[serde(default)]
    pub declared_labels: Vec<String>,
    #[serde(default)]
    pub isochrone: Option<IsochroneService>,
}

impl VisualizationConfig {
    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: VisualizationConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::info!("Loaded config {:?} from {}", config.name, path.display());
        Ok(config)
    }

    /// Scale mode for a metric according to `metric_modes`.
    pub fn mode_for(&self, metric: &str) -> ScaleMode {
        self.metric_modes
            .iter()
            .find(|m| metric.starts_with(&m.attribute_prefix))
            .map(|m| m.mode)
            .unwrap_or(ScaleMode::Linear)
    }

    /// The fixed rule for `attribute`, if this visualization declares one.
    pub fn fixed_rule(&self, attribute: &str) -> VizResult<Option<ScaleRule>> {
        self.fixed_stops
            .as_deref()
            .map(|stops| ScaleRule::from_stops(attribute, stops))
            .transpose()
    }

    pub fn preset(name: &str) -> VizResult<Self> {
        match name {
            "buildings" => Ok(Self::buildings()),
            "traffic" => Ok(Self::traffic()),
            "boardings" => Ok(Self::boardings()),
            "isochrone" => Ok(Self::isochrone()),
            other => Err(VizError::Config(format!(
                "unknown preset {other:?}, expected one of {PRESET_NAMES:?}"
            ))),
        }
    }

    fn base(name: &str, dataset: &str, layer_id: &str, channel: &str, output_max: f64) -> Self {
        Self {
            name: name.to_string(),
            view: MapView {
                center: [24.826367, 60.214861],
                zoom: ZoomLevels {
                    min: 10.0,
                    default: 14.5,
                    max: 17.0,
                },
                max_bounds: Some([[24.259512, 59.903851], [25.454228, 60.450752]]),
            },
            dataset: dataset.to_string(),
            layer_id: layer_id.to_string(),
            channel: channel.to_string(),
            output_max,
            category_attribute: None,
            metric: None,
            metric_modes: Vec::new(),
            fixed_stops: None,
            series_prefix: None,
            series_years: Vec::new(),
            declared_labels: Vec::new(),
            isochrone: None,
        }
    }

    /// Extruded buildings, height driven by the selected metric.
    pub fn buildings() -> Self {
        let mut config = Self::base(
            "buildings",
            "./data/bay-buildings-joined-16-11-2023-elaborated.geojson",
            "buildings3d",
            "fill-extrusion-height",
            300.0,
        );
        config.view.zoom = ZoomLevels {
            min: 12.0,
            default: 15.5,
            max: 17.0,
        };
        config.view.max_bounds = Some([[24.781583, 60.165923], [24.909075, 60.232232]]);
        config.category_attribute = Some("grouped_purpose_of_use".to_string());
        config.metric = Some("assumed_height_based_on_floors".to_string());
        config.metric_modes = vec![
            MetricMode::new("assumed_height_based_on_floors", ScaleMode::Direct),
            MetricMode::new("floor_area_per_dwelling", ScaleMode::Logarithmic),
            MetricMode::new("simpson_diversity_within_", ScaleMode::Percentile),
            MetricMode::new("days_since_earliest", ScaleMode::Percentile),
        ];
        config
    }

    /// Road segments, opacity driven by the traffic volume of a year.
    pub fn traffic() -> Self {
        let mut config = Self::base(
            "traffic",
            "./data/espoo-autoliikennemaarat-21-11-2023-min.geojson",
            "trafficLayer",
            "line-opacity",
            1.0,
        );
        config.view.max_bounds = Some([[24.439912, 60.106414], [24.959423, 60.543638]]);
        config.metric = Some("traffic_amount_2022".to_string());
        config.fixed_stops = Some(vec![(0.0, 0.0), (15000.0, 1.0)]);
        config.series_prefix = Some("traffic_amount_".to_string());
        config.series_years = (2018..=2022).collect();
        config
    }

    /// Transit stops, circle radius driven by boardings.
    pub fn boardings() -> Self {
        let mut config = Self::base(
            "boardings",
            "./data/hsl-boardings-nov2016-min.geojson",
            "boardingsLayer",
            "circle-radius",
            20.0,
        );
        config.metric = Some("passengers".to_string());
        config.fixed_stops = Some(vec![(1.0, 2.0), (3000.0, 20.0)]);
        config
    }

    /// Places tallied inside a clicked isochrone.
    pub fn isochrone() -> Self {
        let mut config = Self::base(
            "isochrone",
            "./data/places-helsinki-2023-10-19-alpha-gehl-cat-min-60per-confidence.geojson",
            "places",
            "circle-radius",
            2.0,
        );
        config.view.zoom = ZoomLevels {
            min: 13.0,
            default: 15.5,
            max: 17.0,
        };
        config.category_attribute = Some("GehlCategory".to_string());
        config.declared_labels = ["social", "necessary", "optional", "other"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        config.isochrone = Some(IsochroneService {
            endpoint: "https://api.openrouteservice.org/v2/isochrones/{mode}".to_string(),
            travel_mode: TravelMode::FootWalking,
            minutes: 15,
            api_key: None,
        });
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_building_modes() {
        let config = VisualizationConfig::buildings();
        assert_eq!(config.mode_for("assumed_height_based_on_floors"), ScaleMode::Direct);
        assert_eq!(config.mode_for("floor_area_per_dwelling"), ScaleMode::Logarithmic);
        assert_eq!(config.mode_for("simpson_diversity_within_500m"), ScaleMode::Percentile);
        assert_eq!(config.mode_for("days_since_earliest"), ScaleMode::Percentile);
        assert_eq!(config.mode_for("places_within_500m"), ScaleMode::Linear);
    }

    #[test]
    fn test_traffic_fixed_rule() {
        let config = VisualizationConfig::traffic();
        let rule = config.fixed_rule("traffic_amount_2019").unwrap().unwrap();
        assert_eq!(rule.attribute(), "traffic_amount_2019");
        assert_eq!(rule.evaluate_value(Some(7500.0)), 0.5);
        assert_eq!(config.series_years, vec![2018, 2019, 2020, 2021, 2022]);
        assert!(VisualizationConfig::buildings()
            .fixed_rule("x")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_presets_and_json_round_trip() {
        for name in PRESET_NAMES {
            let config = VisualizationConfig::preset(name).unwrap();
            let text = serde_json::to_string(&config).unwrap();
            let back: VisualizationConfig = serde_json::from_str(&text).unwrap();
            assert_eq!(back.name, name);
            assert_eq!(back.metric_modes, config.metric_modes);
            assert_eq!(back.declared_labels, config.declared_labels);
            assert_eq!(back.isochrone, config.isochrone);
        }
        assert!(VisualizationConfig::preset("weather").is_err());
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let text = r#"{
            "name": "custom",
            "view": { "center": [24.9, 60.2], "zoom": { "min": 10, "default": 12, "max": 16 } },
            "dataset": "https://example.org/data.geojson",
            "layer_id": "l",
            "channel": "circle-radius",
            "output_max": 10,
            "metric_modes": [ { "attribute_prefix": "rank_", "mode": "percentile" } ]
        }"#;
        let config: VisualizationConfig = serde_json::from_str(text).unwrap();
        assert_eq!(config.mode_for("rank_total"), ScaleMode::Percentile);
        assert!(config.declared_labels.is_empty());
        assert!(config.isochrone.is_none());
    }

    #[test]
    fn test_isochrone_url() {
        let service = VisualizationConfig::isochrone().isochrone.unwrap();
        assert_eq!(
            service.url_for(TravelMode::CyclingRegular),
            "https://api.openrouteservice.org/v2/isochrones/cycling-regular"
        );
    }
}
