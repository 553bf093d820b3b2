use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use geojson::GeoJson;
use serde_json::Value as JsonValue;

use super::model::{AttributeValue, Feature, FeatureCollection};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a dataset from a source string: `http://` / `https://` URLs are
/// fetched once, anything else is treated as a local path.
pub fn load_source(source: &str) -> Result<FeatureCollection> {
    if source.starts_with("http://") || source.starts_with("https://") {
        fetch_url(source)
    } else {
        load_file(Path::new(source))
    }
}

/// Load a feature collection from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.geojson` / `.json` – a GeoJSON `FeatureCollection` (or single `Feature`)
pub fn load_file(path: &Path) -> Result<FeatureCollection> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "geojson" | "json" => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let collection = parse_geojson(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            log::info!(
                "Loaded {} features from {} with columns {:?}",
                collection.len(),
                path.display(),
                collection.column_names
            );
            Ok(collection)
        }
        other => bail!("Unsupported file extension: .{other}"),
    }
}

/// One-shot fetch of a static dataset.
pub fn fetch_url(url: &str) -> Result<FeatureCollection> {
    let response = reqwest::blocking::get(url).with_context(|| format!("fetching {url}"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("Fetching {url} returned {status}");
    }
    let text = response.text().context("reading response body")?;
    let collection = parse_geojson(&text).with_context(|| format!("parsing {url}"))?;
    log::info!("Fetched {} features from {url}", collection.len());
    Ok(collection)
}

// ---------------------------------------------------------------------------
// GeoJSON parsing
// ---------------------------------------------------------------------------

/// Parse GeoJSON text into a [`FeatureCollection`].
///
/// Geometries are converted to `geo` types; features whose geometry cannot
/// be converted keep `None` and a warning is logged.
pub fn parse_geojson(text: &str) -> Result<FeatureCollection> {
    let root: GeoJson = text.parse().context("parsing GeoJSON")?;
    let features = match root {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => bail!("Expected a Feature or FeatureCollection, got a bare geometry"),
    };

    let converted = features
        .into_iter()
        .enumerate()
        .map(|(i, f)| convert_feature(i, f))
        .collect();

    Ok(FeatureCollection::from_features(converted))
}

fn convert_feature(index: usize, feature: geojson::Feature) -> Feature {
    let geometry = feature.geometry.and_then(|g| {
        geo::Geometry::<f64>::try_from(g)
            .map_err(|e| log::warn!("Feature {index}: unsupported geometry: {e}"))
            .ok()
    });

    let properties: BTreeMap<String, AttributeValue> = feature
        .properties
        .unwrap_or_default()
        .iter()
        .map(|(key, val)| (key.clone(), json_to_attribute(val)))
        .collect();

    Feature {
        geometry,
        properties,
    }
}

fn json_to_attribute(val: &JsonValue) -> AttributeValue {
    match val {
        JsonValue::String(s) => AttributeValue::String(s.clone()),
        JsonValue::Number(n) => match n.as_f64() {
            Some(f) => AttributeValue::Number(f),
            None => AttributeValue::String(n.to_string()),
        },
        JsonValue::Bool(b) => AttributeValue::Bool(*b),
        JsonValue::Null => AttributeValue::Null,
        other => AttributeValue::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point};

    const BUILDINGS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [24.82, 60.21] },
                "properties": { "name": "A", "floor_area": 120.5, "number_of_dwellings": null }
            },
            {
                "type": "Feature",
                "geometry": null,
                "properties": { "name": "B", "floor_area": 80, "tags": ["x"] }
            }
        ]
    }"#;

    #[test]
    fn test_parse_feature_collection() {
        let fc = parse_geojson(BUILDINGS).unwrap();
        assert_eq!(fc.len(), 2);
        assert_eq!(
            fc.features[0].geometry,
            Some(Geometry::Point(Point::new(24.82, 60.21)))
        );
        assert!(fc.features[1].geometry.is_none());
        assert_eq!(fc.numbers("floor_area"), vec![120.5, 80.0]);
        assert_eq!(
            fc.features[0].get("number_of_dwellings"),
            &AttributeValue::Null
        );
        assert_eq!(fc.features[1].get("tags").as_str(), Some(r#"["x"]"#));
    }

    #[test]
    fn test_bare_geometry_is_rejected() {
        let err = parse_geojson(r#"{ "type": "Point", "coordinates": [0, 0] }"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_file(Path::new("buildings.parquet")).unwrap_err();
        assert!(err.to_string().contains("Unsupported file extension"));
    }
}
