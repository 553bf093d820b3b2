use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Value};

const PURPOSES: [&str; 5] = [
    "Residential",
    "Commercial",
    "Industrial",
    "Education",
    "Public services",
];
const GEHL_CATEGORIES: [&str; 4] = ["social", "necessary", "optional", "other"];
const CENTER: [f64; 2] = [24.826367, 60.214861];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }

    /// `true` with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

fn jitter(rng: &mut SimpleRng, spread: f64) -> [f64; 2] {
    [
        CENTER[0] + rng.range(-spread, spread) * 2.0,
        CENTER[1] + rng.range(-spread, spread),
    ]
}

/// Small square footprint around `c`.
fn footprint(c: [f64; 2], half: f64) -> Value {
    let ring = vec![
        [c[0] - half, c[1] - half],
        [c[0] + half, c[1] - half],
        [c[0] + half, c[1] + half],
        [c[0] - half, c[1] + half],
        [c[0] - half, c[1] - half],
    ];
    json!({ "type": "Polygon", "coordinates": [ring] })
}

fn building(rng: &mut SimpleRng, id: usize) -> Value {
    let purpose = rng.pick(&PURPOSES);
    let floors = 1 + (rng.next_u64() % 12) as u32;
    let dwellings = if purpose == "Residential" {
        json!(rng.range(25.0, 180.0).round())
    } else {
        Value::Null
    };
    let mut properties = json!({
        "id": id,
        "grouped_purpose_of_use": purpose,
        "assumed_height_based_on_floors": f64::from(floors) * 3.2,
        "floor_area_per_dwelling": dwellings,
        "places_within_500m": (rng.range(0.0, 60.0)).round(),
        "simpson_diversity_within_500m": rng.range(0.0, 0.75),
        "days_since_earliest": (rng.range(0.0, 20000.0)).round(),
    });
    // Some buildings lack survey data entirely.
    if rng.chance(0.1) {
        properties["places_within_500m"] = Value::Null;
    }
    json!({
        "type": "Feature",
        "properties": properties,
        "geometry": footprint(jitter(rng, 0.01), 0.0001),
    })
}

fn place(rng: &mut SimpleRng, id: usize) -> Value {
    let category = if rng.chance(0.05) {
        Value::Null
    } else {
        json!(rng.pick(&GEHL_CATEGORIES))
    };
    let [lon, lat] = jitter(rng, 0.015);
    json!({
        "type": "Feature",
        "properties": { "id": id, "GehlCategory": category },
        "geometry": { "type": "Point", "coordinates": [lon, lat] },
    })
}

fn road(rng: &mut SimpleRng, id: usize) -> Value {
    let start = jitter(rng, 0.02);
    let end = [start[0] + rng.range(-0.004, 0.004), start[1] + rng.range(-0.002, 0.002)];
    let base = rng.range(500.0, 20000.0);
    let mut properties = json!({ "id": id });
    for year in 2018..=2022 {
        // Counts are missing for some years.
        let value = if rng.chance(0.15) {
            Value::Null
        } else {
            json!((base * rng.range(0.85, 1.15)).round())
        };
        properties[format!("traffic_amount_{year}")] = value;
    }
    json!({
        "type": "Feature",
        "properties": properties,
        "geometry": { "type": "LineString", "coordinates": [start, end] },
    })
}

fn write_collection(path: &Path, features: Vec<Value>) -> Result<()> {
    let count = features.len();
    let collection = json!({ "type": "FeatureCollection", "features": features });
    let text = serde_json::to_string(&collection)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {count} features to {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let out = Path::new("data");
    fs::create_dir_all(out).context("creating data directory")?;

    let buildings = (0..400).map(|i| building(&mut rng, i)).collect();
    write_collection(&out.join("sample-buildings.geojson"), buildings)?;

    let places = (0..600).map(|i| place(&mut rng, i)).collect();
    write_collection(&out.join("sample-places.geojson"), places)?;

    let roads = (0..120).map(|i| road(&mut rng, i)).collect();
    write_collection(&out.join("sample-traffic.geojson"), roads)?;
    Ok(())
}
