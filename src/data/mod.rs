/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  .geojson file / dataset URL
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse GeoJSON → FeatureCollection
///   └──────────┘
///        │
///        ▼
///   ┌───────────────────┐
///   │ FeatureCollection │  Vec<Feature>, column index
///   └───────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  category + null-guard predicate → visible indices
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod filter;
