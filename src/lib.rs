//! Data-driven visual encodings and isochrone aggregation for urban-planning
//! map layers.
//!
//! ```text
//!  dataset ──► data::loader ──► FeatureCollection
//!                                  │
//!        control change            │            map click
//!              │                   │                │
//!              ▼                   ▼                ▼
//!        scale::normalize   data::filter     isochrone::IsochroneClient
//!              │                   │                │ polygon
//!              └──► state::MapState ◄── aggregate::tally_within
//!                        │                          │
//!                        ▼                          ▼
//!              surface::RenderSurface     surface::ChartSurface
//! ```

pub mod aggregate;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod isochrone;
pub mod scale;
pub mod series;
pub mod state;
pub mod surface;

pub use error::{VizError, VizResult};
