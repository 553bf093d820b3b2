//! Client for the routing/isochrone service (openrouteservice API shape).
//!
//! `POST {endpoint}/{profile}` with `{"locations": [[lon, lat]], "range": [seconds]}`,
//! authenticated by a static key in the `Authorization` header. The answer is
//! a GeoJSON feature collection whose first feature is the reachability
//! polygon.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use geo::Geometry;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};

use crate::config::IsochroneService;
use crate::data::loader::parse_geojson;
use crate::error::{VizError, VizResult};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TravelMode {
    DrivingCar,
    CyclingRegular,
    CyclingElectric,
    FootWalking,
    Wheelchair,
}

impl TravelMode {
    /// Path segment used by the service.
    pub fn profile(self) -> &'static str {
        match self {
            TravelMode::DrivingCar => "driving-car",
            TravelMode::CyclingRegular => "cycling-regular",
            TravelMode::CyclingElectric => "cycling-electric",
            TravelMode::FootWalking => "foot-walking",
            TravelMode::Wheelchair => "wheelchair",
        }
    }
}

impl FromStr for TravelMode {
    type Err = VizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "driving-car" => Ok(TravelMode::DrivingCar),
            "cycling-regular" => Ok(TravelMode::CyclingRegular),
            "cycling-electric" => Ok(TravelMode::CyclingElectric),
            "foot-walking" => Ok(TravelMode::FootWalking),
            "wheelchair" => Ok(TravelMode::Wheelchair),
            other => Err(VizError::Config(format!("unknown travel mode: {other}"))),
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile())
    }
}

/// JSON body of an isochrone query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsochroneRequest {
    pub locations: Vec<[f64; 2]>,
    pub range: Vec<u32>,
}

impl IsochroneRequest {
    /// A single origin and a single time budget in minutes.
    pub fn new(lon: f64, lat: f64, minutes: u32) -> VizResult<Self> {
        let seconds = minutes.checked_mul(60).ok_or_else(|| {
            VizError::Config(format!("time budget of {minutes} minutes is too large"))
        })?;
        Ok(Self {
            locations: vec![[lon, lat]],
            range: vec![seconds],
        })
    }
}

// ---------------------------------------------------------------------------
// Stale-response guard
// ---------------------------------------------------------------------------

/// Identifies one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    generation: u64,
}

/// Hands out increasing tickets; only the most recent one is current.
#[derive(Debug, Default)]
pub struct RequestGenerations {
    latest: u64,
}

impl RequestGenerations {
    pub fn issue(&mut self) -> RequestTicket {
        self.latest += 1;
        RequestTicket {
            generation: self.latest,
        }
    }

    /// `false` once a newer ticket has been issued.
    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.generation == self.latest
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct IsochroneClient {
    service: IsochroneService,
    api_key: Option<String>,
    client: Client,
}

impl IsochroneClient {
    /// No request timeout is set: a call ends when the service answers or the
    /// connection fails.
    pub fn new(service: IsochroneService) -> VizResult<Self> {
        let client = Client::builder()
            .user_agent("urbanviz/0.1")
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| VizError::ExternalServiceFailure {
                status: None,
                message: format!("failed to create HTTP client: {e}"),
            })?;
        let api_key = service.resolve_api_key();
        if api_key.is_none() {
            log::warn!("No isochrone API key configured");
        }
        Ok(Self {
            service,
            api_key,
            client,
        })
    }

    /// Query the reachability polygon around `(lon, lat)`.
    pub fn fetch(
        &self,
        lon: f64,
        lat: f64,
        mode: TravelMode,
        minutes: u32,
    ) -> VizResult<Geometry<f64>> {
        let url = self.service.url_for(mode);
        let body = IsochroneRequest::new(lon, lat, minutes)?;
        log::info!("Requesting {minutes} min {mode} isochrone at [{lon}, {lat}]");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, key);
        }

        let response = request.send().map_err(|e| VizError::ExternalServiceFailure {
            status: None,
            message: format!("isochrone request failed: {e}"),
        })?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("").to_string();
        let text = response.text().map_err(|e| VizError::ExternalServiceFailure {
            status: Some(status.as_u16()),
            message: format!("reading isochrone response: {e}"),
        })?;
        parse_response(status.as_u16(), &reason, &text)
    }
}

/// Turn a service answer into the reachability geometry.
///
/// Non-2xx → `ExternalServiceFailure`; a body without a usable first
/// feature geometry → `InvalidGeometry`.
pub fn parse_response(status: u16, reason: &str, body: &str) -> VizResult<Geometry<f64>> {
    if !(200..300).contains(&status) {
        return Err(VizError::ExternalServiceFailure {
            status: Some(status),
            message: if reason.is_empty() {
                format!("status {status}")
            } else {
                reason.to_string()
            },
        });
    }

    let collection = parse_geojson(body)
        .map_err(|e| VizError::invalid_geometry(format!("unreadable response: {e:#}")))?;
    collection
        .features
        .into_iter()
        .next()
        .ok_or_else(|| VizError::invalid_geometry("response contains no features"))?
        .geometry
        .ok_or_else(|| VizError::invalid_geometry("first feature has no geometry"))
}
