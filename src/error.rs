use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Recoverable failures of an encoding or aggregation step.
///
/// None of these is fatal: the caller keeps whatever was displayed before
/// and surfaces the message (status line, log).
#[derive(Debug, Error)]
pub enum VizError {
    /// The sampled attribute had no usable numeric value.
    #[error("no valid values found for property: {attribute}")]
    NoValidData { attribute: String },

    /// The routing/isochrone service failed or answered with a non-2xx status.
    #[error("an error occurred: {message}")]
    ExternalServiceFailure { status: Option<u16>, message: String },

    /// The reachability polygon is missing or unusable.
    #[error("invalid isochrone geometry: {reason}")]
    InvalidGeometry { reason: String },

    /// A hand-declared interpolation table is empty or out of order.
    #[error("invalid interpolation stops: {reason}")]
    InvalidStops { reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl VizError {
    pub fn no_valid_data(attribute: &str) -> Self {
        VizError::NoValidData {
            attribute: attribute.to_string(),
        }
    }

    pub fn invalid_geometry(reason: impl Into<String>) -> Self {
        VizError::InvalidGeometry {
            reason: reason.into(),
        }
    }
}

pub type VizResult<T> = Result<T, VizError>;
