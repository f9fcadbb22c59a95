// src/locate.rs
use thiserror::Error;

use crate::workout::Coords;

pub const PERMISSION_DENIED: u16 = 1;
pub const POSITION_UNAVAILABLE: u16 = 2;

/// A failed position lookup, shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Error: {code} : {message}")]
pub struct GeolocationError {
    pub code: u16,
    pub message: String,
}

impl GeolocationError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn permission_denied() -> Self {
        Self::new(PERMISSION_DENIED, "User denied Geolocation")
    }

    pub fn unavailable() -> Self {
        Self::new(POSITION_UNAVAILABLE, "Position unavailable")
    }
}

/// One-shot source of the user's position. No retries.
pub trait GeolocationProvider {
    /// # Errors
    /// Returns `GeolocationError` if the position cannot be determined.
    fn current_position(&self) -> Result<Coords, GeolocationError>;
}

/// Provider that always answers with a configured position.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPosition(pub Option<Coords>);

impl GeolocationProvider for FixedPosition {
    fn current_position(&self) -> Result<Coords, GeolocationError> {
        self.0.ok_or_else(GeolocationError::unavailable)
    }
}
