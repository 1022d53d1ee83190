//! Common validation utilities.

use validator::ValidationError;

/// Largest fallback jitter accepted, in degrees (~1.1 km at the equator).
const MAX_JITTER_DEGREES: f64 = 0.01;

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Validates that accuracy is a finite, non-negative radius in meters.
pub fn validate_accuracy(accuracy: f64) -> Result<(), ValidationError> {
    if accuracy.is_finite() && accuracy >= 0.0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("accuracy_range");
        err.message = Some("Accuracy must be non-negative".into());
        Err(err)
    }
}

/// Validates the total width of the random jitter applied to fallback locations.
pub fn validate_jitter(jitter: f64) -> Result<(), ValidationError> {
    if (0.0..=MAX_JITTER_DEGREES).contains(&jitter) {
        Ok(())
    } else {
        let mut err = ValidationError::new("jitter_range");
        err.message = Some("Jitter must be between 0 and 0.01 degrees".into());
        Err(err)
    }
}

/// Validates a coordinate pair, reporting the first offending axis.
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), ValidationError> {
    validate_latitude(lat)?;
    validate_longitude(lon)
}
