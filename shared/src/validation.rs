//! Validation utilities for field data
//!
//! The engine performs no server-side validation of the external store; these
//! checks guard local edits and calibration input only.

use rust_decimal::Decimal;

use crate::models::{Field, FieldInput};
use crate::types::GpsCoordinates;

// ============================================================================
// Agronomic Validations
// ============================================================================

/// Validate soil moisture is a percentage
pub fn validate_moisture_percent(moisture: Decimal) -> Result<(), &'static str> {
    if moisture < Decimal::ZERO || moisture > Decimal::from(100) {
        return Err("Soil moisture must be between 0 and 100%");
    }
    Ok(())
}

/// Validate vegetation index is within [0, 1]
pub fn validate_vegetation_index(index: Decimal) -> Result<(), &'static str> {
    if index < Decimal::ZERO || index > Decimal::ONE {
        return Err("Vegetation index must be between 0 and 1");
    }
    Ok(())
}

/// Validate irrigation flow rate is positive
pub fn validate_flow_rate(flow_rate_gpm: Decimal) -> Result<(), &'static str> {
    if flow_rate_gpm <= Decimal::ZERO {
        return Err("Flow rate must be greater than 0 gallons per minute");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate GPS coordinates are on the globe
pub fn validate_coordinates(coordinates: &GpsCoordinates) -> Result<(), &'static str> {
    if coordinates.latitude < Decimal::from(-90) || coordinates.latitude > Decimal::from(90) {
        return Err("Latitude must be between -90 and 90");
    }
    if coordinates.longitude < Decimal::from(-180) || coordinates.longitude > Decimal::from(180) {
        return Err("Longitude must be between -180 and 180");
    }
    Ok(())
}

/// Validate a field name is present
pub fn validate_field_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("Field name is required");
    }
    if name.chars().count() > 120 {
        return Err("Field name must be at most 120 characters");
    }
    Ok(())
}

/// Validate a local field edit before it enters the store
pub fn validate_field_input(input: &FieldInput) -> Result<(), &'static str> {
    validate_field_name(&input.name)?;
    validate_flow_rate(input.flow_rate_gpm)?;
    validate_coordinates(&input.location)?;
    Ok(())
}

/// Validate a complete field record
pub fn validate_field(field: &Field) -> Result<(), &'static str> {
    validate_field_name(&field.name)?;
    validate_flow_rate(field.flow_rate_gpm)?;
    validate_coordinates(&field.location)?;
    validate_moisture_percent(field.soil_moisture)?;
    if let Some(index) = field.vegetation_index {
        validate_vegetation_index(index)?;
    }
    Ok(())
}
