//! WebAssembly module for the AquaCrop dashboard
//!
//! Provides client-side computation for:
//! - Crop coefficient and crop water use
//! - Irrigation runtime previews while a field is being edited
//! - Offline field validation

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;
pub use shared::water_balance::*;

fn to_decimal(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn parse_stage(stage: &str) -> Result<GrowthStage, JsValue> {
    serde_json::from_value(serde_json::Value::String(stage.to_string()))
        .map_err(|_| JsValue::from_str(&format!("Unknown growth stage: {}", stage)))
}

/// Crop coefficient for a growth stage, adjusted by NDVI when one is given
#[wasm_bindgen]
pub fn crop_coefficient(stage: &str, ndvi: Option<f64>) -> Result<f64, JsValue> {
    let stage = parse_stage(stage)?;
    Ok(to_f64(adjusted_crop_coefficient(stage, ndvi.map(to_decimal))))
}

/// Crop water use (inches/day) for a stage under a given ET0
#[wasm_bindgen]
pub fn calculate_crop_water_use(et0_in: f64, stage: &str, ndvi: Option<f64>) -> Result<f64, JsValue> {
    let stage = parse_stage(stage)?;
    let kc = adjusted_crop_coefficient(stage, ndvi.map(to_decimal));
    Ok(to_f64(crop_water_use(to_decimal(et0_in), kc)))
}

/// Irrigation runtime in whole minutes, 0 when no irrigation is needed
#[wasm_bindgen]
pub fn preview_irrigation_minutes(
    soil_moisture: f64,
    et0_in: f64,
    precipitation_in: f64,
    stage: &str,
    ndvi: Option<f64>,
    flow_rate_gpm: f64,
) -> Result<u32, JsValue> {
    if !is_actionable(to_decimal(soil_moisture)) {
        return Ok(0);
    }
    let stage = parse_stage(stage)?;
    let kc = adjusted_crop_coefficient(stage, ndvi.map(to_decimal));
    let etc = crop_water_use(to_decimal(et0_in), kc);
    let nir = net_irrigation_requirement(etc, to_decimal(precipitation_in));
    Ok(irrigation_minutes(nir, to_decimal(flow_rate_gpm)))
}

/// Validate a field form before it is submitted
#[wasm_bindgen]
pub fn validate_field_form(field_json: &str) -> Result<(), JsValue> {
    let input: FieldInput = serde_json::from_str(field_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid field JSON: {}", e)))?;
    validate_field_input(&input).map_err(JsValue::from_str)
}
