//! Deterministic soil water balance
//!
//! Converts reference evapotranspiration into a per-field irrigation runtime:
//!
//! 1. Base crop coefficient (Kc) from the growth stage
//! 2. Kc adjusted by the vegetation index when one is available
//! 3. Crop water use `ETc = ET0 * Kc`
//! 4. Net irrigation requirement `max(0, ETc - precipitation)`, only when the
//!    field is below the action threshold
//! 5. Runtime `(NIR * 27154) / flow_rate`, one acre assumed

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{Field, FieldId, GrowthStage, WeatherData};

/// Gallons needed to apply one inch of water over one acre
pub const GALLONS_PER_ACRE_INCH: u32 = 27154;

/// Soil moisture (percent) below which a field is considered for irrigation
pub const ACTION_THRESHOLD_PERCENT: u32 = 40;

/// Baseline Kc for a growth stage
pub fn base_crop_coefficient(stage: GrowthStage) -> Decimal {
    match stage {
        GrowthStage::Seedling => Decimal::new(3, 1),
        GrowthStage::Vegetative => Decimal::new(7, 1),
        GrowthStage::Flowering => Decimal::new(11, 1),
        GrowthStage::Maturity => Decimal::new(8, 1),
    }
}

/// Kc scaled by vegetation density. Neutral at an index of 0.5.
pub fn adjusted_crop_coefficient(stage: GrowthStage, vegetation_index: Option<Decimal>) -> Decimal {
    let base = base_crop_coefficient(stage);
    match vegetation_index {
        Some(index) => base * (Decimal::ONE + (index - Decimal::new(5, 1))),
        None => base,
    }
}

/// Crop water use (ETc) in inches/day
pub fn crop_water_use(et0_in: Decimal, crop_coefficient: Decimal) -> Decimal {
    et0_in * crop_coefficient
}

/// Whether a field's moisture is low enough to act on
pub fn is_actionable(soil_moisture: Decimal) -> bool {
    soil_moisture < Decimal::from(ACTION_THRESHOLD_PERCENT)
}

/// Water deficit left after precipitation, never negative
pub fn net_irrigation_requirement(crop_water_use_in: Decimal, precipitation_in: Decimal) -> Decimal {
    (crop_water_use_in - precipitation_in).max(Decimal::ZERO)
}

/// Exact runtime in minutes for a deficit on a one-acre field. Saturates at
/// `Decimal::MAX`.
pub fn irrigation_minutes_exact(net_requirement_in: Decimal, flow_rate_gpm: Decimal) -> Decimal {
    if net_requirement_in <= Decimal::ZERO || flow_rate_gpm <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    net_requirement_in
        .checked_mul(Decimal::from(GALLONS_PER_ACRE_INCH))
        .and_then(|gallons| gallons.checked_div(flow_rate_gpm))
        .unwrap_or(Decimal::MAX)
}

/// Runtime rounded up to whole minutes, so any deficit yields a positive runtime
pub fn irrigation_minutes(net_requirement_in: Decimal, flow_rate_gpm: Decimal) -> u32 {
    irrigation_minutes_exact(net_requirement_in, flow_rate_gpm)
        .ceil()
        .to_u32()
        .unwrap_or(u32::MAX)
}

/// Full water balance breakdown for one field
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldWaterBalance {
    pub field_id: FieldId,
    pub base_kc: Decimal,
    pub adjusted_kc: Decimal,
    pub crop_water_use_in: Decimal,
    pub net_requirement_in: Decimal,
    pub duration_minutes: u32,
}

impl FieldWaterBalance {
    pub fn needs_irrigation(&self) -> bool {
        self.duration_minutes > 0
    }
}

/// Run the water balance for a field against current weather
pub fn evaluate_field(field: &Field, weather: &WeatherData) -> FieldWaterBalance {
    let base_kc = base_crop_coefficient(field.growth_stage);
    let adjusted_kc = adjusted_crop_coefficient(field.growth_stage, field.vegetation_index);
    let crop_water_use_in = crop_water_use(weather.et0_in, adjusted_kc);

    let net_requirement_in = if is_actionable(field.soil_moisture) {
        net_irrigation_requirement(crop_water_use_in, weather.precipitation_in)
    } else {
        Decimal::ZERO
    };

    FieldWaterBalance {
        field_id: field.id.clone(),
        base_kc,
        adjusted_kc,
        crop_water_use_in,
        net_requirement_in,
        duration_minutes: irrigation_minutes(net_requirement_in, field.flow_rate_gpm),
    }
}
