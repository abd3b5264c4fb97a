//! Environmental snapshot models
//!
//! All values are in canonical units: Fahrenheit, inches, mph, percent and
//! kWh/m²/day. Provider-native units never cross into these types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Current weather and daily water balance drivers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherData {
    pub temperature_f: Decimal,
    /// Forecasted precipitation for the day, inches
    pub precipitation_in: Decimal,
    pub wind_speed_mph: Decimal,
    pub relative_humidity_pct: Decimal,
    /// Reference evapotranspiration, inches/day
    pub et0_in: Decimal,
}

/// Agronomic growth drivers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrowthData {
    pub solar_radiation_kwh_m2: Decimal,
    pub temperature_f: Decimal,
    /// Directly measured shallow soil moisture, percent. `None` means no
    /// calibration is available, never "dry".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soil_moisture_pct: Option<Decimal>,
}

/// One complete refresh of environmental telemetry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentalSnapshot {
    pub fetched_at: DateTime<Utc>,
    /// Offset of the farm's local time from UTC, as reported by the provider
    pub utc_offset_seconds: i32,
    pub weather: WeatherData,
    pub growth: GrowthData,
}
