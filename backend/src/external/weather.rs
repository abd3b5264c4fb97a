//! Environmental feed backed by the Open-Meteo forecast API
//!
//! Fetches current conditions and the daily water balance drivers for the farm
//! location, then normalizes provider-native units into the canonical snapshot
//! (Fahrenheit, inches, mph, kWh/m²/day). Nothing provider-specific leaves this
//! module.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use shared::{EnvironmentalSnapshot, FarmLocation, GrowthData, WeatherData};

use crate::clock::Clock;
use crate::error::ProviderError;

/// Source of environmental telemetry for a farm location
#[async_trait]
pub trait EnvironmentalFeed: Send + Sync {
    async fn fetch(&self, location: &FarmLocation) -> Result<EnvironmentalSnapshot, ProviderError>;
}

const CURRENT_VARIABLES: &str = "temperature_2m,relative_humidity_2m,wind_speed_10m";
const DAILY_VARIABLES: &str = "et0_fao_evapotranspiration,precipitation_sum,shortwave_radiation_sum";
const SOIL_MOISTURE_VARIABLE: &str = "soil_moisture_0_to_7cm";

/// Readings at or below this value are the provider's "no data" marker
const NO_DATA_SENTINEL: f64 = -999.0;

/// Open-Meteo API client
#[derive(Clone)]
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
    request_soil_moisture: bool,
    clock: Arc<dyn Clock>,
}

/// Open-Meteo forecast response
#[derive(Debug, Deserialize)]
pub struct OpenMeteoResponse {
    #[serde(default)]
    pub utc_offset_seconds: i32,
    pub current: Option<OpenMeteoCurrent>,
    #[serde(default)]
    pub daily_units: HashMap<String, String>,
    pub daily: Option<OpenMeteoDaily>,
}

#[derive(Debug, Deserialize)]
pub struct OpenMeteoCurrent {
    pub temperature_2m: f64,
    pub relative_humidity_2m: f64,
    pub wind_speed_10m: f64,
}

#[derive(Debug, Deserialize)]
pub struct OpenMeteoDaily {
    #[serde(default)]
    pub et0_fao_evapotranspiration: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    pub shortwave_radiation_sum: Vec<Option<f64>>,
    /// Not offered by every forecast model
    pub soil_moisture_0_to_7cm: Option<Vec<Option<f64>>>,
}

impl OpenMeteoClient {
    pub fn new(base_url: String, request_soil_moisture: bool, clock: Arc<dyn Clock>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            request_soil_moisture,
            clock,
        }
    }

    fn forecast_url(&self, location: &FarmLocation) -> String {
        let mut daily = DAILY_VARIABLES.to_string();
        if self.request_soil_moisture {
            daily.push(',');
            daily.push_str(SOIL_MOISTURE_VARIABLE);
        }

        format!(
            "{}/forecast?latitude={}&longitude={}&current={}&daily={}&temperature_unit=fahrenheit&wind_speed_unit=mph&timezone=auto&forecast_days=1",
            self.base_url.trim_end_matches('/'),
            location.coordinates.latitude,
            location.coordinates.longitude,
            CURRENT_VARIABLES,
            daily
        )
    }
}

#[async_trait]
impl EnvironmentalFeed for OpenMeteoClient {
    async fn fetch(&self, location: &FarmLocation) -> Result<EnvironmentalSnapshot, ProviderError> {
        let url = self.forecast_url(location);
        tracing::debug!("Fetching environmental data for {}", location.name);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let data: OpenMeteoResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        normalize_response(data, self.clock.now())
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Convert a raw provider response into the canonical snapshot
pub fn normalize_response(
    data: OpenMeteoResponse,
    fetched_at: DateTime<Utc>,
) -> Result<EnvironmentalSnapshot, ProviderError> {
    let current = data
        .current
        .ok_or_else(|| ProviderError::Malformed("missing current conditions".to_string()))?;
    let daily = data
        .daily
        .ok_or_else(|| ProviderError::Malformed("missing daily series".to_string()))?;

    let temperature_f = round_half_up(to_decimal("temperature_2m", current.temperature_2m)?, 0);
    let wind_speed_mph = round_half_up(to_decimal("wind_speed_10m", current.wind_speed_10m)?, 0);
    let relative_humidity_pct = to_decimal("relative_humidity_2m", current.relative_humidity_2m)?;

    let et0_raw = first_reading("et0_fao_evapotranspiration", &daily.et0_fao_evapotranspiration)?;
    let et0_in = round_half_up(
        depth_to_inches(
            "et0_fao_evapotranspiration",
            unit_of(&data.daily_units, "et0_fao_evapotranspiration"),
            et0_raw,
        )?,
        2,
    );

    let precipitation_raw = first_reading("precipitation_sum", &daily.precipitation_sum)?;
    let precipitation_in = depth_to_inches(
        "precipitation_sum",
        unit_of(&data.daily_units, "precipitation_sum"),
        precipitation_raw,
    )?;

    let radiation_raw = first_reading("shortwave_radiation_sum", &daily.shortwave_radiation_sum)?;
    let solar_radiation_kwh_m2 = radiation_to_kwh(
        unit_of(&data.daily_units, "shortwave_radiation_sum"),
        radiation_raw,
    )?;

    let soil_moisture_pct = daily
        .soil_moisture_0_to_7cm
        .as_deref()
        .and_then(|series| series.first().copied().flatten())
        .and_then(volumetric_to_percent);

    Ok(EnvironmentalSnapshot {
        fetched_at,
        utc_offset_seconds: data.utc_offset_seconds,
        weather: WeatherData {
            temperature_f,
            precipitation_in,
            wind_speed_mph,
            relative_humidity_pct,
            et0_in,
        },
        growth: GrowthData {
            solar_radiation_kwh_m2,
            temperature_f,
            soil_moisture_pct,
        },
    })
}

fn unit_of<'a>(units: &'a HashMap<String, String>, variable: &str) -> Option<&'a str> {
    units.get(variable).map(String::as_str)
}

fn to_decimal(variable: &str, value: f64) -> Result<Decimal, ProviderError> {
    Decimal::from_f64(value)
        .ok_or_else(|| ProviderError::Malformed(format!("{} is not a finite number", variable)))
}

fn first_reading(variable: &str, series: &[Option<f64>]) -> Result<Decimal, ProviderError> {
    let value = series
        .first()
        .copied()
        .flatten()
        .ok_or_else(|| ProviderError::Malformed(format!("no reading for {}", variable)))?;
    to_decimal(variable, value)
}

fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Water depth in inches. A missing unit is read as millimetres, the provider default.
pub fn depth_to_inches(variable: &str, unit: Option<&str>, value: Decimal) -> Result<Decimal, ProviderError> {
    match unit.unwrap_or("mm") {
        "mm" => Ok(value / Decimal::new(254, 1)),
        "inch" | "in" => Ok(value),
        other => Err(ProviderError::UnsupportedUnit {
            variable: variable.to_string(),
            unit: other.to_string(),
        }),
    }
}

/// Daily radiation sum in kWh/m². A missing unit is read as MJ/m², the provider default.
pub fn radiation_to_kwh(unit: Option<&str>, value: Decimal) -> Result<Decimal, ProviderError> {
    match unit.unwrap_or("MJ/m²") {
        "Wh/m²" | "Wh/m2" => Ok(value / Decimal::from(1000)),
        "MJ/m²" | "MJ/m2" => Ok(value / Decimal::new(36, 1)),
        "kWh/m²" | "kWh/m2" => Ok(value),
        other => Err(ProviderError::UnsupportedUnit {
            variable: "shortwave_radiation_sum".to_string(),
            unit: other.to_string(),
        }),
    }
}

/// Volumetric soil water (m³/m³) as a whole percent. Sentinels read as absent.
pub fn volumetric_to_percent(value: f64) -> Option<Decimal> {
    if !value.is_finite() || value <= NO_DATA_SENTINEL {
        return None;
    }
    Decimal::from_f64(value * 100.0).map(|pct| round_half_up(pct, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_depth_conversion() {
        assert_eq!(depth_to_inches("precipitation_sum", Some("mm"), dec("25.4")).unwrap(), dec("1"));
        assert_eq!(depth_to_inches("precipitation_sum", Some("inch"), dec("0.3")).unwrap(), dec("0.3"));
        assert!(matches!(
            depth_to_inches("precipitation_sum", Some("cm"), dec("1")),
            Err(ProviderError::UnsupportedUnit { .. })
        ));
    }

    #[test]
    fn test_radiation_conversion() {
        assert_eq!(radiation_to_kwh(Some("Wh/m²"), dec("6500")).unwrap(), dec("6.5"));
        assert_eq!(radiation_to_kwh(Some("MJ/m²"), dec("36")).unwrap(), dec("10"));
        assert_eq!(radiation_to_kwh(Some("kWh/m²"), dec("7.2")).unwrap(), dec("7.2"));
        assert!(radiation_to_kwh(Some("langley"), dec("1")).is_err());
    }

    #[test]
    fn test_soil_moisture_sentinels() {
        assert_eq!(volumetric_to_percent(0.284), Some(dec("28")));
        assert_eq!(volumetric_to_percent(-999.0), None);
        assert_eq!(volumetric_to_percent(f64::NAN), None);
    }

    #[test]
    fn test_forecast_url_requests_soil_moisture_only_when_enabled() {
        let location = FarmLocation {
            name: "Fresno".to_string(),
            coordinates: shared::GpsCoordinates::new(dec("36.75"), dec("-119.77")),
        };
        let clock: Arc<dyn Clock> = Arc::new(crate::clock::SystemClock);

        let plain = OpenMeteoClient::new("https://api.open-meteo.com/v1/".to_string(), false, clock.clone());
        let url = plain.forecast_url(&location);
        assert!(url.starts_with("https://api.open-meteo.com/v1/forecast?latitude=36.75&longitude=-119.77"));
        assert!(url.contains("temperature_unit=fahrenheit"));
        assert!(!url.contains(SOIL_MOISTURE_VARIABLE));

        let calibrating = OpenMeteoClient::new("https://api.open-meteo.com/v1".to_string(), true, clock);
        assert!(calibrating.forecast_url(&location).contains(SOIL_MOISTURE_VARIABLE));
    }
}
