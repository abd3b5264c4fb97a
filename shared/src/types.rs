//! Common types used across the engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// GPS coordinates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GpsCoordinates {
    #[serde(alias = "lat")]
    pub latitude: Decimal,
    #[serde(alias = "lng")]
    pub longitude: Decimal,
}

impl GpsCoordinates {
    pub fn new(latitude: Decimal, longitude: Decimal) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Named farm location used to query the environmental provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FarmLocation {
    pub name: String,
    #[serde(flatten)]
    pub coordinates: GpsCoordinates,
}

/// Service tier held by the session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTier {
    #[default]
    Basic,
    Pro,
}

impl ServiceTier {
    /// Whether the tier unlocks satellite sensing and smart alerts
    pub fn is_enhanced(&self) -> bool {
        matches!(self, ServiceTier::Pro)
    }
}

impl std::fmt::Display for ServiceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceTier::Basic => write!(f, "basic"),
            ServiceTier::Pro => write!(f, "pro"),
        }
    }
}

impl std::str::FromStr for ServiceTier {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(ServiceTier::Basic),
            "pro" => Ok(ServiceTier::Pro),
            _ => Err("Unknown service tier"),
        }
    }
}
