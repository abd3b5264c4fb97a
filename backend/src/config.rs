//! Configuration management for the AquaCrop irrigation engine
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with AQC_ prefix

use std::time::Duration;

use chrono::NaiveTime;
use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{FarmLocation, GpsCoordinates, ServiceTier};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Farm being managed
    pub farm: FarmConfig,

    /// Environmental provider configuration
    pub weather: WeatherConfig,

    /// Vegetation index source configuration
    #[serde(default)]
    pub vegetation: VegetationConfig,

    /// External scheduling oracle configuration
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Alert sink configuration
    pub alerts: AlertsConfig,

    /// Scheduling policy
    pub scheduling: SchedulingConfig,

    /// Periodic trigger periods
    pub refresh: RefreshConfig,

    /// Activity log configuration
    pub activity_log: ActivityLogConfig,

    /// Initial session context
    pub session: SessionConfig,

    /// Field feed webhook configuration
    #[serde(default)]
    pub feed: FeedConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FarmConfig {
    pub name: String,
    pub latitude: Decimal,
    pub longitude: Decimal,
}

impl FarmConfig {
    pub fn location(&self) -> FarmLocation {
        FarmLocation {
            name: self.name.clone(),
            coordinates: GpsCoordinates::new(self.latitude, self.longitude),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    /// Weather API endpoint
    pub api_endpoint: String,

    /// Also request shallow soil moisture (not offered by every model)
    pub request_soil_moisture: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct VegetationConfig {
    /// Vegetation index API endpoint; simulated when absent
    pub api_endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OracleConfig {
    /// Scheduling oracle endpoint; local water balance only when absent
    pub api_endpoint: Option<String>,

    /// Focus message endpoint; defaults to `{api_endpoint}/focus`
    pub focus_endpoint: Option<String>,

    /// Scheduling oracle API key
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    /// Push endpoint for user-facing alerts; alerts are only logged when absent
    pub push_endpoint: Option<String>,

    /// Icon shown with every alert
    pub icon_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulingConfig {
    /// Farm-local start of the low-evaporation irrigation window, HH:MM
    pub window_start: String,
}

impl SchedulingConfig {
    pub fn window_start_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.window_start, "%H:%M").map_err(|e| {
            ConfigError::Message(format!(
                "scheduling.window_start '{}' is not HH:MM: {}",
                self.window_start, e
            ))
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    pub environment_secs: u64,
    pub schedule_secs: u64,
    pub reminder_secs: u64,
}

impl RefreshConfig {
    /// Every trigger needs a non-zero period
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, secs) in [
            ("refresh.environment_secs", self.environment_secs),
            ("refresh.schedule_secs", self.schedule_secs),
            ("refresh.reminder_secs", self.reminder_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Message(format!("{} must be greater than 0", key)));
            }
        }
        Ok(())
    }

    pub fn environment_period(&self) -> Duration {
        Duration::from_secs(self.environment_secs)
    }

    pub fn schedule_period(&self) -> Duration {
        Duration::from_secs(self.schedule_secs)
    }

    pub fn reminder_period(&self) -> Duration {
        Duration::from_secs(self.reminder_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ActivityLogConfig {
    /// Entries kept before the oldest are dropped
    pub max_entries: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub tier: ServiceTier,
    pub alerts_permitted: bool,
    pub read_only: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FeedConfig {
    /// Shared secret for signed field feed pushes
    pub webhook_secret: Option<String>,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("AQC_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("farm.name", "Fresno, California, USA")?
            .set_default("farm.latitude", "36.746842")?
            .set_default("farm.longitude", "-119.772591")?
            .set_default("weather.api_endpoint", "https://api.open-meteo.com/v1")?
            .set_default("weather.request_soil_moisture", false)?
            .set_default(
                "alerts.icon_url",
                "https://storage.googleapis.com/maker-suite-gallery/aquacrop-previews/droplet-icon.png",
            )?
            .set_default("scheduling.window_start", "05:30")?
            .set_default("refresh.environment_secs", 30 * 60)?
            .set_default("refresh.schedule_secs", 10 * 60)?
            .set_default("refresh.reminder_secs", 30)?
            .set_default("activity_log.max_entries", 500)?
            .set_default("session.tier", "basic")?
            .set_default("session.alerts_permitted", false)?
            .set_default("session.read_only", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (AQC_ prefix)
            .add_source(
                Environment::with_prefix("AQC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.scheduling.window_start_time()?;
        config.refresh.validate()?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_start_parsing() {
        let policy = SchedulingConfig {
            window_start: "05:30".to_string(),
        };
        assert_eq!(
            policy.window_start_time().unwrap(),
            NaiveTime::from_hms_opt(5, 30, 0).unwrap()
        );

        let bad = SchedulingConfig {
            window_start: "dawn".to_string(),
        };
        assert!(bad.window_start_time().is_err());
    }

    #[test]
    fn test_refresh_periods() {
        let refresh = RefreshConfig {
            environment_secs: 1800,
            schedule_secs: 600,
            reminder_secs: 30,
        };
        assert_eq!(refresh.environment_period(), Duration::from_secs(1800));
        assert_eq!(refresh.schedule_period(), Duration::from_secs(600));
        assert_eq!(refresh.reminder_period(), Duration::from_secs(30));
        assert!(refresh.validate().is_ok());
    }

    #[test]
    fn test_zero_refresh_period_rejected() {
        let refresh = RefreshConfig {
            environment_secs: 1800,
            schedule_secs: 600,
            reminder_secs: 0,
        };
        let err = refresh.validate().unwrap_err();
        assert!(err.to_string().contains("refresh.reminder_secs"));
    }
}
