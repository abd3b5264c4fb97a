//! Field (irrigated plot) models

use std::collections::VecDeque;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::GpsCoordinates;

/// Number of readings kept in a field's moisture history
pub const MOISTURE_HISTORY_LEN: usize = 5;

/// Moisture assigned to a freshly created field before any reading arrives
pub const DEFAULT_FIELD_MOISTURE: u32 = 50;

/// Identity of a field as assigned by the external field store
pub type FieldId = String;

/// Crop growth stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum GrowthStage {
    Seedling,
    Vegetative,
    Flowering,
    Maturity,
}

impl GrowthStage {
    pub const ALL: [GrowthStage; 4] = [
        GrowthStage::Seedling,
        GrowthStage::Vegetative,
        GrowthStage::Flowering,
        GrowthStage::Maturity,
    ];
}

impl std::fmt::Display for GrowthStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrowthStage::Seedling => write!(f, "Seedling"),
            GrowthStage::Vegetative => write!(f, "Vegetative"),
            GrowthStage::Flowering => write!(f, "Flowering"),
            GrowthStage::Maturity => write!(f, "Maturity"),
        }
    }
}

/// Soil texture class
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SoilType {
    Clay,
    #[serde(rename = "Sandy Loam")]
    SandyLoam,
    #[serde(rename = "Silty Clay")]
    SiltyClay,
    Loam,
    Silt,
}

/// Irrigation hardware installed on a field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IrrigationSystem {
    Drip,
    Sprinkler,
    Pivot,
}

/// Fixed-length moisture history, oldest reading first
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct MoistureHistory(VecDeque<Decimal>);

impl MoistureHistory {
    /// Build a history from raw readings, normalized to the fixed length.
    ///
    /// Longer inputs keep the newest readings; shorter inputs are padded at the
    /// front with their oldest reading, or with `fallback` when empty.
    pub fn new(readings: impl IntoIterator<Item = Decimal>, fallback: Decimal) -> Self {
        let mut values: VecDeque<Decimal> = readings.into_iter().collect();
        while values.len() > MOISTURE_HISTORY_LEN {
            values.pop_front();
        }
        let pad = values.front().copied().unwrap_or(fallback);
        while values.len() < MOISTURE_HISTORY_LEN {
            values.push_front(pad);
        }
        Self(values)
    }

    /// History where every slot holds the same reading
    pub fn uniform(value: Decimal) -> Self {
        Self::new(std::iter::empty(), value)
    }

    /// Drop the oldest reading and append `value` as the newest
    pub fn push(&mut self, value: Decimal) {
        self.0.pop_front();
        self.0.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn latest(&self) -> Option<Decimal> {
        self.0.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decimal> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<Decimal> {
        self.0.iter().copied().collect()
    }
}

/// An irrigated field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "FieldRecord")]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    #[serde(rename = "cropTypes")]
    pub crop_types: Vec<String>,
    #[serde(rename = "growthStage")]
    pub growth_stage: GrowthStage,
    #[serde(rename = "soilType")]
    pub soil_type: SoilType,
    #[serde(rename = "irrigationSystemType")]
    pub irrigation_system: IrrigationSystem,
    /// Flow rate in gallons per minute
    #[serde(rename = "flowRate")]
    pub flow_rate_gpm: Decimal,
    pub location: GpsCoordinates,
    /// Current soil moisture, percent
    #[serde(rename = "soilMoisture")]
    pub soil_moisture: Decimal,
    #[serde(rename = "soilMoistureHistory")]
    pub soil_moisture_history: MoistureHistory,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    /// NDVI-like vegetation index in [0, 1]
    #[serde(rename = "ndvi", skip_serializing_if = "Option::is_none")]
    pub vegetation_index: Option<Decimal>,
}

impl Field {
    /// Record a new moisture reading, shifting the history window
    pub fn record_moisture(&mut self, moisture: Decimal) {
        self.soil_moisture = moisture;
        self.soil_moisture_history.push(moisture);
    }

    /// Whether two records agree on everything a user can edit. Moisture
    /// readings and vegetation annotations are ignored.
    pub fn same_configuration(&self, other: &Field) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.crop_types == other.crop_types
            && self.growth_stage == other.growth_stage
            && self.soil_type == other.soil_type
            && self.irrigation_system == other.irrigation_system
            && self.flow_rate_gpm == other.flow_rate_gpm
            && self.location == other.location
            && self.image_url == other.image_url
    }

    /// Copy of this field with a vegetation index attached
    pub fn with_vegetation_index(&self, index: Option<Decimal>) -> Field {
        Field {
            vegetation_index: index,
            ..self.clone()
        }
    }
}

/// Wire shape of a field as produced by the external store and the API
#[derive(Debug, Clone, Deserialize)]
struct FieldRecord {
    id: FieldId,
    name: String,
    #[serde(rename = "cropTypes", default)]
    crop_types: Vec<String>,
    #[serde(rename = "growthStage")]
    growth_stage: GrowthStage,
    #[serde(rename = "soilType")]
    soil_type: SoilType,
    #[serde(rename = "irrigationSystemType")]
    irrigation_system: IrrigationSystem,
    #[serde(rename = "flowRate")]
    flow_rate_gpm: Decimal,
    location: GpsCoordinates,
    #[serde(rename = "soilMoisture")]
    soil_moisture: Decimal,
    #[serde(rename = "soilMoistureHistory", default)]
    soil_moisture_history: Vec<Decimal>,
    #[serde(rename = "imageUrl", default)]
    image_url: String,
    #[serde(rename = "ndvi", default)]
    vegetation_index: Option<Decimal>,
}

impl From<FieldRecord> for Field {
    fn from(record: FieldRecord) -> Self {
        Field {
            soil_moisture_history: MoistureHistory::new(
                record.soil_moisture_history,
                record.soil_moisture,
            ),
            id: record.id,
            name: record.name,
            crop_types: record.crop_types,
            growth_stage: record.growth_stage,
            soil_type: record.soil_type,
            irrigation_system: record.irrigation_system,
            flow_rate_gpm: record.flow_rate_gpm,
            location: record.location,
            soil_moisture: record.soil_moisture,
            image_url: record.image_url,
            vegetation_index: record.vegetation_index,
        }
    }
}

/// Input for creating or editing a field locally
#[derive(Debug, Clone, Deserialize)]
pub struct FieldInput {
    pub name: String,
    #[serde(rename = "cropTypes", default)]
    pub crop_types: Vec<String>,
    #[serde(rename = "growthStage")]
    pub growth_stage: GrowthStage,
    #[serde(rename = "soilType")]
    pub soil_type: SoilType,
    #[serde(rename = "irrigationSystemType")]
    pub irrigation_system: IrrigationSystem,
    #[serde(rename = "flowRate")]
    pub flow_rate_gpm: Decimal,
    pub location: GpsCoordinates,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
}

impl FieldInput {
    /// Materialize a brand-new field with default moisture readings
    pub fn into_new_field(self, id: FieldId) -> Field {
        let moisture = Decimal::from(DEFAULT_FIELD_MOISTURE);
        Field {
            id,
            name: self.name,
            crop_types: self.crop_types,
            growth_stage: self.growth_stage,
            soil_type: self.soil_type,
            irrigation_system: self.irrigation_system,
            flow_rate_gpm: self.flow_rate_gpm,
            location: self.location,
            soil_moisture: moisture,
            soil_moisture_history: MoistureHistory::uniform(moisture),
            image_url: self.image_url.unwrap_or_default(),
            vegetation_index: None,
        }
    }

    /// Apply the edit on top of an existing field, keeping its readings
    pub fn apply_to(self, existing: &Field) -> Field {
        Field {
            id: existing.id.clone(),
            name: self.name,
            crop_types: self.crop_types,
            growth_stage: self.growth_stage,
            soil_type: self.soil_type,
            irrigation_system: self.irrigation_system,
            flow_rate_gpm: self.flow_rate_gpm,
            location: self.location,
            soil_moisture: existing.soil_moisture,
            soil_moisture_history: existing.soil_moisture_history.clone(),
            image_url: self.image_url.unwrap_or_else(|| existing.image_url.clone()),
            vegetation_index: existing.vegetation_index,
        }
    }
}
