//! Vegetation index sources
//!
//! Satellite sensing is an enhanced-tier input. When no sensing endpoint is
//! configured the engine uses a simulated source that draws a plausible index
//! for each field's growth stage.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{validate_vegetation_index, Field, FieldId, GrowthStage};

use crate::error::ProviderError;

/// Per-field vegetation index lookup
#[async_trait]
pub trait VegetationSource: Send + Sync {
    async fn vegetation_indices(
        &self,
        fields: &[Field],
    ) -> Result<HashMap<FieldId, Decimal>, ProviderError>;
}

// ============================================================================
// HTTP source
// ============================================================================

#[derive(Clone)]
pub struct HttpVegetationSource {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct VegetationRequest<'a> {
    fields: Vec<VegetationRequestField<'a>>,
}

#[derive(Debug, Serialize)]
struct VegetationRequestField<'a> {
    id: &'a str,
    #[serde(rename = "growthStage")]
    growth_stage: GrowthStage,
}

#[derive(Debug, Deserialize)]
struct VegetationReading {
    #[serde(rename = "fieldId")]
    field_id: FieldId,
    ndvi: Decimal,
}

impl HttpVegetationSource {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl VegetationSource for HttpVegetationSource {
    async fn vegetation_indices(
        &self,
        fields: &[Field],
    ) -> Result<HashMap<FieldId, Decimal>, ProviderError> {
        let request = VegetationRequest {
            fields: fields
                .iter()
                .map(|f| VegetationRequestField {
                    id: &f.id,
                    growth_stage: f.growth_stage,
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let readings: Vec<VegetationReading> = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        readings
            .into_iter()
            .map(|r| {
                validate_vegetation_index(r.ndvi)
                    .map_err(|msg| ProviderError::Malformed(format!("{}: {}", r.field_id, msg)))?;
                Ok((r.field_id, r.ndvi))
            })
            .collect()
    }
}

// ============================================================================
// Simulated source
// ============================================================================

/// Draws an index from a realistic range for each growth stage
pub struct SimulatedVegetationSource {
    rng: Mutex<StdRng>,
}

impl SimulatedVegetationSource {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic sequence for tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for SimulatedVegetationSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Inclusive index range observed for a growth stage
pub fn stage_index_range(stage: GrowthStage) -> (f64, f64) {
    match stage {
        GrowthStage::Seedling => (0.20, 0.30),
        GrowthStage::Vegetative => (0.50, 0.70),
        GrowthStage::Flowering => (0.70, 0.85),
        GrowthStage::Maturity => (0.60, 0.75),
    }
}

#[async_trait]
impl VegetationSource for SimulatedVegetationSource {
    async fn vegetation_indices(
        &self,
        fields: &[Field],
    ) -> Result<HashMap<FieldId, Decimal>, ProviderError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| ProviderError::Network("simulated sensor unavailable".to_string()))?;

        Ok(fields
            .iter()
            .filter_map(|field| {
                let (low, high) = stage_index_range(field.growth_stage);
                let draw: f64 = rng.gen_range(low..=high);
                Decimal::from_f64(draw).map(|index| (field.id.clone(), index.round_dp(2)))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::ToPrimitive;
    use shared::{GpsCoordinates, IrrigationSystem, MoistureHistory, SoilType};

    fn field(id: &str, stage: GrowthStage) -> Field {
        Field {
            id: id.to_string(),
            name: id.to_string(),
            crop_types: Vec::new(),
            growth_stage: stage,
            soil_type: SoilType::SandyLoam,
            irrigation_system: IrrigationSystem::Sprinkler,
            flow_rate_gpm: Decimal::from(300),
            location: GpsCoordinates::new(Decimal::ZERO, Decimal::ZERO),
            soil_moisture: Decimal::from(30),
            soil_moisture_history: MoistureHistory::uniform(Decimal::from(30)),
            image_url: String::new(),
            vegetation_index: None,
        }
    }

    #[tokio::test]
    async fn test_simulated_indices_stay_in_stage_range() {
        let source = SimulatedVegetationSource::seeded(7);
        let fields: Vec<Field> = GrowthStage::ALL
            .iter()
            .enumerate()
            .map(|(i, stage)| field(&format!("f-{}", i), *stage))
            .collect();

        for _ in 0..20 {
            let indices = source.vegetation_indices(&fields).await.unwrap();
            assert_eq!(indices.len(), fields.len());
            for f in &fields {
                let (low, high) = stage_index_range(f.growth_stage);
                let value = indices[&f.id].to_f64().unwrap();
                assert!(value >= low - 0.005 && value <= high + 0.005);
                assert!(indices[&f.id].scale() <= 2);
            }
        }
    }

    #[tokio::test]
    async fn test_seeded_sources_agree() {
        let fields = vec![field("a", GrowthStage::Vegetative)];
        let a = SimulatedVegetationSource::seeded(42).vegetation_indices(&fields).await.unwrap();
        let b = SimulatedVegetationSource::seeded(42).vegetation_indices(&fields).await.unwrap();
        assert_eq!(a, b);
    }
}
