//! Field store: the engine's working set of fields
//!
//! The external feed is authoritative. Two kinds of local state ride on top of
//! it until the feed catches up:
//!
//! - **pending edits** made through [`FieldStore::upsert_local`], dropped once
//!   the feed delivers the same configuration or deletes the field. Readings
//!   always come from the feed while an edit is pending.
//! - **calibration overlays** made through
//!   [`FieldStore::apply_moisture_calibration`], kept while the feed still
//!   reports the readings the calibration was applied on top of
//!
//! Vegetation indices are per-computation annotations and never enter the store.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use rust_decimal::Decimal;
use shared::{validate_field, validate_moisture_percent, Field, FieldId, MoistureHistory};

use crate::error::FieldStoreError;

#[derive(Debug, Clone)]
struct CalibrationOverlay {
    base_moisture: Decimal,
    base_history: MoistureHistory,
    moisture: Decimal,
    history: MoistureHistory,
}

impl CalibrationOverlay {
    fn applies_to(&self, record: &Field) -> bool {
        record.soil_moisture == self.base_moisture && record.soil_moisture_history == self.base_history
    }
}

#[derive(Debug, Default)]
struct StoreState {
    /// Last list delivered by the feed
    persisted: Vec<Field>,
    /// Local edits not yet confirmed by the feed
    pending: HashMap<FieldId, Field>,
    /// Insertion order of pending fields the feed has never seen
    pending_new: Vec<FieldId>,
    calibrations: HashMap<FieldId, CalibrationOverlay>,
    /// Materialized working set
    view: Vec<Field>,
}

impl StoreState {
    /// Record whose readings a calibration is applied on top of
    fn readings_for(&self, id: &str) -> Option<&Field> {
        self.persisted
            .iter()
            .find(|f| f.id == id)
            .or_else(|| self.pending.get(id))
    }

    fn rebuild_view(&mut self) {
        let mut view: Vec<Field> = self
            .persisted
            .iter()
            .map(|f| match self.pending.get(&f.id) {
                Some(edit) => Field {
                    soil_moisture: f.soil_moisture,
                    soil_moisture_history: f.soil_moisture_history.clone(),
                    ..edit.clone()
                },
                None => f.clone(),
            })
            .collect();
        view.extend(
            self.pending_new
                .iter()
                .filter_map(|id| self.pending.get(id))
                .cloned(),
        );

        let calibrations = &mut self.calibrations;
        calibrations.retain(|id, overlay| view.iter().any(|f| &f.id == id && overlay.applies_to(f)));
        for field in view.iter_mut() {
            if let Some(overlay) = calibrations.get(&field.id) {
                field.soil_moisture = overlay.moisture;
                field.soil_moisture_history = overlay.history.clone();
            }
        }

        self.view = view;
    }
}

#[derive(Debug, Default)]
pub struct FieldStore {
    state: RwLock<StoreState>,
}

fn without_annotations(mut field: Field) -> Field {
    field.vegetation_index = None;
    field
}

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an initial authoritative list
    pub fn with_fields(fields: Vec<Field>) -> Self {
        let store = Self::new();
        store.merge(fields);
        store
    }

    /// Copy of the current working set
    pub fn snapshot(&self) -> Vec<Field> {
        self.read().view.clone()
    }

    pub fn get(&self, id: &str) -> Option<Field> {
        self.read().view.iter().find(|f| f.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().view.iter().any(|f| f.id == id)
    }

    pub fn len(&self) -> usize {
        self.read().view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a local edit for `id` is still waiting on the feed
    pub fn has_pending_edit(&self, id: &str) -> bool {
        self.read().pending.contains_key(id)
    }

    /// Replace the authoritative list with the latest feed delivery
    pub fn merge(&self, latest: Vec<Field>) {
        let latest: Vec<Field> = latest.into_iter().map(without_annotations).collect();
        let mut state = self.write();

        let previously_known: HashSet<FieldId> = state.persisted.iter().map(|f| f.id.clone()).collect();
        let incoming: HashMap<&str, &Field> = latest.iter().map(|f| (f.id.as_str(), f)).collect();

        state.pending.retain(|id, edit| match incoming.get(id.as_str()) {
            Some(record) => !record.same_configuration(edit),
            None => !previously_known.contains(id),
        });
        let StoreState {
            pending,
            pending_new,
            ..
        } = &mut *state;
        pending_new.retain(|id| pending.contains_key(id) && !incoming.contains_key(id.as_str()));

        state.persisted = latest;
        state.rebuild_view();

        tracing::debug!(
            fields = state.view.len(),
            pending = state.pending.len(),
            "Merged field feed"
        );
    }

    /// Record a new moisture reading for one field, shifting its history
    pub fn apply_moisture_calibration(
        &self,
        field_id: &str,
        moisture: Decimal,
    ) -> Result<Field, FieldStoreError> {
        validate_moisture_percent(moisture).map_err(FieldStoreError::Validation)?;

        let mut state = self.write();
        let mut field = state
            .view
            .iter()
            .find(|f| f.id == field_id)
            .cloned()
            .ok_or_else(|| FieldStoreError::NotFound(field_id.to_string()))?;
        field.record_moisture(moisture);

        let (base_moisture, base_history) = match state.calibrations.get(field_id) {
            Some(existing) => (existing.base_moisture, existing.base_history.clone()),
            None => {
                let record = state
                    .readings_for(field_id)
                    .ok_or_else(|| FieldStoreError::NotFound(field_id.to_string()))?;
                (record.soil_moisture, record.soil_moisture_history.clone())
            }
        };

        state.calibrations.insert(
            field_id.to_string(),
            CalibrationOverlay {
                base_moisture,
                base_history,
                moisture: field.soil_moisture,
                history: field.soil_moisture_history.clone(),
            },
        );
        state.rebuild_view();

        Ok(field)
    }

    /// Calibrate every field to the same reading
    pub fn calibrate_all(&self, moisture: Decimal) -> Result<usize, FieldStoreError> {
        let ids: Vec<FieldId> = self.read().view.iter().map(|f| f.id.clone()).collect();
        for id in &ids {
            self.apply_moisture_calibration(id, moisture)?;
        }
        Ok(ids.len())
    }

    /// Stage a local create or edit until the feed confirms it. Readings of
    /// a field the feed already knows are not part of the edit.
    pub fn upsert_local(&self, field: Field) -> Result<(), FieldStoreError> {
        validate_field(&field).map_err(FieldStoreError::Validation)?;
        let field = without_annotations(field);

        let mut state = self.write();
        let is_new = !state.persisted.iter().any(|f| f.id == field.id);
        if is_new {
            if !state.pending_new.contains(&field.id) {
                state.pending_new.push(field.id.clone());
            }
            state.calibrations.remove(&field.id);
        }
        state.pending.insert(field.id.clone(), field);
        state.rebuild_view();

        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{GpsCoordinates, GrowthStage, IrrigationSystem, SoilType};

    fn field(id: &str, moisture: i64) -> Field {
        Field {
            id: id.to_string(),
            name: format!("Field {}", id),
            crop_types: vec!["Tomatoes".to_string()],
            growth_stage: GrowthStage::Vegetative,
            soil_type: SoilType::Loam,
            irrigation_system: IrrigationSystem::Drip,
            flow_rate_gpm: Decimal::from(500),
            location: GpsCoordinates::new(Decimal::new(3675, 2), Decimal::new(-11977, 2)),
            soil_moisture: Decimal::from(moisture),
            soil_moisture_history: MoistureHistory::uniform(Decimal::from(moisture)),
            image_url: String::new(),
            vegetation_index: None,
        }
    }

    #[test]
    fn test_confirmed_edit_with_new_readings_is_retired() {
        let store = FieldStore::with_fields(vec![field("f-1", 45)]);
        let mut edited = field("f-1", 45);
        edited.growth_stage = GrowthStage::Flowering;
        store.upsert_local(edited.clone()).unwrap();

        let mut confirmed = edited.clone();
        confirmed.record_moisture(Decimal::from(30));
        store.merge(vec![confirmed.clone()]);
        assert!(!store.has_pending_edit("f-1"));

        confirmed.record_moisture(Decimal::from(25));
        store.merge(vec![confirmed]);
        let current = store.get("f-1").unwrap();
        assert_eq!(current.soil_moisture, Decimal::from(25));
        assert_eq!(current.growth_stage, GrowthStage::Flowering);
    }

    #[test]
    fn test_merge_strips_vegetation_index() {
        let store = FieldStore::new();
        let annotated = field("a", 45).with_vegetation_index(Some(Decimal::new(7, 1)));
        store.merge(vec![annotated]);
        assert_eq!(store.get("a").unwrap().vegetation_index, None);
    }

    #[test]
    fn test_calibration_rejects_out_of_range() {
        let store = FieldStore::with_fields(vec![field("a", 45)]);
        assert!(matches!(
            store.apply_moisture_calibration("a", Decimal::from(101)),
            Err(FieldStoreError::Validation(_))
        ));
        assert_eq!(
            store.apply_moisture_calibration("zzz", Decimal::from(30)),
            Err(FieldStoreError::NotFound("zzz".to_string()))
        );
    }
}
