//! Import committer - turns selected records into stored vehicles
//!
//! A batch is committed with a single `append`, so either every selected
//! record is stored or none is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::identity::IdGenerator;
use crate::core::store::VehicleStore;
use crate::entities::{LastMovement, VehicleRecord};
use crate::onboarding::record::{MappedRecord, TargetField};

/// Actor recorded in `lastMovement.by` when none is configured
pub const DEFAULT_IMPORT_ACTOR: &str = "Import Process";

/// One message attached to an import result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportMessage {
    /// 1-based position of the record within the committed batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ImportMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            row: None,
            message: message.into(),
            details: None,
        }
    }

    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Outcome of committing one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    pub imported: usize,
    pub failed: usize,
    #[serde(default)]
    pub errors: Vec<ImportMessage>,
    #[serde(default)]
    pub warnings: Vec<ImportMessage>,
    pub timestamp: DateTime<Utc>,
}

impl ImportResult {
    /// A failed batch: nothing imported, every record counted as failed
    pub fn failure(attempted: usize, details: impl Into<String>) -> Self {
        Self {
            success: false,
            imported: 0,
            failed: attempted,
            errors: vec![
                ImportMessage::new("Failed to import vehicles").with_details(details),
            ],
            warnings: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Values filled in for optional fields the file did not supply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDefaults {
    pub status: String,
    pub color: String,
    pub location: String,
    pub lat: f64,
    pub lng: f64,
}

impl Default for ImportDefaults {
    fn default() -> Self {
        Self {
            status: "available".to_string(),
            color: "Not specified".to_string(),
            location: "Main Lot".to_string(),
            lat: 37.7749,
            lng: -122.4194,
        }
    }
}

/// Builds vehicles from mapped records and appends them to a store
#[derive(Debug, Clone)]
pub struct ImportCommitter {
    actor: String,
    defaults: ImportDefaults,
}

impl Default for ImportCommitter {
    fn default() -> Self {
        Self::new(DEFAULT_IMPORT_ACTOR, ImportDefaults::default())
    }
}

impl ImportCommitter {
    pub fn new(actor: impl Into<String>, defaults: ImportDefaults) -> Self {
        Self {
            actor: actor.into(),
            defaults,
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn defaults(&self) -> &ImportDefaults {
        &self.defaults
    }

    /// Commit a batch of records to the store
    pub fn commit(&self, store: &mut dyn VehicleStore, records: &[MappedRecord]) -> ImportResult {
        let existing = match store.list() {
            Ok(vehicles) => vehicles,
            Err(e) => {
                tracing::warn!(error = %e, "could not read existing vehicles");
                return ImportResult::failure(records.len(), e.to_string());
            }
        };
        let mut taken: HashSet<String> = existing.into_iter().map(|v| v.id).collect();

        let now = Utc::now();
        let mut ids = IdGenerator::new();
        let mut warnings = Vec::new();
        let mut vehicles = Vec::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            let id = loop {
                let candidate = ids.next_id().to_string();
                if taken.insert(candidate.clone()) {
                    break candidate;
                }
            };
            vehicles.push(self.build_vehicle(id, record, now, i + 1, &mut warnings));
        }

        if let Err(e) = store.append(&vehicles) {
            tracing::warn!(error = %e, count = records.len(), "import batch rejected by store");
            return ImportResult::failure(records.len(), e.to_string());
        }

        tracing::info!(
            imported = vehicles.len(),
            warnings = warnings.len(),
            store = %store.describe(),
            "import committed"
        );

        ImportResult {
            success: true,
            imported: vehicles.len(),
            failed: 0,
            errors: Vec::new(),
            warnings,
            timestamp: now,
        }
    }

    fn build_vehicle(
        &self,
        id: String,
        record: &MappedRecord,
        now: DateTime<Utc>,
        row: usize,
        warnings: &mut Vec<ImportMessage>,
    ) -> VehicleRecord {
        let text_or = |field: TargetField, fallback: &str| -> String {
            record
                .get(field)
                .filter(|v| !v.is_blank())
                .map(|v| v.to_string())
                .unwrap_or_else(|| fallback.to_string())
        };

        let mut coordinate = |field: TargetField, fallback: f64| -> f64 {
            match record.get(field) {
                None => fallback,
                Some(v) if v.is_blank() => fallback,
                Some(v) => match v.as_number() {
                    Some(n) => n,
                    None => {
                        let message = format!("{} could not be read as a number", field.label());
                        warnings.push(
                            ImportMessage::new(message)
                                .at_row(row)
                                .with_details(format!("'{}' replaced with {}", v, fallback)),
                        );
                        fallback
                    }
                },
            }
        };

        let location_lat = coordinate(TargetField::LocationLat, self.defaults.lat);
        let location_lng = coordinate(TargetField::LocationLng, self.defaults.lng);

        VehicleRecord {
            id,
            vin: text_or(TargetField::Vin, ""),
            make: text_or(TargetField::Make, ""),
            model: text_or(TargetField::Model, ""),
            year: record.get(TargetField::Year).cloned().unwrap_or_default(),
            color: text_or(TargetField::Color, &self.defaults.color),
            status: text_or(TargetField::Status, &self.defaults.status),
            location: text_or(TargetField::Location, &self.defaults.location),
            location_lat,
            location_lng,
            mileage: record
                .get(TargetField::Mileage)
                .filter(|v| !v.is_blank())
                .cloned(),
            price: record
                .get(TargetField::Price)
                .filter(|v| !v.is_blank())
                .cloned(),
            last_movement: LastMovement {
                by: self.actor.clone(),
                date: now,
            },
        }
    }
}
