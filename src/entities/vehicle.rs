//! Vehicle entity, inventory filtering, and status metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::onboarding::record::FieldValue;

/// Inventory status of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    Available,
    Leased,
    Service,
    Sold,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "available",
            VehicleStatus::Leased => "leased",
            VehicleStatus::Service => "service",
            VehicleStatus::Sold => "sold",
        }
    }

    pub fn all() -> &'static [VehicleStatus] {
        &[
            VehicleStatus::Available,
            VehicleStatus::Leased,
            VehicleStatus::Service,
            VehicleStatus::Sold,
        ]
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "available" => Ok(VehicleStatus::Available),
            "leased" => Ok(VehicleStatus::Leased),
            "service" => Ok(VehicleStatus::Service),
            "sold" => Ok(VehicleStatus::Sold),
            _ => Err(format!(
                "invalid vehicle status: '{}' (valid: available, leased, service, sold)",
                s
            )),
        }
    }
}

/// Who last moved a vehicle and when
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastMovement {
    pub by: String,
    pub date: DateTime<Utc>,
}

/// A vehicle in the inventory
///
/// Status is kept as free text: imports only warn about unknown statuses,
/// so a stored vehicle may carry one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleRecord {
    pub id: String,
    pub vin: String,
    pub make: String,
    pub model: String,
    pub year: FieldValue,
    pub color: String,
    pub status: String,
    pub location: String,
    pub location_lat: f64,
    pub location_lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mileage: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<FieldValue>,
    #[serde(rename = "lastMovement")]
    pub last_movement: LastMovement,
}

impl VehicleRecord {
    /// Status parsed into a known value, if it is one
    pub fn known_status(&self) -> Option<VehicleStatus> {
        self.status.parse().ok()
    }

    /// Short human description, e.g. "2022 Honda Accord"
    pub fn title(&self) -> String {
        let year = self.year.to_string();
        [year.as_str(), self.make.as_str(), self.model.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A status or location change made from the yard
///
/// Applying one re-stamps `lastMovement` with who made the change and when.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VehicleStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl VehicleUpdate {
    pub fn status(status: VehicleStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn location(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.location.is_none()
    }

    /// Copy of `vehicle` with the change applied
    pub fn apply(&self, vehicle: &VehicleRecord, by: &str, date: DateTime<Utc>) -> VehicleRecord {
        let mut updated = vehicle.clone();
        if let Some(status) = self.status {
            updated.status = status.as_str().to_string();
        }
        if let Some(ref location) = self.location {
            updated.location = location.clone();
        }
        updated.last_movement = LastMovement {
            by: by.to_string(),
            date,
        };
        updated
    }
}

/// Inventory browsing filter. Empty criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct VehicleFilter {
    /// Case-insensitive substring of VIN, make, or model
    pub search: Option<String>,
    /// Exact status match
    pub status: Option<VehicleStatus>,
    /// Exact location match
    pub location: Option<String>,
}

impl VehicleFilter {
    pub fn matches(&self, vehicle: &VehicleRecord) -> bool {
        if let Some(term) = self.search.as_deref().filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let hit = [&vehicle.vin, &vehicle.make, &vehicle.model]
                .iter()
                .any(|field| field.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }

        if let Some(status) = self.status {
            if vehicle.status != status.as_str() {
                return false;
            }
        }

        if let Some(ref location) = self.location {
            if &vehicle.location != location {
                return false;
            }
        }

        true
    }

    pub fn apply<'a>(&self, vehicles: &'a [VehicleRecord]) -> Vec<&'a VehicleRecord> {
        vehicles.iter().filter(|v| self.matches(v)).collect()
    }
}

/// Vehicle counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FleetMetrics {
    pub total: usize,
    pub available: usize,
    pub leased: usize,
    pub service: usize,
    pub sold: usize,
}

impl FleetMetrics {
    pub fn from_vehicles<'a>(vehicles: impl IntoIterator<Item = &'a VehicleRecord>) -> Self {
        let mut metrics = FleetMetrics::default();
        for vehicle in vehicles {
            metrics.total += 1;
            match vehicle.known_status() {
                Some(VehicleStatus::Available) => metrics.available += 1,
                Some(VehicleStatus::Leased) => metrics.leased += 1,
                Some(VehicleStatus::Service) => metrics.service += 1,
                Some(VehicleStatus::Sold) => metrics.sold += 1,
                None => {}
            }
        }
        metrics
    }
}

/// Distinct locations in first-seen order, for filter choices
pub fn locations(vehicles: &[VehicleRecord]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for vehicle in vehicles {
        if !vehicle.location.is_empty() && !seen.contains(&vehicle.location.as_str()) {
            seen.push(&vehicle.location);
        }
    }
    seen
}
