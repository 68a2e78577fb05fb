//! GPS tracking devices and their reported positions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A tracking unit attached to a vehicle, identified by the vehicle's VIN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedDevice {
    pub id: u64,
    pub name: String,
    /// VIN or other unique identifier reported by the unit
    pub unique_id: String,
    pub status: String,
    pub last_update: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// One position fix reported by a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: u64,
    pub device_id: u64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub speed: f64,
    pub device_time: DateTime<Utc>,
    pub fix_time: DateTime<Utc>,
}

/// Request to register a new device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDevice {
    pub name: String,
    pub unique_id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Name and VIN/Unique ID are required")]
    MissingFields,
}

impl NewDevice {
    pub fn new(name: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique_id: unique_id.into(),
        }
    }

    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.name.trim().is_empty() || self.unique_id.trim().is_empty() {
            return Err(DeviceError::MissingFields);
        }
        Ok(())
    }
}
