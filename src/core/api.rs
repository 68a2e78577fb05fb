//! Backend port for vehicles, devices, and onboarding
//!
//! `LocalApi` runs everything in process against a [`VehicleStore`].
//! `HttpApi` talks to a fleet REST server. Callers only see [`FleetApi`].

use base64::Engine;
use chrono::{Duration, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

use crate::core::auth::{AuthError, AuthProvider};
use crate::core::store::{StoreError, VehicleStore};
use crate::entities::{
    DeviceError, LastMovement, NewDevice, Position, TrackedDevice, VehicleRecord, VehicleUpdate,
};
use crate::onboarding::committer::{ImportCommitter, ImportResult};
use crate::onboarding::parser::{
    self, source_record_from_json, ParseError, ParsedFile, UploadedFile,
};
use crate::onboarding::record::{FieldValue, MappedRecord, TargetField};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Server(String),

    #[error("invalid response from server: {0}")]
    InvalidResponse(String),
}

/// Operations the dashboard and the import wizard need from a backend
pub trait FleetApi {
    fn fetch_vehicles(&self) -> Result<Vec<VehicleRecord>, ApiError>;

    fn fetch_vehicle(&self, id: &str) -> Result<Option<VehicleRecord>, ApiError>;

    /// Apply a status or location change made by `by`. `None` when no
    /// vehicle has the id.
    fn update_vehicle(
        &mut self,
        id: &str,
        update: &VehicleUpdate,
        by: &str,
    ) -> Result<Option<VehicleRecord>, ApiError>;

    fn fetch_devices(&self) -> Result<Vec<TrackedDevice>, ApiError>;

    fn fetch_positions(&self, device_id: u64) -> Result<Vec<Position>, ApiError>;

    /// Device whose unique id equals the VIN
    fn find_device_by_vin(&self, vin: &str) -> Result<Option<TrackedDevice>, ApiError>;

    fn parse_file(&self, file: &UploadedFile) -> Result<ParsedFile, ApiError>;

    fn import_vehicles(&mut self, records: &[MappedRecord]) -> Result<ImportResult, ApiError>;

    fn create_device(&mut self, device: &NewDevice) -> Result<TrackedDevice, ApiError>;
}

impl<A: FleetApi + ?Sized> FleetApi for Box<A> {
    fn fetch_vehicles(&self) -> Result<Vec<VehicleRecord>, ApiError> {
        (**self).fetch_vehicles()
    }

    fn fetch_vehicle(&self, id: &str) -> Result<Option<VehicleRecord>, ApiError> {
        (**self).fetch_vehicle(id)
    }

    fn update_vehicle(
        &mut self,
        id: &str,
        update: &VehicleUpdate,
        by: &str,
    ) -> Result<Option<VehicleRecord>, ApiError> {
        (**self).update_vehicle(id, update, by)
    }

    fn fetch_devices(&self) -> Result<Vec<TrackedDevice>, ApiError> {
        (**self).fetch_devices()
    }

    fn fetch_positions(&self, device_id: u64) -> Result<Vec<Position>, ApiError> {
        (**self).fetch_positions(device_id)
    }

    fn find_device_by_vin(&self, vin: &str) -> Result<Option<TrackedDevice>, ApiError> {
        (**self).find_device_by_vin(vin)
    }

    fn parse_file(&self, file: &UploadedFile) -> Result<ParsedFile, ApiError> {
        (**self).parse_file(file)
    }

    fn import_vehicles(&mut self, records: &[MappedRecord]) -> Result<ImportResult, ApiError> {
        (**self).import_vehicles(records)
    }

    fn create_device(&mut self, device: &NewDevice) -> Result<TrackedDevice, ApiError> {
        (**self).create_device(device)
    }
}

// ============================================================================
// Local backend
// ============================================================================

/// In-process backend over a vehicle store
///
/// With demo data enabled it also serves a fixed set of sample vehicles,
/// devices, and positions. Changes to sample vehicles and devices created
/// here live for the session only.
pub struct LocalApi {
    store: Box<dyn VehicleStore>,
    committer: ImportCommitter,
    sample_vehicles: Vec<VehicleRecord>,
    devices: Vec<TrackedDevice>,
    positions: Vec<Position>,
}

impl LocalApi {
    pub fn new(store: Box<dyn VehicleStore>, committer: ImportCommitter) -> Self {
        Self {
            store,
            committer,
            sample_vehicles: Vec::new(),
            devices: Vec::new(),
            positions: Vec::new(),
        }
    }

    /// Add the sample vehicles, devices, and positions
    pub fn with_demo_data(mut self) -> Self {
        let now = Utc::now();

        self.sample_vehicles = vec![
            VehicleRecord {
                id: "1".to_string(),
                vin: "VIN123456".to_string(),
                make: "Ford".to_string(),
                model: "F-150".to_string(),
                year: FieldValue::from("2022"),
                color: "Black".to_string(),
                status: "available".to_string(),
                location: "Main Lot".to_string(),
                location_lat: 37.7749,
                location_lng: -122.4194,
                mileage: None,
                price: None,
                last_movement: LastMovement {
                    by: "John Doe".to_string(),
                    date: now,
                },
            },
            VehicleRecord {
                id: "2".to_string(),
                vin: "VIN789012".to_string(),
                make: "Toyota".to_string(),
                model: "Tacoma".to_string(),
                year: FieldValue::from("2021"),
                color: "Silver".to_string(),
                status: "leased".to_string(),
                location: "Overflow Lot".to_string(),
                location_lat: 37.7739,
                location_lng: -122.4184,
                mileage: None,
                price: None,
                last_movement: LastMovement {
                    by: "Jane Smith".to_string(),
                    date: now,
                },
            },
        ];

        self.devices = vec![
            TrackedDevice {
                id: 1,
                name: "Truck 101".to_string(),
                unique_id: "VIN101".to_string(),
                status: "online".to_string(),
                last_update: now,
                latitude: Some(37.7735),
                longitude: Some(-122.4165),
            },
            TrackedDevice {
                id: 2,
                name: "Truck 102".to_string(),
                unique_id: "VIN102".to_string(),
                status: "offline".to_string(),
                last_update: now - Duration::days(1),
                latitude: Some(37.7845),
                longitude: Some(-122.4075),
            },
        ];

        self.positions = vec![Position {
            id: 1,
            device_id: 1,
            latitude: 37.7735,
            longitude: -122.4165,
            speed: 0.0,
            device_time: now,
            fix_time: now,
        }];

        self
    }

    pub fn store(&self) -> &dyn VehicleStore {
        self.store.as_ref()
    }

}

impl FleetApi for LocalApi {
    fn fetch_vehicles(&self) -> Result<Vec<VehicleRecord>, ApiError> {
        let mut vehicles = self.sample_vehicles.clone();
        vehicles.extend(self.store.list()?);
        Ok(vehicles)
    }

    fn fetch_vehicle(&self, id: &str) -> Result<Option<VehicleRecord>, ApiError> {
        Ok(self.fetch_vehicles()?.into_iter().find(|v| v.id == id))
    }

    fn update_vehicle(
        &mut self,
        id: &str,
        update: &VehicleUpdate,
        by: &str,
    ) -> Result<Option<VehicleRecord>, ApiError> {
        let now = Utc::now();

        if let Some(sample) = self.sample_vehicles.iter_mut().find(|v| v.id == id) {
            *sample = update.apply(sample, by, now);
            return Ok(Some(sample.clone()));
        }

        let Some(stored) = self.store.list()?.into_iter().find(|v| v.id == id) else {
            return Ok(None);
        };
        let updated = update.apply(&stored, by, now);
        if !self.store.update(&updated)? {
            return Ok(None);
        }
        tracing::info!(id, by, "vehicle updated");
        Ok(Some(updated))
    }

    fn fetch_devices(&self) -> Result<Vec<TrackedDevice>, ApiError> {
        Ok(self.devices.clone())
    }

    fn fetch_positions(&self, device_id: u64) -> Result<Vec<Position>, ApiError> {
        Ok(self
            .positions
            .iter()
            .filter(|p| p.device_id == device_id)
            .cloned()
            .collect())
    }

    fn find_device_by_vin(&self, vin: &str) -> Result<Option<TrackedDevice>, ApiError> {
        Ok(self.devices.iter().find(|d| d.unique_id == vin).cloned())
    }

    fn parse_file(&self, file: &UploadedFile) -> Result<ParsedFile, ApiError> {
        Ok(parser::parse(file)?)
    }

    fn import_vehicles(&mut self, records: &[MappedRecord]) -> Result<ImportResult, ApiError> {
        Ok(self.committer.commit(self.store.as_mut(), records))
    }

    fn create_device(&mut self, device: &NewDevice) -> Result<TrackedDevice, ApiError> {
        device.validate()?;
        let id = self.devices.iter().map(|d| d.id).max().unwrap_or(0) + 1;
        let created = TrackedDevice {
            id,
            name: device.name.trim().to_string(),
            unique_id: device.unique_id.trim().to_string(),
            status: "created".to_string(),
            last_update: Utc::now(),
            latitude: None,
            longitude: None,
        };
        tracing::info!(id, unique_id = %created.unique_id, "device created");
        self.devices.push(created.clone());
        Ok(created)
    }
}

// ============================================================================
// HTTP backend
// ============================================================================

/// Standard response wrapper used by the fleet server
#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, rename = "suggestedMapping")]
    suggested_mapping: Option<serde_json::Map<String, JsonValue>>,
}

/// REST client for a fleet server
pub struct HttpApi {
    client: Client,
    base_url: String,
    auth: Box<dyn AuthProvider>,
}

impl HttpApi {
    pub fn new(base_url: &str, auth: Box<dyn AuthProvider>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("fleet/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        self.auth.current_user()?;
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "fleet api request");

        let mut request = self.client.request(method, url);
        if let Some(token) = self.auth.bearer_token() {
            request = request.bearer_auth(token);
        }
        Ok(request)
    }

    fn send_json(&self, request: RequestBuilder) -> Result<JsonValue, ApiError> {
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<JsonValue>()?)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Envelope<T>, ApiError> {
        let value = self.send_json(request)?;
        let envelope: Envelope<T> = serde_json::from_value(value)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        if !envelope.success {
            return Err(ApiError::Server(
                envelope
                    .error
                    .unwrap_or_else(|| "request failed".to_string()),
            ));
        }
        Ok(envelope)
    }
}

impl FleetApi for HttpApi {
    fn fetch_vehicles(&self) -> Result<Vec<VehicleRecord>, ApiError> {
        let envelope = self.send(self.request(Method::GET, "/vehicles")?)?;
        Ok(envelope.data.unwrap_or_default())
    }

    fn fetch_vehicle(&self, id: &str) -> Result<Option<VehicleRecord>, ApiError> {
        let envelope = self.send(self.request(Method::GET, &format!("/vehicles/{}", id))?)?;
        Ok(envelope.data)
    }

    fn update_vehicle(
        &mut self,
        id: &str,
        update: &VehicleUpdate,
        by: &str,
    ) -> Result<Option<VehicleRecord>, ApiError> {
        let movement = LastMovement {
            by: by.to_string(),
            date: Utc::now(),
        };
        let mut body = serde_json::to_value(update)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        body["lastMovement"] = serde_json::to_value(&movement)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        let request = self
            .request(Method::PATCH, &format!("/vehicles/{}", id))?
            .json(&body);
        match self.send(request) {
            Ok(envelope) => Ok(envelope.data),
            Err(ApiError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn fetch_devices(&self) -> Result<Vec<TrackedDevice>, ApiError> {
        let envelope = self.send(self.request(Method::GET, "/tracking/devices")?)?;
        Ok(envelope.data.unwrap_or_default())
    }

    fn fetch_positions(&self, device_id: u64) -> Result<Vec<Position>, ApiError> {
        let path = format!("/tracking/devices/{}/positions", device_id);
        let envelope = self.send(self.request(Method::GET, &path)?)?;
        Ok(envelope.data.unwrap_or_default())
    }

    fn find_device_by_vin(&self, vin: &str) -> Result<Option<TrackedDevice>, ApiError> {
        let path = format!("/tracking/devices/vin/{}", vin);
        let envelope = self.send(self.request(Method::GET, &path)?)?;
        Ok(envelope.data)
    }

    fn parse_file(&self, file: &UploadedFile) -> Result<ParsedFile, ApiError> {
        let format = file.format()?;
        let (encoding, content) = if format.is_binary() {
            (
                "base64",
                base64::engine::general_purpose::STANDARD.encode(&file.content),
            )
        } else {
            let text = std::str::from_utf8(&file.content).map_err(|_| ParseError::NotUtf8)?;
            ("text", text.to_string())
        };

        let body = json!({
            "name": file.name,
            "size": file.size(),
            "extension": file.extension(),
            "encoding": encoding,
            "content": content,
        });

        let envelope: Envelope<Vec<serde_json::Map<String, JsonValue>>> =
            self.send(self.request(Method::POST, "/onboarding/parse")?.json(&body))?;

        let rows = envelope.data.unwrap_or_default();
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, row)| source_record_from_json(i + 1, row))
            .collect::<Result<Vec<_>, _>>()?;
        let mut parsed = ParsedFile::from_records(records)?;

        // Prefer the server's suggestions when it sends any
        if let Some(suggested) = envelope.suggested_mapping {
            let from_server: Vec<(String, TargetField)> = suggested
                .into_iter()
                .filter(|(column, _)| parsed.headers.contains(column))
                .filter_map(|(column, target)| {
                    let target = target.as_str()?.parse::<TargetField>().ok()?;
                    Some((column, target))
                })
                .collect();
            if !from_server.is_empty() {
                parsed.suggested_mapping = from_server;
            }
        }

        Ok(parsed)
    }

    fn import_vehicles(&mut self, records: &[MappedRecord]) -> Result<ImportResult, ApiError> {
        let request = self
            .request(Method::POST, "/onboarding/import")?
            .json(records);
        let value = self.send_json(request)?;

        match serde_json::from_value::<ImportResult>(value.clone()) {
            Ok(result) => Ok(result),
            Err(e) => match value.get("error").and_then(JsonValue::as_str) {
                Some(message) => Ok(ImportResult::failure(records.len(), message)),
                None => Err(ApiError::InvalidResponse(e.to_string())),
            },
        }
    }

    fn create_device(&mut self, device: &NewDevice) -> Result<TrackedDevice, ApiError> {
        device.validate()?;
        let request = self
            .request(Method::POST, "/tracking/devices")?
            .json(device);
        let envelope: Envelope<TrackedDevice> = self.send(request)?;
        envelope
            .data
            .ok_or_else(|| ApiError::InvalidResponse("missing device in response".to_string()))
    }
}
