//! Entity types - vehicles and tracking devices

pub mod device;
pub mod vehicle;

pub use device::{DeviceError, NewDevice, Position, TrackedDevice};
pub use vehicle::{
    FleetMetrics, LastMovement, VehicleFilter, VehicleRecord, VehicleStatus,
    VehicleUpdate,
};
