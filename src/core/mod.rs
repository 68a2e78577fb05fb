//! Core module - storage, backends, identity, and configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod identity;
pub mod store;

pub use api::{ApiError, FleetApi, HttpApi, LocalApi};
pub use auth::{AuthError, AuthProvider, LocalAuth, TokenAuth, User};
pub use config::Config;
pub use identity::{IdGenerator, IdParseError, VehicleId};
pub use store::{open_store, JsonFileStore, MemoryStore, SqliteStore, StoreBackend, StoreError, VehicleStore};
