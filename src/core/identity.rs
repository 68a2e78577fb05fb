//! Identifiers for imported vehicles using prefixed ULIDs
//!
//! A ULID is a millisecond timestamp followed by 80 random bits, so ids
//! sort by import time and do not collide across batches.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::{Generator, Ulid};

/// Identifier of a vehicle created by the import pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId {
    ulid: Ulid,
}

impl VehicleId {
    pub const PREFIX: &'static str = "IMP";

    pub fn new() -> Self {
        Self { ulid: Ulid::new() }
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self { ulid }
    }

    pub fn ulid(&self) -> Ulid {
        self.ulid
    }

    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }

    /// Whether a stored id was produced by the import pipeline
    pub fn is_import_id(s: &str) -> bool {
        Self::parse(s).is_ok()
    }
}

impl Default for VehicleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", Self::PREFIX, self.ulid)
    }
}

impl FromStr for VehicleId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, ulid_str) = s
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingDelimiter(s.to_string()))?;

        if !prefix.eq_ignore_ascii_case(Self::PREFIX) {
            return Err(IdParseError::InvalidPrefix(prefix.to_string()));
        }

        let ulid = Ulid::from_string(ulid_str)
            .map_err(|e| IdParseError::InvalidUlid(ulid_str.to_string(), e.to_string()))?;

        Ok(Self { ulid })
    }
}

/// Produces strictly increasing ids, even within one millisecond
pub struct IdGenerator {
    inner: Generator,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            inner: Generator::new(),
        }
    }

    pub fn next_id(&mut self) -> VehicleId {
        // The monotonic counter only overflows after 2^80 ids in one
        // millisecond; fall back to a fresh random ULID if it ever does.
        let ulid = self.inner.generate().unwrap_or_else(|_| Ulid::new());
        VehicleId::from_ulid(ulid)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when parsing vehicle ids
#[derive(Debug, Error)]
pub enum IdParseError {
    #[error("invalid vehicle id prefix: '{0}' (expected IMP)")]
    InvalidPrefix(String),

    #[error("missing '-' delimiter in vehicle id: '{0}'")]
    MissingDelimiter(String),

    #[error("invalid ULID '{0}': {1}")]
    InvalidUlid(String, String),
}
