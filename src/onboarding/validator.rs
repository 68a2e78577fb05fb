//! Row-level validation of mapped vehicle records
//!
//! Every rule looks at a single row; there are no cross-row checks. Only
//! [`Severity::Error`] issues make a row ineligible for import.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::onboarding::record::{MappedRecord, TargetField};

/// Statuses a vehicle can be in; anything else is flagged as a warning
pub const KNOWN_STATUSES: [&str; 4] = ["available", "leased", "service", "sold"];

/// Oldest model year accepted without a warning
pub const MIN_MODEL_YEAR: i32 = 1900;

/// VINs shorter than this get a warning. Full 17-character VINs are not enforced.
pub const MIN_VIN_LENGTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A problem found in one field of one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Index into the mapped record sequence (0-based)
    pub row: usize,
    pub field: TargetField,
    pub severity: Severity,
    pub message: String,
}

impl ValidationIssue {
    fn error(row: usize, field: TargetField, message: &str) -> Self {
        Self {
            row,
            field,
            severity: Severity::Error,
            message: message.to_string(),
        }
    }

    fn warning(row: usize, field: TargetField, message: &str) -> Self {
        Self {
            row,
            field,
            severity: Severity::Warning,
            message: message.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Validate records against the current calendar year
pub fn validate(records: &[MappedRecord]) -> Vec<ValidationIssue> {
    validate_as_of(records, chrono::Local::now().year())
}

/// Validate records, accepting model years up to `current_year + 1`
pub fn validate_as_of(records: &[MappedRecord], current_year: i32) -> Vec<ValidationIssue> {
    let issues: Vec<ValidationIssue> = records
        .iter()
        .enumerate()
        .flat_map(|(row, record)| validate_row(row, record, current_year))
        .collect();

    tracing::debug!(
        rows = records.len(),
        errors = issues.iter().filter(|i| i.is_error()).count(),
        warnings = issues.iter().filter(|i| !i.is_error()).count(),
        "validated mapped records"
    );

    issues
}

fn validate_row(row: usize, record: &MappedRecord, current_year: i32) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    match record.get(TargetField::Vin) {
        None => issues.push(ValidationIssue::error(row, TargetField::Vin, "Missing VIN")),
        Some(vin) if vin.is_empty() => {
            issues.push(ValidationIssue::error(row, TargetField::Vin, "Missing VIN"))
        }
        Some(vin) => {
            if vin.to_string().chars().count() < MIN_VIN_LENGTH {
                issues.push(ValidationIssue::warning(
                    row,
                    TargetField::Vin,
                    "VIN is shorter than recommended length",
                ));
            }
        }
    }

    if record.get(TargetField::Make).map_or(true, |v| v.is_blank()) {
        issues.push(ValidationIssue::error(row, TargetField::Make, "Make is required"));
    }

    if record.get(TargetField::Model).map_or(true, |v| v.is_blank()) {
        issues.push(ValidationIssue::error(row, TargetField::Model, "Model is required"));
    }

    match record.get(TargetField::Year) {
        Some(year) if !year.is_empty() => {
            let max_year = f64::from(current_year + 1);
            let in_range = year
                .as_number()
                .is_some_and(|y| y >= f64::from(MIN_MODEL_YEAR) && y <= max_year);
            if !in_range {
                issues.push(ValidationIssue::warning(
                    row,
                    TargetField::Year,
                    "Year appears to be invalid",
                ));
            }
        }
        _ => issues.push(ValidationIssue::error(row, TargetField::Year, "Year is required")),
    }

    if let Some(status) = record.get(TargetField::Status).filter(|v| !v.is_empty()) {
        let status = status.to_string().to_lowercase();
        if !KNOWN_STATUSES.contains(&status.as_str()) {
            issues.push(ValidationIssue::warning(
                row,
                TargetField::Status,
                "Status should be: available, leased, service, or sold",
            ));
        }
    }

    if record.get(TargetField::Location).map_or(true, |v| v.is_blank()) {
        issues.push(ValidationIssue::warning(
            row,
            TargetField::Location,
            "Location is recommended but not required",
        ));
    }

    issues
}
