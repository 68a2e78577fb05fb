//! Field mapping from uploaded columns onto the vehicle schema

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::onboarding::parser::ParsedFile;
use crate::onboarding::record::{FieldValue, MappedRecord, SourceRecord, TargetField};

/// Sentinel used for a target that should not receive any column
pub const IGNORE: &str = "ignore";

/// Only this many leading records are searched for a sample value
const SAMPLE_ROWS: usize = 5;

/// Sample values longer than this are truncated for display
const SAMPLE_MAX_CHARS: usize = 30;

/// Where a target field takes its value from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MappingSource {
    Ignore,
    Column(String),
}

impl MappingSource {
    pub fn column(name: impl Into<String>) -> Self {
        MappingSource::Column(name.into())
    }

    pub fn as_column(&self) -> Option<&str> {
        match self {
            MappingSource::Column(name) => Some(name),
            MappingSource::Ignore => None,
        }
    }

    /// Parse a user-supplied source; `ignore` is the sentinel
    pub fn parse(value: &str) -> Self {
        if value == IGNORE {
            MappingSource::Ignore
        } else {
            MappingSource::Column(value.to_string())
        }
    }
}

impl fmt::Display for MappingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingSource::Ignore => f.write_str(IGNORE),
            MappingSource::Column(name) => f.write_str(name),
        }
    }
}

impl Serialize for MappingSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MappingSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(MappingSource::parse(&s))
    }
}

/// Target field to source assignment
pub type FieldMapping = BTreeMap<TargetField, MappingSource>;

/// A selectable source for one target field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOption {
    pub source: MappingSource,
    /// `ignore` cannot be chosen for required fields
    pub disabled: bool,
}

/// Heuristic type of a source column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedType {
    NotApplicable,
    Unknown,
    Number,
    Boolean,
    Date,
    Vin,
    NumericString,
    String,
}

impl DetectedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectedType::NotApplicable => "N/A",
            DetectedType::Unknown => "unknown",
            DetectedType::Number => "number",
            DetectedType::Boolean => "boolean",
            DetectedType::Date => "date",
            DetectedType::Vin => "VIN",
            DetectedType::NumericString => "numeric string",
            DetectedType::String => "string",
        }
    }
}

impl fmt::Display for DetectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("Please map the following required fields: {}", labels(.0))]
    MissingRequired(Vec<TargetField>),

    #[error("{} is required and cannot be ignored", .0.label())]
    RequiredIgnored(TargetField),

    #[error("Unknown source column '{}' for {}", .column, .target.label())]
    UnknownColumn { target: TargetField, column: String },
}

fn labels(fields: &[TargetField]) -> String {
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Holds the parsed upload and the mapping being edited
#[derive(Debug, Clone)]
pub struct FieldMapper {
    parsed: ParsedFile,
    mapping: FieldMapping,
}

impl FieldMapper {
    /// Create a mapper pre-filled from the parser's suggestions
    pub fn new(parsed: ParsedFile) -> Self {
        let mut mapping = FieldMapping::new();
        for (column, target) in &parsed.suggested_mapping {
            mapping
                .entry(*target)
                .or_insert_with(|| MappingSource::column(column.clone()));
        }
        Self { parsed, mapping }
    }

    /// Create a mapper with an explicit starting mapping. Entries naming
    /// columns the file does not have are dropped.
    pub fn with_mapping(parsed: ParsedFile, initial: FieldMapping) -> Self {
        let mapping = initial
            .into_iter()
            .filter(|(_, source)| match source {
                MappingSource::Ignore => true,
                MappingSource::Column(name) => parsed.headers.contains(name),
            })
            .collect();
        Self { parsed, mapping }
    }

    pub fn parsed(&self) -> &ParsedFile {
        &self.parsed
    }

    pub fn source_fields(&self) -> &[String] {
        &self.parsed.headers
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    pub fn source_for(&self, target: TargetField) -> Option<&MappingSource> {
        self.mapping.get(&target)
    }

    /// `ignore` followed by every source column
    pub fn source_options(&self, target: TargetField) -> Vec<SourceOption> {
        std::iter::once(SourceOption {
            source: MappingSource::Ignore,
            disabled: target.is_required(),
        })
        .chain(self.parsed.headers.iter().map(|h| SourceOption {
            source: MappingSource::column(h.clone()),
            disabled: false,
        }))
        .collect()
    }

    pub fn set(&mut self, target: TargetField, source: MappingSource) -> Result<(), MappingError> {
        match &source {
            MappingSource::Ignore if target.is_required() => {
                return Err(MappingError::RequiredIgnored(target));
            }
            MappingSource::Column(column) if !self.parsed.headers.contains(column) => {
                return Err(MappingError::UnknownColumn {
                    target,
                    column: column.clone(),
                });
            }
            _ => {}
        }
        self.mapping.insert(target, source);
        Ok(())
    }

    pub fn unset(&mut self, target: TargetField) {
        self.mapping.remove(&target);
    }

    /// Required fields that are unmapped or set to `ignore`
    pub fn missing_required(&self) -> Vec<TargetField> {
        TargetField::required()
            .filter(|f| {
                !matches!(self.mapping.get(f), Some(MappingSource::Column(_)))
            })
            .collect()
    }

    /// Finalize the mapping, refusing if a required field has no column
    pub fn submit(&self) -> Result<FieldMapping, MappingError> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            tracing::debug!(missing = %labels(&missing), "mapping submission rejected");
            return Err(MappingError::MissingRequired(missing));
        }
        Ok(self.mapping.clone())
    }

    /// Apply a mapping to every parsed record
    pub fn apply(&self, mapping: &FieldMapping) -> Vec<MappedRecord> {
        self.parsed
            .records
            .iter()
            .map(|record| apply_mapping(record, mapping))
            .collect()
    }

    /// First non-empty value among the leading records, for display
    pub fn sample_value(&self, source: &MappingSource) -> String {
        let Some(column) = source.as_column() else {
            return "N/A".to_string();
        };

        self.parsed
            .records
            .iter()
            .take(SAMPLE_ROWS)
            .filter_map(|r| r.get(column))
            .find(|v| !v.is_empty())
            .map(|v| truncate_sample(&v.to_string()))
            .unwrap_or_else(|| "N/A".to_string())
    }

    /// Classify a column from its first non-null value
    pub fn detect_type(&self, source: &MappingSource) -> DetectedType {
        let Some(column) = source.as_column() else {
            return DetectedType::NotApplicable;
        };

        let sample = self
            .parsed
            .records
            .iter()
            .filter_map(|r| r.get(column))
            .find(|v| !v.is_null());

        match sample {
            None => DetectedType::Unknown,
            Some(value) => detect_value_type(value),
        }
    }
}

/// Copy mapped columns into a record keyed by target field
pub fn apply_mapping(record: &SourceRecord, mapping: &FieldMapping) -> MappedRecord {
    mapping
        .iter()
        .filter_map(|(target, source)| {
            let column = source.as_column()?;
            record.get(column).map(|value| (*target, value.clone()))
        })
        .collect()
}

fn truncate_sample(s: &str) -> String {
    if s.chars().count() > SAMPLE_MAX_CHARS {
        let head: String = s.chars().take(SAMPLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

fn detect_value_type(value: &FieldValue) -> DetectedType {
    match value {
        FieldValue::Null => DetectedType::Unknown,
        FieldValue::Number(_) => DetectedType::Number,
        FieldValue::Bool(_) => DetectedType::Boolean,
        FieldValue::Text(s) => {
            if has_date_prefix(s) {
                DetectedType::Date
            } else if is_vin_like(s) {
                DetectedType::Vin
            } else if is_numeric_string(s) {
                DetectedType::NumericString
            } else {
                DetectedType::String
            }
        }
    }
}

/// `YYYY-MM-DD` at the start of the string
fn has_date_prefix(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 10
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit)
}

/// 17 characters from the VIN alphabet (no I, O, or Q)
fn is_vin_like(s: &str) -> bool {
    s.len() == 17
        && s.chars().all(|c| {
            let c = c.to_ascii_uppercase();
            c.is_ascii_digit() || (c.is_ascii_uppercase() && !matches!(c, 'I' | 'O' | 'Q'))
        })
}

/// Signed integer or decimal such as `42`, `-7`, `+.5`, or `3.25`
fn is_numeric_string(s: &str) -> bool {
    let body = s.strip_prefix(&['-', '+'][..]).unwrap_or(s);
    match body.split_once('.') {
        None => !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()),
        Some((int, frac)) => {
            int.bytes().all(|b| b.is_ascii_digit())
                && !frac.is_empty()
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
    }
}
