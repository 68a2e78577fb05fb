//! Record types flowing through the onboarding pipeline
//!
//! Uploaded files have no fixed shape: every parser produces [`SourceRecord`]s
//! keyed by whatever column names the file carried. The field mapper turns
//! those into [`MappedRecord`]s keyed by the fixed [`TargetField`] schema.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A primitive value read from an uploaded file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Convert a JSON value, rejecting arrays and objects
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(FieldValue::Null),
            serde_json::Value::Bool(b) => Some(FieldValue::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(FieldValue::Number),
            serde_json::Value::String(s) => Some(FieldValue::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Null or the empty string
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Null or a string that is empty after trimming whitespace
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric interpretation: numbers as-is, strings parsed after trimming
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
                }
            }
            _ => None,
        }
    }

    /// Text content, `None` for null
    pub fn as_text(&self) -> Option<String> {
        if self.is_null() {
            None
        } else {
            Some(self.to_string())
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Null
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FieldValue::Null => serializer.serialize_unit(),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            // Whole numbers go out as integers so years stay `2022`, not `2022.0`
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                serializer.serialize_i64(*n as i64)
            }
            FieldValue::Number(n) => serializer.serialize_f64(*n),
            FieldValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// One parsed row: column name to raw value, in file column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRecord {
    fields: Vec<(String, FieldValue)>,
}

impl SourceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a column value, keeping first-seen column order
    pub fn insert(&mut self, column: impl Into<String>, value: FieldValue) {
        let column = column.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for SourceRecord {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        let mut record = SourceRecord::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

impl Serialize for SourceRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Fields of the vehicle schema that source columns can be mapped onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetField {
    Vin,
    Make,
    Model,
    Year,
    Color,
    Status,
    Location,
    LocationLat,
    LocationLng,
    Mileage,
    Price,
}

impl TargetField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetField::Vin => "vin",
            TargetField::Make => "make",
            TargetField::Model => "model",
            TargetField::Year => "year",
            TargetField::Color => "color",
            TargetField::Status => "status",
            TargetField::Location => "location",
            TargetField::LocationLat => "location_lat",
            TargetField::LocationLng => "location_lng",
            TargetField::Mileage => "mileage",
            TargetField::Price => "price",
        }
    }

    /// Display label used in prompts and error messages
    pub fn label(&self) -> &'static str {
        match self {
            TargetField::Vin => "VIN",
            TargetField::Make => "Make",
            TargetField::Model => "Model",
            TargetField::Year => "Year",
            TargetField::Color => "Color",
            TargetField::Status => "Status",
            TargetField::Location => "Location",
            TargetField::LocationLat => "Latitude",
            TargetField::LocationLng => "Longitude",
            TargetField::Mileage => "Mileage",
            TargetField::Price => "Price",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TargetField::Vin => "Vehicle Identification Number",
            TargetField::Make => "Vehicle manufacturer",
            TargetField::Model => "Vehicle model",
            TargetField::Year => "Vehicle model year",
            TargetField::Color => "Vehicle color",
            TargetField::Status => "Current vehicle status",
            TargetField::Location => "Physical location",
            TargetField::LocationLat => "GPS latitude",
            TargetField::LocationLng => "GPS longitude",
            TargetField::Mileage => "Current odometer reading",
            TargetField::Price => "Vehicle price",
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(
            self,
            TargetField::Vin | TargetField::Make | TargetField::Model | TargetField::Year
        )
    }

    /// All target fields, required ones first
    pub fn all() -> &'static [TargetField] {
        &[
            TargetField::Vin,
            TargetField::Make,
            TargetField::Model,
            TargetField::Year,
            TargetField::Color,
            TargetField::Status,
            TargetField::Location,
            TargetField::LocationLat,
            TargetField::LocationLng,
            TargetField::Mileage,
            TargetField::Price,
        ]
    }

    pub fn required() -> impl Iterator<Item = TargetField> {
        Self::all().iter().copied().filter(|f| f.is_required())
    }

    pub fn optional() -> impl Iterator<Item = TargetField> {
        Self::all().iter().copied().filter(|f| !f.is_required())
    }
}

impl fmt::Display for TargetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        TargetField::all()
            .iter()
            .copied()
            .find(|f| f.as_str() == key)
            .ok_or_else(|| {
                format!(
                    "unknown target field '{}' (valid: {})",
                    s,
                    TargetField::all()
                        .iter()
                        .map(|f| f.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// A record expressed in the target schema; only mapped fields are present
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappedRecord {
    values: BTreeMap<TargetField, FieldValue>,
}

impl MappedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: TargetField, value: FieldValue) {
        self.values.insert(field, value);
    }

    pub fn get(&self, field: TargetField) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    /// Text value of a field, `None` when absent or null
    pub fn text(&self, field: TargetField) -> Option<String> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn contains(&self, field: TargetField) -> bool {
        self.values.contains_key(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetField, &FieldValue)> {
        self.values.iter().map(|(field, value)| (*field, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(TargetField, FieldValue)> for MappedRecord {
    fn from_iter<I: IntoIterator<Item = (TargetField, FieldValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_display_whole_numbers() {
        assert_eq!(FieldValue::Number(2022.0).to_string(), "2022");
        assert_eq!(FieldValue::Number(37.7749).to_string(), "37.7749");
        assert_eq!(FieldValue::Null.to_string(), "");
    }

    #[test]
    fn test_field_value_as_number() {
        assert_eq!(FieldValue::from(" 2021 ").as_number(), Some(2021.0));
        assert_eq!(FieldValue::from("abc").as_number(), None);
        assert_eq!(FieldValue::from("").as_number(), None);
        assert_eq!(FieldValue::Bool(true).as_number(), None);
    }

    #[test]
    fn test_field_value_blank_vs_empty() {
        assert!(FieldValue::from("   ").is_blank());
        assert!(!FieldValue::from("   ").is_empty());
        assert!(FieldValue::Null.is_empty());
        assert!(!FieldValue::Number(0.0).is_blank());
    }

    #[test]
    fn test_field_value_serializes_integers() {
        let json = serde_json::to_string(&FieldValue::Number(2022.0)).unwrap();
        assert_eq!(json, "2022");
        let json = serde_json::to_string(&FieldValue::Number(1.5)).unwrap();
        assert_eq!(json, "1.5");
    }

    #[test]
    fn test_source_record_keeps_column_order() {
        let mut record = SourceRecord::new();
        record.insert("VIN", "1HGCM82633A123456".into());
        record.insert("Make", "Honda".into());
        record.insert("VIN", "WBAPM7339AE111111".into());

        let columns: Vec<_> = record.columns().collect();
        assert_eq!(columns, vec!["VIN", "Make"]);
        assert_eq!(
            record.get("VIN"),
            Some(&FieldValue::from("WBAPM7339AE111111"))
        );
    }

    #[test]
    fn test_target_field_parse() {
        assert_eq!("location_lat".parse::<TargetField>(), Ok(TargetField::LocationLat));
        assert_eq!(" VIN ".parse::<TargetField>(), Ok(TargetField::Vin));
        assert!("odometer".parse::<TargetField>().is_err());
    }

    #[test]
    fn test_required_fields() {
        let required: Vec<_> = TargetField::required().collect();
        assert_eq!(
            required,
            vec![TargetField::Vin, TargetField::Make, TargetField::Model, TargetField::Year]
        );
        assert_eq!(TargetField::optional().count(), 7);
    }

    #[test]
    fn test_mapped_record_json_uses_field_keys() {
        let record: MappedRecord = [
            (TargetField::Vin, FieldValue::from("1HGCM82633A123456")),
            (TargetField::LocationLat, FieldValue::Number(37.5)),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["vin"], "1HGCM82633A123456");
        assert_eq!(json["location_lat"], 37.5);

        let back: MappedRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
