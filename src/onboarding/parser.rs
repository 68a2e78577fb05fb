//! Uploaded file parsing
//!
//! Formats are chosen by file extension only; content is never sniffed to
//! pick a parser. Every parser yields flat [`SourceRecord`]s and the header
//! set of the first record defines the columns offered for mapping.

use calamine::{Data, Reader};
use serde_json::Value as JsonValue;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

use crate::onboarding::record::{FieldValue, SourceRecord, TargetField};

/// File formats accepted for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Excel,
    Json,
    Xml,
    Text,
}

impl FileFormat {
    /// Resolve a format from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(FileFormat::Csv),
            "xls" | "xlsx" => Some(FileFormat::Excel),
            "json" => Some(FileFormat::Json),
            "xml" => Some(FileFormat::Xml),
            "txt" => Some(FileFormat::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Excel => "excel",
            FileFormat::Json => "json",
            FileFormat::Xml => "xml",
            FileFormat::Text => "text",
        }
    }

    /// Binary formats travel base64-encoded when sent to a remote parser
    pub fn is_binary(&self) -> bool {
        matches!(self, FileFormat::Excel)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file handed to the wizard for parsing
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Read a file from disk, keeping only its file name
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, content })
    }

    /// Text after the last `.` of the name, lowercased
    pub fn extension(&self) -> String {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default()
    }

    pub fn format(&self) -> Result<FileFormat, ParseError> {
        let ext = self.extension();
        FileFormat::from_extension(&ext).ok_or(ParseError::UnsupportedFileType { extension: ext })
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Result of parsing an uploaded file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFile {
    /// Columns of the first record, in file order
    pub headers: Vec<String>,
    pub records: Vec<SourceRecord>,
    /// Source column to target field guesses used to pre-fill the mapper
    pub suggested_mapping: Vec<(String, TargetField)>,
}

impl ParsedFile {
    /// Build from records, deriving headers and suggested mapping
    pub fn from_records(records: Vec<SourceRecord>) -> Result<Self, ParseError> {
        let first = records.first().ok_or(ParseError::Empty)?;
        let headers: Vec<String> = first.columns().map(String::from).collect();
        let suggested_mapping = suggest_mapping(&headers);
        Ok(Self {
            headers,
            records,
            suggested_mapping,
        })
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unsupported file type: .{extension}. Please upload a CSV, Excel, JSON, XML, or text file.")]
    UnsupportedFileType { extension: String },

    #[error("File contains no records")]
    Empty,

    #[error("File is not valid UTF-8 text")]
    NotUtf8,

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Excel error: {0}")]
    Excel(String),

    /// `row` is 1-based
    #[error("Record {row}: {message}")]
    InvalidRecord { row: usize, message: String },
}

/// Parse an uploaded file according to its extension
pub fn parse(file: &UploadedFile) -> Result<ParsedFile, ParseError> {
    let format = file.format()?;

    let records = match format {
        FileFormat::Csv => parse_delimited(as_text(&file.content)?, b','),
        FileFormat::Text => {
            let text = as_text(&file.content)?;
            parse_delimited(text, sniff_delimiter(text))
        }
        FileFormat::Json => parse_json(as_text(&file.content)?),
        FileFormat::Xml => parse_xml(as_text(&file.content)?),
        FileFormat::Excel => parse_excel(&file.content),
    }?;

    let parsed = ParsedFile::from_records(records)?;
    tracing::info!(
        file = %file.name,
        format = %format,
        records = parsed.records.len(),
        columns = parsed.headers.len(),
        "parsed upload"
    );
    Ok(parsed)
}

fn as_text(content: &[u8]) -> Result<&str, ParseError> {
    let text = std::str::from_utf8(content).map_err(|_| ParseError::NotUtf8)?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Pick the delimiter that appears most often on the header line
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    [b'\t', b';', b'|', b',']
        .into_iter()
        .map(|d| (d, header.bytes().filter(|b| *b == d).count()))
        .filter(|(_, count)| *count > 0)
        .fold(None, |best: Option<(u8, usize)>, candidate| match best {
            Some(b) if b.1 >= candidate.1 => Some(b),
            _ => Some(candidate),
        })
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

fn parse_delimited(text: &str, delimiter: u8) -> Result<Vec<SourceRecord>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ParseError::Csv(e.to_string()))?
        .clone();

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let row_data = result.map_err(|e| ParseError::Csv(format!("row {}: {}", row + 1, e)))?;
        let record: SourceRecord = headers
            .iter()
            .zip(row_data.iter())
            .map(|(column, value)| (column, FieldValue::from(value)))
            .collect();
        records.push(record);
    }
    Ok(records)
}

fn parse_json(text: &str) -> Result<Vec<SourceRecord>, ParseError> {
    let value: JsonValue =
        serde_json::from_str(text).map_err(|e| ParseError::Json(e.to_string()))?;

    let items = match &value {
        JsonValue::Array(items) => items,
        JsonValue::Object(obj) => match obj.get("data") {
            Some(JsonValue::Array(items)) => items,
            _ => {
                return Err(ParseError::Json(
                    "expected an array of records or an object with a \"data\" array".to_string(),
                ))
            }
        },
        _ => return Err(ParseError::Json("expected an array of records".to_string())),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            JsonValue::Object(obj) => source_record_from_json(i + 1, obj),
            _ => Err(ParseError::InvalidRecord {
                row: i + 1,
                message: "expected an object".to_string(),
            }),
        })
        .collect()
}

/// Convert one JSON object into a record, rejecting nested values.
/// `row` is the 1-based position reported in errors.
pub fn source_record_from_json(
    row: usize,
    obj: &serde_json::Map<String, JsonValue>,
) -> Result<SourceRecord, ParseError> {
    let mut record = SourceRecord::new();
    for (column, value) in obj {
        let value = FieldValue::from_json(value).ok_or_else(|| ParseError::InvalidRecord {
            row,
            message: format!("field '{}' is not a primitive value", column),
        })?;
        record.insert(column.clone(), value);
    }
    Ok(record)
}

fn parse_xml(text: &str) -> Result<Vec<SourceRecord>, ParseError> {
    let doc = roxmltree::Document::parse(text).map_err(|e| ParseError::Xml(e.to_string()))?;

    let records = doc
        .root_element()
        .children()
        .filter(|n| n.is_element())
        .map(|node| {
            let mut record = SourceRecord::new();
            for attr in node.attributes() {
                record.insert(attr.name(), FieldValue::from(attr.value()));
            }
            for child in node.children().filter(|n| n.is_element()) {
                let text = child.text().unwrap_or("").trim();
                record.insert(child.tag_name().name(), FieldValue::from(text));
            }
            record
        })
        .filter(|record| !record.is_empty())
        .collect();

    Ok(records)
}

fn parse_excel(content: &[u8]) -> Result<Vec<SourceRecord>, ParseError> {
    let cursor = Cursor::new(content.to_vec());
    let mut workbook =
        calamine::open_workbook_auto_from_rs(cursor).map_err(|e| ParseError::Excel(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::Excel("workbook has no worksheets".to_string()))?
        .map_err(|e| ParseError::Excel(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(cells) => cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let name = cell.to_string().trim().to_string();
                if name.is_empty() {
                    format!("Column{}", i + 1)
                } else {
                    name
                }
            })
            .collect(),
        None => return Err(ParseError::Empty),
    };

    let records = rows
        .filter(|cells| cells.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|cells| {
            headers
                .iter()
                .zip(cells.iter())
                .map(|(column, cell)| (column.clone(), excel_value(cell)))
                .collect::<SourceRecord>()
        })
        .collect();

    Ok(records)
}

fn excel_value(cell: &Data) -> FieldValue {
    match cell {
        Data::Empty | Data::Error(_) => FieldValue::Null,
        Data::Int(i) => FieldValue::Number(*i as f64),
        Data::Float(f) => FieldValue::Number(*f),
        Data::Bool(b) => FieldValue::Bool(*b),
        Data::String(s) => FieldValue::Text(s.clone()),
        other => FieldValue::Text(other.to_string()),
    }
}

/// Header aliases recognized when suggesting a mapping, compared after
/// lowercasing and stripping everything but letters and digits
const HEADER_ALIASES: &[(TargetField, &[&str])] = &[
    (
        TargetField::Vin,
        &["vin", "vehicleid", "vinnumber", "vehicleidentificationnumber"],
    ),
    (TargetField::Make, &["make", "manufacturer", "brand"]),
    (TargetField::Model, &["model"]),
    (TargetField::Year, &["year", "modelyear"]),
    (TargetField::Color, &["color", "colour", "exteriorcolor"]),
    (TargetField::Status, &["status", "currentstatus", "inventorystatus"]),
    (
        TargetField::Location,
        &["location", "currentlocation", "dealerlocation", "lot"],
    ),
    (
        TargetField::LocationLat,
        &["latitude", "lat", "gpslatitude", "locationlat"],
    ),
    (
        TargetField::LocationLng,
        &["longitude", "lng", "long", "lon", "gpslongitude", "locationlng"],
    ),
    (TargetField::Mileage, &["mileage", "odometer", "miles"]),
    (TargetField::Price, &["price", "msrp", "listprice"]),
];

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Guess target fields for known header names. Each target is suggested at
/// most once, for the first header that matches it.
pub fn suggest_mapping(headers: &[String]) -> Vec<(String, TargetField)> {
    let mut suggestions: Vec<(String, TargetField)> = Vec::new();
    for header in headers {
        let normalized = normalize_header(header);
        let target = HEADER_ALIASES
            .iter()
            .find(|(_, aliases)| aliases.contains(&normalized.as_str()))
            .map(|(target, _)| *target);
        if let Some(target) = target {
            if !suggestions.iter().any(|(_, t)| *t == target) {
                suggestions.push((header.clone(), target));
            }
        }
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "VIN,Make,Model,Year,Color,Status,Location,Latitude,Longitude
1HGCM82633A123456,Honda,Accord,2022,Black,available,Main Lot,37.7749,-122.4194
5XYKT3A17CG222222,Kia,Sorento,2020,White,leased,Offsite,37.7833,-122.4167
";

    #[test]
    fn test_extension_is_case_insensitive() {
        let file = UploadedFile::new("Inventory.XLSX", Vec::new());
        assert_eq!(file.extension(), "xlsx");
        assert_eq!(file.format().unwrap(), FileFormat::Excel);
    }

    #[test]
    fn test_unsupported_extension_names_it() {
        let file = UploadedFile::new("vehicles.pdf", b"%PDF".to_vec());
        let err = parse(&file).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFileType { .. }));
        assert_eq!(
            err.to_string(),
            "Unsupported file type: .pdf. Please upload a CSV, Excel, JSON, XML, or text file."
        );
    }

    #[test]
    fn test_parse_csv() {
        let parsed = parse(&UploadedFile::new("inventory.csv", SAMPLE_CSV)).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.headers[0], "VIN");
        assert_eq!(parsed.headers.len(), 9);
        assert_eq!(
            parsed.records[1].get("Make"),
            Some(&FieldValue::from("Kia"))
        );
    }

    #[test]
    fn test_parse_csv_strips_bom() {
        let content = format!("\u{feff}{}", SAMPLE_CSV);
        let parsed = parse(&UploadedFile::new("inventory.csv", content)).unwrap();
        assert_eq!(parsed.headers[0], "VIN");
    }

    #[test]
    fn test_parse_text_sniffs_tabs() {
        let content = "VIN\tMake\tModel\tYear\nWBAPM7339AE111111\tBMW\t535i\t2021\n";
        let parsed = parse(&UploadedFile::new("export.txt", content)).unwrap();
        assert_eq!(parsed.headers, vec!["VIN", "Make", "Model", "Year"]);
        assert_eq!(
            parsed.records[0].get("Model"),
            Some(&FieldValue::from("535i"))
        );
    }

    #[test]
    fn test_sniff_delimiter_defaults_to_comma() {
        assert_eq!(sniff_delimiter("single"), b',');
        assert_eq!(sniff_delimiter("a;b;c"), b';');
        assert_eq!(sniff_delimiter("a|b,c|d"), b'|');
    }

    #[test]
    fn test_parse_json_array_keeps_types() {
        let content = r#"[
            {"vehicleId": "JN8AS5MT4CW444444", "manufacturer": "Nissan", "modelYear": 2019, "gpsLatitude": null}
        ]"#;
        let parsed = parse(&UploadedFile::new("fleet.json", content)).unwrap();
        assert_eq!(parsed.headers, vec!["vehicleId", "manufacturer", "modelYear", "gpsLatitude"]);
        assert_eq!(
            parsed.records[0].get("modelYear"),
            Some(&FieldValue::Number(2019.0))
        );
        assert_eq!(parsed.records[0].get("gpsLatitude"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_parse_json_data_envelope() {
        let content = r#"{"data": [{"VIN": "A"}, {"VIN": "B"}]}"#;
        let parsed = parse(&UploadedFile::new("fleet.json", content)).unwrap();
        assert_eq!(parsed.records.len(), 2);
    }

    #[test]
    fn test_parse_json_rejects_nested_values() {
        let content = r#"[{"VIN": "A", "owner": {"name": "x"}}]"#;
        let err = parse(&UploadedFile::new("fleet.json", content)).unwrap_err();
        assert!(matches!(err, ParseError::InvalidRecord { row: 1, .. }));
        assert!(err.to_string().starts_with("Record 1:"));

        let content = r#"[{"VIN": "A"}, "B"]"#;
        let err = parse(&UploadedFile::new("fleet.json", content)).unwrap_err();
        assert!(matches!(err, ParseError::InvalidRecord { row: 2, .. }));
    }

    #[test]
    fn test_parse_json_empty_array_is_empty_error() {
        let err = parse(&UploadedFile::new("fleet.json", "[]")).unwrap_err();
        assert!(matches!(err, ParseError::Empty));
    }

    #[test]
    fn test_parse_xml_elements_and_attributes() {
        let content = r#"<?xml version="1.0"?>
<vehicles>
  <vehicle id="17">
    <VIN>3VWDX7AJ5BM012345</VIN>
    <Make>Volkswagen</Make>
    <Model> Jetta </Model>
  </vehicle>
  <vehicle>
    <VIN>19UYA31581L000000</VIN>
    <Make>Acura</Make>
    <Model>TL</Model>
  </vehicle>
</vehicles>"#;
        let parsed = parse(&UploadedFile::new("fleet.xml", content)).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.headers, vec!["id", "VIN", "Make", "Model"]);
        assert_eq!(
            parsed.records[0].get("Model"),
            Some(&FieldValue::from("Jetta"))
        );
    }

    #[test]
    fn test_parse_invalid_xml() {
        let err = parse(&UploadedFile::new("fleet.xml", "<vehicles>")).unwrap_err();
        assert!(matches!(err, ParseError::Xml(_)));
    }

    #[test]
    fn test_parse_excel_workbook() {
        let content = include_bytes!("testdata/vehicles.xlsx").to_vec();
        let parsed = parse(&UploadedFile::new("vehicles.xlsx", content)).unwrap();

        assert_eq!(parsed.headers, vec!["VIN", "Make", "Column3", "Year", "In Service"]);
        // the blank third row is skipped
        assert_eq!(parsed.records.len(), 2);

        let first = &parsed.records[0];
        assert_eq!(first.get("VIN"), Some(&FieldValue::from("1HGCM82633A123456")));
        assert_eq!(first.get("Column3"), Some(&FieldValue::from("Fleet car")));
        assert_eq!(first.get("Year"), Some(&FieldValue::Number(2022.0)));
        assert_eq!(first.get("In Service"), Some(&FieldValue::Bool(true)));

        let second = &parsed.records[1];
        assert_eq!(second.get("Make"), Some(&FieldValue::from("BMW")));
        assert_eq!(second.get("Column3"), Some(&FieldValue::Null));
        assert_eq!(second.get("Year"), Some(&FieldValue::Number(2019.5)));
        assert_eq!(second.get("In Service"), Some(&FieldValue::Bool(false)));

        assert!(parsed
            .suggested_mapping
            .contains(&("Year".to_string(), TargetField::Year)));
    }

    #[test]
    fn test_excel_cell_conversion() {
        assert_eq!(excel_value(&Data::Int(42)), FieldValue::Number(42.0));
        assert_eq!(excel_value(&Data::Float(1.5)), FieldValue::Number(1.5));
        assert_eq!(excel_value(&Data::Bool(true)), FieldValue::Bool(true));
        assert_eq!(excel_value(&Data::Empty), FieldValue::Null);
        assert_eq!(
            excel_value(&Data::Error(calamine::CellErrorType::Div0)),
            FieldValue::Null
        );
        assert_eq!(
            excel_value(&Data::String("Main Lot".to_string())),
            FieldValue::from("Main Lot")
        );
    }

    #[test]
    fn test_parse_garbage_excel_fails() {
        let err = parse(&UploadedFile::new("fleet.xlsx", b"not a workbook".to_vec())).unwrap_err();
        assert!(matches!(err, ParseError::Excel(_)));
    }

    #[test]
    fn test_suggest_mapping_for_known_layouts() {
        let csv_headers: Vec<String> = [
            "Vehicle_ID", "Manufacturer", "Model", "Year", "Current_Status", "Current_Location",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let suggestions = suggest_mapping(&csv_headers);
        assert!(suggestions.contains(&("Vehicle_ID".to_string(), TargetField::Vin)));
        assert!(suggestions.contains(&("Current_Location".to_string(), TargetField::Location)));

        let excel_headers: Vec<String> = ["VIN", "Lot", "Lat", "Lng", "Notes"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let suggestions = suggest_mapping(&excel_headers);
        assert_eq!(suggestions.len(), 4);
        assert!(suggestions.contains(&("Lng".to_string(), TargetField::LocationLng)));
    }

    #[test]
    fn test_suggest_mapping_first_header_wins() {
        let headers = vec!["VIN".to_string(), "vehicle id".to_string()];
        assert_eq!(
            suggest_mapping(&headers),
            vec![("VIN".to_string(), TargetField::Vin)]
        );
    }
}
