//! Import wizard: Upload -> Mapping -> Preview -> Import -> Summary
//!
//! Each operation checks the current step first, so the wizard can never
//! skip ahead. Failures leave it on a step the user can retry from.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::core::api::{ApiError, FleetApi};
use crate::onboarding::committer::ImportResult;
use crate::onboarding::mapper::{FieldMapper, FieldMapping, MappingError};
use crate::onboarding::parser::{ParseError, UploadedFile};
use crate::onboarding::preview::{RowSelector, DEFAULT_PAGE_SIZE};
use crate::onboarding::record::MappedRecord;
use crate::onboarding::summary::ImportSummary;
use crate::onboarding::validator::{self, ValidationIssue};

/// Banner shown when the backend could not parse an upload
pub const PARSE_FAILED_MESSAGE: &str =
    "Failed to parse the uploaded file. Please check the format and try again.";

/// Banner shown when the backend call for an import fails outright
pub const IMPORT_FAILED_MESSAGE: &str = "Failed to import the data. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WizardStep {
    Upload,
    Mapping,
    Preview,
    Import,
    Summary,
}

impl WizardStep {
    pub fn all() -> &'static [WizardStep] {
        &[
            WizardStep::Upload,
            WizardStep::Mapping,
            WizardStep::Preview,
            WizardStep::Import,
            WizardStep::Summary,
        ]
    }

    /// Position in the flow, starting at 1
    pub fn number(&self) -> usize {
        WizardStep::all()
            .iter()
            .position(|s| s == self)
            .map_or(0, |i| i + 1)
    }

    pub fn label(&self) -> &'static str {
        match self {
            WizardStep::Upload => "Upload",
            WizardStep::Mapping => "Mapping",
            WizardStep::Preview => "Preview",
            WizardStep::Import => "Import",
            WizardStep::Summary => "Summary",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("cannot {action} during the {step} step")]
    InvalidStep {
        action: &'static str,
        step: WizardStep,
    },

    #[error(transparent)]
    UnsupportedFile(ParseError),

    #[error("Failed to parse the uploaded file: {0}")]
    Parse(#[source] ApiError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("No rows selected for import")]
    NothingSelected,

    #[error("{message}")]
    ImportFailed {
        message: String,
        result: Option<ImportResult>,
    },
}

/// Drives one import from upload to summary against a backend
pub struct ImportWizard<A: FleetApi> {
    api: A,
    step: WizardStep,
    page_size: usize,
    reference_year: Option<i32>,
    file_name: Option<String>,
    file_error: Option<String>,
    error: Option<String>,
    mapper: Option<FieldMapper>,
    mapping: Option<FieldMapping>,
    selector: Option<RowSelector>,
    result: Option<ImportResult>,
}

impl<A: FleetApi> ImportWizard<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            step: WizardStep::Upload,
            page_size: DEFAULT_PAGE_SIZE,
            reference_year: None,
            file_name: None,
            file_error: None,
            error: None,
            mapper: None,
            mapping: None,
            selector: None,
            result: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Validate years against a fixed calendar year instead of today's
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Inline error under the file picker
    pub fn file_error(&self) -> Option<&str> {
        self.file_error.as_deref()
    }

    /// Page-level error banner
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn mapper(&self) -> Option<&FieldMapper> {
        self.mapper.as_ref()
    }

    pub fn mapper_mut(&mut self) -> Option<&mut FieldMapper> {
        self.mapper.as_mut()
    }

    /// Mapping accepted by the last successful submit
    pub fn mapping(&self) -> Option<&FieldMapping> {
        self.mapping.as_ref()
    }

    pub fn selector(&self) -> Option<&RowSelector> {
        self.selector.as_ref()
    }

    pub fn selector_mut(&mut self) -> Option<&mut RowSelector> {
        self.selector.as_mut()
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        self.selector.as_ref().map(|s| s.issues()).unwrap_or(&[])
    }

    pub fn result(&self) -> Option<&ImportResult> {
        self.result.as_ref()
    }

    pub fn summary(&self) -> Option<ImportSummary> {
        self.result.as_ref().map(ImportSummary::from_result)
    }

    fn expect_step(&self, expected: WizardStep, action: &'static str) -> Result<(), WizardError> {
        if self.step != expected {
            return Err(WizardError::InvalidStep {
                action,
                step: self.step,
            });
        }
        Ok(())
    }

    /// Parse an upload and move to the mapping step
    pub fn upload(&mut self, file: UploadedFile) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Upload, "upload a file")?;
        self.file_error = None;
        self.error = None;

        if let Err(e) = file.format() {
            self.file_error = Some(e.to_string());
            return Err(WizardError::UnsupportedFile(e));
        }

        let parsed = match self.api.parse_file(&file) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "upload could not be parsed");
                self.error = Some(PARSE_FAILED_MESSAGE.to_string());
                return Err(WizardError::Parse(e));
            }
        };

        tracing::info!(
            file = %file.name,
            rows = parsed.records.len(),
            columns = parsed.headers.len(),
            suggested = parsed.suggested_mapping.len(),
            "file parsed"
        );

        self.file_name = Some(file.name);
        self.mapper = Some(FieldMapper::new(parsed));
        self.step = WizardStep::Mapping;
        Ok(())
    }

    /// Accept the current mapping, validate the mapped rows, and show the preview
    pub fn submit_mapping(&mut self) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Mapping, "submit a mapping")?;
        let mapper = self.mapper.as_ref().ok_or(WizardError::InvalidStep {
            action: "submit a mapping",
            step: self.step,
        })?;

        let mapping = mapper.submit()?;
        let records = mapper.apply(&mapping);
        let issues = match self.reference_year {
            Some(year) => validator::validate_as_of(&records, year),
            None => validator::validate(&records),
        };

        let selector = RowSelector::with_page_size(records, issues, self.page_size);
        tracing::info!(
            rows = selector.len(),
            errors = selector.error_count(),
            warnings = selector.warning_count(),
            blocked = selector.blocked_rows().len(),
            "mapping applied"
        );

        self.error = None;
        self.mapping = Some(mapping);
        self.selector = Some(selector);
        self.step = WizardStep::Preview;
        Ok(())
    }

    /// Commit the selected rows through the backend
    ///
    /// On success the wizard moves to the summary. On failure it returns to
    /// the preview with an error banner and the selection intact.
    pub fn confirm_import(&mut self) -> Result<&ImportResult, WizardError> {
        self.expect_step(WizardStep::Preview, "import")?;
        let selector = self.selector.as_ref().ok_or(WizardError::InvalidStep {
            action: "import",
            step: self.step,
        })?;

        // Selection never holds blocked rows; filter again by row index anyway
        let records: Vec<MappedRecord> = selector
            .confirm()
            .into_iter()
            .filter(|(row, _)| !selector.is_blocked(*row))
            .map(|(_, record)| record)
            .collect();

        if records.is_empty() {
            return Err(WizardError::NothingSelected);
        }

        self.step = WizardStep::Import;
        self.error = None;

        match self.api.import_vehicles(&records) {
            Ok(result) if result.success => {
                self.step = WizardStep::Summary;
                Ok(self.result.insert(result))
            }
            Ok(result) => {
                let message = result
                    .errors
                    .first()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "Failed to import data".to_string());
                self.error = Some(message.clone());
                self.step = WizardStep::Preview;
                Err(WizardError::ImportFailed {
                    message,
                    result: Some(result),
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "import request failed");
                self.error = Some(IMPORT_FAILED_MESSAGE.to_string());
                self.step = WizardStep::Preview;
                Err(WizardError::ImportFailed {
                    message: format!("{} ({})", IMPORT_FAILED_MESSAGE, e),
                    result: None,
                })
            }
        }
    }

    /// Step back: Preview keeps the mapping, Mapping discards the upload
    pub fn back(&mut self) -> Result<(), WizardError> {
        match self.step {
            WizardStep::Preview => {
                self.selector = None;
                self.error = None;
                self.step = WizardStep::Mapping;
                Ok(())
            }
            WizardStep::Mapping => {
                self.start_over();
                Ok(())
            }
            step => Err(WizardError::InvalidStep {
                action: "go back",
                step,
            }),
        }
    }

    /// Discard everything and return to the upload step
    pub fn start_over(&mut self) {
        self.step = WizardStep::Upload;
        self.file_name = None;
        self.file_error = None;
        self.error = None;
        self.mapper = None;
        self.mapping = None;
        self.selector = None;
        self.result = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::api::LocalApi;
    use crate::core::store::{MemoryStore, StoreError, VehicleStore};
    use crate::entities::VehicleRecord;
    use crate::onboarding::committer::ImportCommitter;
    use crate::onboarding::mapper::MappingSource;
    use crate::onboarding::record::TargetField;

    const THREE_ROWS: &str = "\
VIN,Make,Model,Year,Location
VIN0000001,Honda,Accord,2020,Main Lot
VIN0000002,,Civic,2021,Main Lot
VIN0000003,Ford,Focus,2019,Overflow Lot
";

    struct FullStore;

    impl VehicleStore for FullStore {
        fn list(&self) -> Result<Vec<VehicleRecord>, StoreError> {
            Ok(Vec::new())
        }

        fn append(&mut self, _records: &[VehicleRecord]) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("quota exceeded".to_string()))
        }

        fn update(&mut self, _vehicle: &VehicleRecord) -> Result<bool, StoreError> {
            Ok(false)
        }

        fn clear(&mut self) -> Result<(), StoreError> {
            Ok(())
        }

        fn describe(&self) -> String {
            "full".to_string()
        }
    }

    fn wizard() -> ImportWizard<LocalApi> {
        let api = LocalApi::new(Box::new(MemoryStore::new()), ImportCommitter::default());
        ImportWizard::new(api).with_reference_year(2024)
    }

    fn csv(content: &str) -> UploadedFile {
        UploadedFile::new("vehicles.csv", content)
    }

    #[test]
    fn test_full_flow_skips_blocked_row() {
        let mut wizard = wizard();
        wizard.upload(csv(THREE_ROWS)).unwrap();
        assert_eq!(wizard.step(), WizardStep::Mapping);
        assert_eq!(wizard.file_name(), Some("vehicles.csv"));

        wizard.submit_mapping().unwrap();
        assert_eq!(wizard.step(), WizardStep::Preview);

        let selector = wizard.selector().unwrap();
        assert!(selector.is_blocked(1));
        assert_eq!(selector.selected_rows().len(), 2);

        let result = wizard.confirm_import().unwrap();
        assert!(result.success);
        assert_eq!(result.imported, 2);
        assert_eq!(wizard.step(), WizardStep::Summary);

        let summary = wizard.summary().unwrap();
        assert_eq!(summary.title, "Import Completed Successfully");

        let stored = wizard.api().fetch_vehicles().unwrap();
        let vins: Vec<&str> = stored.iter().map(|v| v.vin.as_str()).collect();
        assert_eq!(vins, vec!["VIN0000001", "VIN0000003"]);
    }

    #[test]
    fn test_unsupported_file_stays_on_upload() {
        let mut wizard = wizard();
        let err = wizard
            .upload(UploadedFile::new("vehicles.pdf", "x"))
            .unwrap_err();
        assert!(matches!(err, WizardError::UnsupportedFile(_)));
        assert_eq!(wizard.step(), WizardStep::Upload);
        assert!(wizard.file_error().unwrap().contains("Unsupported file type: .pdf"));
        assert!(wizard.error().is_none());
    }

    #[test]
    fn test_parse_failure_sets_banner() {
        let mut wizard = wizard();
        let err = wizard
            .upload(UploadedFile::new("vehicles.json", "{broken"))
            .unwrap_err();
        assert!(matches!(err, WizardError::Parse(_)));
        assert_eq!(wizard.step(), WizardStep::Upload);
        assert_eq!(wizard.error(), Some(PARSE_FAILED_MESSAGE));
    }

    #[test]
    fn test_unmapped_vin_blocks_submit() {
        let mut wizard = wizard();
        wizard.upload(csv(THREE_ROWS)).unwrap();
        wizard.mapper_mut().unwrap().unset(TargetField::Vin);

        let err = wizard.submit_mapping().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please map the following required fields: VIN"
        );
        assert_eq!(wizard.step(), WizardStep::Mapping);
        assert!(wizard.selector().is_none());
    }

    #[test]
    fn test_cannot_skip_ahead() {
        let mut wizard = wizard();
        assert!(matches!(
            wizard.submit_mapping(),
            Err(WizardError::InvalidStep {
                step: WizardStep::Upload,
                ..
            })
        ));
        assert!(wizard.confirm_import().is_err());
        assert!(wizard.back().is_err());
    }

    #[test]
    fn test_back_from_preview_keeps_mapping() {
        let mut wizard = wizard();
        wizard.upload(csv(THREE_ROWS)).unwrap();
        wizard
            .mapper_mut()
            .unwrap()
            .set(TargetField::Color, MappingSource::Ignore)
            .unwrap();
        wizard.submit_mapping().unwrap();

        wizard.back().unwrap();
        assert_eq!(wizard.step(), WizardStep::Mapping);
        assert!(wizard.selector().is_none());
        assert_eq!(
            wizard.mapper().unwrap().source_for(TargetField::Color),
            Some(&MappingSource::Ignore)
        );

        wizard.back().unwrap();
        assert_eq!(wizard.step(), WizardStep::Upload);
        assert!(wizard.mapper().is_none());
    }

    #[test]
    fn test_nothing_selected() {
        let mut wizard = wizard();
        wizard.upload(csv(THREE_ROWS)).unwrap();
        wizard.submit_mapping().unwrap();
        wizard.selector_mut().unwrap().toggle_all();

        assert!(matches!(
            wizard.confirm_import(),
            Err(WizardError::NothingSelected)
        ));
        assert_eq!(wizard.step(), WizardStep::Preview);
    }

    #[test]
    fn test_store_failure_returns_to_preview() {
        let api = LocalApi::new(Box::new(FullStore), ImportCommitter::default());
        let mut wizard = ImportWizard::new(api).with_reference_year(2024);
        wizard.upload(csv(THREE_ROWS)).unwrap();
        wizard.submit_mapping().unwrap();

        let err = wizard.confirm_import().unwrap_err();
        match err {
            WizardError::ImportFailed { result, .. } => {
                let result = result.unwrap();
                assert!(!result.success);
                assert_eq!(result.imported, 0);
                assert_eq!(result.failed, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(wizard.step(), WizardStep::Preview);
        assert_eq!(wizard.error(), Some("Failed to import vehicles"));
        assert_eq!(wizard.selector().unwrap().selected_rows().len(), 2);
        assert!(wizard.api().fetch_vehicles().unwrap().is_empty());
    }

    #[test]
    fn test_start_over_from_summary() {
        let mut wizard = wizard();
        wizard.upload(csv(THREE_ROWS)).unwrap();
        wizard.submit_mapping().unwrap();
        wizard.confirm_import().unwrap();

        wizard.start_over();
        assert_eq!(wizard.step(), WizardStep::Upload);
        assert!(wizard.result().is_none());
        assert!(wizard.mapping().is_none());
    }

    #[test]
    fn test_step_numbers() {
        assert_eq!(WizardStep::Upload.number(), 1);
        assert_eq!(WizardStep::Summary.number(), 5);
    }
}
