//! Post-import summary

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::onboarding::committer::{ImportMessage, ImportResult};

/// What the user sees after an import attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub title: &'static str,
    pub success: bool,
    pub imported: usize,
    pub failed: usize,
    pub warning_count: usize,
    pub error_count: usize,
    pub timestamp: DateTime<Utc>,
    pub errors: Vec<ImportMessage>,
    pub warnings: Vec<ImportMessage>,
}

impl ImportSummary {
    pub fn from_result(result: &ImportResult) -> Self {
        let title = if result.success && result.failed == 0 && result.errors.is_empty() {
            "Import Completed Successfully"
        } else {
            "Import Completed with Issues"
        };

        Self {
            title,
            success: result.success,
            imported: result.imported,
            failed: result.failed,
            warning_count: result.warnings.len(),
            error_count: result.errors.len(),
            timestamp: result.timestamp,
            errors: result.errors.clone(),
            warnings: result.warnings.clone(),
        }
    }

    pub fn has_issues(&self) -> bool {
        self.error_count > 0 || self.warning_count > 0 || self.failed > 0
    }

    /// Timestamp in the local timezone, e.g. "2024-05-01 14:03:22"
    pub fn local_time(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

impl From<&ImportResult> for ImportSummary {
    fn from(result: &ImportResult) -> Self {
        Self::from_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(success: bool, imported: usize, failed: usize) -> ImportResult {
        ImportResult {
            success,
            imported,
            failed,
            errors: Vec::new(),
            warnings: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_clean_import_title() {
        let summary = ImportSummary::from_result(&result(true, 3, 0));
        assert_eq!(summary.title, "Import Completed Successfully");
        assert_eq!(summary.imported, 3);
        assert!(!summary.has_issues());
    }

    #[test]
    fn test_failed_import_title() {
        let summary = ImportSummary::from_result(&ImportResult::failure(2, "disk full"));
        assert_eq!(summary.title, "Import Completed with Issues");
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.error_count, 1);
        assert!(summary.has_issues());
    }

    #[test]
    fn test_warnings_are_counted() {
        let mut r = result(true, 1, 0);
        r.warnings
            .push(ImportMessage::new("Latitude could not be read as a number").at_row(1));
        let summary = ImportSummary::from(&r);
        assert_eq!(summary.title, "Import Completed Successfully");
        assert_eq!(summary.warning_count, 1);
        assert!(summary.has_issues());
    }
}
