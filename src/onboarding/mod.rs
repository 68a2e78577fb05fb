//! Vehicle onboarding pipeline
//!
//! upload -> parse -> map -> validate -> select -> commit -> summarize

pub mod committer;
pub mod mapper;
pub mod parser;
pub mod preview;
pub mod record;
pub mod summary;
pub mod validator;
pub mod wizard;

pub use committer::{ImportCommitter, ImportDefaults, ImportMessage, ImportResult};
pub use mapper::{FieldMapper, FieldMapping, MappingError, MappingSource};
pub use parser::{FileFormat, ParseError, ParsedFile, UploadedFile};
pub use preview::RowSelector;
pub use record::{FieldValue, MappedRecord, SourceRecord, TargetField};
pub use summary::ImportSummary;
pub use validator::{Severity, ValidationIssue};
pub use wizard::{ImportWizard, WizardError, WizardStep};
