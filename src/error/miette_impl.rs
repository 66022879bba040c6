//! Miette integration for pretty error reporting.

use miette::{Diagnostic, Severity};
use thiserror::Error;

use super::{ErrorType, ReadError};

/// A diagnostic wrapper for read errors compatible with miette.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct ReadDiagnostic {
    /// The error message
    pub message: String,

    #[source]
    /// The underlying error source
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,

    #[help]
    /// Help text for the user
    pub help: Option<String>,

    #[diagnostic(severity)]
    /// Severity level
    pub severity: Severity,
}

fn help_for(error_type: ErrorType) -> &'static str {
    match error_type {
        ErrorType::SchemaError => "Check the header row and the target record's fields",
        ErrorType::CsvQuoteError => "Check quoting, or select a more lenient quote mode",
        ErrorType::CsvLimitExceeded | ErrorType::JsonSizeLimit => {
            "The input exceeds a configured guard rail; raise the limit if it is trusted"
        }
        ErrorType::JsonRootError => "Adjust the accepted JSON root shapes",
        ErrorType::JsonException | ErrorType::YamlException => "The input is malformed",
        ErrorType::JsonValidationError | ErrorType::JsonValidationFailed => {
            "An element was rejected by the configured validator"
        }
        ErrorType::YamlSecurityError => {
            "The document uses a YAML feature disabled by the security policy"
        }
        ErrorType::TypeRestriction => "Add the materialized type to the allowed type set",
    }
}

impl From<ReadError> for ReadDiagnostic {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::Violation(record) => ReadDiagnostic {
                message: format!(
                    "[{}] on '{}' at line {}",
                    record.error_type, record.file, record.line
                ),
                help: Some(help_for(record.error_type).into()),
                source: Some(record),
                severity: Severity::Error,
            },
            ReadError::Cancelled => ReadDiagnostic {
                message: "read cancelled".into(),
                source: None,
                help: None,
                severity: Severity::Warning,
            },
            other => ReadDiagnostic {
                message: other.to_string(),
                source: Some(Box::new(other)),
                help: None,
                severity: Severity::Error,
            },
        }
    }
}

impl From<ReadError> for miette::Report {
    fn from(e: ReadError) -> Self {
        miette::Report::new(ReadDiagnostic::from(e))
    }
}
