//! Diagnostic codes and error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    /// A relationship-tagged test lacks `column_name`, `field` or a ref
    JoinMissingArgument,

    /// A relationship test argument is present but not a string
    JoinInvalidArgument,

    /// More than one column of a model is flagged as primary key
    PrimaryKeyConflict,

    /// Model has no primary key column (joins will not resolve in Cube)
    PrimaryKeyMissing,

    /// Column data type could not be mapped to a dimension type
    ColumnTypeFallback,

    /// Cube template written to disk
    TemplateWritten,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JoinMissingArgument => "JOIN_MISSING_ARGUMENT",
            Self::JoinInvalidArgument => "JOIN_INVALID_ARGUMENT",
            Self::PrimaryKeyConflict => "PRIMARY_KEY_CONFLICT",
            Self::PrimaryKeyMissing => "PRIMARY_KEY_MISSING",
            Self::ColumnTypeFallback => "COLUMN_TYPE_FALLBACK",
            Self::TemplateWritten => "TEMPLATE_WRITTEN",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - generated output may be incomplete
    Warn,

    /// Error - a model could not be generated
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Source location in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path relative to project root
    pub file: String,
}

impl Location {
    /// Location of a project file
    pub fn new(file: impl Into<String>) -> Self {
        Self { file: file.into() }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    pub location: Option<Location>,

    /// Model the diagnostic belongs to
    pub model: Option<String>,

    /// Test node the diagnostic belongs to
    pub test: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            model: None,
            test: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the owning model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the originating test
    pub fn with_test(mut self, test: impl Into<String>) -> Self {
        self.test = Some(test.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        assert_eq!(DiagnosticCode::JoinMissingArgument.as_str(), "JOIN_MISSING_ARGUMENT");
        assert_eq!(DiagnosticCode::PrimaryKeyConflict.as_str(), "PRIMARY_KEY_CONFLICT");
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::new(
            DiagnosticCode::JoinMissingArgument,
            Severity::Warn,
            "Test 'relationships_orders_customer_id' is missing kwarg 'field'",
        )
        .with_model("orders")
        .with_location(Location::new("models/core/orders.sql"));

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("JOIN_MISSING_ARGUMENT"));
        assert!(json.contains("\"warn\""));
        assert!(json.contains("orders.sql"));
    }

    #[test]
    fn serialized_codes_match_as_str() {
        let codes = [
            DiagnosticCode::JoinMissingArgument,
            DiagnosticCode::JoinInvalidArgument,
            DiagnosticCode::PrimaryKeyConflict,
            DiagnosticCode::PrimaryKeyMissing,
            DiagnosticCode::ColumnTypeFallback,
            DiagnosticCode::TemplateWritten,
        ];
        for code in codes {
            assert_eq!(serde_json::to_value(code).unwrap(), serde_json::json!(code.as_str()));
        }
    }
}
