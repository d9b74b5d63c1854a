// ==============================================================================
// error.rs - Analysis Error Types
// ==============================================================================
// Description: Errors surfaced at the pipeline boundary (mapped to HTTP 400)
// Author: Matt Barham
// Created: 2026-02-02
// Modified: 2026-02-06
// Version: 1.0.0
// ==============================================================================

use thiserror::Error;

use crate::parsers::VcfParseError;

/// Caller-facing analysis failures
///
/// Every variant describes a problem with the request itself; unexpected
/// internal failures never travel through this type.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid variant file: {0}")]
    InvalidInput(#[from] VcfParseError),

    #[error("Unsupported drug(s): {}. Supported drugs: {}", .drugs.join(", "), .supported.join(", "))]
    UnsupportedDrug {
        drugs: Vec<String>,
        supported: Vec<String>,
    },

    #[error("{0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_drug_message_names_every_drug() {
        let err = AnalysisError::UnsupportedDrug {
            drugs: vec!["IBUPROFEN".to_string(), "ASPIRIN".to_string()],
            supported: vec!["CODEINE".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("IBUPROFEN"));
        assert!(msg.contains("ASPIRIN"));
        assert!(msg.contains("CODEINE"));
    }

    #[test]
    fn test_parse_error_converts_to_invalid_input() {
        let err: AnalysisError = VcfParseError::Empty.into();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
        assert_eq!(err.to_string(), "Invalid variant file: Variant file is empty");
    }
}
