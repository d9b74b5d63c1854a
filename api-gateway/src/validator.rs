// ==============================================================================
// validator.rs - File Upload Validation (API Gateway)
// ==============================================================================
// Description: Validates uploaded variant files at the API layer before parsing
// Author: Matt Barham
// Created: 2026-02-03
// Modified: 2026-02-11
// Version: 2.1.0
// Security: Allowlist-only file types, magic number verification
// ==============================================================================
// The 5 MB size limit, VCF structure and the upload fingerprint are owned by
// the pipeline; this layer only rejects names and containers that are never
// acceptable.
// ==============================================================================

use anyhow::Result;
use axum::body::Bytes;
use pgx_processor::audit::{self, AuditEventType};
use std::collections::HashMap;
use tracing::{debug, info};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug)]
pub struct ValidatedFile {
    pub original_name: String,
    pub safe_name: String,
    pub extension: String,
    pub size: usize,
}

pub struct FileValidator {
    allowed_types: HashMap<&'static str, &'static [u8]>,
}

impl FileValidator {
    pub fn new() -> Self {
        let mut allowed_types: HashMap<&'static str, &'static [u8]> = HashMap::new();

        // Plain-text VCF (no magic number)
        allowed_types.insert("vcf", &[]);

        // Gzip compressed VCF
        allowed_types.insert("vcf.gz", &GZIP_MAGIC);

        // Plain-text VCF exported with a .txt name
        allowed_types.insert("txt", &[]);

        Self { allowed_types }
    }

    /// Validate a variant file upload, emitting an audit event either way
    pub fn validate_upload(
        &self,
        filename: &str,
        file_data: &Bytes,
        patient_id: Option<&str>,
    ) -> Result<ValidatedFile> {
        match self.check(filename, file_data) {
            Ok(validated) => {
                audit::log_event(
                    AuditEventType::FileValidated,
                    patient_id,
                    Some(validated.safe_name.clone()),
                    serde_json::json!({
                        "size": validated.size,
                        "extension": validated.extension,
                    }),
                );
                Ok(validated)
            }
            Err(e) => {
                audit::log_event(
                    AuditEventType::FileRejected,
                    patient_id,
                    None,
                    serde_json::json!({
                        "size": file_data.len(),
                        "reason": e.to_string(),
                    }),
                );
                Err(e)
            }
        }
    }

    fn check(&self, filename: &str, file_data: &Bytes) -> Result<ValidatedFile> {
        info!("Validating upload: {} ({} bytes)", filename, file_data.len());

        // 1. Filename sanitization
        let safe_name = self.sanitize_filename(filename)?;
        debug!("Sanitized filename: {}", safe_name);

        // 2. Extension check (allowlist)
        let ext = self.get_extension(&safe_name)?;
        let Some(expected_magic) = self.allowed_types.get(ext.as_str()) else {
            anyhow::bail!(
                "Invalid file type: .{} (allowed: .vcf, .vcf.gz, .txt)",
                ext
            );
        };
        debug!("Extension check passed: .{}", ext);

        // 3. Magic number verification
        if !expected_magic.is_empty() && !file_data.starts_with(expected_magic) {
            anyhow::bail!("Magic number mismatch for .{} file", ext);
        }

        Ok(ValidatedFile {
            original_name: filename.to_string(),
            safe_name,
            extension: ext,
            size: file_data.len(),
        })
    }

    fn sanitize_filename(&self, name: &str) -> Result<String> {
        // Remove path separators, null bytes, control characters
        let safe = name
            .replace(['/', '\\', '\0'], "_")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.' || *c == '-')
            .collect::<String>();

        // Limit length to 255 characters
        let truncated: String = safe.chars().take(255).collect();

        if truncated.is_empty() {
            anyhow::bail!("Invalid filename after sanitization");
        }

        // Must not start with . (hidden file)
        if truncated.starts_with('.') {
            anyhow::bail!("Filename cannot start with '.'");
        }

        Ok(truncated)
    }

    fn get_extension(&self, filename: &str) -> Result<String> {
        let lower = filename.to_lowercase();

        // Compound extension first
        if lower.ends_with(".vcf.gz") {
            return Ok("vcf.gz".to_string());
        }

        match lower.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => Ok(ext.to_string()),
            _ => anyhow::bail!("No file extension found"),
        }
    }
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        let validator = FileValidator::new();

        assert_eq!(
            validator.sanitize_filename("patient_001.vcf").unwrap(),
            "patient_001.vcf"
        );

        assert_eq!(
            validator.sanitize_filename("../../../etc/passwd").unwrap(),
            ".._.._.._etc_passwd"
        );

        assert!(validator.sanitize_filename(".hidden.vcf").is_err());
    }

    #[test]
    fn test_get_extension() {
        let validator = FileValidator::new();

        assert_eq!(validator.get_extension("sample.VCF.GZ").unwrap(), "vcf.gz");
        assert_eq!(validator.get_extension("sample.vcf").unwrap(), "vcf");
        assert_eq!(validator.get_extension("export.txt").unwrap(), "txt");
        assert!(validator.get_extension("noextension").is_err());
    }

    #[test]
    fn test_disallowed_extension_rejected() {
        let validator = FileValidator::new();
        let data = Bytes::from_static(b"##fileformat=VCFv4.2\n");

        let err = validator
            .validate_upload("report.pdf", &data, None)
            .unwrap_err();
        assert!(err.to_string().contains("Invalid file type: .pdf"));
    }

    #[test]
    fn test_gzip_magic_required() {
        let validator = FileValidator::new();
        let plain = Bytes::from_static(b"##fileformat=VCFv4.2\n");
        assert!(validator.validate_upload("sample.vcf.gz", &plain, None).is_err());

        let gz = Bytes::from_static(&[0x1f, 0x8b, 0x08, 0x00]);
        let validated = validator.validate_upload("sample.vcf.gz", &gz, Some("P1")).unwrap();
        assert_eq!(validated.extension, "vcf.gz");
        assert_eq!(validated.size, 4);
    }

    #[test]
    fn test_plain_vcf_accepted() {
        let validator = FileValidator::new();
        let data = Bytes::from_static(b"##fileformat=VCFv4.2\n");
        let validated = validator.validate_upload("Patient 001.vcf", &data, None).unwrap();
        assert_eq!(validated.safe_name, "Patient001.vcf");
        assert_eq!(validated.original_name, "Patient 001.vcf");
    }
}
