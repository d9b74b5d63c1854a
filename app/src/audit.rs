// ==============================================================================
// audit.rs - Audit Logging for Pharmacogenomic Analyses
// ==============================================================================
// Description: Structured audit trail emitted as tracing events (target "audit")
// Author: Matt Barham
// Created: 2026-02-02
// Modified: 2026-02-07
// Version: 1.1.0
// ==============================================================================
// Audit events never carry variant contents, only counts, drug names and the
// upload fingerprint. Nothing is persisted by this module; route the "audit"
// target to durable storage through the subscriber if required.
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Request lifecycle
    AnalysisAccepted,
    AnalysisCompleted,
    AnalysisRejected,

    // File handling
    FileValidated,
    FileRejected,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::AnalysisAccepted => "analysis_accepted",
            AuditEventType::AnalysisCompleted => "analysis_completed",
            AuditEventType::AnalysisRejected => "analysis_rejected",
            AuditEventType::FileValidated => "file_validated",
            AuditEventType::FileRejected => "file_rejected",
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warning,
}

#[derive(Debug, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub patient_id: Option<String>,
    pub resource: Option<String>,
    pub details: serde_json::Value,
    pub severity: LogSeverity,
}

impl AuditEvent {
    pub fn new(
        event_type: AuditEventType,
        patient_id: Option<String>,
        resource: Option<String>,
        details: serde_json::Value,
    ) -> Self {
        let severity = match event_type {
            AuditEventType::AnalysisRejected | AuditEventType::FileRejected => LogSeverity::Warning,
            _ => LogSeverity::Info,
        };

        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            patient_id,
            resource,
            details,
            severity,
        }
    }

    /// Emit the event on the "audit" tracing target
    pub fn emit(&self) {
        let patient = self.patient_id.as_deref().unwrap_or("-");
        let resource = self.resource.as_deref().unwrap_or("-");

        match self.severity {
            LogSeverity::Info => info!(
                target: "audit",
                event_id = %self.id,
                timestamp = %self.timestamp.to_rfc3339(),
                patient_id = patient,
                resource = resource,
                details = %self.details,
                "{}",
                self.event_type.as_str()
            ),
            LogSeverity::Warning => warn!(
                target: "audit",
                event_id = %self.id,
                timestamp = %self.timestamp.to_rfc3339(),
                patient_id = patient,
                resource = resource,
                details = %self.details,
                "{}",
                self.event_type.as_str()
            ),
        }
    }
}

/// Convenience function to build and emit an audit event
pub fn log_event(
    event_type: AuditEventType,
    patient_id: Option<&str>,
    resource: Option<String>,
    details: serde_json::Value,
) {
    AuditEvent::new(event_type, patient_id.map(str::to_string), resource, details).emit();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_creation() {
        let event = AuditEvent::new(
            AuditEventType::AnalysisAccepted,
            Some("PATIENT_001".to_string()),
            Some("sample.vcf".to_string()),
            serde_json::json!({
                "drugs": ["CODEINE"],
                "size": 1024
            }),
        );

        assert_eq!(event.patient_id.as_deref(), Some("PATIENT_001"));
        assert_eq!(event.resource.as_deref(), Some("sample.vcf"));
        assert_eq!(event.severity, LogSeverity::Info);
        event.emit();
    }

    #[test]
    fn test_rejection_severity() {
        let event = AuditEvent::new(
            AuditEventType::FileRejected,
            None,
            None,
            serde_json::json!({}),
        );

        assert_eq!(event.severity, LogSeverity::Warning);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "file_rejected");
    }
}
