//! External collaborator interfaces consumed by the engine.
//!
//! Patient data, audit logging and procurement live outside the core; the
//! engine reaches them only through these traits.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;
use thiserror::Error;

use crate::models::PatientProfile;

/// Patient data fetch failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatientLookupError {
    #[error("patient not found: {0}")]
    NotFound(String),

    #[error("patient data source unavailable: {0}")]
    Unavailable(String),
}

/// Read-only source of patient profiles (EMR integration point).
pub trait PatientDataProvider: Send + Sync {
    fn get_patient_data(&self, patient_id: &str) -> Result<PatientProfile, PatientLookupError>;
}

/// In-memory patient directory: the reference provider implementation and
/// the test double.
#[derive(Default)]
pub struct InMemoryPatientDirectory {
    patients: RwLock<HashMap<String, PatientProfile>>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: PatientProfile) {
        let mut patients = self.patients.write().unwrap_or_else(|e| e.into_inner());
        patients.insert(profile.patient_id.clone(), profile);
    }
}

impl PatientDataProvider for InMemoryPatientDirectory {
    fn get_patient_data(&self, patient_id: &str) -> Result<PatientProfile, PatientLookupError> {
        let patients = self.patients.read().unwrap_or_else(|e| e.into_inner());
        patients
            .get(patient_id)
            .cloned()
            .ok_or_else(|| PatientLookupError::NotFound(patient_id.to_string()))
    }
}

/// Events emitted to the audit trail.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    OrderVerified {
        order_id: String,
        patient_id: String,
        approved: bool,
        alert_count: usize,
        status: String,
        timestamp: String,
    },
    OrderDispensed {
        order_id: String,
        operator_id: String,
        line_count: usize,
        record_hash: String,
        timestamp: String,
    },
    OrderCancelled {
        order_id: String,
        timestamp: String,
    },
}

impl AuditEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::OrderVerified { .. } => "order_verified",
            AuditEvent::OrderDispensed { .. } => "order_dispensed",
            AuditEvent::OrderCancelled { .. } => "order_cancelled",
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            AuditEvent::OrderVerified { order_id, .. }
            | AuditEvent::OrderDispensed { order_id, .. }
            | AuditEvent::OrderCancelled { order_id, .. } => order_id,
        }
    }
}

/// Fire-and-forget audit sink.
///
/// The signature is infallible on purpose: implementations swallow their own
/// failures (logging them) so a broken audit trail can never block or fail a
/// clinical decision.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Default sink: events go to the log.
#[derive(Debug, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, event: &AuditEvent) {
        match serde_json::to_string(event) {
            Ok(json) => log::info!("audit: {json}"),
            Err(err) => log::warn!("audit event for {} not serializable: {err}", event.order_id()),
        }
    }
}
