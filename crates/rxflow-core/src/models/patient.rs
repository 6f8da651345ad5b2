//! Patient profile models, consumed read-only from an external provider.

use serde::{Deserialize, Serialize};

/// Threshold below which eGFR is treated as renal impairment.
const RENAL_IMPAIRMENT_EGFR: f64 = 60.0;

/// A patient's clinical profile as supplied by the patient-data collaborator.
///
/// The core never persists or mutates this; it is fetched per verification
/// pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientProfile {
    pub patient_id: String,
    /// Recorded allergens (free-form, e.g. "penicillin", "sulfa")
    pub allergies: Vec<String>,
    /// Active medications as "drug strength frequency" entries
    /// (e.g. "metformin 500mg BID"); the leading token is the drug key
    pub current_medications: Vec<String>,
    pub demographics: Demographics,
}

/// Demographic fields used only for risk annotation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Demographics {
    pub age: Option<u32>,
    pub weight_kg: Option<f64>,
    /// Serum creatinine (mg/dL)
    pub creatinine: Option<f64>,
    /// Estimated glomerular filtration rate (mL/min/1.73m2)
    pub egfr: Option<f64>,
}

impl PatientProfile {
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            allergies: Vec::new(),
            current_medications: Vec::new(),
            demographics: Demographics::default(),
        }
    }
}

impl Demographics {
    /// Whether recorded renal markers warrant a dosing-review annotation.
    pub fn has_renal_impairment(&self) -> bool {
        self.egfr.map(|e| e < RENAL_IMPAIRMENT_EGFR).unwrap_or(false)
    }
}
