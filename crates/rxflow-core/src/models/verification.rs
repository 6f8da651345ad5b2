//! Verification findings and the dispensing decision derived from them.

use serde::{Deserialize, Serialize};

use super::drug::{Schedule, Severity};

/// A known interaction found between two drugs in the combined medication set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionFinding {
    /// The two drug names as supplied by the caller (not normalized)
    pub drugs: [String; 2],
    pub severity: Severity,
    pub description: String,
}

/// Outcome of dosage validation for one order line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DosageFinding {
    pub drug: String,
    /// Human-readable prescribed dose, e.g. "3000 once daily"
    pub prescribed: String,
    pub valid: bool,
    /// Normalized dose per day (dose x frequency multiplier)
    pub daily_dose: f64,
    pub recommendation: String,
}

/// A proposed drug matching a recorded patient allergen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllergyFinding {
    pub drug: String,
    /// The recorded allergen that matched
    pub allergen: String,
    pub severity: Severity,
}

/// Stock availability for one order line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryFinding {
    pub drug: String,
    pub requested: u32,
    pub available: u32,
    pub sufficient: bool,
}

/// Controlled-substance note for one order line. Never blocks by itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegulatoryFinding {
    pub drug: String,
    pub schedule: Schedule,
    pub note: String,
}

/// Collected output of one verification pass over an order.
///
/// Ephemeral: recomputed per pass, persisted only through the audit sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VerificationResult {
    pub interactions: Vec<InteractionFinding>,
    pub dosage: Vec<DosageFinding>,
    pub allergies: Vec<AllergyFinding>,
    pub inventory: Vec<InventoryFinding>,
    pub regulatory: Vec<RegulatoryFinding>,
}

impl VerificationResult {
    /// Any interaction severe enough to block dispensing.
    pub fn has_blocking_interaction(&self) -> bool {
        self.interactions.iter().any(|i| i.severity.is_blocking())
    }

    pub fn has_allergy(&self) -> bool {
        !self.allergies.is_empty()
    }

    pub fn has_insufficient_stock(&self) -> bool {
        self.inventory.iter().any(|i| !i.sufficient)
    }

    /// A clinical reason to block: interaction or allergy. Routes the order
    /// to clinical review rather than back to the requester.
    pub fn has_clinical_block(&self) -> bool {
        self.has_blocking_interaction() || self.has_allergy()
    }

    /// Interactions that advise but do not block.
    pub fn advisory_interactions(&self) -> impl Iterator<Item = &InteractionFinding> {
        self.interactions.iter().filter(|i| !i.severity.is_blocking())
    }
}

/// Alert classification surfaced to the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Critical,
    Warning,
}

/// One structured alert attached to a dispensing decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub alert_type: AlertType,
    pub message: String,
    pub action: String,
}

impl Alert {
    pub fn critical(message: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            alert_type: AlertType::Critical,
            message: message.into(),
            action: action.into(),
        }
    }

    pub fn warning(message: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            alert_type: AlertType::Warning,
            message: message.into(),
            action: action.into(),
        }
    }
}

/// The accept/reject outcome of verification.
///
/// Derived, never stored: always recomputed from a [`VerificationResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispensingDecision {
    pub approved: bool,
    pub alerts: Vec<Alert>,
}

impl DispensingDecision {
    /// Apply the deterministic decision policy.
    ///
    /// Every check has already run; blocking findings reject the order,
    /// advisory findings attach regardless of the outcome.
    pub fn derive(verification: &VerificationResult) -> Self {
        let mut approved = true;
        let mut alerts = Vec::new();

        if verification.has_blocking_interaction() {
            approved = false;
            alerts.push(Alert::critical(
                "High severity drug interactions detected",
                "Pharmacist consultation required",
            ));
        }

        if verification.has_allergy() {
            approved = false;
            alerts.push(Alert::critical(
                "Patient allergy detected",
                "Alternative medication required",
            ));
        }

        if verification.has_insufficient_stock() {
            approved = false;
            alerts.push(Alert::warning(
                "Insufficient inventory",
                "Partial fill or alternative suggested",
            ));
        }

        for finding in verification.advisory_interactions() {
            alerts.push(Alert::warning(
                format!(
                    "{} interaction: {} + {}",
                    finding.severity, finding.drugs[0], finding.drugs[1]
                ),
                finding.description.clone(),
            ));
        }

        for finding in verification.dosage.iter().filter(|d| !d.valid) {
            alerts.push(Alert::warning(
                format!("Dosage review for {}", finding.drug),
                finding.recommendation.clone(),
            ));
        }

        for finding in &verification.regulatory {
            alerts.push(Alert::warning(
                format!(
                    "{} is a Schedule {} controlled substance",
                    finding.drug, finding.schedule
                ),
                finding.note.clone(),
            ));
        }

        Self { approved, alerts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocking_interaction() -> InteractionFinding {
        InteractionFinding {
            drugs: ["warfarin".into(), "aspirin".into()],
            severity: Severity::Major,
            description: "Increased bleeding risk".into(),
        }
    }

    #[test]
    fn test_clean_verification_approved() {
        let decision = DispensingDecision::derive(&VerificationResult::default());
        assert!(decision.approved);
        assert!(decision.alerts.is_empty());
    }

    #[test]
    fn test_blocking_interaction_rejects() {
        let verification = VerificationResult {
            interactions: vec![blocking_interaction()],
            ..Default::default()
        };
        let decision = DispensingDecision::derive(&verification);
        assert!(!decision.approved);
        assert_eq!(decision.alerts.len(), 1);
        assert_eq!(decision.alerts[0].alert_type, AlertType::Critical);
        assert_eq!(
            decision.alerts[0].message,
            "High severity drug interactions detected"
        );
    }

    #[test]
    fn test_moderate_interaction_advisory_only() {
        let verification = VerificationResult {
            interactions: vec![InteractionFinding {
                drugs: ["lisinopril".into(), "ibuprofen".into()],
                severity: Severity::Moderate,
                description: "NSAIDs reduce ACE inhibitor effectiveness".into(),
            }],
            ..Default::default()
        };
        let decision = DispensingDecision::derive(&verification);
        assert!(decision.approved);
        assert_eq!(decision.alerts.len(), 1);
        assert_eq!(decision.alerts[0].alert_type, AlertType::Warning);
    }

    #[test]
    fn test_inventory_block_is_warning_not_clinical() {
        let verification = VerificationResult {
            inventory: vec![InventoryFinding {
                drug: "metformin".into(),
                requested: 100,
                available: 10,
                sufficient: false,
            }],
            ..Default::default()
        };
        assert!(!verification.has_clinical_block());
        let decision = DispensingDecision::derive(&verification);
        assert!(!decision.approved);
        assert_eq!(decision.alerts[0].alert_type, AlertType::Warning);
        assert_eq!(decision.alerts[0].message, "Insufficient inventory");
    }

    #[test]
    fn test_regulatory_note_never_blocks() {
        let verification = VerificationResult {
            regulatory: vec![RegulatoryFinding {
                drug: "oxycodone".into(),
                schedule: Schedule::II,
                note: "Requires DEA verification".into(),
            }],
            ..Default::default()
        };
        let decision = DispensingDecision::derive(&verification);
        assert!(decision.approved);
        assert_eq!(decision.alerts.len(), 1);
        assert!(decision.alerts[0].message.contains("Schedule II"));
    }

    #[test]
    fn test_all_findings_reported_together() {
        let verification = VerificationResult {
            interactions: vec![blocking_interaction()],
            allergies: vec![AllergyFinding {
                drug: "amoxicillin".into(),
                allergen: "penicillin".into(),
                severity: Severity::Major,
            }],
            inventory: vec![InventoryFinding {
                drug: "warfarin".into(),
                requested: 30,
                available: 0,
                sufficient: false,
            }],
            ..Default::default()
        };
        let decision = DispensingDecision::derive(&verification);
        assert!(!decision.approved);
        // Every blocking reason is explained, never a bare boolean.
        assert_eq!(decision.alerts.len(), 3);
    }
}
