//! Dispensing output: fulfillment record, labels, receipt.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One fulfilled line with the stock level it left behind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispensedLine {
    pub drug_key: String,
    pub drug_name: String,
    pub quantity: u32,
    pub remaining_stock: u32,
}

/// Immutable record of one completed dispense.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispensingRecord {
    pub order_id: String,
    pub patient_id: String,
    pub operator_id: String,
    pub lines: Vec<DispensedLine>,
    /// Fulfillment timestamp (RFC 3339)
    pub dispensed_at: String,
}

impl DispensingRecord {
    /// Serialize to canonical JSON for hashing.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// SHA-256 over the canonical JSON; tamper evidence for the audit trail.
    pub fn content_hash(&self) -> Result<String, serde_json::Error> {
        let json = self.to_canonical_json()?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Printable label for one dispensed line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispensingLabel {
    pub drug_name: String,
    pub quantity: u32,
    /// e.g. "Take 500 twice daily"
    pub directions: String,
}

/// Full result of a successful dispense operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispensingReceipt {
    pub record: DispensingRecord,
    pub labels: Vec<DispensingLabel>,
    pub record_hash: String,
}
