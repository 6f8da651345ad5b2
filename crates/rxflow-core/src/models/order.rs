//! Order models and the order lifecycle state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::drug::normalize_key;

/// Drugs that escalate an order to `Urgent` regardless of flags.
pub const HIGH_RISK_DRUGS: [&str; 4] = ["warfarin", "insulin", "digoxin", "lithium"];

/// One prescribed item within an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    /// Drug identity (matched against the reference store)
    pub drug_key: String,
    /// Units to dispense
    pub quantity: u32,
    /// Single-dose amount
    pub dose: f64,
    /// Administration frequency as prescribed (free text)
    pub frequency: String,
    /// Days of supply, if stated
    pub days_supply: Option<u32>,
}

impl OrderLine {
    pub fn new(drug_key: impl Into<String>, quantity: u32, dose: f64, frequency: impl Into<String>) -> Self {
        Self {
            drug_key: drug_key.into(),
            quantity,
            dose,
            frequency: frequency.into(),
            days_supply: None,
        }
    }
}

/// An incoming order submission, before verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub patient_id: String,
    pub prescriber_id: String,
    pub lines: Vec<OrderLine>,
    /// Explicit STAT flag from the prescriber
    #[serde(default)]
    pub stat: bool,
    /// Explicit urgency flag
    #[serde(default)]
    pub urgent: bool,
}

/// Work-queue priority. Ordered: `Routine < Urgent < Stat`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum Priority {
    Routine,
    Urgent,
    Stat,
}

impl Priority {
    /// Priority at submission: STAT if flagged, Urgent if flagged or any
    /// line carries a high-risk drug, otherwise Routine.
    pub fn classify(stat: bool, urgent: bool, lines: &[OrderLine]) -> Self {
        if stat {
            return Priority::Stat;
        }
        let high_risk = lines
            .iter()
            .any(|line| HIGH_RISK_DRUGS.contains(&normalize_key(&line.drug_key).as_str()));
        if urgent || high_risk {
            Priority::Urgent
        } else {
            Priority::Routine
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Routine => "Routine",
            Priority::Urgent => "Urgent",
            Priority::Stat => "STAT",
        };
        f.write_str(s)
    }
}

/// Order lifecycle.
///
/// `Submitted -> Verifying -> {ClinicalReview | ReadyToDispense} -> Dispensed`,
/// with `Cancelled` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Submitted,
    Verifying,
    ClinicalReview,
    ReadyToDispense,
    Dispensed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Dispensed | OrderStatus::Cancelled)
    }

    /// Whether a transition to `next` is legal.
    pub fn can_transition(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if next == Cancelled {
            return !self.is_terminal();
        }
        matches!(
            (*self, next),
            (Submitted, Verifying)
                | (Verifying, ClinicalReview)
                | (Verifying, ReadyToDispense)
                | (Verifying, Submitted)
                | (ClinicalReview, ReadyToDispense)
                | (ReadyToDispense, Dispensed)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Submitted => "submitted",
            OrderStatus::Verifying => "verifying",
            OrderStatus::ClinicalReview => "clinical_review",
            OrderStatus::ReadyToDispense => "ready_to_dispense",
            OrderStatus::Dispensed => "dispensed",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A medication order owned by the decision engine for its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub patient_id: String,
    pub prescriber_id: String,
    pub lines: Vec<OrderLine>,
    pub priority: Priority,
    pub status: OrderStatus,
    /// Submission timestamp (RFC 3339)
    pub submitted_at: String,
    /// Monotonic tie-breaker for FIFO ordering within a priority
    pub submission_seq: u64,
    /// Operator currently working this order, if claimed
    pub assigned_to: Option<String>,
    pub dispensed_by: Option<String>,
    pub dispensed_at: Option<String>,
}

impl Order {
    /// Create a new order from a submission.
    pub fn new(request: OrderRequest, submission_seq: u64) -> Self {
        let priority = Priority::classify(request.stat, request.urgent, &request.lines);
        Self {
            order_id: format!("RX-{}", uuid::Uuid::new_v4()),
            patient_id: request.patient_id,
            prescriber_id: request.prescriber_id,
            lines: request.lines,
            priority,
            status: OrderStatus::Submitted,
            submitted_at: chrono::Utc::now().to_rfc3339(),
            submission_seq,
            assigned_to: None,
            dispensed_by: None,
            dispensed_at: None,
        }
    }
}
