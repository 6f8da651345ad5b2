//! Dispensing decision engine.
//!
//! Composition root of the verification pipeline: runs every check, applies
//! the deterministic accept/reject policy, owns orders for their lifetime and
//! moves them through the stage work queues.

mod external;
pub mod queue;

pub use external::*;
pub use queue::*;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use thiserror::Error;

use crate::checks::{AllergyScreener, DosageValidator, InteractionChecker, RegulatoryChecker};
use crate::inventory::{InventoryLedger, LedgerError};
use crate::models::{
    Alert, DispensedLine, DispensingDecision, DispensingLabel, DispensingReceipt,
    DispensingRecord, InventoryFinding, Order, OrderLine, OrderRequest, OrderStatus,
    PatientProfile, VerificationResult,
};
use crate::reference::DrugReferenceStore;

/// Engine errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed order input; rejected before any check runs.
    #[error("invalid order: {0}")]
    Validation(String),

    #[error("patient not found: {0}")]
    PatientNotFound(String),

    #[error("patient data source unavailable: {0}")]
    PatientUnavailable(String),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("order {order_id} is not ready to dispense (status: {status})")]
    NotReady {
        order_id: String,
        status: OrderStatus,
    },

    #[error("illegal order transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Final verification found blocking issues at dispense time.
    #[error("dispensing blocked by verification ({} alerts)", alerts.len())]
    Blocked { alerts: Vec<Alert> },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<PatientLookupError> for EngineError {
    fn from(err: PatientLookupError) -> Self {
        match err {
            PatientLookupError::NotFound(id) => EngineError::PatientNotFound(id),
            PatientLookupError::Unavailable(msg) => EngineError::PatientUnavailable(msg),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Result of submitting an order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderOutcome {
    pub order_id: String,
    pub status: OrderStatus,
    pub alerts: Vec<Alert>,
    pub verification: VerificationResult,
}

/// The dispensing decision engine.
///
/// All collaborators are injected; no global state, so independent instances
/// coexist (one per test, one per tenant).
pub struct DispensingEngine {
    reference: Arc<DrugReferenceStore>,
    inventory: Arc<InventoryLedger>,
    patients: Arc<dyn PatientDataProvider>,
    audit: Arc<dyn AuditSink>,
    screener: AllergyScreener,
    queues: WorkQueues,
    orders: RwLock<HashMap<String, Order>>,
    submission_seq: AtomicU64,
}

impl DispensingEngine {
    pub fn new(
        reference: Arc<DrugReferenceStore>,
        inventory: Arc<InventoryLedger>,
        patients: Arc<dyn PatientDataProvider>,
    ) -> Self {
        Self {
            reference,
            inventory,
            patients,
            audit: Arc::new(LogAuditSink),
            screener: AllergyScreener::new(),
            queues: WorkQueues::new(),
            orders: RwLock::new(HashMap::new()),
            submission_seq: AtomicU64::new(0),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_screener(mut self, screener: AllergyScreener) -> Self {
        self.screener = screener;
        self
    }

    pub fn inventory(&self) -> &InventoryLedger {
        &self.inventory
    }

    pub fn reference(&self) -> &DrugReferenceStore {
        &self.reference
    }

    fn read_orders(&self) -> RwLockReadGuard<'_, HashMap<String, Order>> {
        self.orders.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_orders(&self) -> RwLockWriteGuard<'_, HashMap<String, Order>> {
        self.orders.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Submit an order: validate, verify, decide, route.
    ///
    /// Every check runs and every finding is collected before the decision is
    /// made; rejected orders carry the full alert list.
    pub fn process_order(&self, request: OrderRequest) -> EngineResult<OrderOutcome> {
        validate_request(&request)?;
        let patient = self.patients.get_patient_data(&request.patient_id)?;

        let seq = self.submission_seq.fetch_add(1, Ordering::SeqCst);
        let mut order = Order::new(request, seq);
        order.status = OrderStatus::Verifying;

        let verification = self.verify(&order.lines, &patient);
        let decision = DispensingDecision::derive(&verification);

        if decision.approved {
            order.status = OrderStatus::ReadyToDispense;
        } else if verification.has_clinical_block() {
            // Interactions and allergies need a pharmacist; supply problems
            // do not.
            order.status = OrderStatus::ClinicalReview;
        } else {
            order.status = OrderStatus::Submitted;
        }

        let outcome = OrderOutcome {
            order_id: order.order_id.clone(),
            status: order.status,
            alerts: decision.alerts,
            verification,
        };
        let patient_id = order.patient_id.clone();
        let (priority, seq) = (order.priority, order.submission_seq);

        // The order must be in the book before its id enters a queue, or a
        // concurrent take_next would discard the id as stale.
        self.write_orders().insert(order.order_id.clone(), order);
        match outcome.status {
            OrderStatus::ReadyToDispense => {
                self.queues.dispensing.push(priority, seq, outcome.order_id.clone());
            }
            OrderStatus::ClinicalReview => {
                self.queues.clinical.push(priority, seq, outcome.order_id.clone());
            }
            _ => {}
        }

        self.audit.record(&AuditEvent::OrderVerified {
            order_id: outcome.order_id.clone(),
            patient_id,
            approved: decision.approved,
            alert_count: outcome.alerts.len(),
            status: outcome.status.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
        Ok(outcome)
    }

    /// Fulfill a ready order.
    ///
    /// Re-runs a final verification (defense against state drift between
    /// queueing and fulfillment), then commits every line atomically. A lost
    /// inventory race is retried once before `InsufficientStock` surfaces.
    /// The order book lock is held across the whole operation so two
    /// operators cannot both fulfill the same order.
    pub fn dispense_order(
        &self,
        order_id: &str,
        operator_id: &str,
    ) -> EngineResult<DispensingReceipt> {
        let mut orders = self.write_orders();
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| EngineError::OrderNotFound(order_id.to_string()))?;

        if order.status != OrderStatus::ReadyToDispense {
            return Err(EngineError::NotReady {
                order_id: order_id.to_string(),
                status: order.status,
            });
        }

        let patient = self.patients.get_patient_data(&order.patient_id)?;
        let verification = self.verify(&order.lines, &patient);
        let decision = DispensingDecision::derive(&verification);
        if !decision.approved {
            return Err(EngineError::Blocked {
                alerts: decision.alerts,
            });
        }

        let wanted: Vec<(String, u32)> = order
            .lines
            .iter()
            .map(|line| (line.drug_key.clone(), line.quantity))
            .collect();
        let committed = match self.inventory.dispense_all(&wanted) {
            Ok(committed) => committed,
            Err(LedgerError::InsufficientStock { drug, .. }) => {
                log::warn!("dispense race on {drug} for {order_id}; retrying once");
                self.inventory.dispense_all(&wanted)?
            }
            Err(err) => return Err(err.into()),
        };
        let remaining: HashMap<String, u32> = committed.into_iter().collect();

        let dispensed_at = chrono::Utc::now().to_rfc3339();
        order.status = OrderStatus::Dispensed;
        order.assigned_to = Some(operator_id.to_string());
        order.dispensed_by = Some(operator_id.to_string());
        order.dispensed_at = Some(dispensed_at.clone());
        self.queues
            .billing
            .push(order.priority, order.submission_seq, order.order_id.clone());

        let record = DispensingRecord {
            order_id: order.order_id.clone(),
            patient_id: order.patient_id.clone(),
            operator_id: operator_id.to_string(),
            lines: order
                .lines
                .iter()
                .map(|line| self.dispensed_line(line, &remaining))
                .collect(),
            dispensed_at,
        };
        let labels = order.lines.iter().map(|line| self.label_for(line)).collect();
        drop(orders);

        let record_hash = record.content_hash()?;
        self.audit.record(&AuditEvent::OrderDispensed {
            order_id: record.order_id.clone(),
            operator_id: operator_id.to_string(),
            line_count: record.lines.len(),
            record_hash: record_hash.clone(),
            timestamp: record.dispensed_at.clone(),
        });

        Ok(DispensingReceipt {
            record,
            labels,
            record_hash,
        })
    }

    /// Cancel an order from any non-terminal state.
    pub fn cancel_order(&self, order_id: &str) -> EngineResult<Order> {
        let mut orders = self.write_orders();
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| EngineError::OrderNotFound(order_id.to_string()))?;

        if !order.status.can_transition(OrderStatus::Cancelled) {
            return Err(EngineError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }
        order.status = OrderStatus::Cancelled;
        let cancelled = order.clone();
        drop(orders);

        self.audit.record(&AuditEvent::OrderCancelled {
            order_id: cancelled.order_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
        Ok(cancelled)
    }

    pub fn get_order(&self, order_id: &str) -> Option<Order> {
        self.read_orders().get(order_id).cloned()
    }

    /// Orders awaiting a stage, priority-sorted, filtered to unassigned or
    /// self-assigned.
    pub fn get_work_queue(&self, name: WorkQueueName, operator_id: &str) -> Vec<Order> {
        let expected = stage_status(name);
        let orders = self.read_orders();
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|order| order.status == expected)
            .filter(|order| {
                order
                    .assigned_to
                    .as_deref()
                    .map(|assignee| assignee == operator_id)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.submission_seq.cmp(&b.submission_seq))
        });
        matching
    }

    /// Atomically claim the head of a queue for an operator.
    ///
    /// Entries whose order moved on (cancelled, already fulfilled) are
    /// discarded lazily.
    pub fn take_next(&self, name: WorkQueueName, operator_id: &str) -> Option<Order> {
        let expected = stage_status(name);
        loop {
            let order_id = self.queues.get(name).pop()?;
            let mut orders = self.write_orders();
            if let Some(order) = orders.get_mut(&order_id) {
                let claimable = order.status == expected
                    && order
                        .assigned_to
                        .as_deref()
                        .map(|assignee| assignee == operator_id)
                        .unwrap_or(true);
                if claimable {
                    order.assigned_to = Some(operator_id.to_string());
                    return Some(order.clone());
                }
            }
            // Stale entry; keep draining.
        }
    }

    /// Run every check over a set of lines for a patient.
    fn verify(&self, lines: &[OrderLine], patient: &PatientProfile) -> VerificationResult {
        let validator = DosageValidator::new(&self.reference);
        let dosage = lines
            .iter()
            .map(|line| validator.validate_line(line, Some(&patient.demographics)))
            .collect();

        // Interactions run over the proposed drugs plus everything the
        // patient already takes.
        let mut combined: Vec<String> = lines.iter().map(|l| l.drug_key.clone()).collect();
        combined.extend(
            patient
                .current_medications
                .iter()
                .filter_map(|entry| medication_token(entry))
                .map(String::from),
        );
        let interactions = InteractionChecker::new(&self.reference).check(&combined);

        let proposed: Vec<&str> = lines.iter().map(|l| l.drug_key.as_str()).collect();
        let screening = self.screener.screen(&patient.allergies, &proposed);

        let inventory = lines
            .iter()
            .map(|line| {
                let availability = self.inventory.check_availability(&line.drug_key, line.quantity);
                InventoryFinding {
                    drug: line.drug_key.clone(),
                    requested: line.quantity,
                    available: availability.available,
                    sufficient: availability.sufficient,
                }
            })
            .collect();

        let regulatory = RegulatoryChecker::new(&self.reference).check(&proposed);

        VerificationResult {
            interactions,
            dosage,
            allergies: screening.alerts,
            inventory,
            regulatory,
        }
    }

    fn dispensed_line(&self, line: &OrderLine, remaining: &HashMap<String, u32>) -> DispensedLine {
        let key = crate::models::normalize_key(&line.drug_key);
        DispensedLine {
            drug_name: self.display_name(&line.drug_key),
            remaining_stock: remaining.get(&key).copied().unwrap_or(0),
            drug_key: key,
            quantity: line.quantity,
        }
    }

    fn label_for(&self, line: &OrderLine) -> DispensingLabel {
        DispensingLabel {
            drug_name: self.display_name(&line.drug_key),
            quantity: line.quantity,
            directions: format!("Take {} {}", line.dose, line.frequency),
        }
    }

    fn display_name(&self, drug_key: &str) -> String {
        self.reference
            .lookup_drug(drug_key)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| drug_key.to_string())
    }
}

/// Extract the drug key from a current-medication entry like
/// "metformin 500mg BID".
fn medication_token(entry: &str) -> Option<&str> {
    entry.split_whitespace().next()
}

fn stage_status(name: WorkQueueName) -> OrderStatus {
    match name {
        WorkQueueName::Clinical => OrderStatus::ClinicalReview,
        WorkQueueName::Dispensing => OrderStatus::ReadyToDispense,
        WorkQueueName::Billing => OrderStatus::Dispensed,
    }
}

/// Reject malformed input before any check runs.
fn validate_request(request: &OrderRequest) -> EngineResult<()> {
    if request.patient_id.trim().is_empty() {
        return Err(EngineError::Validation("patient_id is required".into()));
    }
    if request.prescriber_id.trim().is_empty() {
        return Err(EngineError::Validation("prescriber_id is required".into()));
    }
    if request.lines.is_empty() {
        return Err(EngineError::Validation("order has no lines".into()));
    }
    for (index, line) in request.lines.iter().enumerate() {
        if line.drug_key.trim().is_empty() {
            return Err(EngineError::Validation(format!(
                "line {index}: drug_key is required"
            )));
        }
        if line.quantity == 0 {
            return Err(EngineError::Validation(format!(
                "line {index}: quantity must be positive"
            )));
        }
        if !line.dose.is_finite() || line.dose <= 0.0 {
            return Err(EngineError::Validation(format!(
                "line {index}: dose must be positive"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryItem;
    use crate::models::{AlertType, Demographics, Priority};
    use crate::reference::seed;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAudit {
        events: Mutex<Vec<String>>,
    }

    impl AuditSink for RecordingAudit {
        fn record(&self, event: &AuditEvent) {
            self.events.lock().unwrap().push(event.event_type().to_string());
        }
    }

    struct Fixture {
        engine: DispensingEngine,
        directory: Arc<InMemoryPatientDirectory>,
        audit: Arc<RecordingAudit>,
    }

    fn fixture() -> Fixture {
        let reference = Arc::new(DrugReferenceStore::seeded());
        let inventory = Arc::new(InventoryLedger::new());
        inventory.load(seed::inventory(chrono::Utc::now())).unwrap();

        let directory = Arc::new(InMemoryPatientDirectory::new());
        directory.insert(PatientProfile::new("patient-1"));

        let audit = Arc::new(RecordingAudit::default());
        let engine = DispensingEngine::new(reference, inventory, directory.clone())
            .with_audit(audit.clone());
        Fixture {
            engine,
            directory,
            audit,
        }
    }

    fn simple_request(drug: &str, quantity: u32, dose: f64) -> OrderRequest {
        OrderRequest {
            patient_id: "patient-1".into(),
            prescriber_id: "prescriber-1".into(),
            lines: vec![OrderLine::new(drug, quantity, dose, "once daily")],
            stat: false,
            urgent: false,
        }
    }

    #[test]
    fn test_clean_order_ready_to_dispense() {
        let f = fixture();
        let outcome = f.engine.process_order(simple_request("metformin", 30, 500.0)).unwrap();
        assert_eq!(outcome.status, OrderStatus::ReadyToDispense);
        assert!(outcome.alerts.is_empty());
        assert_eq!(f.engine.get_work_queue(WorkQueueName::Dispensing, "rph-1").len(), 1);
        assert_eq!(f.audit.events.lock().unwrap().as_slice(), ["order_verified"]);
    }

    #[test]
    fn test_interaction_with_current_medication_blocks() {
        let f = fixture();
        let mut patient = PatientProfile::new("patient-1");
        patient.current_medications = vec!["aspirin 81mg daily".into()];
        f.directory.insert(patient);

        let outcome = f.engine.process_order(simple_request("warfarin", 10, 5.0)).unwrap();
        assert_eq!(outcome.status, OrderStatus::ClinicalReview);
        let critical: Vec<_> = outcome
            .alerts
            .iter()
            .filter(|a| a.alert_type == AlertType::Critical)
            .collect();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].message, "High severity drug interactions detected");
        assert_eq!(f.engine.get_work_queue(WorkQueueName::Clinical, "rph-1").len(), 1);
        assert!(f.engine.get_work_queue(WorkQueueName::Dispensing, "rph-1").is_empty());
    }

    #[test]
    fn test_allergy_blocks_to_clinical_review() {
        let f = fixture();
        let mut patient = PatientProfile::new("patient-1");
        patient.allergies = vec!["penicillin".into()];
        f.directory.insert(patient);

        let outcome = f.engine.process_order(simple_request("amoxicillin", 21, 500.0)).unwrap();
        assert_eq!(outcome.status, OrderStatus::ClinicalReview);
        assert!(outcome
            .alerts
            .iter()
            .any(|a| a.message == "Patient allergy detected"));
    }

    #[test]
    fn test_inventory_shortfall_stays_submitted() {
        let f = fixture();
        // Only 47 warfarin on hand.
        let outcome = f.engine.process_order(simple_request("warfarin", 60, 5.0)).unwrap();
        assert_eq!(outcome.status, OrderStatus::Submitted);
        assert!(outcome
            .alerts
            .iter()
            .any(|a| a.message == "Insufficient inventory"));
        // Supply problems are not clinical problems.
        assert!(f.engine.get_work_queue(WorkQueueName::Clinical, "rph-1").is_empty());
        assert!(f.engine.get_work_queue(WorkQueueName::Dispensing, "rph-1").is_empty());
    }

    #[test]
    fn test_dosage_warning_does_not_block() {
        let f = fixture();
        let outcome = f
            .engine
            .process_order(simple_request("metformin", 30, 3000.0))
            .unwrap();
        assert_eq!(outcome.status, OrderStatus::ReadyToDispense);
        assert!(outcome
            .alerts
            .iter()
            .any(|a| a.action.contains("Exceeds maximum daily dose")));
    }

    #[test]
    fn test_controlled_substance_note_does_not_block() {
        let f = fixture();
        let ledger = f.engine.inventory();
        ledger.insert_item(InventoryItem::new("oxycodone", 100, 20)).unwrap();

        let outcome = f.engine.process_order(simple_request("oxycodone", 20, 5.0)).unwrap();
        assert_eq!(outcome.status, OrderStatus::ReadyToDispense);
        assert_eq!(outcome.verification.regulatory.len(), 1);
        assert!(outcome
            .alerts
            .iter()
            .any(|a| a.action == "Requires DEA verification"));
    }

    #[test]
    fn test_dispense_full_flow() {
        let f = fixture();
        let outcome = f.engine.process_order(simple_request("metformin", 30, 500.0)).unwrap();

        let receipt = f.engine.dispense_order(&outcome.order_id, "rph-1").unwrap();
        assert_eq!(receipt.record.lines.len(), 1);
        assert_eq!(receipt.record.lines[0].remaining_stock, 420);
        assert_eq!(receipt.labels[0].drug_name, "Metformin");
        assert_eq!(receipt.record_hash.len(), 64);

        let order = f.engine.get_order(&outcome.order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Dispensed);
        assert_eq!(order.dispensed_by.as_deref(), Some("rph-1"));
        assert_eq!(f.engine.get_work_queue(WorkQueueName::Billing, "rph-1").len(), 1);
        assert_eq!(
            f.audit.events.lock().unwrap().as_slice(),
            ["order_verified", "order_dispensed"]
        );
    }

    #[test]
    fn test_dispense_twice_rejected() {
        let f = fixture();
        let outcome = f.engine.process_order(simple_request("metformin", 30, 500.0)).unwrap();
        f.engine.dispense_order(&outcome.order_id, "rph-1").unwrap();

        let err = f.engine.dispense_order(&outcome.order_id, "rph-2").unwrap_err();
        assert!(matches!(err, EngineError::NotReady { .. }));
        // No second decrement.
        assert_eq!(
            f.engine.inventory().snapshot("metformin").unwrap().quantity_on_hand,
            420
        );
    }

    #[test]
    fn test_dispense_reverification_catches_drift() {
        let f = fixture();
        let outcome = f.engine.process_order(simple_request("insulin", 100, 20.0)).unwrap();
        assert_eq!(outcome.status, OrderStatus::ReadyToDispense);

        // Another order drains the stock before fulfillment.
        f.engine.inventory().dispense("insulin", 150).unwrap();

        let err = f.engine.dispense_order(&outcome.order_id, "rph-1").unwrap_err();
        assert!(matches!(err, EngineError::Blocked { .. }));
        // Untouched: nothing dispensed, order still ready.
        assert_eq!(f.engine.inventory().snapshot("insulin").unwrap().quantity_on_hand, 30);
        assert_eq!(
            f.engine.get_order(&outcome.order_id).unwrap().status,
            OrderStatus::ReadyToDispense
        );
    }

    #[test]
    fn test_dispense_aggregate_shortfall_rolls_back() {
        let f = fixture();
        // Two lines of the same drug each pass per-line verification
        // (50 against 90) but their aggregate exceeds stock at commit time.
        f.engine.inventory().insert_item(InventoryItem::new("insulin", 90, 10)).unwrap();
        let request = OrderRequest {
            patient_id: "patient-1".into(),
            prescriber_id: "prescriber-1".into(),
            lines: vec![
                OrderLine::new("insulin", 50, 20.0, "once daily"),
                OrderLine::new("insulin", 50, 20.0, "once daily"),
            ],
            stat: false,
            urgent: false,
        };
        let outcome = f.engine.process_order(request).unwrap();
        // Per-line availability: 50 <= 90, so verification approves.
        assert_eq!(outcome.status, OrderStatus::ReadyToDispense);

        let err = f.engine.dispense_order(&outcome.order_id, "rph-1").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::InsufficientStock { .. })
        ));
        // All-or-nothing: stock untouched, order not dispensed.
        assert_eq!(f.engine.inventory().snapshot("insulin").unwrap().quantity_on_hand, 90);
        assert_eq!(
            f.engine.get_order(&outcome.order_id).unwrap().status,
            OrderStatus::ReadyToDispense
        );
    }

    #[test]
    fn test_cancel_order() {
        let f = fixture();
        let outcome = f.engine.process_order(simple_request("metformin", 30, 500.0)).unwrap();
        let cancelled = f.engine.cancel_order(&outcome.order_id).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        // Cancelled order is skipped by take_next (stale queue entry).
        assert!(f.engine.take_next(WorkQueueName::Dispensing, "rph-1").is_none());

        // Terminal states cannot be cancelled again.
        let err = f.engine.cancel_order(&outcome.order_id).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn test_queue_priority_ordering() {
        let f = fixture();
        let submit = |drug: &str, stat: bool, urgent: bool| {
            let mut request = simple_request(drug, 10, 500.0);
            request.stat = stat;
            request.urgent = urgent;
            f.engine.process_order(request).unwrap().order_id
        };

        let routine_1 = submit("metformin", false, false);
        let stat = submit("metformin", true, false);
        let urgent = submit("metformin", false, true);
        let routine_2 = submit("metformin", false, false);

        let queue = f.engine.get_work_queue(WorkQueueName::Dispensing, "rph-1");
        let ids: Vec<&str> = queue.iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec![stat.as_str(), urgent.as_str(), routine_1.as_str(), routine_2.as_str()]);
    }

    #[test]
    fn test_take_next_claims_head() {
        let f = fixture();
        let mut stat_request = simple_request("metformin", 10, 500.0);
        stat_request.stat = true;
        let stat = f.engine.process_order(stat_request).unwrap().order_id;
        let routine = f.engine.process_order(simple_request("metformin", 10, 500.0)).unwrap().order_id;

        let first = f.engine.take_next(WorkQueueName::Dispensing, "rph-1").unwrap();
        assert_eq!(first.order_id, stat);
        assert_eq!(first.assigned_to.as_deref(), Some("rph-1"));

        let second = f.engine.take_next(WorkQueueName::Dispensing, "rph-2").unwrap();
        assert_eq!(second.order_id, routine);
        assert!(f.engine.take_next(WorkQueueName::Dispensing, "rph-3").is_none());
    }

    #[test]
    fn test_assigned_order_hidden_from_others() {
        let f = fixture();
        let id = f.engine.process_order(simple_request("metformin", 10, 500.0)).unwrap().order_id;
        f.engine.take_next(WorkQueueName::Dispensing, "rph-1").unwrap();

        assert!(f.engine.get_work_queue(WorkQueueName::Dispensing, "rph-2").is_empty());
        let mine = f.engine.get_work_queue(WorkQueueName::Dispensing, "rph-1");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].order_id, id);
    }

    #[test]
    fn test_high_risk_drug_is_urgent() {
        let f = fixture();
        let outcome = f.engine.process_order(simple_request("warfarin", 30, 5.0)).unwrap();
        let order = f.engine.get_order(&outcome.order_id).unwrap();
        assert_eq!(order.priority, Priority::Urgent);
    }

    #[test]
    fn test_validation_rejects_before_checks() {
        let f = fixture();
        let empty = OrderRequest {
            patient_id: "patient-1".into(),
            prescriber_id: "prescriber-1".into(),
            lines: vec![],
            stat: false,
            urgent: false,
        };
        assert!(matches!(
            f.engine.process_order(empty).unwrap_err(),
            EngineError::Validation(_)
        ));

        let zero_quantity = OrderRequest {
            patient_id: "patient-1".into(),
            prescriber_id: "prescriber-1".into(),
            lines: vec![OrderLine::new("metformin", 0, 500.0, "once daily")],
            stat: false,
            urgent: false,
        };
        assert!(matches!(
            f.engine.process_order(zero_quantity).unwrap_err(),
            EngineError::Validation(_)
        ));
        // Nothing was audited or enqueued.
        assert!(f.audit.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_patient() {
        let f = fixture();
        let mut request = simple_request("metformin", 30, 500.0);
        request.patient_id = "patient-404".into();
        assert!(matches!(
            f.engine.process_order(request).unwrap_err(),
            EngineError::PatientNotFound(_)
        ));
    }

    #[test]
    fn test_renal_annotation_flows_through() {
        let f = fixture();
        let mut patient = PatientProfile::new("patient-1");
        patient.demographics = Demographics {
            age: Some(71),
            egfr: Some(42.0),
            ..Default::default()
        };
        f.directory.insert(patient);

        let outcome = f.engine.process_order(simple_request("metformin", 30, 500.0)).unwrap();
        assert!(outcome.verification.dosage[0]
            .recommendation
            .contains("renal function review advised"));
    }
}
