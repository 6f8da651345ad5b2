//! Rxflow Core Library
//!
//! Clinical decision support and dispensing verification for a pharmacy
//! backend.
//!
//! # Architecture
//!
//! ```text
//! Order submission
//!       │
//!   Validate ──► reject malformed input before any check runs
//!       │
//!   Verify ────► interactions │ dosage │ allergies │ inventory │ regulatory
//!       │              (all checks always run; findings collected)
//!       │
//! Dispensing Decision (deterministic policy)
//!       │
//!   ┌───┴──────────────┬────────────────────┐
//!   ▼                  ▼                    ▼
//! ready_to_dispense  clinical_review   submitted (supply gap only)
//!   │
//! dispense: re-verify, atomic all-line commit, labels + hashed record
//!   │
//! billing queue
//! ```
//!
//! # Core Principle
//!
//! **Fail open on missing reference data, fail closed on any positive
//! finding of risk.** Over-blocking costs a pharmacist review; a missed
//! interaction costs far more.
//!
//! # Modules
//!
//! - [`reference`]: consolidated drug reference store and seed formulary
//! - [`checks`]: dosage, interaction, allergy and regulatory checks
//! - [`inventory`]: per-key-locked inventory ledger
//! - [`engine`]: decision engine, work queues, external interfaces
//! - [`db`]: SQLite persistence (formulary, inventory, audit log)
//! - [`models`]: domain types

pub mod checks;
pub mod db;
pub mod engine;
pub mod inventory;
pub mod models;
pub mod reference;

// Re-export commonly used types
pub use db::{AuditLogEntry, Database, SqliteAuditSink};
pub use engine::{
    AuditEvent, AuditSink, DispensingEngine, EngineError, InMemoryPatientDirectory,
    OrderOutcome, PatientDataProvider, PatientLookupError, WorkQueueName,
};
pub use inventory::{
    Availability, ExpiryFinding, ExpiryHorizons, InventoryItem, InventoryLedger, LedgerError,
    ProcurementSink,
};
pub use models::{
    Alert, AlertType, DispensingDecision, DispensingReceipt, Drug, DosageRange, InteractionRule,
    Order, OrderLine, OrderRequest, OrderStatus, PatientProfile, Priority, Schedule, Severity,
    VerificationResult,
};
pub use reference::{DrugReferenceStore, FormularySearch, ScoredDrug};

use std::sync::{Arc, Mutex};

use checks::InteractionChecker;
use models::InteractionFinding;

// =========================================================================
// Top-Level Error Type
// =========================================================================

#[derive(Debug, thiserror::Error)]
pub enum PharmacyError {
    #[error("database error: {0}")]
    Database(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Inventory(#[from] LedgerError),
}

impl From<db::DbError> for PharmacyError {
    fn from(e: db::DbError) -> Self {
        PharmacyError::Database(e.to_string())
    }
}

pub type PharmacyResult<T> = Result<T, PharmacyError>;

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe facade wiring the database, reference store, ledger and
/// engine together.
///
/// The ledger is authoritative for quantities at runtime; the database is
/// loaded at startup and written back after each mutation.
pub struct PharmacyCore {
    db: Arc<Mutex<Database>>,
    engine: DispensingEngine,
}

impl PharmacyCore {
    /// Open or create a database at the given path and build the engine
    /// around it. Seeds the reference data on first run.
    pub fn open(
        path: impl AsRef<std::path::Path>,
        patients: Arc<dyn PatientDataProvider>,
    ) -> PharmacyResult<Self> {
        Self::from_database(Database::open(path)?, patients)
    }

    /// In-memory instance (tests, ephemeral deployments).
    pub fn open_in_memory(patients: Arc<dyn PatientDataProvider>) -> PharmacyResult<Self> {
        Self::from_database(Database::open_in_memory()?, patients)
    }

    fn from_database(
        db: Database,
        patients: Arc<dyn PatientDataProvider>,
    ) -> PharmacyResult<Self> {
        if db.list_drugs(false)?.is_empty() {
            log::info!("empty formulary; seeding reference data");
            for drug in reference::seed::formulary() {
                db.upsert_drug(&drug)?;
            }
            for rule in reference::seed::interaction_rules() {
                db.upsert_interaction_rule(&rule)?;
            }
        }
        if db.list_inventory()?.is_empty() {
            for item in reference::seed::inventory(chrono::Utc::now()) {
                db.upsert_inventory_item(&item)?;
            }
        }

        let store = Arc::new(DrugReferenceStore::from_database(&db)?);
        let ledger = Arc::new(InventoryLedger::new());
        ledger.load(db.list_inventory()?)?;

        let db = Arc::new(Mutex::new(db));
        let audit: Arc<dyn AuditSink> = Arc::new(SqliteAuditSink::new(db.clone()));
        let engine = DispensingEngine::new(store, ledger, patients).with_audit(audit);

        Ok(Self { db, engine })
    }

    fn db(&self) -> std::sync::MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The underlying engine, for callers composing their own flows.
    pub fn engine(&self) -> &DispensingEngine {
        &self.engine
    }

    // =====================================================================
    // Order Operations
    // =====================================================================

    /// Submit an order through the verification pipeline.
    pub fn process_order(&self, request: OrderRequest) -> PharmacyResult<OrderOutcome> {
        Ok(self.engine.process_order(request)?)
    }

    /// Fulfill a ready order and write the new stock levels back.
    pub fn dispense_order(
        &self,
        order_id: &str,
        operator_id: &str,
    ) -> PharmacyResult<DispensingReceipt> {
        let receipt = self.engine.dispense_order(order_id, operator_id)?;

        let db = self.db();
        for line in &receipt.record.lines {
            if let Err(err) = db.set_inventory_quantity(&line.drug_key, line.remaining_stock) {
                // The ledger already committed; persistence catches up on the
                // next write. Surfacing an error here would misreport a
                // completed dispense as failed.
                log::warn!("inventory write-back failed for {}: {err}", line.drug_key);
            }
        }
        Ok(receipt)
    }

    pub fn cancel_order(&self, order_id: &str) -> PharmacyResult<Order> {
        Ok(self.engine.cancel_order(order_id)?)
    }

    pub fn get_order(&self, order_id: &str) -> Option<Order> {
        self.engine.get_order(order_id)
    }

    /// Orders awaiting a stage, priority-sorted, unassigned or assigned to
    /// the calling operator.
    pub fn get_work_queue(&self, name: WorkQueueName, operator_id: &str) -> Vec<Order> {
        self.engine.get_work_queue(name, operator_id)
    }

    /// Atomically claim the next order in a queue.
    pub fn take_next(&self, name: WorkQueueName, operator_id: &str) -> Option<Order> {
        self.engine.take_next(name, operator_id)
    }

    // =====================================================================
    // Inventory Operations
    // =====================================================================

    pub fn check_availability(&self, drug_key: &str, quantity: u32) -> Availability {
        self.engine.inventory().check_availability(drug_key, quantity)
    }

    /// Add stock and persist the new level.
    pub fn replenish(&self, drug_key: &str, quantity: u32) -> PharmacyResult<u32> {
        let new_quantity = self.engine.inventory().replenish(drug_key, quantity)?;
        if let Err(err) = self.db().set_inventory_quantity(drug_key, new_quantity) {
            log::warn!("inventory write-back failed for {drug_key}: {err}");
        }
        Ok(new_quantity)
    }

    /// Stock a new item.
    pub fn add_inventory_item(&self, item: InventoryItem) -> PharmacyResult<()> {
        self.db().upsert_inventory_item(&item)?;
        self.engine.inventory().insert_item(item)?;
        Ok(())
    }

    /// Items inside the expiry horizons as of now.
    pub fn scan_expiring(&self) -> Vec<ExpiryFinding> {
        self.engine.inventory().scan_expiry(chrono::Utc::now())
    }

    /// Items at or below their reorder level.
    pub fn low_stock_report(&self) -> Vec<InventoryItem> {
        self.engine.inventory().low_stock_report()
    }

    // =====================================================================
    // Reference Operations
    // =====================================================================

    /// Search the formulary by name or brand alias.
    pub fn search_medications(&self, query: &str, limit: usize) -> PharmacyResult<Vec<ScoredDrug>> {
        let db = self.db();
        Ok(FormularySearch::new(&db).search(query, limit)?)
    }

    /// Check a medication set for known interactions.
    pub fn check_interactions(&self, drug_names: &[String]) -> Vec<InteractionFinding> {
        InteractionChecker::new(self.engine.reference()).check(drug_names)
    }

    // =====================================================================
    // Audit Operations
    // =====================================================================

    /// Most recent audit entries, newest first.
    pub fn recent_audit_events(&self, limit: usize) -> PharmacyResult<Vec<AuditLogEntry>> {
        Ok(self.db().recent_audit_events(limit)?)
    }
}
