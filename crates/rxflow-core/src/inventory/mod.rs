//! Inventory ledger: the single owner of on-hand quantities.
//!
//! Each drug key is guarded by its own lock, so dispenses against the same
//! drug serialize while different drugs commit fully in parallel. Multi-line
//! dispenses acquire locks in sorted key order and commit all-or-nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::normalize_key;

/// Ledger errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("no inventory item for drug: {0}")]
    ItemNotFound(String),

    /// Routine business outcome, not a fault: requested more than on hand.
    #[error("insufficient stock for {drug}: requested {requested}, available {available}")]
    InsufficientStock {
        drug: String,
        requested: u32,
        available: u32,
    },

    #[error("inventory lock poisoned")]
    LockPoisoned,
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Stocked quantity and thresholds for one drug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub drug_key: String,
    pub quantity_on_hand: u32,
    pub reorder_level: u32,
    pub expiration_date: Option<DateTime<Utc>>,
}

impl InventoryItem {
    pub fn new(drug_key: impl AsRef<str>, quantity_on_hand: u32, reorder_level: u32) -> Self {
        Self {
            drug_key: normalize_key(drug_key.as_ref()),
            quantity_on_hand,
            reorder_level,
            expiration_date: None,
        }
    }

    pub fn with_expiration(mut self, expiration_date: DateTime<Utc>) -> Self {
        self.expiration_date = Some(expiration_date);
        self
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity_on_hand <= self.reorder_level
    }
}

/// Result of a pure availability read.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Availability {
    pub sufficient: bool,
    pub available: u32,
}

/// Expiry-scan horizons, in days ahead of now.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpiryHorizons {
    pub expiring_soon_days: i64,
    pub high_priority_days: i64,
}

impl Default for ExpiryHorizons {
    fn default() -> Self {
        Self {
            expiring_soon_days: 7,
            high_priority_days: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExpiryUrgency {
    ExpiringSoon,
    HighPriority,
}

/// One item inside the expiry horizon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpiryFinding {
    pub drug_key: String,
    pub days_until_expiry: i64,
    pub quantity_affected: u32,
    pub urgency: ExpiryUrgency,
}

/// Best-effort notification target for reorder events.
pub trait ProcurementSink: Send + Sync {
    fn on_reorder_triggered(&self, drug_key: &str, current_qty: u32, reorder_level: u32);
}

/// Default sink: reorder events go to the log.
#[derive(Debug, Default)]
pub struct LogProcurementSink;

impl ProcurementSink for LogProcurementSink {
    fn on_reorder_triggered(&self, drug_key: &str, current_qty: u32, reorder_level: u32) {
        log::info!(
            "reorder triggered for {drug_key}: {current_qty} on hand, reorder level {reorder_level}"
        );
    }
}

/// The inventory ledger. Sole writer of `quantity_on_hand`.
pub struct InventoryLedger {
    items: RwLock<HashMap<String, Arc<Mutex<InventoryItem>>>>,
    procurement: Arc<dyn ProcurementSink>,
    horizons: ExpiryHorizons,
}

impl Default for InventoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryLedger {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            procurement: Arc::new(LogProcurementSink),
            horizons: ExpiryHorizons::default(),
        }
    }

    pub fn with_procurement(mut self, sink: Arc<dyn ProcurementSink>) -> Self {
        self.procurement = sink;
        self
    }

    pub fn with_horizons(mut self, horizons: ExpiryHorizons) -> Self {
        self.horizons = horizons;
        self
    }

    /// Insert or replace an item (seed / admin path, not dispensing).
    pub fn insert_item(&self, item: InventoryItem) -> LedgerResult<()> {
        let mut items = self.items.write().map_err(|_| LedgerError::LockPoisoned)?;
        items.insert(item.drug_key.clone(), Arc::new(Mutex::new(item)));
        Ok(())
    }

    /// Bulk load (startup).
    pub fn load(&self, items: impl IntoIterator<Item = InventoryItem>) -> LedgerResult<()> {
        for item in items {
            self.insert_item(item)?;
        }
        Ok(())
    }

    fn handle(&self, key: &str) -> LedgerResult<Arc<Mutex<InventoryItem>>> {
        let normalized = normalize_key(key);
        let items = self.items.read().map_err(|_| LedgerError::LockPoisoned)?;
        items
            .get(&normalized)
            .cloned()
            .ok_or(LedgerError::ItemNotFound(normalized))
    }

    /// Pure read: can `quantity` be dispensed right now?
    ///
    /// Unknown drugs report zero availability rather than erroring; the
    /// decision engine turns that into an insufficient-stock finding.
    pub fn check_availability(&self, key: &str, quantity: u32) -> Availability {
        match self.handle(key) {
            Ok(item) => {
                // A poisoned item lock means a reader panicked; quantities
                // are only written at the end of a validated critical
                // section, so the value is still consistent.
                let item = item.lock().unwrap_or_else(|e| e.into_inner());
                Availability {
                    sufficient: item.quantity_on_hand >= quantity,
                    available: item.quantity_on_hand,
                }
            }
            Err(_) => Availability {
                sufficient: false,
                available: 0,
            },
        }
    }

    /// Current state of one item.
    pub fn snapshot(&self, key: &str) -> Option<InventoryItem> {
        self.handle(key)
            .ok()
            .map(|item| item.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    /// All items, unordered.
    pub fn list(&self) -> Vec<InventoryItem> {
        let items = match self.items.read() {
            Ok(items) => items,
            Err(poisoned) => poisoned.into_inner(),
        };
        items
            .values()
            .map(|item| item.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .collect()
    }

    /// Atomically dispense `quantity` of one drug. Never goes negative.
    pub fn dispense(&self, key: &str, quantity: u32) -> LedgerResult<u32> {
        let results = self.dispense_all(&[(key.to_string(), quantity)])?;
        Ok(results[0].1)
    }

    /// Atomically dispense every line or none.
    ///
    /// Duplicate keys are aggregated, locks are acquired in sorted key order
    /// (deadlock-free against concurrent multi-line dispenses), every line is
    /// validated before any quantity changes, and reorder signals fire only
    /// after the locks are released.
    pub fn dispense_all(&self, lines: &[(String, u32)]) -> LedgerResult<Vec<(String, u32)>> {
        let mut wanted: BTreeMap<String, u32> = BTreeMap::new();
        for (key, quantity) in lines {
            *wanted.entry(normalize_key(key)).or_insert(0) += quantity;
        }

        // Resolve all handles before locking anything: an unknown drug must
        // not leave a partially locked set behind.
        let handles: Vec<(String, u32, Arc<Mutex<InventoryItem>>)> = wanted
            .iter()
            .map(|(key, &quantity)| Ok((key.clone(), quantity, self.handle(key)?)))
            .collect::<LedgerResult<_>>()?;

        let mut guards: Vec<(&str, u32, MutexGuard<'_, InventoryItem>)> = Vec::new();
        for (key, quantity, handle) in &handles {
            let guard = handle.lock().map_err(|_| LedgerError::LockPoisoned)?;
            guards.push((key.as_str(), *quantity, guard));
        }

        // Validate every line before mutating any.
        for (key, quantity, guard) in &guards {
            if guard.quantity_on_hand < *quantity {
                return Err(LedgerError::InsufficientStock {
                    drug: (*key).to_string(),
                    requested: *quantity,
                    available: guard.quantity_on_hand,
                });
            }
        }

        let mut committed = Vec::with_capacity(guards.len());
        let mut reorders = Vec::new();
        for (key, quantity, guard) in &mut guards {
            guard.quantity_on_hand -= *quantity;
            committed.push(((*key).to_string(), guard.quantity_on_hand));
            if guard.is_low_stock() {
                reorders.push(((*key).to_string(), guard.quantity_on_hand, guard.reorder_level));
            }
        }
        drop(guards);

        for (key, current, level) in reorders {
            self.procurement.on_reorder_triggered(&key, current, level);
        }

        Ok(committed)
    }

    /// Add stock (reorder fulfillment). Additive only.
    pub fn replenish(&self, key: &str, quantity: u32) -> LedgerResult<u32> {
        let handle = self.handle(key)?;
        let mut item = handle.lock().map_err(|_| LedgerError::LockPoisoned)?;
        item.quantity_on_hand = item.quantity_on_hand.saturating_add(quantity);
        Ok(item.quantity_on_hand)
    }

    /// Flag items inside the expiry horizons, nearest expiry first.
    pub fn scan_expiry(&self, now: DateTime<Utc>) -> Vec<ExpiryFinding> {
        let mut findings: Vec<ExpiryFinding> = self
            .list()
            .into_iter()
            .filter_map(|item| {
                let expiration = item.expiration_date?;
                let days = (expiration - now).num_days();
                if days > self.horizons.expiring_soon_days {
                    return None;
                }
                let urgency = if days <= self.horizons.high_priority_days {
                    ExpiryUrgency::HighPriority
                } else {
                    ExpiryUrgency::ExpiringSoon
                };
                Some(ExpiryFinding {
                    drug_key: item.drug_key,
                    days_until_expiry: days,
                    quantity_affected: item.quantity_on_hand,
                    urgency,
                })
            })
            .collect();
        findings.sort_by_key(|f| f.days_until_expiry);
        findings
    }

    /// Items at or below their reorder level.
    pub fn low_stock_report(&self) -> Vec<InventoryItem> {
        let mut report: Vec<InventoryItem> =
            self.list().into_iter().filter(|i| i.is_low_stock()).collect();
        report.sort_by(|a, b| a.drug_key.cmp(&b.drug_key));
        report
    }
}
