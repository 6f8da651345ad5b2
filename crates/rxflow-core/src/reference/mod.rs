//! Canonical drug reference store.
//!
//! Consolidates the drug identity, interaction, dosage-range and
//! controlled-substance tables into one read-only lookup structure. All
//! callers — dosage validation, interaction checking, regulatory checks —
//! consume this single store.

mod search;
pub mod seed;

pub use search::*;

use std::collections::HashMap;

use crate::db::{Database, DbResult};
use crate::models::{normalize_key, pair_key, Drug, InteractionRule, Schedule};

/// Controlled-substance classification for a drug key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlledStatus {
    pub is_controlled: bool,
    pub schedule: Option<Schedule>,
}

impl ControlledStatus {
    fn not_controlled() -> Self {
        Self {
            is_controlled: false,
            schedule: None,
        }
    }
}

/// Read-only reference data: drugs keyed by normalized name, interactions
/// keyed by sorted pair. Immutable after initialization; lookups are
/// case-insensitive and alias-aware.
#[derive(Debug, Clone, Default)]
pub struct DrugReferenceStore {
    drugs: HashMap<String, Drug>,
    /// alias (normalized) -> canonical drug key
    aliases: HashMap<String, String>,
    interactions: HashMap<(String, String), InteractionRule>,
}

impl DrugReferenceStore {
    /// Empty store; populate via `insert_drug` / `insert_interaction`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store loaded with the built-in formulary and interaction table.
    pub fn seeded() -> Self {
        let mut store = Self::new();
        for drug in seed::formulary() {
            store.insert_drug(drug);
        }
        for rule in seed::interaction_rules() {
            store.insert_interaction(rule);
        }
        store
    }

    /// Load reference data from the database.
    pub fn from_database(db: &Database) -> DbResult<Self> {
        let mut store = Self::new();
        for drug in db.list_drugs(true)? {
            store.insert_drug(drug);
        }
        for rule in db.list_interaction_rules()? {
            store.insert_interaction(rule);
        }
        Ok(store)
    }

    /// Register a drug (seed time / admin action).
    pub fn insert_drug(&mut self, drug: Drug) {
        for alias in &drug.aliases {
            self.aliases.insert(normalize_key(alias), drug.key.clone());
        }
        self.drugs.insert(drug.key.clone(), drug);
    }

    /// Register an interaction rule (already pair-normalized by construction).
    pub fn insert_interaction(&mut self, rule: InteractionRule) {
        self.interactions
            .insert((rule.drug_a.clone(), rule.drug_b.clone()), rule);
    }

    /// Resolve an input to its canonical drug key: direct match first, then
    /// alias expansion; unknown input passes through normalized.
    pub fn resolve_key(&self, key: &str) -> String {
        let normalized = normalize_key(key);
        if self.drugs.contains_key(&normalized) {
            return normalized;
        }
        self.aliases
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    /// Look up a drug by key or alias.
    pub fn lookup_drug(&self, key: &str) -> Option<&Drug> {
        self.drugs.get(&self.resolve_key(key))
    }

    /// Look up the interaction rule for an unordered pair of drugs.
    ///
    /// Symmetric: `(a, b)` and `(b, a)` resolve to the same rule because the
    /// pair is sorted before lookup.
    pub fn lookup_interaction(&self, a: &str, b: &str) -> Option<&InteractionRule> {
        let key = pair_key(&self.resolve_key(a), &self.resolve_key(b));
        self.interactions.get(&key)
    }

    /// Controlled-substance classification for a drug key.
    pub fn controlled_status(&self, key: &str) -> ControlledStatus {
        match self.lookup_drug(key).and_then(|d| d.schedule) {
            Some(schedule) => ControlledStatus {
                is_controlled: true,
                schedule: Some(schedule),
            },
            None => ControlledStatus::not_controlled(),
        }
    }

    pub fn drugs(&self) -> impl Iterator<Item = &Drug> {
        self.drugs.values()
    }

    pub fn drug_count(&self) -> usize {
        self.drugs.len()
    }

    pub fn interaction_count(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drugs.is_empty() && self.interactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn store_with_warfarin_aspirin() -> DrugReferenceStore {
        let mut store = DrugReferenceStore::new();
        let mut warfarin = Drug::new("warfarin", "Warfarin");
        warfarin.aliases = vec!["coumadin".into()];
        store.insert_drug(warfarin);
        store.insert_drug(Drug::new("aspirin", "Aspirin"));
        store.insert_interaction(InteractionRule::new(
            "warfarin",
            "aspirin",
            Severity::Major,
            "Increased bleeding risk - monitor INR closely",
        ));
        store
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let store = store_with_warfarin_aspirin();
        assert!(store.lookup_drug("WARFARIN").is_some());
        assert!(store.lookup_drug("  warfarin  ").is_some());
        assert!(store.lookup_drug("unobtainium").is_none());
    }

    #[test]
    fn test_lookup_via_alias() {
        let store = store_with_warfarin_aspirin();
        let drug = store.lookup_drug("Coumadin").unwrap();
        assert_eq!(drug.key, "warfarin");
    }

    #[test]
    fn test_interaction_symmetric() {
        let store = store_with_warfarin_aspirin();
        let forward = store.lookup_interaction("warfarin", "aspirin").unwrap();
        let reverse = store.lookup_interaction("aspirin", "warfarin").unwrap();
        assert_eq!(forward, reverse);
        assert_eq!(forward.severity, Severity::Major);
    }

    #[test]
    fn test_interaction_through_alias() {
        let store = store_with_warfarin_aspirin();
        assert!(store.lookup_interaction("Coumadin", "Aspirin").is_some());
    }

    #[test]
    fn test_controlled_status_default() {
        let store = store_with_warfarin_aspirin();
        let status = store.controlled_status("warfarin");
        assert!(!status.is_controlled);
        assert!(status.schedule.is_none());
    }

    #[test]
    fn test_seeded_store() {
        let store = DrugReferenceStore::seeded();
        assert!(store.drug_count() > 20);
        assert!(store.interaction_count() > 10);

        // Controlled substances carry a schedule
        let oxy = store.controlled_status("oxycodone");
        assert!(oxy.is_controlled);
        assert_eq!(oxy.schedule, Some(crate::models::Schedule::II));
    }
}
