//! Controlled-substance checks.

use crate::models::RegulatoryFinding;
use crate::reference::DrugReferenceStore;

/// Flags controlled substances for DEA handling. Findings are informational
/// and never block approval by themselves.
pub struct RegulatoryChecker<'a> {
    store: &'a DrugReferenceStore,
}

impl<'a> RegulatoryChecker<'a> {
    pub fn new(store: &'a DrugReferenceStore) -> Self {
        Self { store }
    }

    pub fn check<S: AsRef<str>>(&self, drug_keys: &[S]) -> Vec<RegulatoryFinding> {
        drug_keys
            .iter()
            .filter_map(|key| {
                let status = self.store.controlled_status(key.as_ref());
                status.schedule.map(|schedule| RegulatoryFinding {
                    drug: key.as_ref().to_string(),
                    schedule,
                    note: "Requires DEA verification".into(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Drug, Schedule};

    fn store() -> DrugReferenceStore {
        let mut store = DrugReferenceStore::new();
        let mut oxycodone = Drug::new("oxycodone", "Oxycodone");
        oxycodone.schedule = Some(Schedule::II);
        store.insert_drug(oxycodone);
        store.insert_drug(Drug::new("metformin", "Metformin"));
        store
    }

    #[test]
    fn test_controlled_flagged() {
        let store = store();
        let checker = RegulatoryChecker::new(&store);
        let findings = checker.check(&["Oxycodone"]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].schedule, Schedule::II);
        assert_eq!(findings[0].note, "Requires DEA verification");
    }

    #[test]
    fn test_uncontrolled_ignored() {
        let store = store();
        let checker = RegulatoryChecker::new(&store);
        assert!(checker.check(&["metformin", "unknown"]).is_empty());
    }
}
