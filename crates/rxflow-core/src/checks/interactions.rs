//! Pairwise drug-drug interaction checking.

use std::collections::HashSet;

use crate::models::InteractionFinding;
use crate::reference::DrugReferenceStore;

/// Walks every unordered pair in a medication set and reports known
/// interactions.
pub struct InteractionChecker<'a> {
    store: &'a DrugReferenceStore,
}

impl<'a> InteractionChecker<'a> {
    pub fn new(store: &'a DrugReferenceStore) -> Self {
        Self { store }
    }

    /// Check every unordered pair `(i, j)`, `i < j` in input order.
    ///
    /// Input names are de-duplicated by resolved key (first spelling kept),
    /// so no pair is reported twice and at most `n*(n-1)/2` findings come
    /// back. Findings carry the caller's original names; ordering follows
    /// pair iteration, not severity.
    pub fn check<S: AsRef<str>>(&self, drug_names: &[S]) -> Vec<InteractionFinding> {
        let mut seen = HashSet::new();
        let mut drugs: Vec<(String, String)> = Vec::new(); // (resolved key, original)
        for name in drug_names {
            let original = name.as_ref().trim();
            if original.is_empty() {
                continue;
            }
            let key = self.store.resolve_key(original);
            if seen.insert(key.clone()) {
                drugs.push((key, original.to_string()));
            }
        }

        let mut findings = Vec::new();
        for i in 0..drugs.len() {
            for j in (i + 1)..drugs.len() {
                if let Some(rule) = self.store.lookup_interaction(&drugs[i].0, &drugs[j].0) {
                    findings.push(InteractionFinding {
                        drugs: [drugs[i].1.clone(), drugs[j].1.clone()],
                        severity: rule.severity,
                        description: rule.description.clone(),
                    });
                }
            }
        }
        findings
    }
}
