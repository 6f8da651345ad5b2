//! Allergy screening of proposed drugs against recorded allergens.

use std::collections::HashMap;

use crate::models::{AllergyFinding, Severity};

/// Result of screening one medication set.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningResult {
    pub has_allergies: bool,
    pub alerts: Vec<AllergyFinding>,
}

/// Substring-based allergy screener with allergen-class expansion.
///
/// Matching is deliberately permissive: a missed allergy costs far more than
/// an extra pharmacist review, so a proposed drug containing any allergen
/// token (or any member of the allergen's class) is flagged.
pub struct AllergyScreener {
    /// class allergen (normalized) -> member drug terms
    classes: HashMap<String, Vec<String>>,
}

impl Default for AllergyScreener {
    fn default() -> Self {
        Self::new()
    }
}

impl AllergyScreener {
    /// Screener with the default allergen-class map.
    pub fn new() -> Self {
        Self {
            classes: Self::default_classes(),
        }
    }

    /// Register an extra member term for an allergen class.
    pub fn add_class_member(&mut self, allergen: &str, member: &str) {
        self.classes
            .entry(allergen.trim().to_lowercase())
            .or_default()
            .push(member.trim().to_lowercase());
    }

    /// Screen proposed drugs against the patient's recorded allergens.
    pub fn screen<A: AsRef<str>, D: AsRef<str>>(
        &self,
        allergens: &[A],
        proposed_drugs: &[D],
    ) -> ScreeningResult {
        let mut alerts = Vec::new();

        for drug in proposed_drugs {
            let drug_lower = drug.as_ref().to_lowercase();
            for allergen in allergens {
                if self.matches(allergen.as_ref(), &drug_lower) {
                    alerts.push(AllergyFinding {
                        drug: drug.as_ref().to_string(),
                        allergen: allergen.as_ref().to_string(),
                        severity: Severity::Major,
                    });
                }
            }
        }

        ScreeningResult {
            has_allergies: !alerts.is_empty(),
            alerts,
        }
    }

    /// Whether a lower-cased drug name matches an allergen directly or via
    /// its class members.
    fn matches(&self, allergen: &str, drug_lower: &str) -> bool {
        let allergen_lower = allergen.trim().to_lowercase();
        if allergen_lower.is_empty() {
            return false;
        }
        if drug_lower.contains(&allergen_lower) {
            return true;
        }
        self.classes
            .get(&allergen_lower)
            .map(|members| members.iter().any(|m| drug_lower.contains(m.as_str())))
            .unwrap_or(false)
    }

    /// Default allergen classes.
    fn default_classes() -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();

        map.insert(
            "penicillin".into(),
            vec![
                "amoxicillin".into(),
                "ampicillin".into(),
                "dicloxacillin".into(),
                "piperacillin".into(),
                "nafcillin".into(),
            ],
        );
        map.insert(
            "sulfa".into(),
            vec![
                "sulfamethoxazole".into(),
                "sulfasalazine".into(),
                "sulfadiazine".into(),
            ],
        );
        map.insert(
            "cephalosporin".into(),
            vec![
                "cephalexin".into(),
                "cefazolin".into(),
                "ceftriaxone".into(),
                "cefdinir".into(),
            ],
        );
        map.insert(
            "nsaid".into(),
            vec![
                "ibuprofen".into(),
                "naproxen".into(),
                "ketorolac".into(),
                "aspirin".into(),
            ],
        );

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_match() {
        let screener = AllergyScreener::new();
        let result = screener.screen(&["sulfa"], &["Sulfamethoxazole"]);
        assert!(result.has_allergies);
        assert_eq!(result.alerts.len(), 1);
        assert_eq!(result.alerts[0].allergen, "sulfa");
        assert_eq!(result.alerts[0].severity, Severity::Major);
    }

    #[test]
    fn test_class_expansion_penicillin() {
        let screener = AllergyScreener::new();
        // "Amoxicillin" does not contain "penicillin" but is in its class.
        let result = screener.screen(&["penicillin"], &["Amoxicillin"]);
        assert!(result.has_allergies);
        assert_eq!(result.alerts[0].drug, "Amoxicillin");
        assert_eq!(result.alerts[0].allergen, "penicillin");
    }

    #[test]
    fn test_case_insensitive() {
        let screener = AllergyScreener::new();
        assert!(screener.screen(&["PENICILLIN"], &["penicillin v"]).has_allergies);
    }

    #[test]
    fn test_no_match() {
        let screener = AllergyScreener::new();
        let result = screener.screen(&["penicillin"], &["metformin", "lisinopril"]);
        assert!(!result.has_allergies);
        assert!(result.alerts.is_empty());
    }

    #[test]
    fn test_no_allergens_recorded() {
        let screener = AllergyScreener::new();
        let allergens: [&str; 0] = [];
        assert!(!screener.screen(&allergens, &["amoxicillin"]).has_allergies);
    }

    #[test]
    fn test_custom_class_member() {
        let mut screener = AllergyScreener::new();
        screener.add_class_member("opioid", "oxycodone");
        assert!(screener.screen(&["opioid"], &["Oxycodone 5mg"]).has_allergies);
    }

    #[test]
    fn test_one_alert_per_drug_allergen_pair() {
        let screener = AllergyScreener::new();
        let result = screener.screen(&["penicillin", "sulfa"], &["Amoxicillin", "Sulfadiazine"]);
        assert_eq!(result.alerts.len(), 2);
    }
}
