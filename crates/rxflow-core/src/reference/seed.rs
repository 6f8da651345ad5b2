//! Built-in reference data.
//!
//! One canonical formulary replacing the tables previously scattered across
//! the legacy pharmacy services. Severities use the closed enum; interaction
//! pairs are normalized at construction.

use chrono::{DateTime, Duration, Utc};

use crate::inventory::InventoryItem;
use crate::models::{DosageRange, Drug, InteractionRule, Schedule, Severity};

fn drug(
    key: &str,
    name: &str,
    aliases: &[&str],
    ndc: Option<&str>,
    range: Option<DosageRange>,
    schedule: Option<Schedule>,
) -> Drug {
    let mut d = Drug::new(key, name);
    d.aliases = aliases.iter().map(|a| a.to_string()).collect();
    d.ndc = ndc.map(|n| n.to_string());
    d.dosage_range = range;
    d.schedule = schedule;
    d
}

fn range(min: f64, max: f64, unit: &str, max_daily: f64) -> Option<DosageRange> {
    Some(DosageRange {
        min,
        max,
        unit: unit.into(),
        max_daily,
    })
}

/// The seeded formulary.
pub fn formulary() -> Vec<Drug> {
    vec![
        // Stocked medications with dosing bounds
        drug(
            "metformin",
            "Metformin",
            &["glucophage"],
            Some("00093-1048-01"),
            range(500.0, 2000.0, "mg", 2000.0),
            None,
        ),
        drug(
            "lisinopril",
            "Lisinopril",
            &["prinivil", "zestril"],
            Some("00591-0405-01"),
            range(2.5, 40.0, "mg", 40.0),
            None,
        ),
        drug(
            "warfarin",
            "Warfarin",
            &["coumadin", "jantoven"],
            Some("00056-0172-70"),
            range(1.0, 10.0, "mg", 10.0),
            None,
        ),
        drug(
            "insulin",
            "Insulin",
            &["humulin", "novolin"],
            None,
            range(10.0, 100.0, "units", 200.0),
            None,
        ),
        drug(
            "simvastatin",
            "Simvastatin",
            &["zocor"],
            Some("00006-0740-61"),
            range(10.0, 80.0, "mg", 80.0),
            None,
        ),
        // Interaction partners
        drug("aspirin", "Aspirin", &["ecotrin"], None, None, None),
        drug("ibuprofen", "Ibuprofen", &["advil", "motrin"], None, None, None),
        drug("amiodarone", "Amiodarone", &["pacerone"], None, None, None),
        drug("metoprolol", "Metoprolol", &["lopressor", "toprol-xl"], None, None, None),
        drug("verapamil", "Verapamil", &["calan"], None, None, None),
        drug("lithium", "Lithium", &["lithobid"], None, None, None),
        drug("prednisone", "Prednisone", &["deltasone"], None, None, None),
        drug("ciprofloxacin", "Ciprofloxacin", &["cipro"], None, None, None),
        drug("theophylline", "Theophylline", &["theo-24"], None, None, None),
        drug("sertraline", "Sertraline", &["zoloft"], None, None, None),
        drug("digoxin", "Digoxin", &["lanoxin"], None, None, None),
        drug("potassium", "Potassium Chloride", &["klor-con"], None, None, None),
        drug("phenelzine", "Phenelzine", &["nardil"], None, None, None),
        // Antibiotics relevant to allergy screening
        drug("amoxicillin", "Amoxicillin", &["amoxil"], None, None, None),
        drug(
            "sulfamethoxazole",
            "Sulfamethoxazole/Trimethoprim",
            &["bactrim", "septra"],
            None,
            None,
            None,
        ),
        // Controlled substances
        drug(
            "oxycodone",
            "Oxycodone",
            &["oxycontin", "roxicodone"],
            None,
            None,
            Some(Schedule::II),
        ),
        drug("morphine", "Morphine", &["ms contin"], None, None, Some(Schedule::II)),
        drug("fentanyl", "Fentanyl", &["duragesic"], None, None, Some(Schedule::II)),
        drug(
            "adderall",
            "Adderall",
            &["amphetamine-dextroamphetamine"],
            None,
            None,
            Some(Schedule::II),
        ),
        drug("tramadol", "Tramadol", &["ultram"], None, None, Some(Schedule::IV)),
        drug("alprazolam", "Alprazolam", &["xanax"], None, None, Some(Schedule::IV)),
    ]
}

/// The seeded pairwise interaction table.
pub fn interaction_rules() -> Vec<InteractionRule> {
    use Severity::*;
    let rules: [(&str, &str, Severity, &str); 17] = [
        // Anticoagulation
        ("warfarin", "aspirin", Major, "Increased bleeding risk - monitor INR closely"),
        ("warfarin", "ibuprofen", Major, "Increased bleeding and reduced warfarin effectiveness"),
        ("warfarin", "amiodarone", Major, "Significantly increases warfarin effect"),
        ("warfarin", "simvastatin", Moderate, "May increase bleeding risk"),
        ("warfarin", "ciprofloxacin", Major, "Significantly increases warfarin effect"),
        ("warfarin", "tramadol", Moderate, "May increase bleeding risk"),
        // ACE inhibitors
        ("lisinopril", "ibuprofen", Moderate, "NSAIDs reduce ACE inhibitor effectiveness"),
        ("lisinopril", "potassium", Moderate, "Risk of hyperkalemia"),
        ("lisinopril", "lithium", Major, "Increased lithium toxicity risk"),
        // Cardiac
        ("metoprolol", "verapamil", Major, "Risk of severe bradycardia and heart block"),
        ("metoprolol", "insulin", Moderate, "Beta-blockers may mask hypoglycemia symptoms"),
        // Diabetes
        ("metformin", "alcohol", Moderate, "Increased lactic acidosis risk"),
        ("metformin", "contrast", Major, "Hold before contrast procedures"),
        ("insulin", "prednisone", Moderate, "Steroids increase blood glucose"),
        // Antibiotics
        ("ciprofloxacin", "theophylline", Major, "Increases theophylline toxicity"),
        // Serotonergic
        ("tramadol", "sertraline", Major, "Increased serotonin syndrome risk"),
        (
            "tramadol",
            "phenelzine",
            Contraindicated,
            "Serotonin syndrome risk with MAOIs; combination contraindicated",
        ),
    ];

    rules
        .into_iter()
        .map(|(a, b, severity, description)| InteractionRule::new(a, b, severity, description))
        .collect()
}

/// The seeded stock positions, with expiry dates relative to `today`.
pub fn inventory(today: DateTime<Utc>) -> Vec<InventoryItem> {
    let expiring = |days: i64| today + Duration::days(days);
    vec![
        InventoryItem::new("metformin", 450, 100).with_expiration(expiring(180)),
        InventoryItem::new("lisinopril", 320, 80).with_expiration(expiring(365)),
        InventoryItem::new("warfarin", 47, 50).with_expiration(expiring(2)),
        InventoryItem::new("insulin", 180, 40).with_expiration(expiring(90)),
        InventoryItem::new("simvastatin", 280, 75).with_expiration(expiring(240)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_formulary_keys_unique_and_normalized() {
        let drugs = formulary();
        let keys: HashSet<_> = drugs.iter().map(|d| d.key.clone()).collect();
        assert_eq!(keys.len(), drugs.len());
        for drug in &drugs {
            assert_eq!(drug.key, drug.key.to_lowercase());
        }
    }

    #[test]
    fn test_interaction_pairs_normalized_and_unique() {
        let rules = interaction_rules();
        let pairs: HashSet<_> = rules
            .iter()
            .map(|r| (r.drug_a.clone(), r.drug_b.clone()))
            .collect();
        assert_eq!(pairs.len(), rules.len());
        for rule in &rules {
            assert!(rule.drug_a < rule.drug_b);
        }
    }

    #[test]
    fn test_contraindicated_pair_present() {
        assert!(interaction_rules()
            .iter()
            .any(|r| r.severity == Severity::Contraindicated));
    }

    #[test]
    fn test_inventory_warfarin_below_reorder() {
        let items = inventory(Utc::now());
        let warfarin = items.iter().find(|i| i.drug_key == "warfarin").unwrap();
        assert!(warfarin.is_low_stock());
    }
}
