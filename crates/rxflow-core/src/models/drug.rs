//! Drug reference models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single medication in the formulary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drug {
    /// Normalized lower-case identity used for all lookups
    pub key: String,
    /// Canonical display name
    pub name: String,
    /// Brand names / alternative spellings
    pub aliases: Vec<String>,
    /// National Drug Code, if known
    pub ndc: Option<String>,
    /// Safe dosing bounds for validation
    pub dosage_range: Option<DosageRange>,
    /// Controlled-substance schedule; `None` means not controlled
    pub schedule: Option<Schedule>,
    /// Whether this drug is currently orderable
    pub active: bool,
}

/// Dosing bounds for a single drug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DosageRange {
    /// Minimum single dose
    pub min: f64,
    /// Maximum single dose
    pub max: f64,
    /// Dose unit (e.g., "mg", "units")
    pub unit: String,
    /// Maximum cumulative dose per day
    pub max_daily: f64,
}

impl Drug {
    /// Create a new drug with required fields. The key is normalized.
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: normalize_key(&key.into()),
            name: name.into(),
            aliases: Vec::new(),
            ndc: None,
            dosage_range: None,
            schedule: None,
            active: true,
        }
    }

    /// Whether this drug is a controlled substance.
    pub fn is_controlled(&self) -> bool {
        self.schedule.is_some()
    }
}

/// Canonical form for drug keys: trimmed, lower-case.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Controlled-substance schedule (DEA I-V).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Schedule {
    I,
    II,
    III,
    IV,
    V,
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Schedule::I => "I",
            Schedule::II => "II",
            Schedule::III => "III",
            Schedule::IV => "IV",
            Schedule::V => "V",
        };
        f.write_str(s)
    }
}

impl FromStr for Schedule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "I" | "1" => Ok(Schedule::I),
            "II" | "2" => Ok(Schedule::II),
            "III" | "3" => Ok(Schedule::III),
            "IV" | "4" => Ok(Schedule::IV),
            "V" | "5" => Ok(Schedule::V),
            other => Err(format!("unknown schedule: {other}")),
        }
    }
}

/// Severity of a drug-drug interaction.
///
/// Ordered: `Minor < Moderate < Major < Contraindicated`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Moderate,
    Major,
    Contraindicated,
}

impl Severity {
    /// Severities that block dispensing outright.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Major | Severity::Contraindicated)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Major => "major",
            Severity::Contraindicated => "contraindicated",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Legacy data encoded severity as low/medium/high; accept those
        // spellings at parse boundaries only.
        match s.trim().to_lowercase().as_str() {
            "minor" | "low" => Ok(Severity::Minor),
            "moderate" | "medium" => Ok(Severity::Moderate),
            "major" | "high" => Ok(Severity::Major),
            "contraindicated" => Ok(Severity::Contraindicated),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// A known pairwise drug-drug interaction.
///
/// Keys are stored normalized with `drug_a < drug_b` lexicographically, so
/// lookup is symmetric by construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionRule {
    pub drug_a: String,
    pub drug_b: String,
    pub severity: Severity,
    pub description: String,
}

impl InteractionRule {
    /// Create a rule; the pair is normalized and sorted.
    pub fn new(
        a: impl AsRef<str>,
        b: impl AsRef<str>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        let (drug_a, drug_b) = pair_key(a.as_ref(), b.as_ref());
        Self {
            drug_a,
            drug_b,
            severity,
            description: description.into(),
        }
    }
}

/// Canonical unordered-pair key: both sides normalized, sorted.
pub fn pair_key(a: &str, b: &str) -> (String, String) {
    let a = normalize_key(a);
    let b = normalize_key(b);
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
