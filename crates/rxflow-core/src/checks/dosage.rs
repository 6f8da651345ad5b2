//! Dosage validation against the reference store's safe ranges.

use crate::models::{Demographics, DosageFinding, OrderLine};
use crate::reference::DrugReferenceStore;

/// Administration frequency with its fixed daily multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    OnceDaily,
    TwiceDaily,
    ThreeTimesDaily,
    FourTimesDaily,
    Every6Hours,
    Every8Hours,
    Every12Hours,
}

impl Frequency {
    /// Parse prescriber input. Returns `None` for unrecognized text; the
    /// validator applies the documented lenient fallback explicitly.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "once daily" | "qd" => Some(Frequency::OnceDaily),
            "twice daily" | "bid" => Some(Frequency::TwiceDaily),
            "three times daily" | "tid" => Some(Frequency::ThreeTimesDaily),
            "four times daily" | "qid" => Some(Frequency::FourTimesDaily),
            "every 6 hours" | "q6h" => Some(Frequency::Every6Hours),
            "every 8 hours" | "q8h" => Some(Frequency::Every8Hours),
            "every 12 hours" | "q12h" => Some(Frequency::Every12Hours),
            _ => None,
        }
    }

    /// Administrations per day.
    pub fn multiplier(&self) -> u32 {
        match self {
            Frequency::OnceDaily => 1,
            Frequency::TwiceDaily => 2,
            Frequency::ThreeTimesDaily => 3,
            Frequency::FourTimesDaily => 4,
            Frequency::Every6Hours => 4,
            Frequency::Every8Hours => 3,
            Frequency::Every12Hours => 2,
        }
    }
}

/// Outcome of validating one prescribed dose.
#[derive(Debug, Clone, PartialEq)]
pub struct DosageAssessment {
    pub valid: bool,
    pub daily_dose: f64,
    pub recommendation: String,
}

/// Validates prescribed doses against the formulary's ranges.
pub struct DosageValidator<'a> {
    store: &'a DrugReferenceStore,
}

impl<'a> DosageValidator<'a> {
    pub fn new(store: &'a DrugReferenceStore) -> Self {
        Self { store }
    }

    /// Validate a single dose at a given frequency.
    ///
    /// Fail-open on missing data: an unknown drug or a drug without a
    /// recorded range validates with a standard-dosing note. Positive
    /// findings (dose out of bounds) fail closed.
    pub fn validate(&self, drug_key: &str, dose: f64, frequency: &str) -> DosageAssessment {
        let multiplier = match Frequency::parse(frequency) {
            Some(freq) => freq.multiplier(),
            None => {
                log::warn!(
                    "unrecognized frequency '{frequency}' for {drug_key}; assuming once daily"
                );
                1
            }
        };
        let daily_dose = dose * f64::from(multiplier);

        let range = match self.store.lookup_drug(drug_key).and_then(|d| d.dosage_range.as_ref()) {
            Some(range) => range,
            None => {
                log::debug!("no dosage reference for {drug_key}; standard dosing assumed");
                return DosageAssessment {
                    valid: true,
                    daily_dose,
                    recommendation: "Standard dosing; no reference range on file".into(),
                };
            }
        };

        if daily_dose > range.max_daily {
            return DosageAssessment {
                valid: false,
                daily_dose,
                recommendation: format!(
                    "Exceeds maximum daily dose of {}{}",
                    range.max_daily, range.unit
                ),
            };
        }

        if dose < range.min || dose > range.max {
            return DosageAssessment {
                valid: false,
                daily_dose,
                recommendation: format!(
                    "Recommended range: {}-{}{}",
                    range.min, range.max, range.unit
                ),
            };
        }

        DosageAssessment {
            valid: true,
            daily_dose,
            recommendation: "Within therapeutic range".into(),
        }
    }

    /// Validate one order line, annotating for patient risk markers.
    pub fn validate_line(
        &self,
        line: &OrderLine,
        demographics: Option<&Demographics>,
    ) -> DosageFinding {
        let mut assessment = self.validate(&line.drug_key, line.dose, &line.frequency);

        let impaired = demographics.map(|d| d.has_renal_impairment()).unwrap_or(false);
        let has_range = self
            .store
            .lookup_drug(&line.drug_key)
            .map(|d| d.dosage_range.is_some())
            .unwrap_or(false);
        if impaired && has_range {
            assessment.recommendation.push_str("; renal function review advised");
        }

        DosageFinding {
            drug: line.drug_key.clone(),
            prescribed: format!("{} {}", line.dose, line.frequency),
            valid: assessment.valid,
            daily_dose: assessment.daily_dose,
            recommendation: assessment.recommendation,
        }
    }
}
