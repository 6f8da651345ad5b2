//! Formulary search: FTS retrieval followed by fuzzy ranking.

use strsim::{jaro_winkler, normalized_levenshtein};

use crate::db::{Database, DbResult};
use crate::models::Drug;

/// Number of candidates to retrieve from FTS before ranking.
const FTS_CANDIDATE_LIMIT: usize = 20;

/// Minimum score for a candidate to be returned at all.
const MIN_SCORE: f64 = 0.20;

/// A ranked formulary match.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDrug {
    pub drug: Drug,
    pub score: f64,
}

/// Two-stage medication search over the persisted formulary.
pub struct FormularySearch<'a> {
    db: &'a Database,
}

impl<'a> FormularySearch<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Search by name or brand alias, best matches first.
    pub fn search(&self, query: &str, limit: usize) -> DbResult<Vec<ScoredDrug>> {
        let candidates = self.db.search_formulary(query, FTS_CANDIDATE_LIMIT)?;

        let mut scored: Vec<ScoredDrug> = candidates
            .into_iter()
            .map(|drug| {
                let score = score_match(&drug, query);
                ScoredDrug { drug, score }
            })
            .filter(|s| s.score >= MIN_SCORE)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Score match quality of a drug against a query (0.0 - 1.0).
fn score_match(drug: &Drug, query: &str) -> f64 {
    let query_lower = query.trim().to_lowercase();

    if drug.name.to_lowercase().contains(&query_lower) || drug.key == query_lower {
        return 1.0;
    }
    for alias in &drug.aliases {
        if alias.to_lowercase() == query_lower {
            return 1.0;
        }
    }

    let name_similarity = fuzzy_match(&query_lower, &drug.name.to_lowercase());
    let alias_similarity = drug
        .aliases
        .iter()
        .map(|a| fuzzy_match(&query_lower, &a.to_lowercase()))
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(0.0);

    name_similarity.max(alias_similarity)
}

/// Combined fuzzy similarity: Jaro-Winkler favors shared prefixes (typos),
/// Levenshtein overall closeness.
fn fuzzy_match(a: &str, b: &str) -> f64 {
    let jw = jaro_winkler(a, b);
    let lev = normalized_levenshtein(a, b);
    jw * 0.6 + lev * 0.4
}
