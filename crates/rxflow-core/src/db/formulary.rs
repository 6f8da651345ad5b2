//! Formulary and interaction-rule database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Drug, InteractionRule, Severity};

impl Database {
    /// Insert or update a formulary entry.
    pub fn upsert_drug(&self, drug: &Drug) -> DbResult<()> {
        let aliases_json = serde_json::to_string(&drug.aliases)?;
        let dosage_range_json = drug
            .dosage_range
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn().execute(
            r#"
            INSERT INTO formulary (
                drug_key, name, aliases, ndc, dosage_range, schedule, active, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
            ON CONFLICT(drug_key) DO UPDATE SET
                name = excluded.name,
                aliases = excluded.aliases,
                ndc = excluded.ndc,
                dosage_range = excluded.dosage_range,
                schedule = excluded.schedule,
                active = excluded.active,
                updated_at = datetime('now')
            "#,
            params![
                drug.key,
                drug.name,
                aliases_json,
                drug.ndc,
                dosage_range_json,
                drug.schedule.map(|s| s.to_string()),
                drug.active,
            ],
        )?;
        Ok(())
    }

    /// Get a formulary entry by key.
    pub fn get_drug(&self, key: &str) -> DbResult<Option<Drug>> {
        let result = self
            .conn()
            .query_row(
                r#"
                SELECT drug_key, name, aliases, ndc, dosage_range, schedule, active
                FROM formulary
                WHERE drug_key = ?
                "#,
                [key],
                |row| {
                    Ok(DrugRow {
                        drug_key: row.get(0)?,
                        name: row.get(1)?,
                        aliases: row.get(2)?,
                        ndc: row.get(3)?,
                        dosage_range: row.get(4)?,
                        schedule: row.get(5)?,
                        active: row.get(6)?,
                    })
                },
            )
            .optional()?;

        result.map(|row| row.try_into()).transpose()
    }

    /// All formulary entries, optionally active only.
    pub fn list_drugs(&self, active_only: bool) -> DbResult<Vec<Drug>> {
        let sql = if active_only {
            r#"
            SELECT drug_key, name, aliases, ndc, dosage_range, schedule, active
            FROM formulary
            WHERE active = 1
            ORDER BY drug_key
            "#
        } else {
            r#"
            SELECT drug_key, name, aliases, ndc, dosage_range, schedule, active
            FROM formulary
            ORDER BY drug_key
            "#
        };

        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(DrugRow {
                drug_key: row.get(0)?,
                name: row.get(1)?,
                aliases: row.get(2)?,
                ndc: row.get(3)?,
                dosage_range: row.get(4)?,
                schedule: row.get(5)?,
                active: row.get(6)?,
            })
        })?;

        let mut drugs = Vec::new();
        for row in rows {
            drugs.push(row?.try_into()?);
        }
        Ok(drugs)
    }

    /// Mark a formulary entry inactive (soft delete).
    pub fn deactivate_drug(&self, key: &str) -> DbResult<bool> {
        let rows_affected = self.conn().execute(
            "UPDATE formulary SET active = 0, updated_at = datetime('now') WHERE drug_key = ?",
            [key],
        )?;
        Ok(rows_affected > 0)
    }

    /// Search the formulary using FTS5 (BM25 ranking). Active entries only.
    pub fn search_formulary(&self, query: &str, limit: usize) -> DbResult<Vec<Drug>> {
        let escaped_query = escape_fts_query(query);
        if escaped_query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn().prepare(
            r#"
            SELECT f.drug_key, f.name, f.aliases, f.ndc, f.dosage_range, f.schedule, f.active,
                   bm25(formulary_fts) as rank
            FROM formulary f
            JOIN formulary_fts fts ON f.rowid = fts.rowid
            WHERE formulary_fts MATCH ?
            AND f.active = 1
            ORDER BY rank
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(params![escaped_query, limit as i64], |row| {
            Ok(DrugRow {
                drug_key: row.get(0)?,
                name: row.get(1)?,
                aliases: row.get(2)?,
                ndc: row.get(3)?,
                dosage_range: row.get(4)?,
                schedule: row.get(5)?,
                active: row.get(6)?,
            })
        })?;

        let mut drugs = Vec::new();
        for row in rows {
            drugs.push(row?.try_into()?);
        }
        Ok(drugs)
    }

    /// Insert or update an interaction rule (pair already normalized).
    pub fn upsert_interaction_rule(&self, rule: &InteractionRule) -> DbResult<()> {
        self.conn().execute(
            r#"
            INSERT INTO interaction_rules (drug_a, drug_b, severity, description)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(drug_a, drug_b) DO UPDATE SET
                severity = excluded.severity,
                description = excluded.description
            "#,
            params![
                rule.drug_a,
                rule.drug_b,
                rule.severity.to_string(),
                rule.description
            ],
        )?;
        Ok(())
    }

    /// All interaction rules.
    pub fn list_interaction_rules(&self) -> DbResult<Vec<InteractionRule>> {
        let mut stmt = self.conn().prepare(
            "SELECT drug_a, drug_b, severity, description FROM interaction_rules ORDER BY drug_a, drug_b",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut rules = Vec::new();
        for row in rows {
            let (drug_a, drug_b, severity, description) = row?;
            let severity: Severity = severity
                .parse()
                .map_err(DbError::Constraint)?;
            rules.push(InteractionRule {
                drug_a,
                drug_b,
                severity,
                description,
            });
        }
        Ok(rules)
    }
}

/// Intermediate row struct for database mapping.
struct DrugRow {
    drug_key: String,
    name: String,
    aliases: String,
    ndc: Option<String>,
    dosage_range: Option<String>,
    schedule: Option<String>,
    active: bool,
}

impl TryFrom<DrugRow> for Drug {
    type Error = DbError;

    fn try_from(row: DrugRow) -> Result<Self, Self::Error> {
        Ok(Drug {
            key: row.drug_key,
            name: row.name,
            aliases: serde_json::from_str(&row.aliases)?,
            ndc: row.ndc,
            dosage_range: row
                .dosage_range
                .map(|s| serde_json::from_str(&s))
                .transpose()?,
            schedule: row
                .schedule
                .map(|s| s.parse().map_err(DbError::Constraint))
                .transpose()?,
            active: row.active,
        })
    }
}

/// Escape special FTS5 characters and prepare query for prefix matching.
fn escape_fts_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .map(|word| format!("{}*", word))
        .collect::<Vec<_>>()
        .join(" ")
}
