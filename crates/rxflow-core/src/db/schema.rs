//! SQLite schema definition.

/// Complete database schema for the pharmacy core.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Formulary (drug reference data)
-- ============================================================================

CREATE TABLE IF NOT EXISTS formulary (
    drug_key TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    aliases TEXT NOT NULL DEFAULT '[]',           -- JSON array of strings
    ndc TEXT,
    dosage_range TEXT,                            -- JSON object {min, max, unit, max_daily}
    schedule TEXT CHECK (schedule IN ('I', 'II', 'III', 'IV', 'V')),
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- FTS5 virtual table for medication search
CREATE VIRTUAL TABLE IF NOT EXISTS formulary_fts USING fts5(
    drug_key,
    name,
    aliases,
    content='formulary',
    content_rowid='rowid'
);

-- Triggers to keep FTS5 in sync with the main table
CREATE TRIGGER IF NOT EXISTS formulary_ai AFTER INSERT ON formulary BEGIN
    INSERT INTO formulary_fts(rowid, drug_key, name, aliases)
    VALUES (new.rowid, new.drug_key, new.name, new.aliases);
END;

CREATE TRIGGER IF NOT EXISTS formulary_ad AFTER DELETE ON formulary BEGIN
    INSERT INTO formulary_fts(formulary_fts, rowid, drug_key, name, aliases)
    VALUES ('delete', old.rowid, old.drug_key, old.name, old.aliases);
END;

CREATE TRIGGER IF NOT EXISTS formulary_au AFTER UPDATE ON formulary BEGIN
    INSERT INTO formulary_fts(formulary_fts, rowid, drug_key, name, aliases)
    VALUES ('delete', old.rowid, old.drug_key, old.name, old.aliases);
    INSERT INTO formulary_fts(rowid, drug_key, name, aliases)
    VALUES (new.rowid, new.drug_key, new.name, new.aliases);
END;

-- ============================================================================
-- Interaction Rules
-- ============================================================================

-- Pairs are stored normalized (lower-case, drug_a < drug_b) so that lookup
-- stays symmetric no matter which direction callers ask about.
CREATE TABLE IF NOT EXISTS interaction_rules (
    drug_a TEXT NOT NULL,
    drug_b TEXT NOT NULL,
    severity TEXT NOT NULL CHECK (severity IN ('minor', 'moderate', 'major', 'contraindicated')),
    description TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (drug_a, drug_b),
    CHECK (drug_a < drug_b)
);

-- ============================================================================
-- Inventory
-- ============================================================================

CREATE TABLE IF NOT EXISTS inventory (
    drug_key TEXT PRIMARY KEY,
    quantity_on_hand INTEGER NOT NULL DEFAULT 0 CHECK (quantity_on_hand >= 0),
    reorder_level INTEGER NOT NULL DEFAULT 10,
    expiration_date TEXT,                         -- RFC 3339
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Audit Log (append-only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type TEXT NOT NULL,
    order_id TEXT,
    payload TEXT NOT NULL,                        -- JSON event body
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_audit_order ON audit_log(order_id);
CREATE INDEX IF NOT EXISTS idx_audit_type ON audit_log(event_type);
"#;
