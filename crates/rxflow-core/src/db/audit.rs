//! Audit-log persistence and the SQLite-backed audit sink.

use std::sync::{Arc, Mutex};

use rusqlite::params;

use super::{Database, DbResult};
use crate::engine::{AuditEvent, AuditSink};

/// One persisted audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogEntry {
    pub id: i64,
    pub event_type: String,
    pub order_id: Option<String>,
    pub payload: String,
    pub created_at: String,
}

impl Database {
    /// Append an audit event.
    pub fn insert_audit_event(
        &self,
        event_type: &str,
        order_id: Option<&str>,
        payload: &str,
    ) -> DbResult<()> {
        self.conn().execute(
            "INSERT INTO audit_log (event_type, order_id, payload) VALUES (?1, ?2, ?3)",
            params![event_type, order_id, payload],
        )?;
        Ok(())
    }

    /// Most recent audit entries, newest first.
    pub fn recent_audit_events(&self, limit: usize) -> DbResult<Vec<AuditLogEntry>> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, event_type, order_id, payload, created_at
            FROM audit_log
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(AuditLogEntry {
                id: row.get(0)?,
                event_type: row.get(1)?,
                order_id: row.get(2)?,
                payload: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

/// Audit sink writing to the shared database.
///
/// Failures are swallowed and logged: a broken audit trail must never block
/// or fail the clinical decision it describes.
pub struct SqliteAuditSink {
    db: Arc<Mutex<Database>>,
}

impl SqliteAuditSink {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }
}

impl AuditSink for SqliteAuditSink {
    fn record(&self, event: &AuditEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!("audit event for {} not serializable: {err}", event.order_id());
                return;
            }
        };
        let db = self.db.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(err) =
            db.insert_audit_event(event.event_type(), Some(event.order_id()), &payload)
        {
            log::warn!("audit write failed for {}: {err}", event.order_id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_list() {
        let db = Database::open_in_memory().unwrap();
        db.insert_audit_event("order_verified", Some("RX-1"), "{}").unwrap();
        db.insert_audit_event("order_dispensed", Some("RX-1"), "{}").unwrap();

        let entries = db.recent_audit_events(10).unwrap();
        assert_eq!(entries.len(), 2);
        // Newest first
        assert_eq!(entries[0].event_type, "order_dispensed");
        assert_eq!(entries[1].event_type, "order_verified");
        assert_eq!(entries[0].order_id.as_deref(), Some("RX-1"));
    }

    #[test]
    fn test_sqlite_sink_records() {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let sink = SqliteAuditSink::new(db.clone());

        sink.record(&AuditEvent::OrderCancelled {
            order_id: "RX-9".into(),
            timestamp: "2026-01-01T00:00:00Z".into(),
        });

        let entries = db.lock().unwrap().recent_audit_events(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, "order_cancelled");
        assert!(entries[0].payload.contains("RX-9"));
    }
}
