//! Inventory persistence.
//!
//! The in-memory ledger is authoritative at runtime; these operations load it
//! at startup and write quantities back after dispense/replenish.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::inventory::InventoryItem;

impl Database {
    /// Insert or update an inventory row.
    pub fn upsert_inventory_item(&self, item: &InventoryItem) -> DbResult<()> {
        self.conn().execute(
            r#"
            INSERT INTO inventory (drug_key, quantity_on_hand, reorder_level, expiration_date, updated_at)
            VALUES (?1, ?2, ?3, ?4, datetime('now'))
            ON CONFLICT(drug_key) DO UPDATE SET
                quantity_on_hand = excluded.quantity_on_hand,
                reorder_level = excluded.reorder_level,
                expiration_date = excluded.expiration_date,
                updated_at = datetime('now')
            "#,
            params![
                item.drug_key,
                item.quantity_on_hand,
                item.reorder_level,
                item.expiration_date.map(|d| d.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Get one inventory row.
    pub fn get_inventory_item(&self, key: &str) -> DbResult<Option<InventoryItem>> {
        let result = self
            .conn()
            .query_row(
                r#"
                SELECT drug_key, quantity_on_hand, reorder_level, expiration_date
                FROM inventory
                WHERE drug_key = ?
                "#,
                [key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        result.map(row_to_item).transpose()
    }

    /// All inventory rows.
    pub fn list_inventory(&self) -> DbResult<Vec<InventoryItem>> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT drug_key, quantity_on_hand, reorder_level, expiration_date
            FROM inventory
            ORDER BY drug_key
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row_to_item(row?)?);
        }
        Ok(items)
    }

    /// Write back the authoritative quantity for one drug.
    pub fn set_inventory_quantity(&self, key: &str, quantity: u32) -> DbResult<bool> {
        let rows_affected = self.conn().execute(
            "UPDATE inventory SET quantity_on_hand = ?1, updated_at = datetime('now') WHERE drug_key = ?2",
            params![quantity, key],
        )?;
        Ok(rows_affected > 0)
    }
}

fn row_to_item(row: (String, u32, u32, Option<String>)) -> DbResult<InventoryItem> {
    let (drug_key, quantity_on_hand, reorder_level, expiration) = row;
    let expiration_date = expiration
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| DbError::Constraint(format!("bad expiration date for {drug_key}: {e}")))
        })
        .transpose()?;
    Ok(InventoryItem {
        drug_key,
        quantity_on_hand,
        reorder_level,
        expiration_date,
    })
}
