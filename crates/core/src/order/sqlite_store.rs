//! SQLite-backed order store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::shipment::ShipmentStatus;

use super::{
    CreateOrderRequest, Order, OrderQuery, OrderStore, StatusUpdate, StoreError, UpdateOutcome,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ORDER_COLUMNS: &str = "id, tracking_code, customer_email, last_known_status, last_notified_status, last_checked_at, last_notified_at, pending_persist_status, pending_persist_at, created_at, updated_at";

/// SQLite-backed order store.
pub struct SqliteOrderStore {
    conn: Mutex<Connection>,
}

impl SqliteOrderStore {
    /// Create a new SQLite order store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        // The audit store writes to the same file from another connection
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite order store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                tracking_code TEXT,
                customer_email TEXT NOT NULL,
                last_known_status TEXT,
                last_notified_status TEXT,
                last_checked_at TEXT,
                last_notified_at TEXT,
                pending_persist_status TEXT,
                pending_persist_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_orders_updated_at ON orders(updated_at);
            CREATE INDEX IF NOT EXISTS idx_orders_last_known_status ON orders(last_known_status);
            CREATE INDEX IF NOT EXISTS idx_orders_pending_persist ON orders(pending_persist_status);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))
    }

    fn row_to_order(row: &rusqlite::Row) -> rusqlite::Result<Order> {
        let status_at = |idx: usize| -> rusqlite::Result<Option<ShipmentStatus>> {
            Ok(row
                .get::<_, Option<String>>(idx)?
                .map(|s| ShipmentStatus::from_provider_code(&s)))
        };
        let time_at = |idx: usize| -> rusqlite::Result<Option<DateTime<Utc>>> {
            Ok(row
                .get::<_, Option<String>>(idx)?
                .and_then(|s| parse_timestamp(&s)))
        };

        Ok(Order {
            id: row.get(0)?,
            tracking_code: row.get(1)?,
            customer_email: row.get(2)?,
            last_known_status: status_at(3)?,
            last_notified_status: status_at(4)?,
            last_checked_at: time_at(5)?,
            last_notified_at: time_at(6)?,
            pending_persist_status: status_at(7)?,
            pending_persist_at: time_at(8)?,
            // Only this store writes these columns, so a parse failure means a corrupt row
            created_at: time_at(9)?.unwrap_or_else(Utc::now),
            updated_at: time_at(10)?.unwrap_or_else(Utc::now),
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Order>, StoreError> {
        conn.query_row(
            &format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS),
            params![id],
            Self::row_to_order,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }
}

/// Fixed-width RFC 3339 so that lexicographic order matches time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

impl OrderStore for SqliteOrderStore {
    fn create(&self, request: CreateOrderRequest) -> Result<Order, StoreError> {
        let conn = self.conn()?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO orders (id, tracking_code, customer_email, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            params![
                id,
                request.tracking_code,
                request.customer_email,
                format_timestamp(now),
                format_timestamp(now),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Self::fetch(&conn, &id)?.ok_or(StoreError::NotFound(id))
    }

    fn get(&self, id: &str) -> Result<Option<Order>, StoreError> {
        let conn = self.conn()?;
        Self::fetch(&conn, id)
    }

    fn get_orders_needing_tracking_check(
        &self,
        query: &OrderQuery,
    ) -> Result<Vec<Order>, StoreError> {
        let conn = self.conn()?;

        let mut conditions = vec![
            "tracking_code IS NOT NULL".to_string(),
            "tracking_code != ''".to_string(),
            "updated_at >= ?".to_string(),
        ];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(format_timestamp(query.cutoff(Utc::now())))];

        if !query.exclude_statuses.is_empty() {
            let placeholders = vec!["?"; query.exclude_statuses.len()].join(", ");
            conditions.push(format!(
                "(last_known_status IS NULL OR last_known_status NOT IN ({}))",
                placeholders
            ));
            for status in &query.exclude_statuses {
                params.push(Box::new(status.as_str()));
            }
        }
        params.push(Box::new(query.limit as i64));

        let sql = format!(
            "SELECT {} FROM orders WHERE {} ORDER BY last_checked_at IS NOT NULL, last_checked_at ASC, created_at ASC LIMIT ?",
            ORDER_COLUMNS,
            conditions.join(" AND ")
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_order)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn update_order_status(&self, update: &StatusUpdate) -> Result<UpdateOutcome, StoreError> {
        let conn = self.conn()?;

        let notified_at = update.notified_at.map(format_timestamp);
        let changed = conn
            .execute(
                r#"
                UPDATE orders SET
                    last_known_status = ?1,
                    last_checked_at = ?2,
                    updated_at = ?2,
                    last_notified_status = CASE WHEN ?3 IS NULL THEN last_notified_status ELSE ?1 END,
                    last_notified_at = COALESCE(?3, last_notified_at),
                    pending_persist_status = NULL,
                    pending_persist_at = NULL
                WHERE id = ?4 AND last_known_status IS ?5
                "#,
                params![
                    update.new_status.as_str(),
                    format_timestamp(update.checked_at),
                    notified_at,
                    update.order_id,
                    update.expected_previous.map(ShipmentStatus::as_str),
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if changed > 0 {
            return Ok(UpdateOutcome::Updated);
        }

        match Self::fetch(&conn, &update.order_id)? {
            Some(_) => Ok(UpdateOutcome::Conflict),
            None => Err(StoreError::NotFound(update.order_id.clone())),
        }
    }

    fn record_check(&self, order_id: &str, checked_at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn()?;

        let changed = conn
            .execute(
                "UPDATE orders SET last_checked_at = ? WHERE id = ?",
                params![format_timestamp(checked_at), order_id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(StoreError::NotFound(order_id.to_string()));
        }
        Ok(())
    }

    fn mark_pending_persist(
        &self,
        order_id: &str,
        status: ShipmentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;

        let changed = conn
            .execute(
                "UPDATE orders SET pending_persist_status = ?, pending_persist_at = ? WHERE id = ?",
                params![status.as_str(), format_timestamp(at), order_id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(StoreError::NotFound(order_id.to_string()));
        }
        Ok(())
    }

    fn list_pending_anomalies(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM orders WHERE pending_persist_status IS NOT NULL ORDER BY pending_persist_at ASC LIMIT ?",
                ORDER_COLUMNS
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit as i64], Self::row_to_order)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn count_pending_anomalies(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM orders WHERE pending_persist_status IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(count as usize)
    }
}
