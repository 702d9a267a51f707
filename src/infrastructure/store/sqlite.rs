//! SQLite-backed order and settings stores

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension as _};

use super::{OrderStore, SettingsStore};
use crate::shared::errors::StoreError;
use crate::shared::types::{OrderRecord, ProviderKind, SwapStatus};

const ORDER_COLUMNS: &str = "id, changenow_id, stealthex_id, payin_address, payin_extra_id, \
     payout_address, payout_extra_id, from_currency, to_currency, from_amount, to_amount, \
     status, created_at, updated_at";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    StoreError::Database(format!("create store dir {}: {}", dir.display(), e))
                })?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;

        migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
    }
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS transactions (
  id TEXT PRIMARY KEY,
  changenow_id TEXT,
  stealthex_id TEXT,
  payin_address TEXT NOT NULL,
  payin_extra_id TEXT,
  payout_address TEXT NOT NULL,
  payout_extra_id TEXT,
  from_currency TEXT NOT NULL,
  to_currency TEXT NOT NULL,
  from_amount REAL NOT NULL,
  to_amount REAL,
  status TEXT NOT NULL,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  CHECK ((changenow_id IS NULL) <> (stealthex_id IS NULL))
);
CREATE INDEX IF NOT EXISTS transactions_status_idx ON transactions(status);
CREATE TABLE IF NOT EXISTS app_settings (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
"#,
    )?;
    Ok(())
}

fn parse_timestamp(raw: &str, col: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                col,
                rusqlite::types::Type::Text,
                format!("invalid timestamp {raw}").into(),
            )
        })
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderRecord> {
    let status_str: String = row.get(11)?;
    let status = SwapStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            11,
            rusqlite::types::Type::Text,
            format!("unknown order status: {status_str}").into(),
        )
    })?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    Ok(OrderRecord {
        id: row.get(0)?,
        changenow_id: row.get(1)?,
        stealthex_id: row.get(2)?,
        payin_address: row.get(3)?,
        payin_extra_id: row.get(4)?,
        payout_address: row.get(5)?,
        payout_extra_id: row.get(6)?,
        from_currency: row.get(7)?,
        to_currency: row.get(8)?,
        from_amount: row.get(9)?,
        to_amount: row.get(10)?,
        status,
        created_at: parse_timestamp(&created_at, 12)?,
        updated_at: parse_timestamp(&updated_at, 13)?,
    })
}

impl OrderStore for SqliteStore {
    fn insert(&self, record: &OrderRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO transactions ({ORDER_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                record.id,
                record.changenow_id,
                record.stealthex_id,
                record.payin_address,
                record.payin_extra_id,
                record.payout_address,
                record.payout_extra_id,
                record.from_currency,
                record.to_currency,
                record.from_amount,
                record.to_amount,
                record.status.as_str(),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn upsert(&self, record: &OrderRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO transactions ({ORDER_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) \
                 ON CONFLICT(id) DO UPDATE SET \
                   changenow_id = excluded.changenow_id, \
                   stealthex_id = excluded.stealthex_id, \
                   payin_address = excluded.payin_address, \
                   payin_extra_id = excluded.payin_extra_id, \
                   payout_address = excluded.payout_address, \
                   payout_extra_id = excluded.payout_extra_id, \
                   from_currency = excluded.from_currency, \
                   to_currency = excluded.to_currency, \
                   from_amount = excluded.from_amount, \
                   to_amount = excluded.to_amount, \
                   status = excluded.status, \
                   updated_at = excluded.updated_at"
            ),
            params![
                record.id,
                record.changenow_id,
                record.stealthex_id,
                record.payin_address,
                record.payin_extra_id,
                record.payout_address,
                record.payout_extra_id,
                record.from_currency,
                record.to_currency,
                record.from_amount,
                record.to_amount,
                record.status.as_str(),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<OrderRecord>, StoreError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM transactions WHERE id = ?1"),
                params![id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn find_by_provider_id(
        &self,
        provider: ProviderKind,
        provider_id: &str,
    ) -> Result<Option<OrderRecord>, StoreError> {
        let column = match provider {
            ProviderKind::ChangeNow => "changenow_id",
            ProviderKind::StealthEx => "stealthex_id",
        };
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM transactions WHERE {column} = ?1"),
                params![provider_id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn list(&self) -> Result<Vec<OrderRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM transactions ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map([], row_to_record)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl SettingsStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM app_settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO app_settings (key, value, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::{CreateOrderRequest, Flow, ProviderOrder};

    fn sample_record(provider: ProviderKind) -> OrderRecord {
        let request = CreateOrderRequest {
            from_currency: "btc".to_string(),
            to_currency: "eth".to_string(),
            from_amount: 0.01,
            destination_address: format!("0x{}", "a1".repeat(20)),
            from_network: None,
            to_network: Some("eth".to_string()),
            refund_address: None,
            refund_extra_id: None,
            extra_id: None,
            flow: Flow::Standard,
            rate_id: None,
        };
        let order = ProviderOrder {
            provider_id: "prov-1".to_string(),
            payin_address: "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string(),
            payin_extra_id: None,
            payout_address: request.destination_address.clone(),
            from_amount: Some(0.01),
            to_amount: Some(0.303),
        };
        OrderRecord::new(provider, &order, &request)
    }

    fn open_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("orders.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_insert_and_get_roundtrip() {
        let (_dir, store) = open_store();
        let record = sample_record(ProviderKind::ChangeNow);

        store.insert(&record).unwrap();
        let loaded = OrderStore::get(&store, &record.id).unwrap().unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.changenow_id.as_deref(), Some("prov-1"));
        assert!(loaded.stealthex_id.is_none());
        assert_eq!(loaded.status, SwapStatus::AwaitingDeposit);
        assert_eq!(loaded.from_amount, 0.01);
    }

    #[test]
    fn test_upsert_overwrites_status() {
        let (_dir, store) = open_store();
        let mut record = sample_record(ProviderKind::StealthEx);
        store.insert(&record).unwrap();

        record.status = SwapStatus::Processing;
        record.to_amount = Some(0.301);
        store.upsert(&record).unwrap();
        // a second identical write must be accepted too
        store.upsert(&record).unwrap();

        let loaded = OrderStore::get(&store, &record.id).unwrap().unwrap();
        assert_eq!(loaded.status, SwapStatus::Processing);
        assert_eq!(loaded.to_amount, Some(0.301));
    }

    #[test]
    fn test_find_by_provider_id() {
        let (_dir, store) = open_store();
        let record = sample_record(ProviderKind::StealthEx);
        store.insert(&record).unwrap();

        let found = store
            .find_by_provider_id(ProviderKind::StealthEx, "prov-1")
            .unwrap();
        assert_eq!(found.map(|r| r.id), Some(record.id));

        let missing = store
            .find_by_provider_id(ProviderKind::ChangeNow, "prov-1")
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_settings_roundtrip() {
        let (_dir, store) = open_store();
        assert!(SettingsStore::get(&store, "commission_rate").unwrap().is_none());

        SettingsStore::set(&store, "commission_rate", "0.4").unwrap();
        SettingsStore::set(&store, "commission_rate", "0.5").unwrap();
        assert_eq!(
            SettingsStore::get(&store, "commission_rate").unwrap().as_deref(),
            Some("0.5")
        );
    }

    #[test]
    fn test_exactly_one_provider_id_enforced() {
        let (_dir, store) = open_store();
        let mut record = sample_record(ProviderKind::ChangeNow);
        record.stealthex_id = Some("also-set".to_string());

        assert!(store.insert(&record).is_err());
    }
}
