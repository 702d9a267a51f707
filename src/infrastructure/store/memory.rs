//! In-memory store for tests and ephemeral runs

use std::collections::HashMap;
use std::sync::Mutex;

use super::{OrderStore, SettingsStore};
use crate::shared::errors::StoreError;
use crate::shared::types::{OrderRecord, ProviderKind};

#[derive(Debug, Default)]
pub struct MemoryStore {
    orders: Mutex<Vec<OrderRecord>>,
    settings: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_orders(&self) -> Result<std::sync::MutexGuard<'_, Vec<OrderRecord>>, StoreError> {
        self.orders
            .lock()
            .map_err(|_| StoreError::Database("orders mutex poisoned".to_string()))
    }
}

impl OrderStore for MemoryStore {
    fn insert(&self, record: &OrderRecord) -> Result<(), StoreError> {
        let mut orders = self.lock_orders()?;
        if orders.iter().any(|r| r.id == record.id) {
            return Err(StoreError::Database(format!(
                "duplicate order id {}",
                record.id
            )));
        }
        orders.push(record.clone());
        Ok(())
    }

    fn upsert(&self, record: &OrderRecord) -> Result<(), StoreError> {
        let mut orders = self.lock_orders()?;
        match orders.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => orders.push(record.clone()),
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<OrderRecord>, StoreError> {
        Ok(self.lock_orders()?.iter().find(|r| r.id == id).cloned())
    }

    fn find_by_provider_id(
        &self,
        provider: ProviderKind,
        provider_id: &str,
    ) -> Result<Option<OrderRecord>, StoreError> {
        let orders = self.lock_orders()?;
        Ok(orders
            .iter()
            .find(|r| {
                let id = match provider {
                    ProviderKind::ChangeNow => r.changenow_id.as_deref(),
                    ProviderKind::StealthEx => r.stealthex_id.as_deref(),
                };
                id == Some(provider_id)
            })
            .cloned())
    }

    fn list(&self) -> Result<Vec<OrderRecord>, StoreError> {
        let mut orders = self.lock_orders()?.clone();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let settings = self
            .settings
            .lock()
            .map_err(|_| StoreError::Database("settings mutex poisoned".to_string()))?;
        Ok(settings.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut settings = self
            .settings
            .lock()
            .map_err(|_| StoreError::Database("settings mutex poisoned".to_string()))?;
        settings.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
