//! Status reconciliation against the upstream providers
//!
//! Every user-facing poll triggers one full reconcile: fetch the live order,
//! collapse the vendor status onto the internal state machine, overwrite the
//! persisted record. The overwrite happens even when nothing changed, so a
//! redundant poll is indistinguishable from a first one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::provider::ProviderClient;
use crate::domain::status::{advance, map_provider_status};
use crate::infrastructure::store::OrderStore;
use crate::shared::errors::ExchangeError;
use crate::shared::types::{OrderDetails, OrderRecord, ProviderKind, SwapStatus};

/// Result of one reconciliation pass
#[derive(Debug, Clone)]
pub struct ReconciledOrder {
    pub record: OrderRecord,
    pub details: OrderDetails,
}

pub struct StatusReconciler {
    clients: HashMap<ProviderKind, Arc<dyn ProviderClient>>,
    orders: Arc<dyn OrderStore>,
}

impl StatusReconciler {
    pub fn new(clients: Vec<Arc<dyn ProviderClient>>, orders: Arc<dyn OrderStore>) -> Self {
        let clients = clients.into_iter().map(|c| (c.kind(), c)).collect();
        Self { clients, orders }
    }

    fn client(&self, provider: ProviderKind) -> Result<&dyn ProviderClient, ExchangeError> {
        self.clients
            .get(&provider)
            .map(|c| c.as_ref())
            .ok_or_else(|| {
                ExchangeError::Config(format!("{} provider not configured", provider.as_str()))
            })
    }

    /// Refresh one order from its provider and persist the outcome.
    ///
    /// A provider 404 propagates as `NotFound` and leaves the local record
    /// untouched. A persistence failure is logged, not propagated: the
    /// caller still sees the freshly fetched status.
    pub async fn reconcile(&self, transaction_id: &str) -> Result<ReconciledOrder, ExchangeError> {
        let record = self
            .orders
            .get(transaction_id)?
            .ok_or_else(|| ExchangeError::NotFound {
                id: transaction_id.to_string(),
            })?;

        let provider = record.provider();
        let client = self.client(provider)?;
        let details = client.get_order(record.provider_order_id()).await?;

        let record = self.apply(record, &details);
        Ok(ReconciledOrder { record, details })
    }

    /// Repair path: fetch by provider id and upsert the local record,
    /// creating it when the row never made it to the store.
    pub async fn resync(
        &self,
        provider: ProviderKind,
        provider_id: &str,
    ) -> Result<ReconciledOrder, ExchangeError> {
        let client = self.client(provider)?;
        let details = client.get_order(provider_id).await?;

        let record = match self.orders.find_by_provider_id(provider, provider_id)? {
            Some(existing) => self.apply(existing, &details),
            None => {
                let record = record_from_details(provider, provider_id, &details);
                self.orders.insert(&record)?;
                info!(
                    "Recovered {} order {} into local store as {}",
                    provider.as_str(),
                    provider_id,
                    record.id
                );
                record
            }
        };

        Ok(ReconciledOrder { record, details })
    }

    fn apply(&self, mut record: OrderRecord, details: &OrderDetails) -> OrderRecord {
        match map_provider_status(&details.raw_status) {
            Some(observed) => {
                let next = advance(record.status, observed);
                if next != record.status {
                    info!(
                        "Order {} status {} -> {}",
                        record.id,
                        record.status.as_str(),
                        next.as_str()
                    );
                } else if observed != record.status {
                    warn!(
                        "Ignoring stale status {:?} for order {} in state {}",
                        details.raw_status,
                        record.id,
                        record.status.as_str()
                    );
                }
                record.status = next;
            }
            None => {
                warn!(
                    "Unknown provider status {:?} for order {}, keeping {}",
                    details.raw_status,
                    record.id,
                    record.status.as_str()
                );
            }
        }

        if let Some(amount) = details.amount_from {
            record.from_amount = amount;
        }
        if details.amount_to.is_some() {
            record.to_amount = details.amount_to;
        }
        record.updated_at = Utc::now();

        // idempotent full-record overwrite, even when nothing changed
        if let Err(e) = self.orders.upsert(&record) {
            warn!("Failed to persist status for order {}: {}", record.id, e);
        }

        record
    }
}

/// Build a local record for an order that exists only at the provider
fn record_from_details(
    provider: ProviderKind,
    provider_id: &str,
    details: &OrderDetails,
) -> OrderRecord {
    let now = Utc::now();
    let (changenow_id, stealthex_id) = match provider {
        ProviderKind::ChangeNow => (Some(provider_id.to_string()), None),
        ProviderKind::StealthEx => (None, Some(provider_id.to_string())),
    };
    let status = map_provider_status(&details.raw_status).unwrap_or(SwapStatus::AwaitingDeposit);

    OrderRecord {
        id: uuid::Uuid::new_v4().to_string(),
        changenow_id,
        stealthex_id,
        payin_address: details.payin_address.clone().unwrap_or_default(),
        payin_extra_id: details.payin_extra_id.clone(),
        payout_address: details.payout_address.clone().unwrap_or_default(),
        payout_extra_id: None,
        from_currency: details.from_currency.clone().unwrap_or_default(),
        to_currency: details.to_currency.clone().unwrap_or_default(),
        from_amount: details
            .amount_from
            .or(details.expected_amount_from)
            .unwrap_or(0.0),
        to_amount: details.amount_to.or(details.expected_amount_to),
        status,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::MockProvider;
    use crate::infrastructure::store::{MemoryStore, OrderStore};
    use crate::shared::errors::StoreError;
    use crate::shared::types::{CreateOrderRequest, Flow, ProviderOrder};
    use std::sync::atomic::Ordering;

    fn stored_record(store: &MemoryStore, provider: ProviderKind) -> OrderRecord {
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
            to_amount: None,
        };
        let record = OrderRecord::new(provider, &order, &request);
        store.insert(&record).unwrap();
        record
    }

    fn reconciler(provider: Arc<MockProvider>, store: Arc<MemoryStore>) -> StatusReconciler {
        StatusReconciler::new(vec![provider as Arc<dyn ProviderClient>], store)
    }

    #[tokio::test]
    async fn test_maps_and_persists_status() {
        let provider =
            Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305).with_status("finished"));
        let store = Arc::new(MemoryStore::new());
        let record = stored_record(&store, ProviderKind::ChangeNow);
        let reconciler = reconciler(provider, store.clone());

        let outcome = reconciler.reconcile(&record.id).await.unwrap();
        assert_eq!(outcome.record.status, SwapStatus::Completed);
        assert_eq!(outcome.record.to_amount, Some(0.303));

        let persisted = store.get(&record.id).unwrap().unwrap();
        assert_eq!(persisted.status, SwapStatus::Completed);
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let provider =
            Arc::new(MockProvider::new(ProviderKind::StealthEx, 0.303).with_status("exchanging"));
        let store = Arc::new(MemoryStore::new());
        let record = stored_record(&store, ProviderKind::StealthEx);
        let reconciler = reconciler(provider.clone(), store);

        let first = reconciler.reconcile(&record.id).await.unwrap();
        let second = reconciler.reconcile(&record.id).await.unwrap();

        assert_eq!(first.record.status, SwapStatus::Processing);
        assert_eq!(second.record.status, SwapStatus::Processing);
        assert_eq!(provider.order_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_terminal_status_is_sticky() {
        let provider =
            Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305).with_status("finished"));
        let store = Arc::new(MemoryStore::new());
        let record = stored_record(&store, ProviderKind::ChangeNow);
        let reconciler = reconciler(provider.clone(), store.clone());

        reconciler.reconcile(&record.id).await.unwrap();
        // a stale upstream answer must not revive a finished order
        provider.set_status("waiting");
        let outcome = reconciler.reconcile(&record.id).await.unwrap();

        assert_eq!(outcome.record.status, SwapStatus::Completed);
        let persisted = store.get(&record.id).unwrap().unwrap();
        assert_eq!(persisted.status, SwapStatus::Completed);
    }

    #[tokio::test]
    async fn test_unknown_vocabulary_keeps_current_status() {
        let provider =
            Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305).with_status("verifying"));
        let store = Arc::new(MemoryStore::new());
        let record = stored_record(&store, ProviderKind::ChangeNow);
        let reconciler = reconciler(provider, store.clone());

        let outcome = reconciler.reconcile(&record.id).await.unwrap();
        assert_eq!(outcome.record.status, SwapStatus::AwaitingDeposit);

        let persisted = store.get(&record.id).unwrap().unwrap();
        assert!(persisted.updated_at >= record.updated_at);
    }

    #[tokio::test]
    async fn test_provider_not_found_leaves_record_untouched() {
        let provider = Arc::new(
            MockProvider::new(ProviderKind::ChangeNow, 0.305).with_order_not_found(),
        );
        let store = Arc::new(MemoryStore::new());
        let record = stored_record(&store, ProviderKind::ChangeNow);
        let reconciler = reconciler(provider, store.clone());

        let err = reconciler.reconcile(&record.id).await.unwrap_err();
        assert!(matches!(err, ExchangeError::NotFound { .. }));

        let persisted = store.get(&record.id).unwrap().unwrap();
        assert_eq!(persisted, record);
    }

    #[tokio::test]
    async fn test_unknown_transaction_id_is_not_found() {
        let provider = Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305));
        let store = Arc::new(MemoryStore::new());
        let reconciler = reconciler(provider, store);

        let err = reconciler.reconcile("no-such-id").await.unwrap_err();
        assert!(matches!(err, ExchangeError::NotFound { .. }));
    }

    /// Order store whose writes always fail; reads delegate to an inner store
    struct ReadOnlyStore {
        inner: MemoryStore,
    }

    impl OrderStore for ReadOnlyStore {
        fn insert(&self, _record: &OrderRecord) -> Result<(), StoreError> {
            Err(StoreError::Database("disk full".to_string()))
        }

        fn upsert(&self, _record: &OrderRecord) -> Result<(), StoreError> {
            Err(StoreError::Database("disk full".to_string()))
        }

        fn get(&self, id: &str) -> Result<Option<OrderRecord>, StoreError> {
            self.inner.get(id)
        }

        fn find_by_provider_id(
            &self,
            provider: ProviderKind,
            provider_id: &str,
        ) -> Result<Option<OrderRecord>, StoreError> {
            self.inner.find_by_provider_id(provider, provider_id)
        }

        fn list(&self) -> Result<Vec<OrderRecord>, StoreError> {
            self.inner.list()
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_hide_fresh_status() {
        let provider =
            Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305).with_status("sending"));
        let inner = MemoryStore::new();
        let record = stored_record(&inner, ProviderKind::ChangeNow);
        let store = Arc::new(ReadOnlyStore { inner });
        let reconciler =
            StatusReconciler::new(vec![provider as Arc<dyn ProviderClient>], store);

        let outcome = reconciler.reconcile(&record.id).await.unwrap();
        assert_eq!(outcome.record.status, SwapStatus::Processing);
    }

    #[tokio::test]
    async fn test_resync_creates_missing_record() {
        let provider =
            Arc::new(MockProvider::new(ProviderKind::StealthEx, 0.303).with_status("confirming"));
        let store = Arc::new(MemoryStore::new());
        let reconciler = reconciler(provider, store.clone());

        let outcome = reconciler
            .resync(ProviderKind::StealthEx, "orphan-7")
            .await
            .unwrap();

        assert_eq!(outcome.record.status, SwapStatus::Processing);
        assert_eq!(outcome.record.stealthex_id.as_deref(), Some("orphan-7"));

        let found = store
            .find_by_provider_id(ProviderKind::StealthEx, "orphan-7")
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_resync_updates_existing_record() {
        let provider =
            Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305).with_status("finished"));
        let store = Arc::new(MemoryStore::new());
        let record = stored_record(&store, ProviderKind::ChangeNow);
        let reconciler = reconciler(provider, store.clone());

        let outcome = reconciler
            .resync(ProviderKind::ChangeNow, "prov-1")
            .await
            .unwrap();

        assert_eq!(outcome.record.id, record.id);
        assert_eq!(outcome.record.status, SwapStatus::Completed);
        assert_eq!(store.list().unwrap().len(), 1);
    }
}
