//! Currency catalog with a short-lived cache
//!
//! The provider catalogs are volatile and rate-limited; entries are cached
//! for five minutes per provider+network and refetched after that.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::provider::ProviderClient;
use crate::shared::errors::ExchangeError;
use crate::shared::types::{Currency, ProviderKind};

pub const CATALOG_TTL: Duration = Duration::from_secs(300);

pub struct CurrencyCatalog {
    clients: HashMap<ProviderKind, Arc<dyn ProviderClient>>,
    ttl: Duration,
    cache: RwLock<HashMap<String, (Instant, Vec<Currency>)>>,
}

impl CurrencyCatalog {
    pub fn new(clients: Vec<Arc<dyn ProviderClient>>) -> Self {
        Self::with_ttl(clients, CATALOG_TTL)
    }

    pub fn with_ttl(clients: Vec<Arc<dyn ProviderClient>>, ttl: Duration) -> Self {
        let clients = clients.into_iter().map(|c| (c.kind(), c)).collect();
        Self {
            clients,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Tradable currencies for a provider, served from cache when fresh
    pub async fn list(
        &self,
        provider: ProviderKind,
        network: Option<&str>,
    ) -> Result<Vec<Currency>, ExchangeError> {
        let key = format!("{}:{}", provider.as_str(), network.unwrap_or("*"));

        if let Some((fetched_at, cached)) = self.cache.read().await.get(&key) {
            if fetched_at.elapsed() < self.ttl {
                debug!("Serving {} currencies from cache", key);
                return Ok(cached.clone());
            }
        }

        let client = self.clients.get(&provider).ok_or_else(|| {
            ExchangeError::Config(format!("{} provider not configured", provider.as_str()))
        })?;
        let currencies = client.list_currencies(network, true).await?;

        self.cache
            .write()
            .await
            .insert(key, (Instant::now(), currencies.clone()));
        Ok(currencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::MockProvider;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let provider = Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305));
        let catalog =
            CurrencyCatalog::new(vec![provider.clone() as Arc<dyn ProviderClient>]);

        catalog.list(ProviderKind::ChangeNow, Some("matic")).await.unwrap();
        catalog.list(ProviderKind::ChangeNow, Some("matic")).await.unwrap();

        assert_eq!(provider.currency_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let provider = Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305));
        let catalog = CurrencyCatalog::with_ttl(
            vec![provider.clone() as Arc<dyn ProviderClient>],
            Duration::ZERO,
        );

        catalog.list(ProviderKind::ChangeNow, None).await.unwrap();
        catalog.list(ProviderKind::ChangeNow, None).await.unwrap();

        assert_eq!(provider.currency_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_network_keys_are_cached_separately() {
        let provider = Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305));
        let catalog =
            CurrencyCatalog::new(vec![provider.clone() as Arc<dyn ProviderClient>]);

        catalog.list(ProviderKind::ChangeNow, Some("matic")).await.unwrap();
        catalog.list(ProviderKind::ChangeNow, Some("eth")).await.unwrap();

        assert_eq!(provider.currency_calls.load(Ordering::SeqCst), 2);
    }
}
