//! Exchange orchestration: estimates and order creation
//!
//! The orchestrator owns the commission asymmetry between vendors: StealthEX
//! receives the rate inside the provider call and returns an already
//! marked-up amount, ChangeNOW knows nothing about the commission and the
//! markup is applied here. Exactly one of the two happens per request.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::application::commission::CommissionService;
use crate::domain::commission::apply_markup;
use crate::domain::provider::ProviderClient;
use crate::domain::validation::validate_address;
use crate::infrastructure::store::OrderStore;
use crate::shared::errors::ExchangeError;
use crate::shared::types::{
    AmountRange, CreateOrderRequest, Currency, EstimateRequest, OrderRecord, ProviderKind, Quote,
    RangeRequest,
};

pub struct ExchangeService {
    clients: HashMap<ProviderKind, Arc<dyn ProviderClient>>,
    orders: Arc<dyn OrderStore>,
    commission: Arc<CommissionService>,
}

impl ExchangeService {
    pub fn new(
        clients: Vec<Arc<dyn ProviderClient>>,
        orders: Arc<dyn OrderStore>,
        commission: Arc<CommissionService>,
    ) -> Self {
        let clients = clients.into_iter().map(|c| (c.kind(), c)).collect();
        Self {
            clients,
            orders,
            commission,
        }
    }

    fn client(&self, provider: ProviderKind) -> Result<&dyn ProviderClient, ExchangeError> {
        self.clients
            .get(&provider)
            .map(|c| c.as_ref())
            .ok_or_else(|| {
                ExchangeError::Config(format!("{} provider not configured", provider.as_str()))
            })
    }

    /// Quote the receive amount with the platform markup applied exactly once
    pub async fn estimate(
        &self,
        provider: ProviderKind,
        request: &EstimateRequest,
    ) -> Result<Quote, ExchangeError> {
        if !request.from_amount.is_finite() || request.from_amount <= 0.0 {
            return Err(ExchangeError::Validation(
                "fromAmount must be a positive number".to_string(),
            ));
        }

        let rate = self.commission.get();
        let client = self.client(provider)?;
        let estimate = client.get_estimate(request, rate).await?;

        let (to_amount, original_to_amount) = if estimate.commission_applied {
            // the provider already baked the markup into its figure
            (estimate.to_amount, estimate.to_amount)
        } else {
            (apply_markup(estimate.to_amount, rate), estimate.to_amount)
        };

        if to_amount <= 0.0 {
            return Err(ExchangeError::AmountTooLow);
        }

        Ok(Quote {
            from_currency: request.from_currency.to_lowercase(),
            to_currency: request.to_currency.to_lowercase(),
            from_amount: request.from_amount,
            to_amount,
            original_to_amount,
            markup_percentage: rate,
            rate_id: estimate.rate_id,
            valid_until: estimate.valid_until,
            min_amount: None,
            max_amount: None,
        })
    }

    /// Min/max deposit bounds for a pair
    pub async fn get_range(
        &self,
        provider: ProviderKind,
        request: &RangeRequest,
    ) -> Result<AmountRange, ExchangeError> {
        self.client(provider)?.get_range(request).await
    }

    /// Tradable currencies straight from the provider (uncached)
    pub async fn list_currencies(
        &self,
        provider: ProviderKind,
        network: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<Currency>, ExchangeError> {
        self.client(provider)?
            .list_currencies(network, active_only)
            .await
    }

    /// Place an order with the provider and persist the resulting record.
    ///
    /// Preconditions run in a fixed order and all reject before any
    /// provider call; a provider failure leaves no local record behind.
    pub async fn create_order(
        &self,
        provider: ProviderKind,
        request: &CreateOrderRequest,
    ) -> Result<OrderRecord, ExchangeError> {
        if request.from_currency.trim().is_empty()
            || request.to_currency.trim().is_empty()
            || request.destination_address.trim().is_empty()
        {
            return Err(ExchangeError::Validation(
                "fromCurrency, toCurrency and destinationAddress are required".to_string(),
            ));
        }

        if !request.from_amount.is_finite() || request.from_amount <= 0.0 {
            return Err(ExchangeError::Validation(
                "fromAmount must be a positive number".to_string(),
            ));
        }

        let to_network = request
            .to_network
            .as_deref()
            .unwrap_or(&request.to_currency);
        if !validate_address(&request.destination_address, to_network) {
            return Err(ExchangeError::Validation(format!(
                "invalid destination address for network {}",
                to_network
            )));
        }

        if let Some(refund_address) = &request.refund_address {
            let from_network = request
                .from_network
                .as_deref()
                .unwrap_or(&request.from_currency);
            if !validate_address(refund_address, from_network) {
                return Err(ExchangeError::Validation(format!(
                    "invalid refund address for network {}",
                    from_network
                )));
            }
        }

        if request.flow.is_fixed_rate() && request.rate_id.as_deref().unwrap_or("").is_empty() {
            return Err(ExchangeError::Validation(
                "rateId is required for fixed-rate exchanges".to_string(),
            ));
        }

        let rate = self.commission.get();
        let client = self.client(provider)?;
        let order = client.create_exchange(request, rate).await?;

        let record = OrderRecord::new(provider, &order, request);
        self.orders.insert(&record)?;
        info!(
            "Created {} order {} ({} -> {})",
            provider.as_str(),
            record.id,
            record.from_currency,
            record.to_currency
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::MockProvider;
    use crate::infrastructure::store::{MemoryStore, OrderStore};
    use crate::shared::types::{Flow, SwapStatus};
    use std::sync::atomic::Ordering;

    fn estimate_request(amount: f64) -> EstimateRequest {
        EstimateRequest {
            from_currency: "btc".to_string(),
            to_currency: "eth".to_string(),
            from_amount: amount,
            from_network: None,
            to_network: None,
            flow: Flow::Standard,
        }
    }

    fn create_request() -> CreateOrderRequest {
        CreateOrderRequest {
            from_currency: "btc".to_string(),
            to_currency: "eth".to_string(),
            from_amount: 0.01,
            destination_address: format!("0x{}", "a1".repeat(20)),
            from_network: Some("btc".to_string()),
            to_network: Some("eth".to_string()),
            refund_address: None,
            refund_extra_id: None,
            extra_id: None,
            flow: Flow::Standard,
            rate_id: None,
        }
    }

    fn service(provider: Arc<MockProvider>, store: Arc<MemoryStore>) -> ExchangeService {
        let commission = Arc::new(CommissionService::new(store.clone()));
        ExchangeService::new(
            vec![provider as Arc<dyn ProviderClient>],
            store,
            commission,
        )
    }

    #[tokio::test]
    async fn test_changenow_markup_applied_by_orchestrator() {
        let provider = Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305));
        let store = Arc::new(MemoryStore::new());
        let service = service(provider.clone(), store);

        let quote = service
            .estimate(ProviderKind::ChangeNow, &estimate_request(0.01))
            .await
            .unwrap();

        assert!((quote.to_amount - 0.30378).abs() < 1e-12);
        assert_eq!(quote.original_to_amount, 0.305);
        assert_eq!(quote.markup_percentage, 0.4);
        assert_eq!(provider.estimate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stealthex_markup_applied_by_provider() {
        let provider = Arc::new(MockProvider::new(ProviderKind::StealthEx, 0.30378));
        let store = Arc::new(MemoryStore::new());
        let service = service(provider.clone(), store);

        let quote = service
            .estimate(ProviderKind::StealthEx, &estimate_request(0.01))
            .await
            .unwrap();

        // the provider figure is used as-is, no second markup
        assert_eq!(quote.to_amount, 0.30378);
        assert_eq!(quote.original_to_amount, 0.30378);
        assert_eq!(quote.markup_percentage, 0.4);
        // and the rate travelled into the provider call
        assert_eq!(*provider.last_commission.lock().unwrap(), Some(0.4));
    }

    #[tokio::test]
    async fn test_estimate_rejects_non_positive_amount() {
        let provider = Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305));
        let store = Arc::new(MemoryStore::new());
        let service = service(provider.clone(), store);

        for amount in [0.0, -1.0, f64::NAN] {
            let err = service
                .estimate(ProviderKind::ChangeNow, &estimate_request(amount))
                .await
                .unwrap_err();
            assert!(matches!(err, ExchangeError::Validation(_)));
        }
        assert_eq!(provider.estimate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_quote_is_amount_too_low() {
        let provider = Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.0));
        let store = Arc::new(MemoryStore::new());
        let service = service(provider, store);

        let err = service
            .estimate(ProviderKind::ChangeNow, &estimate_request(0.000001))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::AmountTooLow));
        assert_eq!(err.category(), "amount_too_low");
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_config_error() {
        let provider = Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305));
        let store = Arc::new(MemoryStore::new());
        let service = service(provider, store);

        let err = service
            .estimate(ProviderKind::StealthEx, &estimate_request(0.01))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Config(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_destination_before_provider_call() {
        let provider = Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305));
        let store = Arc::new(MemoryStore::new());
        let service = service(provider.clone(), store.clone());

        let mut request = create_request();
        request.destination_address = "notanaddress".to_string();

        let err = service
            .create_order(ProviderKind::ChangeNow, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Validation(_)));
        assert_eq!(provider.create_calls.load(Ordering::SeqCst), 0);
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_validates_refund_address_against_from_network() {
        let provider = Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305));
        let store = Arc::new(MemoryStore::new());
        let service = service(provider.clone(), store);

        let mut request = create_request();
        request.refund_address = Some("tooshort".to_string());

        let err = service
            .create_order(ProviderKind::ChangeNow, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Validation(_)));
        assert_eq!(provider.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_requires_rate_id_for_fixed_rate() {
        let provider = Arc::new(MockProvider::new(ProviderKind::ChangeNow, 0.305));
        let store = Arc::new(MemoryStore::new());
        let service = service(provider.clone(), store);

        let mut request = create_request();
        request.flow = Flow::FixedRate;

        let err = service
            .create_order(ProviderKind::ChangeNow, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Validation(_)));
        assert_eq!(provider.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_persists_awaiting_deposit_record() {
        let provider = Arc::new(MockProvider::new(ProviderKind::StealthEx, 0.303));
        let store = Arc::new(MemoryStore::new());
        let service = service(provider.clone(), store.clone());

        let record = service
            .create_order(ProviderKind::StealthEx, &create_request())
            .await
            .unwrap();

        assert_eq!(record.status, SwapStatus::AwaitingDeposit);
        assert_eq!(record.stealthex_id.as_deref(), Some("prov-1"));
        assert!(record.changenow_id.is_none());
        assert_eq!(*provider.last_commission.lock().unwrap(), Some(0.4));

        let stored = store.get(&record.id).unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_no_record() {
        let provider = Arc::new(
            MockProvider::new(ProviderKind::ChangeNow, 0.305).with_failing_create(),
        );
        let store = Arc::new(MemoryStore::new());
        let service = service(provider, store.clone());

        let err = service
            .create_order(ProviderKind::ChangeNow, &create_request())
            .await
            .unwrap_err();

        // the upstream detail is preserved verbatim
        match err {
            ExchangeError::Upstream { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "amount below minimum");
            }
            other => panic!("expected upstream error, got {:?}", other.category()),
        }
        assert!(store.list().unwrap().is_empty());
    }
}
