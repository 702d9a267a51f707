//! Provider client interface

use async_trait::async_trait;

use crate::shared::errors::ExchangeError;
use crate::shared::types::{
    AmountRange, CreateOrderRequest, Currency, EstimateRequest, OrderDetails, ProviderEstimate,
    ProviderKind, ProviderOrder, RangeRequest,
};

/// Common interface for all upstream exchange providers
///
/// Commission handling is asymmetric between vendors: adapters that forward
/// `commission_percent` upstream report `commission_applied = true` on their
/// estimates, everyone else leaves the markup to the orchestrator. Exactly
/// one side applies it.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// List tradable currencies, optionally filtered by network
    async fn list_currencies(
        &self,
        network: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<Currency>, ExchangeError>;

    /// Quote the receive amount for a pair and deposit amount
    async fn get_estimate(
        &self,
        request: &EstimateRequest,
        commission_percent: f64,
    ) -> Result<ProviderEstimate, ExchangeError>;

    /// Min/max deposit bounds for a pair
    async fn get_range(&self, request: &RangeRequest) -> Result<AmountRange, ExchangeError>;

    /// Place an exchange order and obtain the deposit address
    async fn create_exchange(
        &self,
        request: &CreateOrderRequest,
        commission_percent: f64,
    ) -> Result<ProviderOrder, ExchangeError>;

    /// Fetch the live state of a previously created order
    async fn get_order(&self, id: &str) -> Result<OrderDetails, ExchangeError>;
}
