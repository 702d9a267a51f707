//! Read-only analytics over persisted orders
//!
//! Volume and commission figures are approximations: prices are spot values
//! at read time and the commission uses the current rate, since per-order
//! snapshots are not part of the stored record.

use std::sync::Arc;

use crate::application::commission::CommissionService;
use crate::domain::commission::commission_usd;
use crate::infrastructure::pricing::SpotPriceSource;
use crate::infrastructure::store::OrderStore;
use crate::shared::errors::ExchangeError;
use crate::shared::types::SwapStatus;

/// Aggregated figures over all persisted orders
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsSummary {
    pub total_transactions: usize,
    pub completed_transactions: usize,
    pub success_rate_percent: f64,
    /// Raw sum of from-amounts across currencies (legacy figure)
    pub total_volume: f64,
    pub total_volume_usd: f64,
    pub total_commission_usd: f64,
}

pub struct AnalyticsService {
    orders: Arc<dyn OrderStore>,
    prices: Arc<dyn SpotPriceSource>,
    commission: Arc<CommissionService>,
}

impl AnalyticsService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        prices: Arc<dyn SpotPriceSource>,
        commission: Arc<CommissionService>,
    ) -> Self {
        Self {
            orders,
            prices,
            commission,
        }
    }

    pub async fn summary(&self) -> Result<AnalyticsSummary, ExchangeError> {
        let orders = self.orders.list()?;
        let prices = self.prices.usd_prices().await;
        let rate = self.commission.get();

        let mut total_volume = 0.0;
        let mut total_volume_usd = 0.0;
        let mut total_commission_usd = 0.0;
        let mut completed = 0usize;

        for order in &orders {
            total_volume += order.from_amount;

            if order.status != SwapStatus::Completed {
                continue;
            }
            completed += 1;

            let price = prices
                .get(&order.from_currency.to_uppercase())
                .copied()
                .unwrap_or(0.0);
            let usd_value = order.from_amount * price;
            total_volume_usd += usd_value;
            total_commission_usd += commission_usd(usd_value, rate);
        }

        let total = orders.len();
        let success_rate_percent = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        Ok(AnalyticsSummary {
            total_transactions: total,
            completed_transactions: completed,
            success_rate_percent,
            total_volume,
            total_volume_usd,
            total_commission_usd,
        })
    }
}
