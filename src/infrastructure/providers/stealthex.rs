//! StealthEX API client
//!
//! The canonical wire shape is the v4 route shape (currency = {symbol,
//! network} pair, amounts nested under deposit/withdrawal). Older orders can
//! still come back in the legacy symbol-only shape; both collapse onto the
//! same `OrderDetails` through an untagged union.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::domain::provider::ProviderClient;
use crate::shared::errors::ExchangeError;
use crate::shared::types::{
    AmountRange, CreateOrderRequest, Currency, EstimateRequest, Flow, OrderDetails,
    ProviderEstimate, ProviderKind, ProviderOrder, RangeRequest,
};

const DEFAULT_BASE_URL: &str = "https://api.stealthex.io";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
const CURRENCY_PAGE_LIMIT: u32 = 250;

/// Currency entry from `GET /v4/currencies`
#[derive(Debug, Deserialize)]
struct SxCurrency {
    symbol: String,
    name: String,
    #[serde(default)]
    icon_url: Option<String>,
    #[serde(default)]
    network: Option<String>,
    #[serde(default)]
    extra_id: Option<String>,
    #[serde(default)]
    address_regex: Option<String>,
    #[serde(default)]
    extra_id_regex: Option<String>,
}

#[derive(Debug, Serialize)]
struct SxRouteLeg {
    symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<String>,
}

#[derive(Debug, Serialize)]
struct SxRoute {
    from: SxRouteLeg,
    to: SxRouteLeg,
}

impl SxRoute {
    fn new(
        from: &str,
        from_network: Option<&String>,
        to: &str,
        to_network: Option<&String>,
    ) -> Self {
        Self {
            from: SxRouteLeg {
                symbol: from.to_lowercase(),
                network: from_network.map(|n| n.to_lowercase()),
            },
            to: SxRouteLeg {
                symbol: to.to_lowercase(),
                network: to_network.map(|n| n.to_lowercase()),
            },
        }
    }
}

fn rate_for(flow: Flow) -> &'static str {
    if flow.is_fixed_rate() {
        "fixed"
    } else {
        "floating"
    }
}

/// Request body for `POST /v4/rates/estimated-amount`
#[derive(Debug, Serialize)]
struct SxEstimateRequest {
    route: SxRoute,
    amount: f64,
    estimation: &'static str,
    rate: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_fee_percent: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SxRateLock {
    id: String,
    #[serde(default)]
    valid_until: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SxEstimate {
    estimated_amount: f64,
    #[serde(default)]
    rate: Option<SxRateLock>,
}

/// Request body for `POST /v4/exchanges`
#[derive(Debug, Serialize)]
struct SxExchangeRequest {
    route: SxRoute,
    amount: f64,
    estimation: &'static str,
    rate: &'static str,
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refund_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refund_extra_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_fee_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_id: Option<String>,
}

/// One leg of a route-shaped exchange
#[derive(Debug, Deserialize)]
struct SxSide {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    expected_amount: Option<f64>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    extra_id: Option<String>,
    #[serde(default)]
    tx_hash: Option<String>,
}

/// v4 route-shaped exchange
#[derive(Debug, Deserialize)]
struct SxRouteExchange {
    id: String,
    status: String,
    deposit: SxSide,
    withdrawal: SxSide,
}

/// Legacy symbol-only exchange; amounts arrive as strings
#[derive(Debug, Deserialize)]
struct SxLegacyExchange {
    id: String,
    status: String,
    currency_from: String,
    #[serde(default)]
    currency_to: Option<String>,
    #[serde(default)]
    amount_from: Option<serde_json::Value>,
    #[serde(default)]
    amount_to: Option<serde_json::Value>,
    #[serde(default)]
    amount_estimated: Option<serde_json::Value>,
    #[serde(default)]
    address_from: Option<String>,
    #[serde(default)]
    address_to: Option<String>,
    #[serde(default)]
    extra_id_from: Option<String>,
    #[serde(default)]
    tx_from: Option<String>,
    #[serde(default)]
    tx_to: Option<String>,
}

/// Either upstream generation; route tried first since it carries more
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SxExchange {
    Route(SxRouteExchange),
    Legacy(SxLegacyExchange),
}

fn value_to_f64(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

impl SxExchange {
    fn into_details(self) -> OrderDetails {
        match self {
            SxExchange::Route(ex) => OrderDetails {
                provider_id: ex.id,
                raw_status: ex.status,
                from_currency: ex.deposit.symbol,
                to_currency: ex.withdrawal.symbol,
                payin_address: ex.deposit.address,
                payin_extra_id: ex.deposit.extra_id,
                payout_address: ex.withdrawal.address,
                amount_from: ex.deposit.amount,
                amount_to: ex.withdrawal.amount,
                expected_amount_from: ex.deposit.expected_amount,
                expected_amount_to: ex.withdrawal.expected_amount,
                payin_hash: ex.deposit.tx_hash,
                payout_hash: ex.withdrawal.tx_hash,
            },
            SxExchange::Legacy(ex) => {
                let amount_from = ex.amount_from.as_ref().and_then(value_to_f64);
                let expected_to = ex.amount_estimated.as_ref().and_then(value_to_f64);
                let amount_to = ex.amount_to.as_ref().and_then(value_to_f64);
                OrderDetails {
                    provider_id: ex.id,
                    raw_status: ex.status,
                    from_currency: Some(ex.currency_from),
                    to_currency: ex.currency_to,
                    payin_address: ex.address_from,
                    payin_extra_id: ex.extra_id_from,
                    payout_address: ex.address_to,
                    amount_from,
                    amount_to: amount_to.or(expected_to),
                    expected_amount_from: amount_from,
                    expected_amount_to: expected_to,
                    payin_hash: ex.tx_from,
                    payout_hash: ex.tx_to,
                }
            }
        }
    }
}

/// StealthEX API client
#[derive(Debug)]
pub struct StealthExClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl StealthExClient {
    /// Create a new client; a missing API key is a hard configuration error
    pub fn new(api_key: impl Into<String>) -> Result<Self, ExchangeError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL (for testing)
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ExchangeError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ExchangeError::Config(
                "StealthEX API key not configured".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ExchangeError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: base_url.into(),
        })
    }

    async fn upstream_error(response: reqwest::Response) -> ExchangeError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = extract_detail(&body).unwrap_or(body);
        ExchangeError::Upstream { status, message }
    }
}

/// Pull the human detail out of a StealthEX error body, keeping it verbatim
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/err/details")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("message").and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[async_trait]
impl ProviderClient for StealthExClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::StealthEx
    }

    async fn list_currencies(
        &self,
        network: Option<&str>,
        _active_only: bool,
    ) -> Result<Vec<Currency>, ExchangeError> {
        // the v4 catalog has no active flag; everything listed is tradable
        let mut query = vec![("limit", CURRENCY_PAGE_LIMIT.to_string())];
        if let Some(n) = network {
            query.push(("network", n.to_lowercase()));
        }

        let url = format!("{}/v4/currencies", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let currencies: Vec<SxCurrency> = response.json().await?;
        debug!("StealthEX returned {} currencies", currencies.len());

        let mapped = currencies
            .into_iter()
            .map(|c| Currency {
                ticker: c.symbol,
                name: c.name,
                image: c.icon_url,
                network: c.network,
                has_extra_id: c.extra_id.is_some(),
                extra_id_name: c.extra_id,
                address_regex: c.address_regex,
                extra_id_regex: c.extra_id_regex,
            })
            .collect();

        Ok(mapped)
    }

    async fn get_estimate(
        &self,
        request: &EstimateRequest,
        commission_percent: f64,
    ) -> Result<ProviderEstimate, ExchangeError> {
        if !request.from_amount.is_finite() || request.from_amount <= 0.0 {
            return Err(ExchangeError::Validation(
                "fromAmount must be a positive number".to_string(),
            ));
        }

        // the provider bakes the commission into estimated_amount itself
        let body = SxEstimateRequest {
            route: SxRoute::new(
                &request.from_currency,
                request.from_network.as_ref(),
                &request.to_currency,
                request.to_network.as_ref(),
            ),
            amount: request.from_amount,
            estimation: "direct",
            rate: rate_for(request.flow),
            additional_fee_percent: Some(commission_percent),
        };

        let url = format!("{}/v4/rates/estimated-amount", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let estimate: SxEstimate = response.json().await?;
        let (rate_id, valid_until) = match estimate.rate {
            Some(lock) => (Some(lock.id), lock.valid_until),
            None => (None, None),
        };

        Ok(ProviderEstimate {
            to_amount: estimate.estimated_amount,
            rate_id,
            valid_until,
            commission_applied: true,
        })
    }

    async fn get_range(&self, request: &RangeRequest) -> Result<AmountRange, ExchangeError> {
        #[derive(Debug, Serialize)]
        struct SxRangeRequest {
            route: SxRoute,
            estimation: &'static str,
            rate: &'static str,
        }

        #[derive(Debug, Deserialize)]
        struct SxRange {
            min_amount: f64,
            #[serde(default)]
            max_amount: Option<f64>,
        }

        let body = SxRangeRequest {
            route: SxRoute::new(
                &request.from_currency,
                request.from_network.as_ref(),
                &request.to_currency,
                request.to_network.as_ref(),
            ),
            estimation: "direct",
            rate: rate_for(request.flow),
        };

        let url = format!("{}/v4/rates/range", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let range: SxRange = response.json().await?;
        Ok(AmountRange {
            min_amount: range.min_amount,
            max_amount: range.max_amount,
        })
    }

    async fn create_exchange(
        &self,
        request: &CreateOrderRequest,
        commission_percent: f64,
    ) -> Result<ProviderOrder, ExchangeError> {
        if request.flow.is_fixed_rate() && request.rate_id.as_deref().unwrap_or("").is_empty() {
            return Err(ExchangeError::Validation(
                "rateId is required for fixed-rate exchanges".to_string(),
            ));
        }

        let body = SxExchangeRequest {
            route: SxRoute::new(
                &request.from_currency,
                request.from_network.as_ref(),
                &request.to_currency,
                request.to_network.as_ref(),
            ),
            amount: request.from_amount,
            estimation: "direct",
            rate: rate_for(request.flow),
            address: request.destination_address.clone(),
            extra_id: request.extra_id.clone(),
            refund_address: request.refund_address.clone(),
            refund_extra_id: request.refund_extra_id.clone(),
            additional_fee_percent: Some(commission_percent),
            rate_id: request.rate_id.clone(),
        };

        let url = format!("{}/v4/exchanges", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let exchange: SxExchange = response.json().await?;
        let details = exchange.into_details();
        let payin_address = details.payin_address.ok_or(ExchangeError::Upstream {
            status: 200,
            message: "exchange response missing deposit address".to_string(),
        })?;

        Ok(ProviderOrder {
            provider_id: details.provider_id,
            payin_address,
            payin_extra_id: details.payin_extra_id,
            payout_address: details.payout_address.unwrap_or_default(),
            from_amount: details.amount_from.or(details.expected_amount_from),
            to_amount: details.amount_to.or(details.expected_amount_to),
        })
    }

    async fn get_order(&self, id: &str) -> Result<OrderDetails, ExchangeError> {
        let url = format!("{}/v4/exchanges/{}", self.base_url, id);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Err(ExchangeError::NotFound { id: id.to_string() });
        }
        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let exchange: SxExchange = response.json().await?;
        Ok(exchange.into_details())
    }
}
