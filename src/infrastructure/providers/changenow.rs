//! ChangeNOW v2 API client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::domain::provider::ProviderClient;
use crate::shared::errors::ExchangeError;
use crate::shared::types::{
    AmountRange, CreateOrderRequest, Currency, EstimateRequest, OrderDetails, ProviderEstimate,
    ProviderKind, ProviderOrder, RangeRequest,
};

const DEFAULT_BASE_URL: &str = "https://api.changenow.io/v2";
const API_KEY_HEADER: &str = "x-changenow-api-key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Currency entry from `GET /exchange/currencies`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CnCurrency {
    ticker: String,
    name: String,
    image: Option<String>,
    network: Option<String>,
    #[serde(default)]
    has_external_id: bool,
}

/// Response from `GET /exchange/estimated-amount`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CnEstimate {
    to_amount: f64,
    #[serde(default)]
    rate_id: Option<String>,
    #[serde(default)]
    valid_until: Option<String>,
}

/// Response from `GET /exchange/range`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CnRange {
    min_amount: f64,
    #[serde(default)]
    max_amount: Option<f64>,
}

/// Request body for `POST /exchange`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CnExchangeRequest {
    from_currency: String,
    to_currency: String,
    // upstream expects the amount as a string here
    from_amount: String,
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_network: Option<String>,
    flow: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refund_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refund_extra_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_id: Option<String>,
}

/// Response from `POST /exchange`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CnExchange {
    id: String,
    payin_address: String,
    payout_address: String,
    #[serde(default)]
    payin_extra_id: Option<String>,
    #[serde(default)]
    from_amount: Option<f64>,
    #[serde(default)]
    to_amount: Option<f64>,
}

/// Response from `GET /exchange/by-id`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CnOrder {
    id: String,
    status: String,
    #[serde(default)]
    from_currency: Option<String>,
    #[serde(default)]
    to_currency: Option<String>,
    #[serde(default)]
    payin_address: Option<String>,
    #[serde(default)]
    payin_extra_id: Option<String>,
    #[serde(default)]
    payout_address: Option<String>,
    #[serde(default)]
    amount_from: Option<f64>,
    #[serde(default)]
    amount_to: Option<f64>,
    #[serde(default)]
    expected_amount_from: Option<f64>,
    #[serde(default)]
    expected_amount_to: Option<f64>,
    #[serde(default)]
    payin_hash: Option<String>,
    #[serde(default)]
    payout_hash: Option<String>,
}

impl CnOrder {
    fn into_details(self) -> OrderDetails {
        OrderDetails {
            provider_id: self.id,
            raw_status: self.status,
            from_currency: self.from_currency,
            to_currency: self.to_currency,
            payin_address: self.payin_address,
            payin_extra_id: self.payin_extra_id,
            payout_address: self.payout_address,
            amount_from: self.amount_from,
            amount_to: self.amount_to,
            expected_amount_from: self.expected_amount_from,
            expected_amount_to: self.expected_amount_to,
            payin_hash: self.payin_hash,
            payout_hash: self.payout_hash,
        }
    }
}

/// ChangeNOW API client
#[derive(Debug)]
pub struct ChangeNowClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl ChangeNowClient {
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
                "ChangeNOW API key not configured".to_string(),
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

/// Pull the human detail out of a ChangeNOW error body, keeping it verbatim
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("error").and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[async_trait]
impl ProviderClient for ChangeNowClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ChangeNow
    }

    async fn list_currencies(
        &self,
        network: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<Currency>, ExchangeError> {
        let url = format!("{}/exchange/currencies", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("active", active_only.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let currencies: Vec<CnCurrency> = response.json().await?;
        debug!("ChangeNOW returned {} currencies", currencies.len());

        let mapped = currencies
            .into_iter()
            .filter(|c| match network {
                Some(n) => c
                    .network
                    .as_deref()
                    .is_some_and(|cn| cn.eq_ignore_ascii_case(n)),
                None => true,
            })
            .map(|c| Currency {
                ticker: c.ticker,
                name: c.name,
                image: c.image,
                network: c.network,
                has_extra_id: c.has_external_id,
                extra_id_name: None,
                address_regex: None,
                extra_id_regex: None,
            })
            .collect();

        Ok(mapped)
    }

    async fn get_estimate(
        &self,
        request: &EstimateRequest,
        _commission_percent: f64,
    ) -> Result<ProviderEstimate, ExchangeError> {
        // ChangeNOW has no commission parameter; the markup is applied by the caller
        if !request.from_amount.is_finite() || request.from_amount <= 0.0 {
            return Err(ExchangeError::Validation(
                "fromAmount must be a positive number".to_string(),
            ));
        }

        let mut query = vec![
            ("fromCurrency", request.from_currency.to_lowercase()),
            ("toCurrency", request.to_currency.to_lowercase()),
            ("fromAmount", request.from_amount.to_string()),
            ("flow", request.flow.as_str().to_string()),
        ];
        if let Some(n) = &request.from_network {
            query.push(("fromNetwork", n.to_lowercase()));
        }
        if let Some(n) = &request.to_network {
            query.push(("toNetwork", n.to_lowercase()));
        }

        let url = format!("{}/exchange/estimated-amount", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let estimate: CnEstimate = response.json().await?;
        Ok(ProviderEstimate {
            to_amount: estimate.to_amount,
            rate_id: estimate.rate_id,
            valid_until: estimate.valid_until,
            commission_applied: false,
        })
    }

    async fn get_range(&self, request: &RangeRequest) -> Result<AmountRange, ExchangeError> {
        let mut query = vec![
            ("fromCurrency", request.from_currency.to_lowercase()),
            ("toCurrency", request.to_currency.to_lowercase()),
            ("flow", request.flow.as_str().to_string()),
        ];
        if let Some(n) = &request.from_network {
            query.push(("fromNetwork", n.to_lowercase()));
        }
        if let Some(n) = &request.to_network {
            query.push(("toNetwork", n.to_lowercase()));
        }

        let url = format!("{}/exchange/range", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let range: CnRange = response.json().await?;
        Ok(AmountRange {
            min_amount: range.min_amount,
            max_amount: range.max_amount,
        })
    }

    async fn create_exchange(
        &self,
        request: &CreateOrderRequest,
        _commission_percent: f64,
    ) -> Result<ProviderOrder, ExchangeError> {
        // the upstream silently falls back to a stale rate when the id is missing
        if request.flow.is_fixed_rate() && request.rate_id.as_deref().unwrap_or("").is_empty() {
            return Err(ExchangeError::Validation(
                "rateId is required for fixed-rate exchanges".to_string(),
            ));
        }

        let body = CnExchangeRequest {
            from_currency: request.from_currency.to_lowercase(),
            to_currency: request.to_currency.to_lowercase(),
            from_amount: request.from_amount.to_string(),
            address: request.destination_address.clone(),
            from_network: request.from_network.as_ref().map(|n| n.to_lowercase()),
            to_network: request.to_network.as_ref().map(|n| n.to_lowercase()),
            flow: request.flow.as_str().to_string(),
            refund_address: request.refund_address.clone(),
            refund_extra_id: request.refund_extra_id.clone(),
            extra_id: request.extra_id.clone(),
            rate_id: if request.flow.is_fixed_rate() {
                request.rate_id.clone()
            } else {
                None
            },
        };

        let url = format!("{}/exchange", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let exchange: CnExchange = response.json().await?;
        Ok(ProviderOrder {
            provider_id: exchange.id,
            payin_address: exchange.payin_address,
            payin_extra_id: exchange.payin_extra_id,
            payout_address: exchange.payout_address,
            from_amount: exchange.from_amount,
            to_amount: exchange.to_amount,
        })
    }

    async fn get_order(&self, id: &str) -> Result<OrderDetails, ExchangeError> {
        let url = format!("{}/exchange/by-id", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("id", id)])
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Err(ExchangeError::NotFound { id: id.to_string() });
        }
        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let order: CnOrder = response.json().await?;
        Ok(order.into_details())
    }
}
