//! Common types used across the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported upstream exchange providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    ChangeNow,
    StealthEx,
}

impl ProviderKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::ChangeNow => "changenow",
            ProviderKind::StealthEx => "stealthex",
        }
    }

    /// Get all supported providers
    pub fn all() -> [ProviderKind; 2] {
        [ProviderKind::ChangeNow, ProviderKind::StealthEx]
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "changenow" => Ok(ProviderKind::ChangeNow),
            "stealthex" => Ok(ProviderKind::StealthEx),
            other => Err(format!("unsupported provider: {}", other)),
        }
    }
}

/// Internal status of an exchange order
///
/// COMPLETED and FAILED are terminal. Transition rules live in
/// `domain::status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapStatus {
    AwaitingDeposit,
    Processing,
    Completed,
    Failed,
}

/// Quote mode: standard re-quotes at deposit time, fixed-rate locks a rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flow {
    #[default]
    Standard,
    FixedRate,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Standard => "standard",
            Flow::FixedRate => "fixed-rate",
        }
    }

    pub fn is_fixed_rate(&self) -> bool {
        matches!(self, Flow::FixedRate)
    }
}

impl FromStr for Flow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Flow::Standard),
            "fixed-rate" | "fixed" => Ok(Flow::FixedRate),
            other => Err(format!("unsupported flow: {}", other)),
        }
    }
}

/// A tradable asset on a specific network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Currency {
    pub ticker: String,
    pub name: String,
    pub image: Option<String>,
    pub network: Option<String>,
    pub has_extra_id: bool,
    pub extra_id_name: Option<String>,
    pub address_regex: Option<String>,
    pub extra_id_regex: Option<String>,
}

impl Currency {
    /// Ticker in display form (uppercase)
    pub fn display_ticker(&self) -> String {
        self.ticker.to_uppercase()
    }
}

/// Parameters for an estimate request
#[derive(Debug, Clone)]
pub struct EstimateRequest {
    pub from_currency: String,
    pub to_currency: String,
    pub from_amount: f64,
    pub from_network: Option<String>,
    pub to_network: Option<String>,
    pub flow: Flow,
}

/// Parameters for a min/max range request
#[derive(Debug, Clone)]
pub struct RangeRequest {
    pub from_currency: String,
    pub to_currency: String,
    pub from_network: Option<String>,
    pub to_network: Option<String>,
    pub flow: Flow,
}

/// Min/max exchangeable amounts for a currency pair
#[derive(Debug, Clone, Serialize)]
pub struct AmountRange {
    pub min_amount: f64,
    pub max_amount: Option<f64>,
}

/// Raw provider-side estimate, before any orchestrator adjustment
///
/// `commission_applied` records whether the provider already baked the
/// commission into `to_amount` (StealthEX) or left it to the caller
/// (ChangeNOW). Exactly one side applies it.
#[derive(Debug, Clone)]
pub struct ProviderEstimate {
    pub to_amount: f64,
    pub rate_id: Option<String>,
    pub valid_until: Option<String>,
    pub commission_applied: bool,
}

/// Markup-adjusted quote returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub from_currency: String,
    pub to_currency: String,
    pub from_amount: f64,
    pub to_amount: f64,
    pub original_to_amount: f64,
    pub markup_percentage: f64,
    pub rate_id: Option<String>,
    pub valid_until: Option<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

/// Parameters for creating an exchange order
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub from_currency: String,
    pub to_currency: String,
    pub from_amount: f64,
    pub destination_address: String,
    pub from_network: Option<String>,
    pub to_network: Option<String>,
    pub refund_address: Option<String>,
    pub refund_extra_id: Option<String>,
    pub extra_id: Option<String>,
    pub flow: Flow,
    pub rate_id: Option<String>,
}

/// Order as acknowledged by a provider at creation time
#[derive(Debug, Clone)]
pub struct ProviderOrder {
    pub provider_id: String,
    pub payin_address: String,
    pub payin_extra_id: Option<String>,
    pub payout_address: String,
    pub from_amount: Option<f64>,
    pub to_amount: Option<f64>,
}

/// Live order view fetched from a provider
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub provider_id: String,
    pub raw_status: String,
    pub from_currency: Option<String>,
    pub to_currency: Option<String>,
    pub payin_address: Option<String>,
    pub payin_extra_id: Option<String>,
    pub payout_address: Option<String>,
    pub amount_from: Option<f64>,
    pub amount_to: Option<f64>,
    pub expected_amount_from: Option<f64>,
    pub expected_amount_to: Option<f64>,
    pub payin_hash: Option<String>,
    pub payout_hash: Option<String>,
}

/// Durable exchange order record
///
/// Invariant: exactly one of `changenow_id` / `stealthex_id` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub changenow_id: Option<String>,
    pub stealthex_id: Option<String>,
    pub payin_address: String,
    pub payin_extra_id: Option<String>,
    pub payout_address: String,
    pub payout_extra_id: Option<String>,
    pub from_currency: String,
    pub to_currency: String,
    pub from_amount: f64,
    pub to_amount: Option<f64>,
    pub status: SwapStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    /// Build a fresh record for a just-created provider order
    pub fn new(provider: ProviderKind, order: &ProviderOrder, request: &CreateOrderRequest) -> Self {
        let now = Utc::now();
        let (changenow_id, stealthex_id) = match provider {
            ProviderKind::ChangeNow => (Some(order.provider_id.clone()), None),
            ProviderKind::StealthEx => (None, Some(order.provider_id.clone())),
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            changenow_id,
            stealthex_id,
            payin_address: order.payin_address.clone(),
            payin_extra_id: order.payin_extra_id.clone(),
            payout_address: order.payout_address.clone(),
            payout_extra_id: request.extra_id.clone(),
            from_currency: request.from_currency.to_lowercase(),
            to_currency: request.to_currency.to_lowercase(),
            from_amount: order.from_amount.unwrap_or(request.from_amount),
            to_amount: order.to_amount,
            status: SwapStatus::AwaitingDeposit,
            created_at: now,
            updated_at: now,
        }
    }

    /// Which provider holds this order
    pub fn provider(&self) -> ProviderKind {
        if self.changenow_id.is_some() {
            ProviderKind::ChangeNow
        } else {
            ProviderKind::StealthEx
        }
    }

    /// Provider-assigned order id
    pub fn provider_order_id(&self) -> &str {
        self.changenow_id
            .as_deref()
            .or(self.stealthex_id.as_deref())
            .unwrap_or_default()
    }
}
