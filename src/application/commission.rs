//! Commission settings service
//!
//! A quote must never fail because settings are unavailable: reads always
//! produce a rate, falling back to the hardcoded default.

use std::sync::Arc;
use tracing::warn;

use crate::domain::commission::DEFAULT_COMMISSION_PERCENT;
use crate::infrastructure::store::SettingsStore;
use crate::shared::errors::ExchangeError;

pub const COMMISSION_RATE_KEY: &str = "commission_rate";

pub struct CommissionService {
    settings: Arc<dyn SettingsStore>,
}

impl CommissionService {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    /// Current platform commission percentage
    pub fn get(&self) -> f64 {
        match self.settings.get(COMMISSION_RATE_KEY) {
            Ok(Some(raw)) => match raw.parse::<f64>() {
                Ok(rate) if rate.is_finite() => rate,
                _ => {
                    warn!(
                        "Stored commission rate {:?} is not a number, using default",
                        raw
                    );
                    DEFAULT_COMMISSION_PERCENT
                }
            },
            Ok(None) => DEFAULT_COMMISSION_PERCENT,
            Err(e) => {
                warn!("Failed to read commission rate: {}, using default", e);
                DEFAULT_COMMISSION_PERCENT
            }
        }
    }

    /// Update the commission percentage; last writer wins
    pub fn set(&self, rate: f64) -> Result<f64, ExchangeError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(ExchangeError::Validation(
                "commission must be a non-negative number".to_string(),
            ));
        }
        self.settings.set(COMMISSION_RATE_KEY, &rate.to_string())?;
        Ok(rate)
    }
}
