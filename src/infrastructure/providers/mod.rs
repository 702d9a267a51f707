//! Upstream provider adapters

pub mod changenow;
pub mod stealthex;

pub use changenow::ChangeNowClient;
pub use stealthex::StealthExClient;

use std::sync::Arc;

use crate::config::ProvidersCfg;
use crate::domain::provider::ProviderClient;
use crate::shared::errors::ExchangeError;
use crate::shared::types::ProviderKind;

/// Create a provider client for the specified kind
///
/// A missing API key surfaces as `ConfigError` here, never as a silently
/// degraded client.
pub fn create_client(
    kind: ProviderKind,
    cfg: &ProvidersCfg,
) -> Result<Arc<dyn ProviderClient>, ExchangeError> {
    match kind {
        ProviderKind::ChangeNow => {
            let key = cfg.changenow_api_key.clone().unwrap_or_default();
            Ok(Arc::new(ChangeNowClient::new(key)?))
        }
        ProviderKind::StealthEx => {
            let key = cfg.stealthex_api_key.clone().unwrap_or_default();
            Ok(Arc::new(StealthExClient::new(key)?))
        }
    }
}

/// Create clients for every provider with credentials configured
pub fn configured_clients(cfg: &ProvidersCfg) -> Vec<Arc<dyn ProviderClient>> {
    ProviderKind::all()
        .into_iter()
        .filter_map(|kind| create_client(kind, cfg).ok())
        .collect()
}
