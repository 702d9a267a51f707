//! Swapgate - multi-provider crypto swap aggregation service
//! Built with Domain-Driven Design principles

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use application::analytics::AnalyticsService;
pub use application::catalog::CurrencyCatalog;
pub use application::commission::CommissionService;
pub use application::orchestrator::ExchangeService;
pub use application::reconciler::StatusReconciler;
pub use config::Config;
pub use domain::provider::ProviderClient;
pub use shared::errors::ExchangeError;
pub use shared::types::{OrderRecord, ProviderKind, SwapStatus};
