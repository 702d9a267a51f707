//! Application layer - use cases and services

pub mod analytics;
pub mod catalog;
pub mod commands;
pub mod commission;
pub mod orchestrator;
pub mod reconciler;

pub use commands::{Cli, CommandExecutor, Commands};
pub use commission::CommissionService;
pub use orchestrator::ExchangeService;
pub use reconciler::StatusReconciler;
