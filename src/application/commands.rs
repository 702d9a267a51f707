//! CLI commands and handlers

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::application::analytics::AnalyticsService;
use crate::application::catalog::CurrencyCatalog;
use crate::application::commission::CommissionService;
use crate::application::orchestrator::ExchangeService;
use crate::application::reconciler::StatusReconciler;
use crate::config::Config;
use crate::infrastructure::pricing::BinanceSpotPrices;
use crate::infrastructure::providers;
use crate::infrastructure::store::SqliteStore;
use crate::shared::types::{
    CreateOrderRequest, EstimateRequest, Flow, ProviderKind, RangeRequest,
};

#[derive(Parser)]
#[command(name = "swapgate")]
#[command(about = "Multi-provider crypto swap aggregation service")]
pub struct Cli {
    /// Path to config file (optional)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Provider to talk to (changenow, stealthex)
    #[arg(long, global = true)]
    pub provider: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tradable currencies
    Currencies {
        /// Filter by network (e.g. matic, eth)
        #[arg(short, long)]
        network: Option<String>,
    },

    /// Quote an exchange with the commission applied
    Estimate {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        #[arg(long)]
        amount: f64,

        #[arg(long)]
        from_network: Option<String>,

        #[arg(long)]
        to_network: Option<String>,

        /// Quote mode: standard or fixed-rate
        #[arg(long, default_value = "standard")]
        flow: String,

        /// Also fetch the min/max bounds for the pair
        #[arg(long)]
        with_range: bool,
    },

    /// Min/max deposit bounds for a pair
    Range {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        #[arg(long)]
        from_network: Option<String>,

        #[arg(long)]
        to_network: Option<String>,

        #[arg(long, default_value = "standard")]
        flow: String,
    },

    /// Create an exchange order and print the deposit address
    Create {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        #[arg(long)]
        amount: f64,

        /// Destination address receiving the swapped funds
        #[arg(long)]
        address: String,

        #[arg(long)]
        from_network: Option<String>,

        #[arg(long)]
        to_network: Option<String>,

        /// Memo/tag for currencies that require one
        #[arg(long)]
        extra_id: Option<String>,

        #[arg(long)]
        refund_address: Option<String>,

        #[arg(long)]
        refund_extra_id: Option<String>,

        #[arg(long, default_value = "standard")]
        flow: String,

        /// Rate lock id, required for fixed-rate flow
        #[arg(long)]
        rate_id: Option<String>,
    },

    /// Fetch, map and persist the live status of an order
    Status {
        /// Internal transaction id
        id: String,
    },

    /// Repair the local record for a provider-side order id
    Resync {
        /// Provider-assigned order id
        id: String,
    },

    /// Read or update the platform commission percentage
    Commission {
        /// New percentage; omit to read the current value
        #[arg(long)]
        set: Option<f64>,
    },

    /// Volume, commission and success-rate summary
    Analytics,
}

pub struct CommandExecutor;

impl CommandExecutor {
    /// Execute the selected command
    pub async fn execute(cli: Cli) -> Result<()> {
        let config = Config::load(cli.config.as_deref())?;
        let provider = match &cli.provider {
            Some(raw) => raw.parse::<ProviderKind>().map_err(|e| anyhow!(e))?,
            None => config.default_provider(),
        };

        let store = Arc::new(SqliteStore::open(PathBuf::from(&config.store.path))?);
        let commission = Arc::new(CommissionService::new(store.clone()));

        match cli.command {
            Commands::Currencies { network } => {
                Self::execute_currencies(provider, network, &config).await
            }
            Commands::Estimate {
                from,
                to,
                amount,
                from_network,
                to_network,
                flow,
                with_range,
            } => {
                let request = EstimateRequest {
                    from_currency: from,
                    to_currency: to,
                    from_amount: amount,
                    from_network,
                    to_network,
                    flow: flow.parse::<Flow>().map_err(|e| anyhow!(e))?,
                };
                Self::execute_estimate(provider, request, with_range, &config, store, commission)
                    .await
            }
            Commands::Range {
                from,
                to,
                from_network,
                to_network,
                flow,
            } => {
                let request = RangeRequest {
                    from_currency: from,
                    to_currency: to,
                    from_network,
                    to_network,
                    flow: flow.parse::<Flow>().map_err(|e| anyhow!(e))?,
                };
                Self::execute_range(provider, request, &config, store, commission).await
            }
            Commands::Create {
                from,
                to,
                amount,
                address,
                from_network,
                to_network,
                extra_id,
                refund_address,
                refund_extra_id,
                flow,
                rate_id,
            } => {
                let request = CreateOrderRequest {
                    from_currency: from,
                    to_currency: to,
                    from_amount: amount,
                    destination_address: address,
                    from_network,
                    to_network,
                    refund_address,
                    refund_extra_id,
                    extra_id,
                    flow: flow.parse::<Flow>().map_err(|e| anyhow!(e))?,
                    rate_id,
                };
                Self::execute_create(provider, request, &config, store, commission).await
            }
            Commands::Status { id } => Self::execute_status(id, &config, store).await,
            Commands::Resync { id } => Self::execute_resync(provider, id, &config, store).await,
            Commands::Commission { set } => Self::execute_commission(set, commission),
            Commands::Analytics => Self::execute_analytics(store, commission).await,
        }
    }

    async fn execute_currencies(
        provider: ProviderKind,
        network: Option<String>,
        config: &Config,
    ) -> Result<()> {
        let client = providers::create_client(provider, &config.providers)?;
        let catalog = CurrencyCatalog::new(vec![client]);
        let currencies = catalog.list(provider, network.as_deref()).await?;

        info!(
            "{} lists {} currencies{}",
            provider.as_str(),
            currencies.len(),
            network
                .as_deref()
                .map(|n| format!(" on {}", n))
                .unwrap_or_default()
        );
        for currency in &currencies {
            info!(
                "  {} - {}{}",
                currency.display_ticker(),
                currency.name,
                currency
                    .network
                    .as_deref()
                    .map(|n| format!(" [{}]", n))
                    .unwrap_or_default()
            );
        }
        Ok(())
    }

    async fn execute_estimate(
        provider: ProviderKind,
        request: EstimateRequest,
        with_range: bool,
        config: &Config,
        store: Arc<SqliteStore>,
        commission: Arc<CommissionService>,
    ) -> Result<()> {
        let client = providers::create_client(provider, &config.providers)?;
        let service = ExchangeService::new(vec![client], store, commission);

        let mut quote = service.estimate(provider, &request).await?;
        if with_range {
            let range = service
                .get_range(
                    provider,
                    &RangeRequest {
                        from_currency: request.from_currency.clone(),
                        to_currency: request.to_currency.clone(),
                        from_network: request.from_network.clone(),
                        to_network: request.to_network.clone(),
                        flow: request.flow,
                    },
                )
                .await?;
            quote.min_amount = Some(range.min_amount);
            quote.max_amount = range.max_amount;
        }

        info!(
            "{} {} -> {} {} (provider quoted {}, markup {}%)",
            quote.from_amount,
            quote.from_currency.to_uppercase(),
            quote.to_amount,
            quote.to_currency.to_uppercase(),
            quote.original_to_amount,
            quote.markup_percentage
        );
        if let Some(rate_id) = &quote.rate_id {
            info!(
                "  rate locked: {} (valid until {})",
                rate_id,
                quote.valid_until.as_deref().unwrap_or("unknown")
            );
        }
        if let Some(min) = quote.min_amount {
            info!(
                "  bounds: min {} max {}",
                min,
                quote
                    .max_amount
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
        Ok(())
    }

    async fn execute_range(
        provider: ProviderKind,
        request: RangeRequest,
        config: &Config,
        store: Arc<SqliteStore>,
        commission: Arc<CommissionService>,
    ) -> Result<()> {
        let client = providers::create_client(provider, &config.providers)?;
        let service = ExchangeService::new(vec![client], store, commission);
        let range = service.get_range(provider, &request).await?;

        info!(
            "{} -> {}: min {} max {}",
            request.from_currency.to_uppercase(),
            request.to_currency.to_uppercase(),
            range.min_amount,
            range
                .max_amount
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        Ok(())
    }

    async fn execute_create(
        provider: ProviderKind,
        request: CreateOrderRequest,
        config: &Config,
        store: Arc<SqliteStore>,
        commission: Arc<CommissionService>,
    ) -> Result<()> {
        let client = providers::create_client(provider, &config.providers)?;
        let service = ExchangeService::new(vec![client], store, commission);
        let record = service.create_order(provider, &request).await?;

        info!("Order created: {}", record.id);
        info!(
            "  send {} {} to {}",
            record.from_amount,
            record.from_currency.to_uppercase(),
            record.payin_address
        );
        if let Some(extra_id) = &record.payin_extra_id {
            info!("  deposit extra id: {}", extra_id);
        }
        info!(
            "  payout to {} ({})",
            record.payout_address,
            record.to_currency.to_uppercase()
        );
        info!("  status: {}", record.status.as_str());
        Ok(())
    }

    async fn execute_status(id: String, config: &Config, store: Arc<SqliteStore>) -> Result<()> {
        let clients = providers::configured_clients(&config.providers);
        let reconciler = StatusReconciler::new(clients, store);
        let outcome = reconciler.reconcile(&id).await?;

        info!(
            "Order {} is {} (provider status: {})",
            outcome.record.id,
            outcome.record.status.as_str(),
            outcome.details.raw_status
        );
        if let Some(amount) = outcome.details.amount_to {
            info!("  received {}", amount);
        }
        if let Some(hash) = &outcome.details.payin_hash {
            info!("  payin hash: {}", hash);
        }
        if let Some(hash) = &outcome.details.payout_hash {
            info!("  payout hash: {}", hash);
        }
        info!("  updated at {}", outcome.record.updated_at.to_rfc3339());
        Ok(())
    }

    async fn execute_resync(
        provider: ProviderKind,
        id: String,
        config: &Config,
        store: Arc<SqliteStore>,
    ) -> Result<()> {
        let clients = providers::configured_clients(&config.providers);
        let reconciler = StatusReconciler::new(clients, store);
        let outcome = reconciler.resync(provider, &id).await?;

        info!(
            "Resynced {} order {} -> local {} ({})",
            provider.as_str(),
            id,
            outcome.record.id,
            outcome.record.status.as_str()
        );
        Ok(())
    }

    fn execute_commission(set: Option<f64>, commission: Arc<CommissionService>) -> Result<()> {
        match set {
            Some(rate) => {
                let rate = commission.set(rate)?;
                info!("Commission set to {}%", rate);
            }
            None => {
                info!("Commission is {}%", commission.get());
            }
        }
        Ok(())
    }

    async fn execute_analytics(
        store: Arc<SqliteStore>,
        commission: Arc<CommissionService>,
    ) -> Result<()> {
        let service = AnalyticsService::new(store, Arc::new(BinanceSpotPrices::new()), commission);
        let summary = service.summary().await?;

        info!("Transactions: {}", summary.total_transactions);
        info!(
            "Completed: {} ({:.1}% success rate)",
            summary.completed_transactions, summary.success_rate_percent
        );
        info!("Volume (mixed units): {}", summary.total_volume);
        info!("Volume: ${:.2}", summary.total_volume_usd);
        info!("Commission earned: ${:.2}", summary.total_commission_usd);
        Ok(())
    }
}
