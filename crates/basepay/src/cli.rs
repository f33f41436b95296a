use std::sync::Arc;

use alloy::primitives::{Bytes, U256};
use clap::{Parser, Subcommand};
use eyre::WrapErr;
use serde_json::{json, Value};

use basepay_adapters::{ConnectorConfig, Eip1193ProviderFactory, TracingEventSink};
use basepay_core::encoding::{normalize_address, parse_chain_id};
use basepay_core::{
    ChainRegistry, ConnectParams, ConnectionController, PaymentCall, PaymentExecutor,
    PaymentNetwork, PaymentRequest, ProviderFactory, SwitchChainParams,
};

#[derive(Parser, Debug)]
#[command(name = "basepay")]
#[command(about = "Connect to a Base wallet and submit one-shot payments")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Request accounts, optionally moving the wallet to a chain
    Connect {
        #[arg(long, value_parser = chain_id_arg)]
        chain_id: Option<u64>,
    },
    /// Accounts the wallet has already authorized
    Accounts,
    /// Chain the wallet is currently on
    ChainId,
    /// Whether the wallet has authorized at least one account
    Authorized,
    /// Switch to a configured chain, adding it to the wallet when unknown
    SwitchChain {
        #[arg(value_parser = chain_id_arg)]
        chain_id: u64,
    },
    /// Submit a single wallet_sendCalls payment on a fresh provider
    Pay {
        #[arg(long, default_value = "test")]
        network: PaymentNetwork,
        /// Recipient; mixed-case input must be EIP-55 checksummed
        #[arg(long)]
        to: String,
        #[arg(long)]
        data: Option<Bytes>,
        /// Wei, decimal or 0x-hex
        #[arg(long)]
        value: Option<U256>,
    },
}

fn chain_id_arg(raw: &str) -> Result<u64, String> {
    parse_chain_id(raw).map_err(|e| e.to_string())
}

/// Runs one command. Controller commands always disconnect before returning.
pub async fn run(command: Command, config: &ConnectorConfig) -> eyre::Result<Value> {
    let factory: Arc<dyn ProviderFactory> =
        Arc::new(Eip1193ProviderFactory::with_config(config));

    if let Command::Pay {
        network,
        to,
        data,
        value,
    } = command
    {
        let call = PaymentCall::new(
            normalize_address(&to).wrap_err("invalid --to address")?,
            data.unwrap_or_default(),
            value.unwrap_or(U256::ZERO),
        );
        let request = PaymentRequest::new(network.chain_id(), vec![call]);
        let mut executor = PaymentExecutor::new(factory, config.app_name.clone());
        if let Some(logo) = &config.app_logo_url {
            executor = executor.with_app_logo_url(logo.clone());
        }
        let result = executor
            .execute_with_lifecycle(&request, network)
            .await
            .wrap_err("payment failed")?;
        return Ok(serde_json::to_value(result)?);
    }

    let mut controller = ConnectionController::new(
        factory,
        config.connector_parameters(),
        ChainRegistry::base(),
        Arc::new(TracingEventSink),
    );
    let outcome = run_controller(&mut controller, command).await;
    let cleanup = controller.disconnect().await;
    match (outcome, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(eyre::Report::new(e).wrap_err("disconnect failed")),
        (Err(e), cleanup) => {
            if let Err(cleanup_err) = cleanup {
                tracing::warn!(error = %cleanup_err, "disconnect failed after command error");
            }
            Err(e)
        }
    }
}

async fn run_controller(
    controller: &mut ConnectionController,
    command: Command,
) -> eyre::Result<Value> {
    let value = match command {
        Command::Connect { chain_id } => {
            let connection = controller
                .connect(ConnectParams {
                    chain_id,
                    is_reconnecting: false,
                })
                .await
                .wrap_err("connect failed")?;
            controller.pump_events().await?;
            serde_json::to_value(connection)?
        }
        Command::Accounts => json!(controller
            .get_accounts()
            .await?
            .iter()
            .map(|a| a.to_checksum(None))
            .collect::<Vec<_>>()),
        Command::ChainId => json!({ "chainId": controller.get_chain_id().await? }),
        Command::Authorized => json!({ "authorized": controller.is_authorized().await }),
        Command::SwitchChain { chain_id } => {
            let chain = controller
                .switch_chain(SwitchChainParams::new(chain_id))
                .await
                .wrap_err_with(|| format!("switch to chain {chain_id} failed"))?;
            serde_json::to_value(chain)?
        }
        Command::Pay { .. } => eyre::bail!("pay runs on its own provider"),
    };
    Ok(value)
}
