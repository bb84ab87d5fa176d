//! # Relay CLI
use crate::{
    config::RelayConfig,
    metrics::{setup_exporter, spawn_periodic_collectors},
    service::RelayService,
};
use alloy::primitives::{Address, U256};
use alloy_chains::Chain;
use clap::{Parser, Subcommand};
use std::{net::Ipv4Addr, path::PathBuf, time::Duration};
use tracing::info;

/// Delegates a deposit account to its implementation contract and relays signed batches of
/// inbound transfers.
#[derive(Debug, Parser)]
#[command(author, about = "UDA relay", long_about = None)]
pub struct Args {
    /// The configuration file.
    #[arg(long, value_name = "CONFIG", env = "UDA_CONFIG", default_value = "relay.yaml")]
    pub config: PathBuf,
    /// Private key or AWS KMS key id of the controlled account.
    #[arg(long, value_name = "KEY", env = "UDA_CONTROLLED_KEY", hide_env_values = true)]
    pub controlled_key: Option<String>,
    /// Private key or AWS KMS key id of the relayer.
    #[arg(long, value_name = "KEY", env = "UDA_RELAYER_KEY", hide_env_values = true)]
    pub relayer_key: Option<String>,
    /// How long to wait for a transaction to be included.
    #[arg(long, value_name = "SECONDS", value_parser = parse_duration_secs)]
    pub confirmation_timeout: Option<Duration>,
    /// The port to serve the metrics on.
    #[arg(long = "metrics-port", value_name = "PORT")]
    pub metrics_port: Option<u16>,
    /// The command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Relay commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Delegate the controlled account, revoking a delegation to another target first.
    Ensure {
        /// The chain, by name or id.
        #[arg(long)]
        chain: Chain,
        /// Delegate to this target instead of the configured one.
        #[arg(long, value_name = "ADDRESS")]
        target: Option<Address>,
    },
    /// Print the delegation status of the controlled account.
    Status {
        /// The chain, by name or id.
        #[arg(long)]
        chain: Chain,
    },
    /// Forward an amount of the asset in a signed batch.
    Relay {
        /// The chain, by name or id.
        #[arg(long)]
        chain: Chain,
        /// Receiver of the asset. Defaults to the configured recipient.
        #[arg(long, value_name = "ADDRESS")]
        recipient: Option<Address>,
        /// Amount of the asset, in its smallest unit.
        #[arg(long, value_name = "AMOUNT")]
        amount: U256,
    },
    /// Clear the delegation of the controlled account.
    Revoke {
        /// The chain, by name or id.
        #[arg(long)]
        chain: Chain,
    },
    /// Ensure the delegation and relay inbound transfers.
    ///
    /// Watches every configured chain unless one is given.
    Watch {
        /// The chain, by name or id.
        #[arg(long)]
        chain: Option<Chain>,
    },
    /// Print the native balances of the relay's accounts.
    Balances,
}

impl Args {
    /// Run the command.
    pub async fn run(self) -> eyre::Result<()> {
        let config = RelayConfig::load_from_file(&self.config)?;
        let command = self.command;
        let config = config
            .with_controlled_key(self.controlled_key)
            .with_relayer_key(self.relayer_key)
            .with_metrics_port(self.metrics_port);
        let config = match self.confirmation_timeout {
            Some(timeout) => config.with_confirmation_timeout(timeout),
            None => config,
        };

        if let Some(port) = config.metrics.port {
            setup_exporter((Ipv4Addr::UNSPECIFIED, port))?;
        }

        let service = RelayService::connect(&config).await?;

        match command {
            Command::Ensure { chain, target } => {
                let outcome = service.ensure_delegation(chain, target).await?;
                info!(
                    %chain,
                    state = ?outcome.state,
                    status = %outcome.status,
                    transactions = ?outcome.receipts.iter().map(|r| r.tx_hash).collect::<Vec<_>>(),
                    "Delegation ensured"
                );
            }
            Command::Status { chain } => {
                let status = service.check_delegation_status(chain).await?;
                info!(%chain, %status, "Delegation status");
            }
            Command::Relay { chain, recipient, amount } => {
                let recipient = match recipient {
                    Some(recipient) => recipient,
                    None => service.chains().get(chain)?.recipient,
                };
                let receipt = service.relay(chain, recipient, amount).await?;
                info!(
                    %chain,
                    tx_hash = %receipt.tx_hash,
                    block = receipt.block_number,
                    "Batch relayed"
                );
            }
            Command::Revoke { chain } => {
                let receipt = service.revoke_delegation(chain).await?;
                info!(%chain, tx_hash = %receipt.tx_hash, "Delegation revoked");
            }
            Command::Watch { chain } => {
                if config.metrics.port.is_some() {
                    spawn_periodic_collectors(
                        service.chains().clone(),
                        vec![
                            service.accounts().controlled().address(),
                            service.accounts().relayer().address(),
                        ],
                    );
                }
                match chain {
                    Some(chain) => service.watch(chain).await?,
                    None => service.watch_all().await?,
                }
            }
            Command::Balances => {
                for balance in service.balances().await? {
                    info!(
                        chain = %balance.chain,
                        controlled = %balance.controlled,
                        relayer = %balance.relayer,
                        "Account balances"
                    );
                }
            }
        }

        Ok(())
    }
}

/// Parses a string representing seconds to a [`Duration`].
fn parse_duration_secs(arg: &str) -> Result<Duration, std::num::ParseIntError> {
    let seconds = arg.parse()?;
    Ok(Duration::from_secs(seconds))
}
