//! [`ChainApi`] backed by an alloy provider.

use super::{ChainApi, ChainTransaction, Result, SentTransaction, TransferStream};
use crate::{
    constants::{DEFAULT_POLL_INTERVAL, GAS_BUFFER_PERCENT},
    error::ChainError,
    signers::DynSigner,
    transport::{RETRY_LAYER, create_transport},
    types::{IDelegatedAccount, IERC20, Receipt, TransferEvent},
};
use alloy::{
    eips::eip2718::Encodable2718,
    network::{EthereumWallet, TransactionBuilder, TransactionBuilder7702},
    primitives::{Address, B256, Bytes, ChainId, U256},
    providers::{
        DynProvider, PendingTransactionConfig, PendingTransactionError, Provider, ProviderBuilder,
        WatchTxError,
    },
    rpc::{
        client::ClientBuilder,
        types::{Filter, Log, TransactionRequest},
    },
    sol_types::SolEvent,
};
use async_trait::async_trait;
use futures_util::{StreamExt, stream::BoxStream};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// A chain reached over JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcChain {
    provider: DynProvider,
    chain_id: ChainId,
    /// Whether logs can be subscribed to, or have to be polled.
    pubsub: bool,
}

impl RpcChain {
    /// Connects to `endpoint` and reads its chain id.
    pub async fn connect(endpoint: &Url) -> Result<Self> {
        let transport = create_transport(endpoint).await?;
        let client = ClientBuilder::default()
            .layer(RETRY_LAYER)
            .transport(transport.inner, transport.is_local)
            .with_poll_interval(DEFAULT_POLL_INTERVAL);
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_client(client)
            .erased();
        let chain_id = provider.get_chain_id().await?;

        Ok(Self { provider, chain_id, pubsub: transport.is_pubsub })
    }

    /// Returns the underlying provider.
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    fn request(&self, tx: &ChainTransaction) -> TransactionRequest {
        let mut request = TransactionRequest::default()
            .with_from(tx.from)
            .with_to(tx.to)
            .with_value(tx.value)
            .with_input(tx.input.clone());
        if !tx.authorization_list.is_empty() {
            request.set_authorization_list(tx.authorization_list.clone());
        }
        request
    }
}

#[async_trait]
impl ChainApi for RpcChain {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        Ok(self.provider.get_code_at(address).await?)
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        Ok(self.provider.get_balance(address).await?)
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64> {
        Ok(self.provider.get_transaction_count(address).pending().await?)
    }

    async fn contract_nonce(&self, account: Address) -> Result<U256> {
        Ok(IDelegatedAccount::new(account, &self.provider).nonce().call().await?)
    }

    async fn simulate(&self, tx: &ChainTransaction) -> Result<Bytes> {
        Ok(self.provider.call(self.request(tx)).await?)
    }

    #[instrument(skip_all, fields(chain_id = self.chain_id, from = %tx.from, to = %tx.to))]
    async fn send_transaction(
        &self,
        tx: ChainTransaction,
        signer: &DynSigner,
    ) -> Result<SentTransaction> {
        let nonce = self.get_transaction_count(signer.address()).await?;
        let mut request = self.request(&tx).with_chain_id(self.chain_id).with_nonce(nonce);

        let gas = self.provider.estimate_gas(request.clone()).await?;
        let fees = self.provider.estimate_eip1559_fees().await?;
        request.set_gas_limit(gas + gas * GAS_BUFFER_PERCENT / 100);
        request.set_max_fee_per_gas(fees.max_fee_per_gas);
        request.set_max_priority_fee_per_gas(fees.max_priority_fee_per_gas);

        let wallet = EthereumWallet::new(signer.0.clone());
        let envelope = request
            .build(&wallet)
            .await
            .map_err(|err| ChainError::Other(err.to_string().into()))?;
        let encoded: Bytes = envelope.encoded_2718().into();
        let tx_hash = *envelope.tx_hash();

        let _ = self.provider.send_raw_transaction(&encoded).await?;
        debug!(%tx_hash, nonce, "Sent transaction");

        Ok(SentTransaction { tx_hash, nonce, encoded })
    }

    async fn rebroadcast(&self, tx: &SentTransaction) -> Result<()> {
        match self.provider.send_raw_transaction(&tx.encoded).await {
            Ok(_) => Ok(()),
            // the node still has the transaction in its pool
            Err(err) if err.as_error_resp().is_some_and(|resp| resp.message.contains("known")) => {
                debug!(tx_hash = %tx.tx_hash, "Transaction already known");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>> {
        Ok(self.provider.get_transaction_receipt(tx_hash).await?.as_ref().map(Receipt::from))
    }

    async fn wait_for_receipt(&self, tx_hash: B256, timeout: Duration) -> Result<Option<Receipt>> {
        let pending = self
            .provider
            .watch_pending_transaction(
                PendingTransactionConfig::new(tx_hash).with_timeout(Some(timeout)),
            )
            .await?;

        match pending.await {
            Ok(_) => self.get_receipt(tx_hash).await,
            Err(PendingTransactionError::TxWatcher(WatchTxError::Timeout)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn transfers(&self, asset: Address, recipient: Address) -> Result<TransferStream> {
        let filter = Filter::new()
            .address(asset)
            .event_signature(IERC20::Transfer::SIGNATURE_HASH)
            .topic2(recipient.into_word());

        let logs: BoxStream<'static, Log> = if self.pubsub {
            self.provider.subscribe_logs(&filter).await?.into_stream().boxed()
        } else {
            self.provider
                .watch_logs(&filter)
                .await?
                .into_stream()
                .flat_map(futures_util::stream::iter)
                .boxed()
        };

        let chain_id = self.chain_id;
        Ok(logs
            .filter_map(move |log| async move {
                if log.removed {
                    warn!(chain_id, tx_hash = ?log.transaction_hash, "Ignoring removed transfer log");
                    return None;
                }
                TransferEvent::decode_log(&log)
                    .inspect_err(|err| warn!(chain_id, %err, "Failed to decode transfer log"))
                    .ok()
            })
            .boxed())
    }
}
