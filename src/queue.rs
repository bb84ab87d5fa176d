//! Per-chain trigger queue.
//!
//! Transfers of the bridged asset into the controlled account are pushed into a bounded FIFO by
//! a subscriber task, and relayed one at a time by a single worker.

use crate::{
    chain::ChainApi,
    error::RelayError,
    relay::Dispatcher,
    types::TransferEvent,
};
use futures_util::StreamExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, instrument, warn};

/// Aborts the task when dropped.
#[derive(Debug)]
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Trigger queue of a single chain.
#[derive(Debug)]
pub struct RelayQueue {
    dispatcher: Dispatcher,
}

impl RelayQueue {
    /// Creates a new instance of [`RelayQueue`].
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Subscribes to inbound transfers and relays them until the subscription ends.
    ///
    /// Returns an error if a job hits a protocol violation. The queue is paused and the
    /// remaining queued transfers are reported as not relayed. When the subscription ends, the
    /// queued transfers are still relayed; transfers after that point are not observed.
    #[instrument(skip_all, fields(chain = %self.dispatcher.context().chain))]
    pub async fn run(self) -> Result<(), RelayError> {
        let context = self.dispatcher.context().clone();
        let chain_id = context.chain_id();
        let controlled = self.dispatcher.account();
        let mut transfers = context.client.transfers(context.asset, controlled).await?;

        let (tx, mut rx) = mpsc::channel::<TransferEvent>(context.settings.queue_capacity.max(1));
        let metrics = self.dispatcher.metrics().queued.clone();
        let _subscriber = AbortOnDrop(tokio::spawn(async move {
            while let Some(transfer) = transfers.next().await {
                debug!(from = %transfer.from, amount = %transfer.amount, "Queued transfer");
                metrics.increment(1);
                if tx.send(transfer).await.is_err() {
                    return;
                }
            }
            error!(
                chain_id,
                "Transfer subscription ended, transfers from now on are not relayed until restart"
            );
        }));

        info!(account = %controlled, asset = %context.asset, "Watching transfers");
        self.dispatcher.metrics().paused.set(0.0);

        while let Some(transfer) = rx.recv().await {
            self.dispatcher.metrics().queued.decrement(1);

            match self.process(&transfer).await {
                Ok(()) => {}
                Err(err) if err.is_protocol_violation() => {
                    self.dispatcher.metrics().paused.set(1.0);
                    error!(%err, "Protocol violation, pausing relay queue");

                    rx.close();
                    while let Ok(transfer) = rx.try_recv() {
                        self.dispatcher.metrics().queued.decrement(1);
                        error!(
                            from = %transfer.from,
                            amount = %transfer.amount,
                            tx_hash = ?transfer.tx_hash,
                            "Transfer not relayed"
                        );
                    }
                    return Err(err);
                }
                // already reported by the dispatcher
                Err(_) => {}
            }
        }

        warn!("Relay queue drained");
        Ok(())
    }

    /// Relays a single transfer, retrying transient failures with exponential backoff.
    ///
    /// Only failures before a batch is broadcast are transient, a batch whose outcome is unknown
    /// is never relayed again.
    async fn process(&self, transfer: &TransferEvent) -> Result<(), RelayError> {
        let settings = self.dispatcher.context().settings;
        let recipient = self.dispatcher.context().recipient;
        let mut backoff = settings.retry_backoff;
        let mut retries = 0;

        loop {
            match self.dispatcher.relay_transfer(transfer, recipient).await {
                Ok(_) => return Ok(()),
                Err(err) if err.is_transient() && retries < settings.max_transient_retries => {
                    retries += 1;
                    self.dispatcher.metrics().transient_retries.increment(1);
                    warn!(%err, retries, ?backoff, "Transient failure relaying transfer, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
