//! [`ChainApi`] implementation in-memory. Used for testing only.
//!
//! Models the parts of EIP-7702 and of the delegated account contract the relay depends on:
//! sender nonces, authorization processing, delegation designators, signed batch execution and
//! ERC-20 transfers of registered assets.

use super::{ChainApi, ChainTransaction, Result, SentTransaction, TransferStream};
use crate::{
    error::ChainError,
    signers::DynSigner,
    types::{
        CALL_REVERTED_REASON, Call, DelegationStatus, IDelegatedAccount, IERC20,
        INVALID_AUTHORITY_REASON, INVALID_SIGNATURE_REASON, Receipt, TransferEvent, calls_digest,
    },
};
use alloy::{
    eips::eip7702::SignedAuthorization,
    primitives::{
        Address, B256, BlockNumber, Bytes, ChainId, Signature, U256, keccak256,
        map::{HashMap, HashSet},
    },
    sol_types::{Revert, SolCall, SolError},
    transports::TransportErrorKind,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// Account state.
#[derive(Debug, Clone, Default)]
struct Account {
    nonce: u64,
    balance: U256,
    code: Bytes,
    /// Value of the delegated contract's `nonce()` slot.
    contract_nonce: U256,
}

/// A transaction as seen by the chain.
#[derive(Debug, Clone)]
struct Transaction {
    hash: B256,
    nonce: u64,
    tx: ChainTransaction,
}

/// How the next transactions are held back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stall {
    /// Included once re-sent.
    UntilRebroadcast,
    /// Never included.
    Forever,
}

/// A record of a broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    /// Hash of the transaction.
    pub tx_hash: B256,
    /// The sender.
    pub from: Address,
    /// The destination.
    pub to: Address,
    /// Sender nonce.
    pub nonce: u64,
    /// Calldata.
    pub input: Bytes,
    /// Carried authorizations.
    pub authorization_list: Vec<SignedAuthorization>,
}

#[derive(Debug)]
struct Subscription {
    asset: Address,
    recipient: Address,
    sender: mpsc::UnboundedSender<TransferEvent>,
}

#[derive(Debug, Default)]
struct State {
    block_number: BlockNumber,
    tx_count: u64,
    accounts: HashMap<Address, Account>,
    /// Token balances, keyed by (asset, holder).
    tokens: HashMap<(Address, Address), U256>,
    assets: HashSet<Address>,
    implementation: Address,
    receipts: HashMap<B256, Receipt>,
    stalled: HashMap<B256, (Transaction, Stall)>,
    stall_next: Vec<Stall>,
    failing_targets: HashSet<Address>,
    contract_nonce_bumps: u32,
    reject_signatures: bool,
    failing_receipt_waits: u32,
    lost_send_responses: u32,
    failing_reads: u32,
    subscriptions: Vec<Subscription>,
    sent: Vec<SentRecord>,
}

/// Outcome of executing a call.
type Execution = core::result::Result<(), Bytes>;

fn revert(reason: &str) -> Bytes {
    Revert { reason: reason.to_string() }.abi_encode().into()
}

impl State {
    fn account(&mut self, address: Address) -> &mut Account {
        self.accounts.entry(address).or_default()
    }

    fn pending_nonce(&self, address: Address) -> u64 {
        let stalled = self.stalled.values().filter(|(tx, _)| tx.tx.from == address).count();
        self.accounts.get(&address).map(|account| account.nonce).unwrap_or_default()
            + stalled as u64
    }

    fn take_read_failure(&mut self) -> Result<()> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(TransportErrorKind::custom_str("connection reset").into());
        }
        Ok(())
    }

    /// Applies the authorization list, skipping invalid entries.
    fn apply_authorizations(&mut self, chain_id: ChainId, authorizations: &[SignedAuthorization]) {
        for authorization in authorizations {
            let Ok(authority) = authorization.recover_authority() else { continue };
            let auth_chain_id = *authorization.chain_id();
            if !auth_chain_id.is_zero() && auth_chain_id != U256::from(chain_id) {
                continue;
            }

            let account = self.account(authority);
            if account.nonce != authorization.nonce() {
                continue;
            }
            account.nonce += 1;
            let target = *authorization.address();
            account.code = if target.is_zero() {
                Bytes::new()
            } else {
                DelegationStatus::designator(target)
            };
        }
    }

    /// Executes a call to `tx.to` on a copy of the state, committing it on success.
    fn execute(&mut self, tx: &ChainTransaction, log_tx: Option<B256>) -> Execution {
        let mut state = State {
            accounts: self.accounts.clone(),
            tokens: self.tokens.clone(),
            ..Default::default()
        };
        let mut transfers = Vec::new();

        self.execute_on(&mut state, tx, &mut transfers)?;

        self.accounts = state.accounts;
        self.tokens = state.tokens;
        for (index, (asset, transfer)) in transfers.into_iter().enumerate() {
            let transfer = TransferEvent {
                tx_hash: log_tx,
                log_index: log_tx.map(|_| index as u64),
                ..transfer
            };
            self.notify(asset, transfer);
        }
        Ok(())
    }

    fn execute_on(
        &self,
        state: &mut State,
        tx: &ChainTransaction,
        transfers: &mut Vec<(Address, TransferEvent)>,
    ) -> Execution {
        let sender = state.account(tx.from);
        if sender.balance < tx.value {
            return Err(Bytes::new());
        }
        sender.balance -= tx.value;
        state.account(tx.to).balance += tx.value;

        let code = state.account(tx.to).code.clone();
        match DelegationStatus::from_code(&code) {
            DelegationStatus::NotDelegated => Ok(()),
            DelegationStatus::DelegatedTo(target) if target == self.implementation => {
                self.execute_delegated(state, tx, transfers)
            }
            _ if tx.input.is_empty() => Ok(()),
            _ => Err(Bytes::new()),
        }
    }

    /// Executes a call into an account delegated to the implementation contract.
    fn execute_delegated(
        &self,
        state: &mut State,
        tx: &ChainTransaction,
        transfers: &mut Vec<(Address, TransferEvent)>,
    ) -> Execution {
        let account = tx.to;
        if tx.input.is_empty() {
            return Ok(());
        }

        if let Ok(call) = IDelegatedAccount::execute_0Call::abi_decode(&tx.input) {
            if tx.from != account {
                return Err(revert(INVALID_AUTHORITY_REASON));
            }
            return self.execute_calls(state, account, &call.calls, transfers);
        }

        if let Ok(call) = IDelegatedAccount::execute_1Call::abi_decode(&tx.input) {
            let nonce = state.account(account).contract_nonce;
            let digest = calls_digest(nonce, &call.calls);
            let signer = Signature::from_raw(&call.signature)
                .ok()
                .and_then(|signature| signature.recover_address_from_msg(digest).ok());
            if self.reject_signatures || signer != Some(account) {
                return Err(revert(INVALID_SIGNATURE_REASON));
            }
            state.account(account).contract_nonce += U256::from(1);
            return self.execute_calls(state, account, &call.calls, transfers);
        }

        Err(Bytes::new())
    }

    fn execute_calls(
        &self,
        state: &mut State,
        account: Address,
        calls: &[Call],
        transfers: &mut Vec<(Address, TransferEvent)>,
    ) -> Execution {
        for call in calls {
            if self.failing_targets.contains(&call.to) {
                return Err(revert(CALL_REVERTED_REASON));
            }

            let caller = state.account(account);
            if caller.balance < call.value {
                return Err(revert(CALL_REVERTED_REASON));
            }
            caller.balance -= call.value;
            state.account(call.to).balance += call.value;

            if self.assets.contains(&call.to) {
                let Ok(transfer) = IERC20::transferCall::abi_decode(&call.data) else {
                    return Err(revert(CALL_REVERTED_REASON));
                };
                let from = state.tokens.entry((call.to, account)).or_default();
                if *from < transfer.amount {
                    return Err(revert(CALL_REVERTED_REASON));
                }
                *from -= transfer.amount;
                *state.tokens.entry((call.to, transfer.to)).or_default() += transfer.amount;
                transfers
                    .push((call.to, TransferEvent::new(account, transfer.to, transfer.amount)));
            }
        }
        Ok(())
    }

    fn notify(&mut self, asset: Address, transfer: TransferEvent) {
        self.subscriptions.retain(|subscription| {
            if subscription.asset != asset || subscription.recipient != transfer.to {
                return !subscription.sender.is_closed();
            }
            subscription.sender.send(transfer.clone()).is_ok()
        });
    }

    /// Includes a transaction in a new block.
    fn include(&mut self, chain_id: ChainId, transaction: Transaction) {
        let Transaction { hash, nonce, tx } = transaction;
        if self.account(tx.from).nonce != nonce {
            // replaced or invalid, never included
            return;
        }
        self.account(tx.from).nonce += 1;
        self.apply_authorizations(chain_id, &tx.authorization_list);

        let success = self.execute(&tx, Some(hash)).is_ok();
        self.block_number += 1;
        self.receipts
            .insert(hash, Receipt { tx_hash: hash, block_number: self.block_number, success });
    }
}

/// In-memory chain.
#[derive(Debug)]
pub struct InMemoryChain {
    chain_id: ChainId,
    state: Mutex<State>,
}

impl InMemoryChain {
    /// Creates an empty chain whose accounts may delegate to `implementation`.
    pub fn new(chain_id: ChainId, implementation: Address) -> Self {
        Self { chain_id, state: Mutex::new(State { implementation, ..Default::default() }) }
    }

    /// Registers an ERC-20 asset.
    pub fn add_asset(&self, asset: Address) {
        self.state.lock().assets.insert(asset);
    }

    /// Sets the native balance of `address`.
    pub fn fund(&self, address: Address, amount: U256) {
        self.state.lock().account(address).balance = amount;
    }

    /// Transfers `amount` of `asset` from `from` to `to`, notifying subscribers.
    pub fn emit_transfer(&self, asset: Address, from: Address, to: Address, amount: U256) {
        let mut state = self.state.lock();
        state.tx_count += 1;
        state.block_number += 1;
        let tx_hash = keccak256(state.tx_count.to_be_bytes());

        *state.tokens.entry((asset, to)).or_default() += amount;
        let transfer = TransferEvent {
            tx_hash: Some(tx_hash),
            log_index: Some(0),
            ..TransferEvent::new(from, to, amount)
        };
        state.notify(asset, transfer);
    }

    /// Overrides the code of `address`.
    pub fn set_code(&self, address: Address, code: Bytes) {
        self.state.lock().account(address).code = code;
    }

    /// Makes every call to `target` revert.
    pub fn fail_calls_to(&self, target: Address) {
        self.state.lock().failing_targets.insert(target);
    }

    /// Advances the contract nonce of the target of the next signed batch right before it is
    /// included, as if another batch had landed first.
    pub fn bump_contract_nonce_on_next_submit(&self) {
        self.bump_contract_nonce_on_submits(1);
    }

    /// Like [`Self::bump_contract_nonce_on_next_submit`], for the next `count` signed batches.
    pub fn bump_contract_nonce_on_submits(&self, count: u32) {
        self.state.lock().contract_nonce_bumps = count;
    }

    /// Fails the next wait for a receipt with a transport error. The transaction is unaffected.
    pub fn fail_next_receipt_wait(&self) {
        self.state.lock().failing_receipt_waits += 1;
    }

    /// Includes the next sent transaction, but fails the send with a transport error as if the
    /// response was lost.
    pub fn lose_next_send_response(&self) {
        self.state.lock().lost_send_responses += 1;
    }

    /// Makes delegated accounts reject every batch signature, as if they verified against
    /// another key.
    pub fn reject_batch_signatures(&self) {
        self.state.lock().reject_signatures = true;
    }

    /// Holds back the next sent transaction until it is rebroadcast.
    pub fn stall_next_transaction(&self) {
        self.state.lock().stall_next.push(Stall::UntilRebroadcast);
    }

    /// Never includes the next sent transaction.
    pub fn drop_next_transaction(&self) {
        self.state.lock().stall_next.push(Stall::Forever);
    }

    /// Fails the next `count` reads with a transport error.
    pub fn fail_next_reads(&self, count: u32) {
        self.state.lock().failing_reads = count;
    }

    /// Ends all transfer subscriptions.
    pub fn close_subscriptions(&self) {
        self.state.lock().subscriptions.clear();
    }

    /// Returns the number of open transfer subscriptions.
    pub fn subscriptions(&self) -> usize {
        self.state.lock().subscriptions.iter().filter(|sub| !sub.sender.is_closed()).count()
    }

    /// Returns all broadcast transactions, in order.
    pub fn sent_transactions(&self) -> Vec<SentRecord> {
        self.state.lock().sent.clone()
    }

    /// Returns the code of `address`.
    pub fn code(&self, address: Address) -> Bytes {
        self.state.lock().account(address).code.clone()
    }

    /// Returns the sender nonce of `address`.
    pub fn nonce(&self, address: Address) -> u64 {
        self.state.lock().account(address).nonce
    }

    /// Returns the contract nonce of `account`.
    pub fn contract_nonce_of(&self, account: Address) -> U256 {
        self.state.lock().account(account).contract_nonce
    }

    /// Returns the `asset` balance of `holder`.
    pub fn token_balance(&self, asset: Address, holder: Address) -> U256 {
        self.state.lock().tokens.get(&(asset, holder)).copied().unwrap_or_default()
    }
}

#[async_trait]
impl ChainApi for InMemoryChain {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        let mut state = self.state.lock();
        state.take_read_failure()?;
        Ok(state.account(address).code.clone())
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        let mut state = self.state.lock();
        state.take_read_failure()?;
        Ok(state.account(address).balance)
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64> {
        let mut state = self.state.lock();
        state.take_read_failure()?;
        Ok(state.pending_nonce(address))
    }

    async fn contract_nonce(&self, account: Address) -> Result<U256> {
        let mut state = self.state.lock();
        state.take_read_failure()?;
        Ok(state.account(account).contract_nonce)
    }

    async fn simulate(&self, tx: &ChainTransaction) -> Result<Bytes> {
        let state = self.state.lock();
        let mut scratch = State {
            accounts: state.accounts.clone(),
            tokens: state.tokens.clone(),
            ..Default::default()
        };
        scratch.account(tx.from).nonce += 1;
        scratch.apply_authorizations(self.chain_id, &tx.authorization_list);
        state
            .execute_on(&mut scratch, tx, &mut Vec::new())
            .map(|_| Bytes::new())
            .map_err(|data| ChainError::Reverted { data })
    }

    async fn send_transaction(
        &self,
        mut tx: ChainTransaction,
        signer: &DynSigner,
    ) -> Result<SentTransaction> {
        tx.from = signer.address();

        let mut state = self.state.lock();
        let nonce = state.pending_nonce(tx.from);
        state.tx_count += 1;
        let mut preimage = [0u8; 36];
        preimage[..20].copy_from_slice(tx.from.as_slice());
        preimage[20..28].copy_from_slice(&nonce.to_be_bytes());
        preimage[28..].copy_from_slice(&state.tx_count.to_be_bytes());
        let hash = keccak256(preimage);

        state.sent.push(SentRecord {
            tx_hash: hash,
            from: tx.from,
            to: tx.to,
            nonce,
            input: tx.input.clone(),
            authorization_list: tx.authorization_list.clone(),
        });

        if state.contract_nonce_bumps > 0
            && IDelegatedAccount::execute_1Call::abi_decode(&tx.input).is_ok()
        {
            state.contract_nonce_bumps -= 1;
            state.account(tx.to).contract_nonce += U256::from(1);
        }

        let encoded = tx.input.clone();
        let transaction = Transaction { hash, nonce, tx };
        if state.stall_next.is_empty() {
            state.include(self.chain_id, transaction);
        } else {
            let stall = state.stall_next.remove(0);
            state.stalled.insert(hash, (transaction, stall));
        }

        if state.lost_send_responses > 0 {
            state.lost_send_responses -= 1;
            return Err(TransportErrorKind::custom_str("connection reset").into());
        }
        Ok(SentTransaction { tx_hash: hash, nonce, encoded })
    }

    async fn rebroadcast(&self, tx: &SentTransaction) -> Result<()> {
        let mut state = self.state.lock();
        let released = matches!(state.stalled.get(&tx.tx_hash), Some((_, Stall::UntilRebroadcast)));
        if released && let Some((transaction, _)) = state.stalled.remove(&tx.tx_hash) {
            state.include(self.chain_id, transaction);
        }
        Ok(())
    }

    async fn get_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>> {
        Ok(self.state.lock().receipts.get(&tx_hash).copied())
    }

    async fn wait_for_receipt(&self, tx_hash: B256, timeout: Duration) -> Result<Option<Receipt>> {
        {
            let mut state = self.state.lock();
            if state.failing_receipt_waits > 0 {
                state.failing_receipt_waits -= 1;
                return Err(TransportErrorKind::custom_str("connection reset").into());
            }
        }
        if let Some(receipt) = self.get_receipt(tx_hash).await? {
            return Ok(Some(receipt));
        }
        tokio::time::sleep(timeout).await;
        self.get_receipt(tx_hash).await
    }

    async fn transfers(&self, asset: Address, recipient: Address) -> Result<TransferStream> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.state.lock().subscriptions.push(Subscription { asset, recipient, sender });

        Ok(futures_util::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|transfer| (transfer, receiver))
        })
        .boxed())
    }
}
