use crate::e2e::*;
use alloy::{primitives::U256, sol_types::SolCall};
use relay::{
    error::RelayError,
    types::{DelegationStatus, IERC20},
};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Starts watching the chain and waits until the transfer subscription is open.
async fn watch(env: &Environment) -> eyre::Result<JoinHandle<Result<(), RelayError>>> {
    let service = env.service.clone();
    let chain = env.chain_key;
    let handle = tokio::spawn(async move { service.watch(chain).await });

    let subscribed = env.chain.clone();
    wait_until(move || subscribed.subscriptions() > 0).await?;
    Ok(handle)
}

async fn stopped(
    handle: JoinHandle<Result<(), RelayError>>,
) -> eyre::Result<Result<(), RelayError>> {
    Ok(tokio::time::timeout(Duration::from_secs(5), handle).await??)
}

#[tokio::test(flavor = "multi_thread")]
async fn relays_transfers_in_order() -> eyre::Result<()> {
    let env = Environment::setup()?;
    let handle = watch(&env).await?;

    // watching delegates first
    assert_eq!(env.chain.code(env.controlled), DelegationStatus::designator(IMPLEMENTATION));

    for amount in [100, 200, 300] {
        env.deposit(amount);
    }
    let chain = env.chain.clone();
    wait_until(move || chain.token_balance(ASSET, RECIPIENT) == U256::from(600)).await?;

    let relayed = env.relayed();
    let nonces: Vec<u64> = relayed.iter().map(|record| record.nonce).collect();
    assert_eq!(nonces, vec![0, 1, 2]);
    assert_eq!(env.chain.contract_nonce_of(env.controlled), U256::from(3));

    // FIFO: batches forward the transfers in the order they arrived
    let forwarded = relayed
        .iter()
        .map(|record| {
            let calls = batch_calls(record)?;
            Ok(IERC20::transferCall::abi_decode(&calls[0].data)?.amount)
        })
        .collect::<eyre::Result<Vec<_>>>()?;
    assert_eq!(forwarded, vec![U256::from(100), U256::from(200), U256::from(300)]);

    env.chain.close_subscriptions();
    stopped(handle).await??;

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn ignores_other_recipients() -> eyre::Result<()> {
    let env = Environment::setup()?;
    let handle = watch(&env).await?;

    env.chain.emit_transfer(ASSET, SOURCE, RECIPIENT, U256::from(5));
    env.deposit(100);
    let chain = env.chain.clone();
    wait_until(move || chain.token_balance(ASSET, RECIPIENT) == U256::from(105)).await?;
    assert_eq!(env.relayed().len(), 1);

    env.chain.close_subscriptions();
    stopped(handle).await??;

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn pauses_on_protocol_violation() -> eyre::Result<()> {
    let env = Environment::setup()?;
    let handle = watch(&env).await?;

    env.chain.reject_batch_signatures();
    env.deposit(100);
    env.deposit(200);

    let err = stopped(handle).await?.unwrap_err();
    assert!(err.is_protocol_violation());

    // nothing was submitted, nothing moved
    assert!(env.relayed().is_empty());
    assert_eq!(env.chain.token_balance(ASSET, RECIPIENT), U256::ZERO);
    assert_eq!(env.chain.token_balance(ASSET, env.controlled), U256::from(300));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn retries_transient_failures() -> eyre::Result<()> {
    let env = Environment::setup()?;
    let handle = watch(&env).await?;

    env.chain.fail_next_reads(2);
    env.deposit(100);
    let chain = env.chain.clone();
    wait_until(move || chain.token_balance(ASSET, RECIPIENT) == U256::from(100)).await?;
    assert_eq!(env.relayed().len(), 1);

    env.chain.close_subscriptions();
    stopped(handle).await??;

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_jobs_do_not_stop_the_queue() -> eyre::Result<()> {
    let env = Environment::setup()?;
    let handle = watch(&env).await?;

    env.chain.fail_calls_to(RECIPIENT);
    env.deposit(100);
    env.deposit(200);
    env.chain.close_subscriptions();

    // both jobs fail, the queue drains and stops without error
    stopped(handle).await??;
    assert!(env.relayed().is_empty());
    assert_eq!(env.chain.token_balance(ASSET, env.controlled), U256::from(300));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_outcome_is_not_relayed_twice() -> eyre::Result<()> {
    let env = Environment::setup()?;
    // a balance large enough to cover a second forward
    env.chain.emit_transfer(ASSET, SOURCE, env.controlled, U256::from(5_000_000));
    let handle = watch(&env).await?;

    env.chain.fail_next_receipt_wait();
    env.deposit(1_000_000);
    let chain = env.chain.clone();
    wait_until(move || chain.token_balance(ASSET, RECIPIENT) == U256::from(1_000_000)).await?;

    // longer than the retry backoff
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(env.chain.token_balance(ASSET, RECIPIENT), U256::from(1_000_000));
    assert_eq!(env.relayed().len(), 1);
    assert_eq!(env.chain.contract_nonce_of(env.controlled), U256::from(1));

    env.chain.close_subscriptions();
    stopped(handle).await??;

    Ok(())
}
