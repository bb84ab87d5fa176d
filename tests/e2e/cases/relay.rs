use crate::e2e::*;
use alloy::{
    primitives::{Signature, U256},
    sol_types::SolCall,
};
use relay::{
    config::TimeoutPolicy,
    error::{DelegationError, DispatchError, RelayError},
    relay::{BatchSigner, JobBuilder, verify_batch},
    signers::DynSigner,
    types::{IDelegatedAccount, IERC20, JobState},
};

#[tokio::test(flavor = "multi_thread")]
async fn relays_amount_to_recipient() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.delegate().await?;
    env.deposit(1_000);

    let receipt = env.service.relay(env.chain_key, RECIPIENT, U256::from(1_000)).await?;
    assert!(receipt.success);
    assert_eq!(env.chain.token_balance(ASSET, RECIPIENT), U256::from(1_000));
    assert_eq!(env.chain.token_balance(ASSET, env.controlled), U256::ZERO);
    assert_eq!(env.chain.contract_nonce_of(env.controlled), U256::from(1));

    // submitted by the relayer, signed by the controlled account
    let relayed = env.relayed();
    assert_eq!(relayed.len(), 1);
    assert_eq!(relayed[0].to, env.controlled);
    assert!(relayed[0].authorization_list.is_empty());

    let call = IDelegatedAccount::execute_1Call::abi_decode(&relayed[0].input)?;
    assert_eq!(call.calls.len(), 2);
    assert_eq!(call.calls[0].to, ASSET);
    let transfer = IERC20::transferCall::abi_decode(&call.calls[0].data)?;
    assert_eq!(transfer.to, RECIPIENT);
    assert_eq!(transfer.amount, U256::from(1_000));
    assert_eq!(call.calls[1].to, RECIPIENT);
    assert!(call.calls[1].data.is_empty());

    let signature = Signature::from_raw(&call.signature)?;
    assert!(verify_batch(&signature, &call.calls, U256::ZERO, env.controlled));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn marker_call_can_be_disabled() -> eyre::Result<()> {
    let env = Environment::setup_with(TimeoutPolicy::default(), false)?;
    env.delegate().await?;
    env.deposit(10);

    env.service.relay(env.chain_key, RECIPIENT, U256::from(10)).await?;
    assert_eq!(batch_calls(&env.relayed()[0])?.len(), 1);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn consecutive_batches_use_increasing_nonces() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.delegate().await?;
    env.deposit(300);

    for _ in 0..3 {
        env.service.relay(env.chain_key, RECIPIENT, U256::from(100)).await?;
    }

    assert_eq!(env.chain.contract_nonce_of(env.controlled), U256::from(3));
    assert_eq!(env.chain.token_balance(ASSET, RECIPIENT), U256::from(300));
    let nonces: Vec<u64> = env.relayed().iter().map(|record| record.nonce).collect();
    assert_eq!(nonces, vec![0, 1, 2]);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn relay_requires_delegation() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.deposit(1_000);

    let err = env.service.relay(env.chain_key, RECIPIENT, U256::from(1_000)).await.unwrap_err();
    assert!(matches!(err, RelayError::Delegation(DelegationError::NotDelegated { .. })));
    assert!(err.is_protocol_violation());

    // relaying never changes the delegation
    assert!(env.chain.sent_transactions().is_empty());
    assert!(env.chain.code(env.controlled).is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_nonce_is_retried_once() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.delegate().await?;
    env.deposit(1_000);
    env.chain.bump_contract_nonce_on_next_submit();

    let receipt = env.service.relay(env.chain_key, RECIPIENT, U256::from(1_000)).await?;
    assert!(receipt.success);

    // the first batch was signed against a nonce that moved, the second against the fresh one
    let relayed = env.relayed();
    assert_eq!(relayed.len(), 2);
    let first = IDelegatedAccount::execute_1Call::abi_decode(&relayed[0].input)?;
    let second = IDelegatedAccount::execute_1Call::abi_decode(&relayed[1].input)?;
    let first_signature = Signature::from_raw(&first.signature)?;
    let second_signature = Signature::from_raw(&second.signature)?;
    assert!(verify_batch(&first_signature, &first.calls, U256::ZERO, env.controlled));
    assert!(verify_batch(&second_signature, &second.calls, U256::from(1), env.controlled));

    assert_eq!(env.chain.contract_nonce_of(env.controlled), U256::from(2));
    assert_eq!(env.chain.token_balance(ASSET, RECIPIENT), U256::from(1_000));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_retry_is_not_repeated() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.delegate().await?;
    env.deposit(1_000);
    env.chain.bump_contract_nonce_on_submits(2);

    let err = env.service.relay(env.chain_key, RECIPIENT, U256::from(1_000)).await.unwrap_err();
    let RelayError::Dispatch(DispatchError::StaleNonce { signed, current, tx_hash }) = err else {
        eyre::bail!("unexpected error: {err}")
    };
    assert_eq!(signed, U256::from(1));
    assert_eq!(current, U256::from(2));

    // one submission and a single rebuilt one, both reverted
    let relayed = env.relayed();
    assert_eq!(relayed.len(), 2);
    assert_eq!(tx_hash, Some(relayed[1].tx_hash));
    assert_eq!(env.chain.token_balance(ASSET, RECIPIENT), U256::ZERO);
    assert_eq!(env.chain.token_balance(ASSET, env.controlled), U256::from(1_000));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unreadable_receipt_leaves_outcome_unresolved() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.delegate().await?;
    env.deposit(1_000);
    env.chain.fail_next_receipt_wait();

    let err = env.service.relay(env.chain_key, RECIPIENT, U256::from(1_000)).await.unwrap_err();
    let RelayError::Dispatch(DispatchError::Unresolved { tx_hash, .. }) = &err else {
        eyre::bail!("unexpected error: {err}")
    };
    assert!(!err.is_transient());
    assert_eq!(*tx_hash, Some(env.relayed()[0].tx_hash));

    // the batch landed, and was not sent again
    assert_eq!(env.relayed().len(), 1);
    assert_eq!(env.chain.token_balance(ASSET, RECIPIENT), U256::from(1_000));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn lost_send_response_is_not_retried() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.delegate().await?;
    env.deposit(1_000);
    env.chain.lose_next_send_response();

    let err = env.service.relay(env.chain_key, RECIPIENT, U256::from(1_000)).await.unwrap_err();
    assert!(matches!(
        err,
        RelayError::Dispatch(DispatchError::Unresolved { tx_hash: None, .. })
    ));
    assert!(!err.is_transient());

    assert_eq!(env.relayed().len(), 1);
    assert_eq!(env.chain.token_balance(ASSET, RECIPIENT), U256::from(1_000));
    assert_eq!(env.chain.contract_nonce_of(env.controlled), U256::from(1));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn dispatcher_checks_delegation() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.delegate().await?;
    env.service.revoke_delegation(env.chain_key).await?;
    env.deposit(1_000);

    let err = env.dispatcher()?.relay_amount(RECIPIENT, U256::from(1_000)).await.unwrap_err();
    assert!(matches!(err, RelayError::Delegation(DelegationError::NotDelegated { .. })));
    assert!(env.relayed().is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn foreign_signature_is_a_protocol_violation() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.delegate().await?;
    env.deposit(1_000);

    let context = env.service.chains().get(env.chain_key)?;
    let mut job = JobBuilder::new(&context, env.controlled)
        .build_manual(RECIPIENT, U256::from(1_000))
        .await?;
    BatchSigner::new(DynSigner::from_signing_key(OTHER_KEY)?).sign_job(&mut job).await?;
    assert_eq!(job.state, JobState::Signed);

    let err = env.dispatcher()?.dispatch(&mut job).await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::SignatureRejected { nonce, tx_hash: None } if nonce == U256::ZERO
    ));
    assert!(err.is_protocol_violation());

    // rejected before submission
    assert!(env.relayed().is_empty());
    assert_eq!(env.chain.contract_nonce_of(env.controlled), U256::ZERO);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn reverting_call_reports_reason() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.delegate().await?;
    env.deposit(1_000);
    env.chain.fail_calls_to(RECIPIENT);

    let err = env.service.relay(env.chain_key, RECIPIENT, U256::from(1_000)).await.unwrap_err();
    let RelayError::Dispatch(err) = err else { eyre::bail!("unexpected error: {err}") };
    assert_eq!(err.revert_reason().as_deref(), Some("Call reverted"));
    assert!(!err.is_protocol_violation());
    assert!(!err.is_transient());

    assert!(env.relayed().is_empty());
    assert_eq!(env.chain.contract_nonce_of(env.controlled), U256::ZERO);
    assert_eq!(env.chain.token_balance(ASSET, env.controlled), U256::from(1_000));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn insufficient_balance_reverts() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.delegate().await?;
    env.deposit(10);

    let err = env.service.relay(env.chain_key, RECIPIENT, U256::from(1_000)).await.unwrap_err();
    assert!(matches!(err, RelayError::Dispatch(DispatchError::Reverted { .. })));
    assert_eq!(env.chain.token_balance(ASSET, env.controlled), U256::from(10));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn stalled_batch_is_rebroadcast() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.delegate().await?;
    env.deposit(1_000);
    env.chain.stall_next_transaction();

    let receipt = env.service.relay(env.chain_key, RECIPIENT, U256::from(1_000)).await?;
    assert!(receipt.success);

    // the same signed transaction was re-sent, not a new one
    assert_eq!(env.relayed().len(), 1);
    assert_eq!(receipt.tx_hash, env.relayed()[0].tx_hash);
    assert_eq!(env.chain.token_balance(ASSET, RECIPIENT), U256::from(1_000));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn dropped_batch_is_unconfirmed_after_rebroadcasts() -> eyre::Result<()> {
    let env = Environment::setup_with(TimeoutPolicy::Rebroadcast { attempts: 2 }, true)?;
    env.delegate().await?;
    env.deposit(1_000);
    env.chain.drop_next_transaction();

    let err = env.service.relay(env.chain_key, RECIPIENT, U256::from(1_000)).await.unwrap_err();
    let RelayError::Dispatch(DispatchError::Unconfirmed { tx_hash, attempts }) = err else {
        eyre::bail!("unexpected error: {err}")
    };
    assert_eq!(attempts, 3);
    assert_eq!(tx_hash, env.relayed()[0].tx_hash);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn fail_policy_gives_up_after_first_timeout() -> eyre::Result<()> {
    let env = Environment::setup_with(TimeoutPolicy::Fail, true)?;
    env.delegate().await?;
    env.deposit(1_000);
    env.chain.stall_next_transaction();

    let err = env.service.relay(env.chain_key, RECIPIENT, U256::from(1_000)).await.unwrap_err();
    assert!(matches!(err, RelayError::Dispatch(DispatchError::Unconfirmed { attempts: 1, .. })));
    assert_eq!(env.chain.token_balance(ASSET, RECIPIENT), U256::ZERO);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn reports_balances() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.chain.fund(env.controlled, U256::from(5));
    env.chain.fund(env.relayer, U256::from(7));

    let balances = env.service.balances().await?;
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].chain, env.chain_key);
    assert_eq!(balances[0].controlled, U256::from(5));
    assert_eq!(balances[0].relayer, U256::from(7));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_chain_is_rejected() -> eyre::Result<()> {
    let env = Environment::setup()?;

    let err = env
        .service
        .relay(alloy_chains::Chain::from_id(1), RECIPIENT, U256::from(1))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Config(_)));

    Ok(())
}
