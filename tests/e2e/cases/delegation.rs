use crate::e2e::*;
use alloy::primitives::{Address, bytes};
use relay::{
    config::TimeoutPolicy,
    error::{DelegationError, RelayError},
    types::{DelegationState, DelegationStatus},
};

#[tokio::test(flavor = "multi_thread")]
async fn delegates_fresh_account() -> eyre::Result<()> {
    let env = Environment::setup()?;
    assert_eq!(
        env.service.check_delegation_status(env.chain_key).await?,
        DelegationStatus::NotDelegated
    );

    let outcome = env.service.ensure_delegation(env.chain_key, None).await?;
    assert_eq!(outcome.state, DelegationState::DelegatedCorrect);
    assert_eq!(outcome.status, DelegationStatus::DelegatedTo(IMPLEMENTATION));
    assert_eq!(outcome.receipts.len(), 1);
    assert!(outcome.receipts[0].success);

    // the controlled account sends to itself, so the authorization uses the nonce after the
    // transaction's own
    let sent = env.delegation_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, env.controlled);
    assert_eq!(sent[0].nonce, 0);
    let authorization = &sent[0].authorization_list[0];
    assert_eq!(authorization.nonce(), 1);
    assert_eq!(*authorization.address(), IMPLEMENTATION);
    assert_eq!(authorization.recover_authority()?, env.controlled);

    assert_eq!(env.chain.code(env.controlled), DelegationStatus::designator(IMPLEMENTATION));
    assert_eq!(
        env.service.check_delegation_status(env.chain_key).await?,
        DelegationStatus::DelegatedTo(IMPLEMENTATION)
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn ensure_is_idempotent() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.delegate().await?;
    let sent = env.chain.sent_transactions().len();

    let outcome = env.service.ensure_delegation(env.chain_key, None).await?;
    assert_eq!(outcome.state, DelegationState::DelegatedCorrect);
    assert!(outcome.receipts.is_empty());
    assert_eq!(env.chain.sent_transactions().len(), sent);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn redelegates_account_delegated_elsewhere() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.chain.set_code(env.controlled, DelegationStatus::designator(OTHER_IMPLEMENTATION));

    let outcome = env.service.ensure_delegation(env.chain_key, None).await?;
    assert_eq!(outcome.state, DelegationState::DelegatedCorrect);
    assert_eq!(outcome.receipts.len(), 2);

    let sent = env.delegation_transactions();
    assert_eq!(sent.len(), 2);
    let revoke = &sent[0].authorization_list[0];
    let delegate = &sent[1].authorization_list[0];
    assert_eq!(*revoke.address(), Address::ZERO);
    assert_eq!(*delegate.address(), IMPLEMENTATION);
    assert!(sent[0].input.is_empty());

    // the second authorization is built from a fresh read after the revoke landed
    assert!(delegate.nonce() > revoke.nonce());
    assert_eq!(delegate.nonce(), sent[1].nonce + 1);
    assert_eq!(delegate.nonce(), revoke.nonce() + 2);

    assert_eq!(env.chain.code(env.controlled), DelegationStatus::designator(IMPLEMENTATION));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn replaces_unknown_code() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.chain.set_code(env.controlled, bytes!("0x6080604052"));
    assert!(matches!(
        env.service.check_delegation_status(env.chain_key).await?,
        DelegationStatus::DelegatedUnknownFormat(_)
    ));

    let outcome = env.service.ensure_delegation(env.chain_key, None).await?;
    assert_eq!(outcome.receipts.len(), 2);
    assert_eq!(outcome.status, DelegationStatus::DelegatedTo(IMPLEMENTATION));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn revokes_delegation() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.delegate().await?;

    let receipt = env.service.revoke_delegation(env.chain_key).await?;
    assert!(receipt.success);
    assert!(env.chain.code(env.controlled).is_empty());
    assert_eq!(
        env.service.check_delegation_status(env.chain_key).await?,
        DelegationStatus::NotDelegated
    );

    // delegating again needs a new authorization
    let outcome = env.service.ensure_delegation(env.chain_key, None).await?;
    assert_eq!(outcome.receipts.len(), 1);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unconfirmed_delegation_fails() -> eyre::Result<()> {
    let env = Environment::setup_with(TimeoutPolicy::Fail, true)?;
    env.chain.drop_next_transaction();

    let err = env.service.ensure_delegation(env.chain_key, None).await.unwrap_err();
    assert!(matches!(err, RelayError::Delegation(DelegationError::Unconfirmed(_))));
    assert!(env.chain.code(env.controlled).is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn read_failure_is_transient() -> eyre::Result<()> {
    let env = Environment::setup()?;
    env.chain.fail_next_reads(1);

    let err = env.service.ensure_delegation(env.chain_key, None).await.unwrap_err();
    assert!(err.is_transient());
    assert!(!err.is_protocol_violation());
    assert!(env.chain.sent_transactions().is_empty());

    // the next attempt goes through
    env.delegate().await?;
    assert_eq!(env.chain.code(env.controlled), DelegationStatus::designator(IMPLEMENTATION));

    Ok(())
}
