//! # UDA Relay
//!
//! Library for a relay that delegates a controlled account to an implementation contract via
//! EIP-7702, and forwards inbound transfers in batches signed by that account.

pub mod chain;
pub mod chains;
pub mod cli;
pub mod config;
pub mod constants;
pub mod delegation;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod relay;
pub mod serde;
pub mod service;
pub mod signers;
pub mod transport;
pub mod types;
