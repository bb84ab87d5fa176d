//! Relay end-to-end test cases

mod delegation;
mod queue;
mod relay;
