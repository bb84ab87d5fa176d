//! Signers for the controlled account and the relayer.

mod r#dyn;
pub use r#dyn::DynSigner;
