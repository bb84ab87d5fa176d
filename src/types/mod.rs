//! Shared primitive types.

mod call;
pub use call::*;

mod contracts;
pub use contracts::*;

mod delegation;
pub use delegation::*;

mod job;
pub use job::*;

mod receipt;
pub use receipt::*;
