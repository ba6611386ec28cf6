//! Sparse samples, solver configuration, the binary-model trait and the
//! crate error type

pub mod error;
pub mod traits;
pub mod types;

pub use self::error::*;
pub use self::traits::*;
pub use self::types::*;
