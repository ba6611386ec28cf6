//! SVM solver implementations
//!
//! Sequential Minimal Optimization (SMO) for the binary C-SVC dual with
//! per-sample box constraints.

pub mod smo;

pub use self::smo::*;
