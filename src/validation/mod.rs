//! Cross-validation and hyper-parameter search

pub mod grid;
pub mod kfold;

pub use self::grid::*;
pub use self::kfold::*;
