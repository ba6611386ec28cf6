//! Feature file discovery and loading
//!
//! Technique feature files are plain whitespace-separated text, one
//! instance per line. They are grouped by technique name, concatenated into
//! a single labelled matrix and optionally balanced per class.

pub mod balance;
pub mod collector;
pub mod loader;

pub use self::balance::*;
pub use self::collector::*;
pub use self::loader::*;
