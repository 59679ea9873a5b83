#![forbid(unsafe_code)]
#![doc = "Error codes and block cipher identifiers for the blockmode engine."]

pub mod algorithm;
pub mod error;

pub use algorithm::*;
pub use error::*;
