#![forbid(unsafe_code)]
#![doc = "Block cipher modes of operation over a pluggable 128-bit block cipher."]

// Core traits
pub mod provider;

pub use provider::BlockCipher;

// Reference block ciphers
#[cfg(feature = "aes")]
pub mod aes;
#[cfg(feature = "sm4")]
pub mod sm4;

// Modes of operation
#[cfg(feature = "modes")]
pub mod modes;

// Authenticated file container
#[cfg(feature = "container")]
pub mod container;
