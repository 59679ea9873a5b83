//! Block cipher modes of operation.
//!
//! This module provides implementations of standard block cipher modes
//! including CBC, CFB, OFB, CTR, CTS, GCM, CCM, OCB, XTS and key wrap.
//! Each mode operates on top of a 128-bit block cipher (e.g., AES, SM4)
//! through the [`BlockCipher`](crate::provider::BlockCipher) trait and
//! borrows the key schedule rather than owning it.

pub mod cbc;
pub mod ccm;
pub mod cfb;
pub mod ctr;
pub mod cts;
pub mod gcm;
pub(crate) mod ghash;
#[cfg(feature = "ocb")]
pub mod ocb;
pub mod ofb;
pub mod wrap;
pub mod xts;
