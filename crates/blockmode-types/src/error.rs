/// Block cipher mode errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    // Parameter errors
    #[error("invalid argument")]
    InvalidArg,
    #[error("invalid key")]
    InvalidKey,
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("invalid iv length")]
    InvalidIvLength,
    #[error("invalid tag length")]
    InvalidTagLength,
    #[error("invalid padding")]
    InvalidPadding,
    #[error("input data too long")]
    InputOverflow,

    // State machine errors
    #[error("operation called out of sequence")]
    SequenceViolation,

    // Integrity errors
    #[error("aead: tag verification failed")]
    AeadTagVerifyFail,
    #[error("key unwrap: integrity check failed")]
    WrapIntegrityFail,

    // Resource errors
    #[error("counter space exhausted")]
    CounterExhausted,
}

impl CryptoError {
    /// Negative status code for this error.
    ///
    /// Codes group the variants by failure class: `-1` parameter
    /// validation, `-2` sequencing, `-3` AEAD authentication, `-4` key
    /// unwrap integrity and `-5` counter exhaustion.
    pub fn code(&self) -> i32 {
        match self {
            CryptoError::InvalidArg
            | CryptoError::InvalidKey
            | CryptoError::InvalidKeyLength { .. }
            | CryptoError::InvalidIvLength
            | CryptoError::InvalidTagLength
            | CryptoError::InvalidPadding
            | CryptoError::InputOverflow => -1,
            CryptoError::SequenceViolation => -2,
            CryptoError::AeadTagVerifyFail => -3,
            CryptoError::WrapIntegrityFail => -4,
            CryptoError::CounterExhausted => -5,
        }
    }

    /// Whether the error is an integrity failure after which the context
    /// that produced it must not release any further output.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            CryptoError::AeadTagVerifyFail | CryptoError::WrapIntegrityFail
        )
    }
}

/// Authenticated container (`AYCF-SM4-GCM`) errors.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad container magic")]
    BadMagic,
    #[error("unsupported container version {0}")]
    UnsupportedVersion(u8),
    #[error("container truncated")]
    Truncated,
    #[error("payload size mismatch: header declares {declared}, found {actual}")]
    SizeMismatch { declared: u64, actual: u64 },
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl ContainerError {
    /// Negative status code for this error.
    ///
    /// Crypto errors keep their own code; format and I/O failures use
    /// `-10` and below.
    pub fn code(&self) -> i32 {
        match self {
            ContainerError::Crypto(e) => e.code(),
            ContainerError::Io(_) => -10,
            ContainerError::BadMagic => -11,
            ContainerError::UnsupportedVersion(_) => -12,
            ContainerError::Truncated => -13,
            ContainerError::SizeMismatch { .. } => -14,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_negative_and_grouped() {
        assert_eq!(CryptoError::InvalidArg.code(), -1);
        assert_eq!(CryptoError::InvalidTagLength.code(), -1);
        assert_eq!(CryptoError::SequenceViolation.code(), -2);
        assert_eq!(CryptoError::AeadTagVerifyFail.code(), -3);
        assert_eq!(CryptoError::WrapIntegrityFail.code(), -4);
        assert_eq!(CryptoError::CounterExhausted.code(), -5);
    }

    #[test]
    fn container_codes() {
        assert_eq!(ContainerError::BadMagic.code(), -11);
        assert_eq!(ContainerError::UnsupportedVersion(2).code(), -12);
        assert_eq!(
            ContainerError::Crypto(CryptoError::AeadTagVerifyFail).code(),
            -3
        );
    }

    #[test]
    fn integrity_failures() {
        assert!(CryptoError::AeadTagVerifyFail.is_integrity_failure());
        assert!(CryptoError::WrapIntegrityFail.is_integrity_failure());
        assert!(!CryptoError::InvalidArg.is_integrity_failure());
    }

    #[test]
    fn display_messages() {
        let e = CryptoError::InvalidKeyLength {
            expected: 16,
            got: 4,
        };
        assert_eq!(e.to_string(), "invalid key length: expected 16, got 4");
        let e = ContainerError::SizeMismatch {
            declared: 10,
            actual: 4,
        };
        assert!(e.to_string().contains("declares 10"));
    }
}
