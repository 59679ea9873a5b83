/// Block cipher identifiers for the reference ciphers shipped with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockCipherId {
    Aes128,
    Aes192,
    Aes256,
    Sm4,
}

impl BlockCipherId {
    /// Key length in bytes.
    pub fn key_len(&self) -> usize {
        match self {
            BlockCipherId::Aes128 | BlockCipherId::Sm4 => 16,
            BlockCipherId::Aes192 => 24,
            BlockCipherId::Aes256 => 32,
        }
    }

    /// Look up a cipher by its lowercase name (`aes-128`, `sm4`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "aes-128" | "aes128" => Some(BlockCipherId::Aes128),
            "aes-192" | "aes192" => Some(BlockCipherId::Aes192),
            "aes-256" | "aes256" => Some(BlockCipherId::Aes256),
            "sm4" => Some(BlockCipherId::Sm4),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cipher_names() {
        assert_eq!(BlockCipherId::from_name("SM4"), Some(BlockCipherId::Sm4));
        assert_eq!(
            BlockCipherId::from_name("aes-256"),
            Some(BlockCipherId::Aes256)
        );
        assert_eq!(BlockCipherId::from_name("des"), None);
        assert_eq!(BlockCipherId::Aes192.key_len(), 24);
    }
}
