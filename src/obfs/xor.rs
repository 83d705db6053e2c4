//! Repeating-key XOR obfuscation.

use crate::obfs::Obfuscator;

/// XORs each byte with the secret, cycling the key by stream position.
pub struct XorObfuscator {
    key: Vec<u8>,
}

impl XorObfuscator {
    /// `key` must not be empty.
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        let key = key.into();
        debug_assert!(!key.is_empty(), "XOR key must not be empty");
        Self { key }
    }

    fn apply(&self, offset: u64, buf: &mut [u8]) {
        if self.key.is_empty() {
            return;
        }
        let len = self.key.len() as u64;
        let start = (offset % len) as usize;
        for (byte, k) in buf.iter_mut().zip(self.key.iter().cycle().skip(start)) {
            *byte ^= k;
        }
    }
}

impl std::fmt::Debug for XorObfuscator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XorObfuscator")
            .field("key_len", &self.key.len())
            .finish()
    }
}

impl Obfuscator for XorObfuscator {
    fn obfuscate(&self, offset: u64, buf: &mut [u8]) {
        self.apply(offset, buf);
    }

    fn deobfuscate(&self, offset: u64, buf: &mut [u8]) {
        self.apply(offset, buf);
    }
}
