use std::hash::Hasher;

/// FNV-1a 64-bit offset basis
const FNV_OFFSET: u64 = 0xcbf29ce4_84222325;

/// FNV-1a 64-bit prime
const FNV_PRIME: u64 = 0x00000100_000001b3;

/// FNV-1a 64-bit hasher.
///
/// This is the hash the flag service uses when it builds snapshots, so it is
/// the default hasher of [`Filter`](crate::Filter). Bytes are mixed in the
/// order they are written; `write` does not add any length prefix.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a64(u64);

impl Default for Fnv1a64 {
    fn default() -> Self {
        Self(FNV_OFFSET)
    }
}

impl Hasher for Fnv1a64 {
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= byte as u64;
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

/// Hash a byte slice with a fresh `H`, feeding it the raw bytes only.
pub(crate) fn hash_bytes<H: Hasher + Default>(data: &[u8]) -> u64 {
    let mut hasher = H::default();
    hasher.write(data);
    hasher.finish()
}
