use twox_hash::{XxHash3_64, XxHash3_128};

/// The strong side of the block-matching pair: a 64-bit per-block digest
/// that confirms weak-checksum candidates, plus a streaming digest over
/// the whole source that seals the delta.
///
/// Sender and receiver must agree on the implementation; [`Xxh3`] is the
/// default on both sides.
pub trait StrongHash {
    /// Digest one block. Signature entries store this value and the
    /// differ compares candidate windows against it.
    fn hash_block(block: &[u8]) -> u64;

    /// Feed source bytes into the end-to-end digest.
    fn update(&mut self, bytes: &[u8]);

    /// The end-to-end digest of everything fed so far.
    fn finish(&self) -> Vec<u8>;
}

/// xxh3 pairing: 64-bit one-shot for blocks, streaming 128-bit for the
/// end-to-end digest (16-byte little-endian payload).
pub struct Xxh3 {
    inner: XxHash3_128,
}

impl Xxh3 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: XxHash3_128::new(),
        }
    }
}

impl Default for Xxh3 {
    fn default() -> Self {
        Self::new()
    }
}

impl StrongHash for Xxh3 {
    fn hash_block(block: &[u8]) -> u64 {
        XxHash3_64::oneshot(block)
    }

    fn update(&mut self, bytes: &[u8]) {
        self.inner.write(bytes);
    }

    fn finish(&self) -> Vec<u8> {
        self.inner.finish_128().to_le_bytes().to_vec()
    }
}
