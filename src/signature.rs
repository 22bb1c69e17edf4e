use std::io::{self, Read};
use std::marker::PhantomData;

use crate::error::{Error, Result};
use crate::op::{le_u32, le_u64};
use crate::read_exact_or_eof;
use crate::rolling::RollingChecksum;
use crate::strong::{StrongHash, Xxh3};

/// Wire size of one serialized [`BlockHash`].
pub const BLOCK_HASH_SIZE: usize = 20;

/// One signature entry: the weak and strong hashes of target block
/// `index`. The final block of a target may be shorter than the block
/// size; its hashes cover the short content as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockHash {
    pub index: u64,
    pub weak: u32,
    pub strong: u64,
}

/// Encode a [`BlockHash`] into its 20-byte little-endian frame.
#[must_use]
pub fn serialize_block_hash(block_hash: &BlockHash) -> [u8; BLOCK_HASH_SIZE] {
    let mut out = [0u8; BLOCK_HASH_SIZE];
    out[..8].copy_from_slice(&block_hash.index.to_le_bytes());
    out[8..12].copy_from_slice(&block_hash.weak.to_le_bytes());
    out[12..].copy_from_slice(&block_hash.strong.to_le_bytes());
    out
}

/// Decode a [`BlockHash`] from the front of `buf`.
///
/// # Errors
/// [`Error::ShortBuffer`] when `buf` holds fewer than 20 bytes.
pub fn deserialize_block_hash(buf: &[u8]) -> Result<BlockHash> {
    if buf.len() < BLOCK_HASH_SIZE {
        return Err(Error::ShortBuffer {
            needed: BLOCK_HASH_SIZE,
            got: buf.len(),
        });
    }
    Ok(BlockHash {
        index: le_u64(buf),
        weak: le_u32(&buf[8..]),
        strong: le_u64(&buf[12..]),
    })
}

/// Streams a target reader block by block, yielding one [`BlockHash`]
/// per non-overlapping block. A zero-length target yields nothing.
pub struct SignatureBuilder<R, H = Xxh3> {
    reader: R,
    block: Vec<u8>,
    index: u64,
    done: bool,
    marker: PhantomData<H>,
}

impl<R: Read, H: StrongHash> SignatureBuilder<R, H> {
    /// # Panics
    /// Panics if `block_size` is zero.
    pub fn new(reader: R, block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be positive");
        Self {
            reader,
            block: vec![0u8; block_size],
            index: 0,
            done: false,
            marker: PhantomData,
        }
    }
}

impl<R: Read, H: StrongHash> Iterator for SignatureBuilder<R, H> {
    type Item = io::Result<BlockHash>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match read_exact_or_eof(&mut self.reader, &mut self.block) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(n) => {
                if n < self.block.len() {
                    // Short read only happens at EOF; don't poke the
                    // reader again.
                    self.done = true;
                }
                let block = &self.block[..n];
                let block_hash = BlockHash {
                    index: self.index,
                    weak: RollingChecksum::compute(block),
                    strong: H::hash_block(block),
                };
                self.index += 1;
                Some(Ok(block_hash))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Signature of `target` with the given block size, hashed with the
/// default [`Xxh3`]. Pin a different [`StrongHash`] through
/// [`SignatureBuilder::new`] if both sides agree on one.
///
/// # Panics
/// Panics if `block_size` is zero.
pub fn make_signature<R: Read>(target: R, block_size: usize) -> SignatureBuilder<R> {
    SignatureBuilder::new(target, block_size)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dense_indices_and_short_tail() {
        let data = [7u8; 10];
        let sig: Vec<BlockHash> = make_signature(&data[..], 4).map(Result::unwrap).collect();
        assert_eq!(sig.len(), 3);
        assert_eq!(
            sig.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        // Blocks 0 and 1 share content, the 2-byte tail does not.
        assert_eq!(sig[0].weak, sig[1].weak);
        assert_eq!(sig[0].strong, sig[1].strong);
        assert_ne!(sig[0].strong, sig[2].strong);
        assert_eq!(sig[2].strong, Xxh3::hash_block(&[7u8; 2]));
    }

    #[test]
    fn empty_target_yields_nothing() {
        let sig: Vec<BlockHash> = make_signature(&b""[..], 4).map(Result::unwrap).collect();
        assert!(sig.is_empty());
    }

    #[test]
    fn block_hash_wire_roundtrip() {
        let block_hash = BlockHash {
            index: 0x0102_0304_0506_0708,
            weak: 0x1122_3344,
            strong: 0xdead_beef_cafe_f00d,
        };
        let wire = serialize_block_hash(&block_hash);
        assert_eq!(wire.len(), BLOCK_HASH_SIZE);
        assert_eq!(deserialize_block_hash(&wire).unwrap(), block_hash);
        assert!(matches!(
            deserialize_block_hash(&wire[..19]),
            Err(Error::ShortBuffer { needed: 20, got: 19 })
        ));
    }
}
