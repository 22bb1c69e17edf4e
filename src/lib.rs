//! Streaming rsync-style delta engine: build a block signature of a
//! target, diff a source against it with a rolling checksum, and patch
//! the target back into the source with end-to-end verification.

mod diff;
mod error;
mod op;
mod patch;
pub mod rolling;
mod signature;
mod strong;

pub use diff::{Differ, make_diff};
pub use error::{Error, Result};
pub use op::{Operation, OperationStream, deserialize_operation, serialize_operation};
pub use patch::apply;
pub use signature::{
    BLOCK_HASH_SIZE, BlockHash, SignatureBuilder, deserialize_block_hash, make_signature,
    serialize_block_hash,
};
pub use strong::{StrongHash, Xxh3};

/// Block size used when the caller has no reason to pick another.
pub const DEFAULT_BLOCK_SIZE: usize = 6144;

/// Reads exactly `buf.len()` bytes or until EOF, returning the number of bytes read.
pub(crate) fn read_exact_or_eof<R: std::io::Read>(
    reader: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
