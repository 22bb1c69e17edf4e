use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::op::{Operation, OperationStream};
use crate::read_exact_or_eof;
use crate::strong::StrongHash;

const WRITE_BUF_SIZE: usize = 64 * 1024;

/// Replay an operation stream against `target`, writing the
/// reconstructed source to `output` and verifying the trailing hash.
///
/// `block_size` must be the value the signature was generated with, and
/// `strong_hash` must construct the hash both sides agreed on.
///
/// # Errors
/// I/O errors from the target, output or operation stream surface
/// verbatim and abort patching (partial output may have been written);
/// [`Error::ChecksumMismatch`] when the reconstructed bytes do not hash
/// to the delta's trailing `Hash` payload.
///
/// # Panics
/// Panics if `block_size` is zero.
pub fn apply<S, T, W, H>(
    mut ops: S,
    mut target: T,
    output: W,
    block_size: usize,
    strong_hash: impl FnOnce() -> H,
) -> Result<()>
where
    S: OperationStream,
    T: Read + Seek,
    W: Write,
    H: StrongHash,
{
    assert!(block_size > 0, "block size must be positive");
    let mut writer = BufWriter::with_capacity(WRITE_BUF_SIZE, output);
    let mut hasher = strong_hash();
    let mut block = vec![0u8; block_size];

    while let Some(op) = ops.next_op()? {
        match op {
            Operation::Block(index) => {
                copy_block(&mut target, &mut writer, &mut hasher, &mut block, index)?;
            }
            Operation::BlockRange { index, end } => {
                for i in index..=end {
                    let n = copy_block(&mut target, &mut writer, &mut hasher, &mut block, i)?;
                    if n == 0 {
                        // The range ran past the end of the target;
                        // nothing left to copy.
                        warn!("block range {index}..={end} stopped at block {i}: target ended");
                        break;
                    }
                }
            }
            Operation::Data(bytes) => {
                writer.write_all(&bytes)?;
                hasher.update(&bytes);
            }
            Operation::Hash(expected) => {
                let actual = hasher.finish();
                if actual != expected.as_ref() {
                    return Err(Error::ChecksumMismatch {
                        expected: expected.into_owned(),
                        actual,
                    });
                }
                debug!("reconstructed output verified against trailing hash");
                break;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

/// Copy one target block to the output, returning how many bytes the
/// target held there. A short read is legitimate only for the final
/// block; anything shorter mid-stream shows up in the hash check.
fn copy_block<T, W, H>(
    target: &mut T,
    writer: &mut W,
    hasher: &mut H,
    block: &mut [u8],
    index: u64,
) -> Result<usize>
where
    T: Read + Seek,
    W: Write,
    H: StrongHash,
{
    let offset = index.checked_mul(block.len() as u64).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "block offset overflows u64")
    })?;
    target.seek(SeekFrom::Start(offset))?;
    let n = read_exact_or_eof(target, block)?;
    writer.write_all(&block[..n])?;
    hasher.update(&block[..n]);
    Ok(n)
}
