use std::borrow::Cow;

use crate::error::{Error, Result};

const TAG_BLOCK: u8 = 0x00;
const TAG_DATA: u8 = 0x01;
const TAG_HASH: u8 = 0x02;
const TAG_BLOCK_RANGE: u8 = 0x03;

/// One instruction in a delta stream.
///
/// Payloads may borrow the differ's ring buffer (or a wire buffer being
/// decoded); call [`into_owned`](Self::into_owned) to keep one past the
/// next pull.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operation<'a> {
    /// Copy block `index` from the target.
    Block(u64),
    /// Copy blocks `index..=end` from the target.
    BlockRange { index: u64, end: u64 },
    /// Append these literal bytes.
    Data(Cow<'a, [u8]>),
    /// The preceding output must hash to this value; always last.
    Hash(Cow<'a, [u8]>),
}

impl Operation<'_> {
    /// Detach the operation from whatever buffer it borrows.
    #[must_use]
    pub fn into_owned(self) -> Operation<'static> {
        match self {
            Operation::Block(index) => Operation::Block(index),
            Operation::BlockRange { index, end } => Operation::BlockRange { index, end },
            Operation::Data(bytes) => Operation::Data(Cow::Owned(bytes.into_owned())),
            Operation::Hash(bytes) => Operation::Hash(Cow::Owned(bytes.into_owned())),
        }
    }
}

/// A pull-driven sequence of operations.
///
/// Each pulled operation is only guaranteed valid until the next call;
/// `Data` payloads in particular alias internal buffers that the next
/// pull may recycle.
pub trait OperationStream {
    /// The next operation, or `None` once the stream is exhausted.
    ///
    /// # Errors
    /// I/O errors from an underlying reader, or decode errors when the
    /// stream is parsed off the wire.
    fn next_op(&mut self) -> Result<Option<Operation<'_>>>;

    /// Drain the stream into owned operations.
    ///
    /// # Errors
    /// Whatever `next_op` surfaces.
    fn collect_owned(&mut self) -> Result<Vec<Operation<'static>>> {
        let mut ops = Vec::new();
        while let Some(op) = self.next_op()? {
            ops.push(op.into_owned());
        }
        Ok(ops)
    }
}

impl<S: OperationStream + ?Sized> OperationStream for &mut S {
    fn next_op(&mut self) -> Result<Option<Operation<'_>>> {
        (**self).next_op()
    }
}

/// A serialized delta decodes in place: payloads borrow the slice and
/// the slice advances past each consumed frame.
impl OperationStream for &[u8] {
    fn next_op(&mut self) -> Result<Option<Operation<'_>>> {
        let buf = std::mem::take(self);
        if buf.is_empty() {
            return Ok(None);
        }
        match deserialize_operation(buf) {
            Ok((op, consumed)) => {
                *self = &buf[consumed..];
                Ok(Some(op))
            }
            Err(e) => {
                *self = buf;
                Err(e)
            }
        }
    }
}

impl<'a> OperationStream for std::vec::IntoIter<Operation<'a>> {
    fn next_op(&mut self) -> Result<Option<Operation<'_>>> {
        Ok(self.next())
    }
}

/// Encode one operation into its little-endian wire frame.
///
/// # Errors
/// [`Error::SizeOverflow`] when a `Data` payload exceeds `u32::MAX`
/// bytes, a `Hash` payload exceeds `u16::MAX` bytes or a range spans
/// more than `u32::MAX + 1` blocks; [`Error::EmptyRange`] for a
/// `BlockRange` that does not cover at least two blocks.
pub fn serialize_operation(op: &Operation<'_>) -> Result<Vec<u8>> {
    match op {
        Operation::Block(index) => {
            let mut out = Vec::with_capacity(9);
            out.push(TAG_BLOCK);
            out.extend_from_slice(&index.to_le_bytes());
            Ok(out)
        }
        Operation::BlockRange { index, end } => {
            if *end <= *index {
                return Err(Error::EmptyRange);
            }
            let count = end - index;
            let count = u32::try_from(count).map_err(|_| Error::SizeOverflow(count))?;
            let mut out = Vec::with_capacity(13);
            out.push(TAG_BLOCK_RANGE);
            out.extend_from_slice(&index.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            Ok(out)
        }
        Operation::Data(bytes) => {
            let len =
                u32::try_from(bytes.len()).map_err(|_| Error::SizeOverflow(bytes.len() as u64))?;
            let mut out = Vec::with_capacity(5 + bytes.len());
            out.push(TAG_DATA);
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(bytes);
            Ok(out)
        }
        Operation::Hash(bytes) => {
            let len =
                u16::try_from(bytes.len()).map_err(|_| Error::SizeOverflow(bytes.len() as u64))?;
            let mut out = Vec::with_capacity(3 + bytes.len());
            out.push(TAG_HASH);
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(bytes);
            Ok(out)
        }
    }
}

/// Decode one operation from the front of `buf`, returning it together
/// with the number of bytes consumed. Payloads borrow `buf`.
///
/// # Errors
/// [`Error::ShortBuffer`] when `buf` is shorter than the frame declares
/// (refill and retry), [`Error::UnknownTag`] for an unrecognized tag and
/// [`Error::EmptyRange`] for a zero-count block range.
pub fn deserialize_operation(buf: &[u8]) -> Result<(Operation<'_>, usize)> {
    let Some(&tag) = buf.first() else {
        return Err(Error::ShortBuffer { needed: 1, got: 0 });
    };
    match tag {
        TAG_BLOCK => {
            ensure_len(buf, 9)?;
            Ok((Operation::Block(le_u64(&buf[1..])), 9))
        }
        TAG_DATA => {
            ensure_len(buf, 5)?;
            let declared = le_u32(&buf[1..]);
            let len = usize::try_from(declared)
                .map_err(|_| Error::SizeOverflow(u64::from(declared)))?;
            ensure_len(buf, 5 + len)?;
            Ok((Operation::Data(Cow::Borrowed(&buf[5..5 + len])), 5 + len))
        }
        TAG_HASH => {
            ensure_len(buf, 3)?;
            let len = usize::from(le_u16(&buf[1..]));
            ensure_len(buf, 3 + len)?;
            Ok((Operation::Hash(Cow::Borrowed(&buf[3..3 + len])), 3 + len))
        }
        TAG_BLOCK_RANGE => {
            ensure_len(buf, 13)?;
            let index = le_u64(&buf[1..]);
            let count = le_u32(&buf[9..]);
            if count == 0 {
                return Err(Error::EmptyRange);
            }
            let end = index
                .checked_add(u64::from(count))
                .ok_or(Error::SizeOverflow(u64::from(count)))?;
            Ok((Operation::BlockRange { index, end }, 13))
        }
        tag => Err(Error::UnknownTag(tag)),
    }
}

fn ensure_len(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(Error::ShortBuffer {
            needed,
            got: buf.len(),
        });
    }
    Ok(())
}

pub(crate) fn le_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}

pub(crate) fn le_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(raw)
}

pub(crate) fn le_u16(bytes: &[u8]) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(&bytes[..2]);
    u16::from_le_bytes(raw)
}
