use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read};

use log::{debug, trace};

use crate::error::Result;
use crate::op::{Operation, OperationStream};
use crate::rolling::RollingChecksum;
use crate::signature::BlockHash;
use crate::strong::StrongHash;

/// Ring buffer capacity in blocks. Any multiple of the block size of at
/// least two works; a larger buffer amortizes wrap-around copies.
const BUFFER_BLOCKS: usize = 8;

/// A queued operation, held as offsets into the ring buffer so the
/// buffer can keep filling underneath until the operation is pulled.
enum Ready {
    Block(u64),
    BlockRange { index: u64, end: u64 },
    Data { pos: usize, len: usize },
    Hash,
}

enum Fill {
    /// Requested bytes are in the buffer.
    Ready,
    /// Source exhausted before the request could be satisfied.
    Eof,
    /// A literal had to be flushed to make room; hand it to the caller
    /// and compact on the next pull.
    Yield,
}

/// The single-pass differ: slides a block-sized window over the source,
/// emits `Block`/`BlockRange` for target blocks found in it and `Data`
/// for everything in between, then seals the stream with `Hash`.
///
/// Pull operations through [`OperationStream::next_op`]. `Data` payloads
/// borrow the internal ring buffer and are only valid until the next
/// pull; copy them (or use `collect_owned`) to retain them.
pub struct Differ<R, H> {
    source: R,
    /// weak checksum -> [(strong hash, block index)], signature order.
    index: HashMap<u32, Vec<(u64, u64)>>,
    block_size: usize,
    buf: Vec<u8>,
    /// Bytes of `buf` holding source data.
    filled: usize,
    window_pos: usize,
    /// Current window length: 0 right after a match (or at start),
    /// `block_size` while sliding.
    window_sz: usize,
    /// Start of the pending literal run; `data_pos + data_sz` always
    /// equals `window_pos`.
    data_pos: usize,
    data_sz: usize,
    rolling: RollingChecksum,
    hasher: H,
    /// One-slot holding area for block-match coalescing.
    pending: Option<Ready>,
    ready: VecDeque<Ready>,
    digest: Vec<u8>,
    source_len: u64,
    compact_due: bool,
    done: bool,
}

/// Diff `source` against a target described by `signature`, lazily.
///
/// `block_size` must be the value the signature was generated with, and
/// `strong_hash` must construct the hash both sides agreed on.
///
/// # Panics
/// Panics if `block_size` is zero.
pub fn make_diff<R, H>(
    source: R,
    signature: impl IntoIterator<Item = BlockHash>,
    block_size: usize,
    strong_hash: impl FnOnce() -> H,
) -> Differ<R, H>
where
    R: Read,
    H: StrongHash,
{
    assert!(block_size > 0, "block size must be positive");
    let mut index: HashMap<u32, Vec<(u64, u64)>> = HashMap::new();
    for entry in signature {
        index
            .entry(entry.weak)
            .or_default()
            .push((entry.strong, entry.index));
    }
    Differ {
        source,
        index,
        block_size,
        buf: vec![0u8; block_size * BUFFER_BLOCKS],
        filled: 0,
        window_pos: 0,
        window_sz: 0,
        data_pos: 0,
        data_sz: 0,
        rolling: RollingChecksum::new(),
        hasher: strong_hash(),
        pending: None,
        ready: VecDeque::new(),
        digest: Vec::new(),
        source_len: 0,
        compact_due: false,
        done: false,
    }
}

impl<R: Read, H: StrongHash> OperationStream for Differ<R, H> {
    fn next_op(&mut self) -> Result<Option<Operation<'_>>> {
        while self.ready.is_empty() && !self.done {
            if self.compact_due {
                self.compact();
            }
            self.step()?;
        }
        let Some(ready) = self.ready.pop_front() else {
            return Ok(None);
        };
        Ok(Some(self.materialize(ready)))
    }
}

impl<R: Read, H: StrongHash> Differ<R, H> {
    /// One extend-and-probe step of the main loop.
    fn step(&mut self) -> Result<()> {
        if self.window_sz == 0 {
            // Start of file or just past a match: open a fresh window.
            match self.fill_to(self.window_pos + self.block_size)? {
                Fill::Ready => {
                    self.rolling
                        .seed(&self.buf[self.window_pos..self.window_pos + self.block_size]);
                    self.window_sz = self.block_size;
                }
                Fill::Eof => {
                    self.finish_up();
                    return Ok(());
                }
                Fill::Yield => return Ok(()),
            }
        } else {
            // Slide by one; the byte left behind becomes pending literal.
            match self.fill_to(self.window_pos + self.window_sz + 1)? {
                Fill::Ready => {
                    self.window_pos += 1;
                    self.data_sz += 1;
                    let new_first = self.buf[self.window_pos];
                    let new_last = self.buf[self.window_pos + self.window_sz - 1];
                    self.rolling.roll(new_first, new_last);
                }
                Fill::Eof => {
                    self.finish_up();
                    return Ok(());
                }
                Fill::Yield => return Ok(()),
            }
        }
        self.probe();
        Ok(())
    }

    /// Compare the current window against the signature; on a match,
    /// flush the pending literal and consume the window.
    fn probe(&mut self) {
        let weak = self.rolling.value();
        let Some(entries) = self.index.get(&weak) else {
            return;
        };
        let window = &self.buf[self.window_pos..self.window_pos + self.window_sz];
        let strong = H::hash_block(window);
        let Some(&(_, index)) = entries.iter().find(|(s, _)| *s == strong) else {
            return;
        };
        trace!("window matches target block {index} (weak {weak:#010x})");
        self.flush_data();
        self.push_block(index);
        self.window_pos += self.window_sz;
        self.window_sz = 0;
        self.data_pos = self.window_pos;
        self.data_sz = 0;
    }

    /// Make bytes `[0, upto)` of the buffer valid, reading from the
    /// source as needed and wrapping the buffer when `upto` runs past
    /// its capacity.
    fn fill_to(&mut self, mut upto: usize) -> io::Result<Fill> {
        if upto > self.buf.len() {
            if self.data_sz > 0 {
                // The pending literal still borrows the region about to
                // move; emit it first and compact on the next pull.
                self.flush_data();
                self.compact_due = true;
                return Ok(Fill::Yield);
            }
            upto -= self.compact();
        }
        while self.filled < upto {
            match self.source.read(&mut self.buf[self.filled..]) {
                Ok(0) => return Ok(Fill::Eof),
                Ok(n) => {
                    self.hasher.update(&self.buf[self.filled..self.filled + n]);
                    self.source_len += n as u64;
                    self.filled += n;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Fill::Ready)
    }

    /// Slide the live region `[window_pos, filled)` back to offset 0.
    /// Only called once no queued literal references the buffer.
    fn compact(&mut self) -> usize {
        let shift = self.window_pos;
        debug!("ring buffer wrap: discarding {shift} consumed bytes");
        self.buf.copy_within(self.window_pos..self.filled, 0);
        self.filled -= shift;
        self.window_pos = 0;
        self.data_pos = 0;
        self.compact_due = false;
        shift
    }

    /// Queue the pending literal run, if any, flushing the coalescing
    /// slot ahead of it.
    fn flush_data(&mut self) {
        if self.data_sz == 0 {
            return;
        }
        let data = Ready::Data {
            pos: self.data_pos,
            len: self.data_sz,
        };
        self.data_pos += self.data_sz;
        self.data_sz = 0;
        self.emit(data);
    }

    /// Feed a block match into the one-slot coalescer: consecutive
    /// indices grow a range, anything else flushes the slot.
    fn push_block(&mut self, index: u64) {
        self.pending = Some(match self.pending.take() {
            None => Ready::Block(index),
            Some(Ready::Block(prev)) if index == prev + 1 => Ready::BlockRange {
                index: prev,
                end: index,
            },
            Some(Ready::BlockRange { index: start, end }) if index == end + 1 => {
                Ready::BlockRange { index: start, end: index }
            }
            Some(other) => {
                self.ready.push_back(other);
                Ready::Block(index)
            }
        });
    }

    /// Queue a non-block operation, flushing the coalescing slot first.
    fn emit(&mut self, op: Ready) {
        if let Some(pending) = self.pending.take() {
            self.ready.push_back(pending);
        }
        self.ready.push_back(op);
    }

    /// Source exhausted: emit what remains and seal the stream.
    fn finish_up(&mut self) {
        let tail_len = self.filled - self.window_pos;
        if tail_len > 0 {
            // The tail can still equal one target block outright,
            // typically the short final one.
            if let Some(index) = self.probe_tail() {
                self.flush_data();
                self.push_block(index);
            } else {
                // Fold the tail into the pending literal run so the two
                // come out as a single Data.
                self.data_sz += tail_len;
                self.flush_data();
            }
        } else {
            self.flush_data();
        }
        self.digest = self.hasher.finish();
        debug!("diff complete after {} source bytes", self.source_len);
        self.emit(Ready::Hash);
        self.done = true;
    }

    /// Match the whole remaining tail against the signature.
    fn probe_tail(&self) -> Option<u64> {
        let tail = &self.buf[self.window_pos..self.filled];
        let entries = self.index.get(&RollingChecksum::compute(tail))?;
        let strong = H::hash_block(tail);
        entries
            .iter()
            .find(|(s, _)| *s == strong)
            .map(|&(_, index)| index)
    }

    fn materialize(&self, ready: Ready) -> Operation<'_> {
        match ready {
            Ready::Block(index) => Operation::Block(index),
            Ready::BlockRange { index, end } => Operation::BlockRange { index, end },
            Ready::Data { pos, len } => Operation::Data(Cow::Borrowed(&self.buf[pos..pos + len])),
            Ready::Hash => Operation::Hash(Cow::Borrowed(&self.digest)),
        }
    }
}
