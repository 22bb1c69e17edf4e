use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while diffing, encoding or patching.
#[derive(Debug, Error)]
pub enum Error {
    /// A read, write or seek on a caller-provided stream failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The deserializer was handed fewer bytes than the frame declares.
    /// Refill the buffer to at least `needed` bytes and retry.
    #[error("buffer holds {got} bytes but the frame needs {needed}")]
    ShortBuffer { needed: usize, got: usize },

    /// The first byte of a frame is not a known operation tag.
    #[error("unknown operation tag {0:#04x}")]
    UnknownTag(u8),

    /// The reconstructed output does not hash to the value the delta
    /// carries: the target changed underneath us or the delta is corrupt.
    #[error("checksum mismatch: output hashed to {actual:02x?}, delta expects {expected:02x?}")]
    ChecksumMismatch { expected: Vec<u8>, actual: Vec<u8> },

    /// A payload or block count is too large for its wire length field.
    #[error("payload of {0} bytes does not fit the wire length field")]
    SizeOverflow(u64),

    /// A block range covering fewer than two blocks; single blocks are
    /// encoded as `Block`, so this only appears in malformed streams.
    #[error("block range must cover at least two blocks")]
    EmptyRange,
}
