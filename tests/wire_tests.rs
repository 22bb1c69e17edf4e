use rollsync::{
    BLOCK_HASH_SIZE, BlockHash, Error, Operation, OperationStream, deserialize_block_hash,
    deserialize_operation, serialize_block_hash, serialize_operation,
};
use std::borrow::Cow;

#[test]
fn block_frame_layout() {
    let wire = serialize_operation(&Operation::Block(0x0102_0304_0506_0708)).unwrap();
    assert_eq!(
        wire,
        [0x00, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
    );
    let (op, consumed) = deserialize_operation(&wire).unwrap();
    assert_eq!(op, Operation::Block(0x0102_0304_0506_0708));
    assert_eq!(consumed, 9);
}

#[test]
fn data_frame_layout() {
    let wire = serialize_operation(&Operation::Data(Cow::Borrowed(b"abc"))).unwrap();
    assert_eq!(wire, [0x01, 3, 0, 0, 0, b'a', b'b', b'c']);
    let (op, consumed) = deserialize_operation(&wire).unwrap();
    assert_eq!(op, Operation::Data(Cow::Borrowed(b"abc")));
    assert_eq!(consumed, 8);
}

#[test]
fn hash_frame_layout() {
    let wire = serialize_operation(&Operation::Hash(Cow::Borrowed(b"xy"))).unwrap();
    assert_eq!(wire, [0x02, 2, 0, b'x', b'y']);
    let (op, consumed) = deserialize_operation(&wire).unwrap();
    assert_eq!(op, Operation::Hash(Cow::Borrowed(b"xy")));
    assert_eq!(consumed, 5);
}

#[test]
fn block_range_frame_layout() {
    // count_minus_one on the wire: blocks 2..=5 encode a count of 3.
    let wire = serialize_operation(&Operation::BlockRange { index: 2, end: 5 }).unwrap();
    assert_eq!(wire, [0x03, 2, 0, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0]);
    let (op, consumed) = deserialize_operation(&wire).unwrap();
    assert_eq!(op, Operation::BlockRange { index: 2, end: 5 });
    assert_eq!(consumed, 13);
}

#[test]
fn unknown_tag_is_fatal() {
    assert!(matches!(
        deserialize_operation(&[0x04, 0, 0]),
        Err(Error::UnknownTag(0x04))
    ));
}

#[test]
fn truncated_frames_report_how_much_is_needed() {
    assert!(matches!(
        deserialize_operation(&[]),
        Err(Error::ShortBuffer { needed: 1, got: 0 })
    ));
    assert!(matches!(
        deserialize_operation(&[0x00, 1, 2]),
        Err(Error::ShortBuffer { needed: 9, got: 3 })
    ));
    // Data frame declaring 10 payload bytes but delivering 3.
    assert!(matches!(
        deserialize_operation(&[0x01, 10, 0, 0, 0, b'a', b'b', b'c']),
        Err(Error::ShortBuffer { needed: 15, got: 8 })
    ));
    assert!(matches!(
        deserialize_operation(&[0x02, 4, 0, b'a']),
        Err(Error::ShortBuffer { needed: 7, got: 4 })
    ));
    assert!(matches!(
        deserialize_operation(&[0x03, 0, 0, 0, 0, 0, 0, 0, 0]),
        Err(Error::ShortBuffer { needed: 13, got: 9 })
    ));
}

#[test]
fn zero_count_range_is_rejected() {
    let mut wire = vec![0x03];
    wire.extend_from_slice(&7u64.to_le_bytes());
    wire.extend_from_slice(&0u32.to_le_bytes());
    assert!(matches!(
        deserialize_operation(&wire),
        Err(Error::EmptyRange)
    ));
}

#[test]
fn degenerate_ranges_refuse_to_serialize() {
    assert!(matches!(
        serialize_operation(&Operation::BlockRange { index: 5, end: 5 }),
        Err(Error::EmptyRange)
    ));
    assert!(matches!(
        serialize_operation(&Operation::BlockRange { index: 6, end: 5 }),
        Err(Error::EmptyRange)
    ));
}

#[test]
fn oversized_payloads_refuse_to_serialize() {
    let big = vec![0u8; usize::from(u16::MAX) + 1];
    assert!(matches!(
        serialize_operation(&Operation::Hash(Cow::Borrowed(&big))),
        Err(Error::SizeOverflow(_))
    ));
    // A range spanning more than u32::MAX + 1 blocks has no encoding.
    assert!(matches!(
        serialize_operation(&Operation::BlockRange {
            index: 0,
            end: u64::from(u32::MAX) + 1,
        }),
        Err(Error::SizeOverflow(_))
    ));
}

#[test]
fn slice_stream_decodes_in_place() {
    let ops = vec![
        Operation::Block(1),
        Operation::Data(Cow::Borrowed(b"literal")),
        Operation::BlockRange { index: 3, end: 9 },
        Operation::Hash(Cow::Borrowed(&[0xAB; 16])),
    ];
    let mut wire = Vec::new();
    for op in &ops {
        wire.extend_from_slice(&serialize_operation(op).unwrap());
    }

    let mut stream = wire.as_slice();
    let decoded = stream.collect_owned().unwrap();
    assert_eq!(decoded, ops);
    assert!(stream.is_empty());
}

#[test]
fn slice_stream_stops_on_garbage_without_losing_position() {
    let mut wire = serialize_operation(&Operation::Block(4)).unwrap();
    wire.push(0x7F);

    let mut stream = wire.as_slice();
    assert_eq!(stream.next_op().unwrap(), Some(Operation::Block(4)));
    assert!(matches!(stream.next_op(), Err(Error::UnknownTag(0x7F))));
    // The bad frame is still at the front for the caller to inspect.
    assert_eq!(stream, [0x7F]);
}

#[test]
fn block_hash_frame_layout() {
    let entry = BlockHash {
        index: 1,
        weak: 0x0a0b_0c0d,
        strong: 0x1122_3344_5566_7788,
    };
    let wire = serialize_block_hash(&entry);
    assert_eq!(wire.len(), BLOCK_HASH_SIZE);
    assert_eq!(wire[..8], 1u64.to_le_bytes());
    assert_eq!(wire[8..12], 0x0a0b_0c0du32.to_le_bytes());
    assert_eq!(wire[12..], 0x1122_3344_5566_7788u64.to_le_bytes());
    assert_eq!(deserialize_block_hash(&wire).unwrap(), entry);
}
