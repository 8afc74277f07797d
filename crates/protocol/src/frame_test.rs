use bytes::BytesMut;

use crate::frame::{encode_frame, FrameDecoder, FrameHeader, HEADER_SIZE};
use crate::registry::types;
use crate::CodecError;

fn frame_bytes(payload: &[u8]) -> BytesMut {
    let mut out = BytesMut::new();
    encode_frame(types::HOST, 7, 9, payload, &mut out);
    out
}

#[test]
fn test_header_parse_roundtrip() {
    let out = frame_bytes(b"abc");
    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&out[..HEADER_SIZE]);

    let parsed = FrameHeader::parse(&header).unwrap();
    assert_eq!(parsed.size, 3);
    assert_eq!(parsed.type_id, types::HOST);
    assert_eq!(parsed.source_id, 7);
    assert_eq!(parsed.destination_id, 9);
}

#[test]
fn test_header_checksum_detects_corruption() {
    let out = frame_bytes(b"abc");
    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&out[..HEADER_SIZE]);
    header[5] ^= 0xFF; // flip a type id byte

    assert!(matches!(
        FrameHeader::parse(&header),
        Err(CodecError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_decode_single_frame() {
    let out = frame_bytes(b"hello");
    let mut dec = FrameDecoder::new(1024);
    dec.push(&out);

    let frame = dec.next_frame().unwrap().unwrap();
    assert_eq!(frame.type_id, types::HOST);
    assert_eq!(frame.source_id, 7);
    assert_eq!(frame.destination_id, 9);
    assert_eq!(&frame.payload[..], b"hello");

    assert!(dec.next_frame().unwrap().is_none());
}

#[test]
fn test_decode_waits_for_full_payload() {
    let out = frame_bytes(b"hello world");
    let mut dec = FrameDecoder::new(1024);

    // Header plus half the payload: not enough.
    dec.push(&out[..HEADER_SIZE + 5]);
    assert!(dec.next_frame().unwrap().is_none());

    dec.push(&out[HEADER_SIZE + 5..]);
    let frame = dec.next_frame().unwrap().unwrap();
    assert_eq!(&frame.payload[..], b"hello world");
}

#[test]
fn test_resync_after_garbage() {
    let mut dec = FrameDecoder::new(1024);
    dec.push(&[0xDE, 0xAD, 0xBE, 0xEF, 0x01]);
    dec.push(&frame_bytes(b"ok"));

    let frame = dec.next_frame().unwrap().unwrap();
    assert_eq!(&frame.payload[..], b"ok");
    assert_eq!(dec.resync_count(), 5);
}

#[test]
fn test_two_frames_in_one_push() {
    let mut bytes = frame_bytes(b"first");
    bytes.extend_from_slice(&frame_bytes(b"second"));

    let mut dec = FrameDecoder::new(1024);
    dec.push(&bytes);

    assert_eq!(&dec.next_frame().unwrap().unwrap().payload[..], b"first");
    assert_eq!(&dec.next_frame().unwrap().unwrap().payload[..], b"second");
    assert!(dec.next_frame().unwrap().is_none());
}

#[test]
fn test_large_payload_is_chunked_and_reassembled() {
    // Three chunks: 0xFFFF + 0xFFFF + remainder.
    let payload: Vec<u8> = (0..150_000u32).map(|i| i as u8).collect();
    let mut out = BytesMut::new();
    encode_frame(types::SERVICE_STATUS, 1, 2, &payload, &mut out);

    let mut dec = FrameDecoder::new(1024 * 1024);
    dec.push(&out);

    let frame = dec.next_frame().unwrap().unwrap();
    assert_eq!(frame.type_id, types::SERVICE_STATUS);
    assert_eq!(frame.payload.len(), payload.len());
    assert_eq!(&frame.payload[..], &payload[..]);
}

#[test]
fn test_exact_chunk_multiple_gets_empty_terminator() {
    let payload = vec![0x42u8; 0xFFFF];
    let mut out = BytesMut::new();
    encode_frame(types::METRIC, 0, 0, &payload, &mut out);

    // One full chunk plus an empty terminator frame.
    assert_eq!(out.len(), 2 * HEADER_SIZE + 0xFFFF);

    let mut dec = FrameDecoder::new(1024 * 1024);
    dec.push(&out);
    let frame = dec.next_frame().unwrap().unwrap();
    assert_eq!(frame.payload.len(), 0xFFFF);
}

#[test]
fn test_oversized_frame_is_fatal() {
    let payload = vec![0u8; 4096];
    let mut out = BytesMut::new();
    encode_frame(types::HOST, 0, 0, &payload, &mut out);

    let mut dec = FrameDecoder::new(1024);
    dec.push(&out);
    let err = dec.next_frame().unwrap_err();
    assert!(matches!(err, CodecError::FrameTooLarge { .. }));
    assert!(!err.is_recoverable());
}
