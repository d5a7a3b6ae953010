//! Property-based tests for frame encoding, parsing and the handshake head.
//!
//! These tests use proptest to fuzz the codec and find edge cases.

use bytes::BytesMut;
use proptest::prelude::*;
use wshub::codec::FrameReader;
use wshub::protocol::{Frame, OpCode, accept_value, apply_mask};
use wshub::{Error, HttpRequest, Limits};

const MAX: usize = 1 << 20;

fn data_opcode_strategy() -> impl Strategy<Value = OpCode> {
    prop_oneof![
        Just(OpCode::Text),
        Just(OpCode::Binary),
        Just(OpCode::Continuation),
    ]
}

fn control_opcode_strategy() -> impl Strategy<Value = OpCode> {
    prop_oneof![Just(OpCode::Close), Just(OpCode::Ping), Just(OpCode::Pong),]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn test_roundtrip_unmasked(
        fin in any::<bool>(),
        opcode in data_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..1000)
    ) {
        let frame = Frame::new(fin, opcode, payload);
        let wire = frame.encode();
        prop_assert_eq!(wire.len(), frame.wire_size());

        let (parsed, consumed) = Frame::parse(&wire, MAX).unwrap();
        prop_assert_eq!(consumed, wire.len());
        prop_assert_eq!(parsed, frame);
    }

    #[test]
    fn test_roundtrip_masked(
        fin in any::<bool>(),
        opcode in data_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..500),
        mask in any::<[u8; 4]>()
    ) {
        let frame = Frame::new(fin, opcode, payload.clone()).with_mask(Some(mask));
        let wire = frame.encode();

        // The masked section on the wire is the payload XORed with the key.
        let header = frame.header_size();
        for (i, byte) in wire[header..].iter().enumerate() {
            prop_assert_eq!(*byte, payload[i] ^ mask[i % 4]);
        }

        let (parsed, _) = Frame::parse(&wire, MAX).unwrap();
        prop_assert_eq!(parsed.payload(), payload.as_slice());
        prop_assert_eq!(parsed.mask, Some(mask));
        prop_assert_eq!(parsed.fin, fin);
    }

    #[test]
    fn test_mask_reversible(
        data in prop::collection::vec(any::<u8>(), 0..2000),
        mask in any::<[u8; 4]>()
    ) {
        let mut masked = data.clone();
        apply_mask(&mut masked, mask);
        apply_mask(&mut masked, mask);
        prop_assert_eq!(data, masked);
    }

    #[test]
    fn test_payload_length_encoding(len in 0usize..70_000) {
        let frame = Frame::binary(vec![0x5A; len]);
        let wire = frame.encode();
        let expected_ext = match len {
            0..=125 => 0,
            126..=65535 => 2,
            _ => 8,
        };
        prop_assert_eq!(wire.len(), 2 + expected_ext + len);

        let (parsed, consumed) = Frame::parse(&wire, MAX).unwrap();
        prop_assert_eq!(consumed, wire.len());
        prop_assert_eq!(parsed.payload().len(), len);
    }

    #[test]
    fn test_control_frame_limits(
        opcode in control_opcode_strategy(),
        len in 0usize..256
    ) {
        let result = Frame::new(true, opcode, vec![0u8; len]).validate();
        if len <= 125 {
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(result, Err(Error::ControlFrameTooLarge(len)));
        }
    }

    #[test]
    fn test_oversized_rejected(
        max in 0usize..4096,
        extra in 1usize..512
    ) {
        let frame = Frame::binary(vec![0u8; max + extra]);
        let wire = frame.encode();
        // Only the header is needed to reject the frame.
        let header = &wire[..frame.header_size()];
        let err = Frame::parse(header, max).unwrap_err();
        prop_assert_eq!(err, Error::FrameTooLarge { size: (max + extra) as u64, max });
    }

    #[test]
    fn test_incomplete_frame_detection(
        payload in prop::collection::vec(any::<u8>(), 1..500),
        truncate_by in 1usize..50
    ) {
        let wire = Frame::binary(payload).encode();
        let truncated = wire.len().saturating_sub(truncate_by);
        let result = Frame::parse(&wire[..truncated], MAX);
        prop_assert!(
            matches!(result, Err(Error::IncompleteFrame { .. })),
            "expected IncompleteFrame, got {:?}",
            result
        );
    }

    #[test]
    fn test_stream_decode_matches_buffer_parse(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..300), 1..6),
        masked in any::<bool>()
    ) {
        let frames: Vec<Frame> = payloads
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                let mask = masked.then_some([i as u8, 0x11, 0x22, 0x33]);
                Frame::binary(p).with_mask(mask)
            })
            .collect();

        let mut wire = BytesMut::new();
        for frame in &frames {
            frame.encode_into(&mut wire);
        }

        let decoded = runtime().block_on(async {
            let mut reader = FrameReader::new(&wire[..], Limits::default());
            let mut out = Vec::new();
            for _ in 0..frames.len() {
                out.push(reader.read_frame().await.unwrap());
            }
            let tail = reader.read_frame().await;
            (out, tail)
        });

        prop_assert_eq!(decoded.0, frames);
        prop_assert_eq!(decoded.1, Err(Error::ConnectionClosed));
    }

    #[test]
    fn test_parse_garbage_no_panic(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = Frame::parse(&data, 256);
    }

    #[test]
    fn test_accept_value_format(key in "[A-Za-z0-9+/]{22}==") {
        let accept = accept_value(&key);
        // base64 of a 20-byte SHA-1 digest
        prop_assert_eq!(accept.len(), 28);
        prop_assert!(accept.ends_with('='));
        prop_assert_eq!(accept_value(&key), accept);
    }

    #[test]
    fn test_request_head_no_panic(data in prop::collection::vec(any::<u8>(), 0..2000)) {
        let limits = Limits::default();
        let _ = runtime().block_on(async {
            let mut reader = &data[..];
            HttpRequest::read_from(&mut reader, &limits).await
        });
    }

    #[test]
    fn test_request_head_variations(
        path in "/[a-z]{1,20}",
        host in "[a-z]{3,10}\\.[a-z]{2,4}"
    ) {
        let head = format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
             Sec-WebSocket-Version: 13\r\n\r\n"
        );
        let limits = Limits::default();
        let request = runtime()
            .block_on(async {
                let mut reader = head.as_bytes();
                HttpRequest::read_from(&mut reader, &limits).await
            })
            .unwrap();
        prop_assert_eq!(request.path(), path.as_str());
        prop_assert_eq!(request.header("host"), Some(host.as_str()));
        prop_assert!(request.is_websocket_upgrade());
    }
}

mod targeted_tests {
    use super::*;

    #[test]
    fn test_length_boundaries() {
        for len in [0, 1, 125, 126, 127, 65535, 65536] {
            let frame = Frame::binary(vec![0xAB; len]);
            let (parsed, consumed) = Frame::parse(&frame.encode(), MAX).unwrap();
            assert_eq!(consumed, frame.wire_size());
            assert_eq!(parsed.payload().len(), len);
        }
    }

    #[test]
    fn test_zero_and_ff_masks() {
        for mask in [[0, 0, 0, 0], [0xFF; 4]] {
            let frame = Frame::text("test payload").with_mask(Some(mask));
            let (parsed, _) = Frame::parse(&frame.encode(), MAX).unwrap();
            assert_eq!(parsed.payload(), b"test payload");
        }
    }
}
