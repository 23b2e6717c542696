// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use em_rpc::StatusCode;

fn channel_frame() -> Frame {
    Frame::Channel {
        topic: "/pose".to_owned(),
        type_name: "em.test.Pose".to_owned(),
        payload: raw_payload(br#"{"x":1.0}"#).unwrap(),
    }
}

#[test]
fn encode_returns_json_without_length_prefix() {
    let encoded = encode(&channel_frame()).unwrap();
    let text = std::str::from_utf8(&encoded).unwrap();
    assert!(text.starts_with('{'), "should be JSON object: {text}");
    assert!(text.contains(r#""kind":"channel""#));
}

#[test]
fn payload_rides_along_verbatim() {
    let encoded = encode(&channel_frame()).unwrap();
    let decoded = decode(&encoded).unwrap();
    match decoded {
        Frame::Channel { payload, .. } => assert_eq!(payload.get(), r#"{"x":1.0}"#),
        other => panic!("wrong frame kind: {other:?}"),
    }
}

#[test]
fn non_utf8_payload_is_rejected() {
    assert!(matches!(
        raw_payload(&[0xFF, 0xFE]),
        Err(ProtocolError::Payload(_))
    ));
}

#[tokio::test]
async fn read_write_frame_roundtrip() {
    let mut buffer = Vec::new();
    write_frame(&mut buffer, &channel_frame()).await.unwrap();

    // 4-byte length prefix
    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, buffer.len() - 4);

    let mut cursor = std::io::Cursor::new(buffer);
    let frame = read_frame(&mut cursor).await.unwrap().unwrap();
    match frame {
        Frame::Channel { topic, .. } => assert_eq!(topic, "/pose"),
        other => panic!("wrong frame kind: {other:?}"),
    }

    // clean EOF at the boundary
    assert!(read_frame(&mut cursor).await.unwrap().is_none());
}

#[tokio::test]
async fn request_response_roundtrip_keeps_status() {
    let request = Frame::Request {
        id: 7,
        method: "pb:/add".to_owned(),
        timeout_ms: Some(100),
        payload: raw_payload(br#"{"v":41}"#).unwrap(),
    };
    let response = Frame::Response {
        id: 7,
        status: em_rpc::Status::new(StatusCode::Timeout),
        payload: raw_payload(b"null").unwrap(),
    };

    let mut buffer = Vec::new();
    write_frame(&mut buffer, &request).await.unwrap();
    write_frame(&mut buffer, &response).await.unwrap();

    let mut cursor = std::io::Cursor::new(buffer);
    match read_frame(&mut cursor).await.unwrap().unwrap() {
        Frame::Request {
            id,
            method,
            timeout_ms,
            ..
        } => {
            assert_eq!((id, timeout_ms), (7, Some(100)));
            assert_eq!(method, "pb:/add");
        }
        other => panic!("wrong frame kind: {other:?}"),
    }
    match read_frame(&mut cursor).await.unwrap().unwrap() {
        Frame::Response { id, status, .. } => {
            assert_eq!(id, 7);
            assert_eq!(status.code(), StatusCode::Timeout);
        }
        other => panic!("wrong frame kind: {other:?}"),
    }
}

#[tokio::test]
async fn oversized_length_prefix_is_rejected() {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&u32::MAX.to_be_bytes());
    buffer.extend_from_slice(b"xx");

    let mut cursor = std::io::Cursor::new(buffer);
    assert!(matches!(
        read_frame(&mut cursor).await,
        Err(ProtocolError::TooLarge(_))
    ));
}
