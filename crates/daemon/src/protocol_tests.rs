// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol unit tests

use super::*;
use chrono::Utc;
use drover_core::{RunRecord, TaskId};

#[test]
fn encode_decode_roundtrip_request() {
    let request = Request::Hello {
        version: PROTOCOL_VERSION.to_string(),
    };

    let encoded = encode(&request).expect("encode failed");
    let decoded: Request = decode(&encoded).expect("decode failed");

    assert_eq!(request, decoded);
}

#[test]
fn encode_decode_roundtrip_response() {
    let response = Response::Status {
        uptime_secs: 3600,
        workers_active: 2,
        global_ceiling: 4,
        projects: vec![ProjectStatus {
            name: "api".to_string(),
            active: 2,
            ceiling: 3,
        }],
    };

    let encoded = encode(&response).expect("encode failed");
    let decoded: Response = decode(&encoded).expect("decode failed");

    assert_eq!(response, decoded);
}

#[test]
fn encode_decode_query() {
    let request = Request::Query {
        query: Query::GetRun {
            task_id: "t-123".to_string(),
        },
    };

    let encoded = encode(&request).expect("encode failed");
    let decoded: Request = decode(&encoded).expect("decode failed");

    assert_eq!(request, decoded);
}

#[test]
fn encode_returns_json_without_length_prefix() {
    let response = Response::Pong;
    let encoded = encode(&response).expect("encode failed");

    // encode() returns raw JSON, no length prefix
    let json_str = std::str::from_utf8(&encoded).expect("should be valid UTF-8");
    assert!(
        json_str.starts_with('{'),
        "should be JSON object: {}",
        json_str
    );
}

#[test]
fn run_record_serialization() {
    let mut record = RunRecord::claimed(TaskId::from("t1"), "api", Utc::now());
    record.branch_name = Some("drover/t1-fix-run-1".to_string());

    let response = Response::Run {
        run: Some(Box::new(record.clone())),
    };

    let encoded = encode(&response).expect("encode failed");
    let decoded: Response = decode(&encoded).expect("decode failed");

    match decoded {
        Response::Run { run } => {
            assert_eq!(run.as_deref(), Some(&record));
        }
        _ => panic!("Expected Run response"),
    }
}

#[tokio::test]
async fn read_write_message_roundtrip() {
    let original = b"hello world";

    let mut buffer = Vec::new();
    write_message(&mut buffer, original)
        .await
        .expect("write failed");

    // write_message adds 4-byte length prefix
    assert_eq!(buffer.len(), 4 + original.len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.expect("read failed");

    assert_eq!(read_back, original);
}

#[tokio::test]
async fn write_message_adds_length_prefix() {
    let data = b"test data";

    let mut buffer = Vec::new();
    write_message(&mut buffer, data)
        .await
        .expect("write failed");

    // First 4 bytes are the length prefix
    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;

    // Length should match the data size
    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);
}

#[tokio::test]
async fn oversized_message_is_rejected_before_reading_the_body() {
    let len = MAX_MESSAGE_SIZE + 1;
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&len.to_be_bytes());

    let mut cursor = std::io::Cursor::new(buffer);
    let result = read_message(&mut cursor).await;

    match result {
        Err(ProtocolError::TooLarge(size)) => assert_eq!(size, len),
        other => panic!("Expected TooLarge, got {:?}", other),
    }
}

#[tokio::test]
async fn truncated_stream_reads_as_connection_closed() {
    // Prefix promises 100 bytes, stream ends after 3
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&100u32.to_be_bytes());
    buffer.extend_from_slice(b"abc");

    let mut cursor = std::io::Cursor::new(buffer);
    let result = read_message(&mut cursor).await;

    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
}

#[tokio::test]
async fn read_request_times_out_on_a_silent_peer() {
    let (client, mut server) = tokio::io::duplex(64);

    let result = read_request(&mut server, Duration::from_millis(20)).await;

    assert!(matches!(result, Err(ProtocolError::Timeout)));
    drop(client);
}

#[tokio::test]
async fn request_crosses_a_stream_intact() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    let request = Request::Query {
        query: Query::ListRuns {
            project: Some("api".to_string()),
        },
    };
    write_request(&mut client, &request, DEFAULT_TIMEOUT)
        .await
        .expect("write failed");

    let read_back = read_request(&mut server, DEFAULT_TIMEOUT)
        .await
        .expect("read failed");

    assert_eq!(read_back, request);
}
