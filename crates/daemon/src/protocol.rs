// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for the control socket.
//!
//! Messages are JSON framed by a 4-byte big-endian length prefix. One
//! request, one response, then the client hangs up.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use drover_core::RunRecord;
use drover_engine::{OrphanedClaim, WorkerStatus};

/// Protocol version for compatibility checks
pub const PROTOCOL_VERSION: &str = "1";

/// Default timeout for reading or writing one message
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on one framed message
pub const MAX_MESSAGE_SIZE: u32 = 4 * 1024 * 1024;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("message too large: {0} bytes")]
    TooLarge(u32),

    #[error("timeout")]
    Timeout,
}

/// Client-to-daemon messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Liveness check
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Daemon-wide status summary
    Status,

    /// Read-only state queries
    Query { query: Query },

    /// Ask the daemon to stop after the current cycle
    Shutdown,
}

/// Read-only queries against daemon state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    /// Workers the tracker currently holds
    ListWorkers,

    /// Run records, optionally filtered to one project
    ListRuns { project: Option<String> },

    /// One run record by task id
    GetRun { task_id: String },

    /// Non-terminal records with no live worker
    Orphans,
}

/// Per-project slice of a Status response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub name: String,
    pub active: usize,
    pub ceiling: usize,
}

/// Daemon-to-client messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,

    Hello {
        version: String,
    },

    Status {
        uptime_secs: u64,
        workers_active: usize,
        global_ceiling: usize,
        projects: Vec<ProjectStatus>,
    },

    Workers {
        workers: Vec<WorkerStatus>,
    },

    Runs {
        runs: Vec<RunRecord>,
    },

    Run {
        run: Option<Box<RunRecord>>,
    },

    Orphans {
        orphans: Vec<OrphanedClaim>,
    },

    ShuttingDown,

    Error {
        message: String,
    },
}

/// Serialize a message to raw JSON (no length prefix)
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

/// Deserialize a message from raw JSON
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(data)?)
}

/// Write one length-prefixed message
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let len = data.len() as u32;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge(len));
    }
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed message
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::ConnectionClosed
        } else {
            ProtocolError::Io(e)
        }
    })?;

    let len = u32::from_be_bytes(len_bytes);
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge(len));
    }

    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::ConnectionClosed
        } else {
            ProtocolError::Io(e)
        }
    })?;

    Ok(data)
}

/// Read a request with a deadline (server side)
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    let data = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&data)
}

/// Write a response with a deadline (server side)
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

/// Write a request with a deadline (client side)
pub async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    request: &Request,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let data = encode(request)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

/// Read a response with a deadline (client side)
pub async fn read_response<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Response, ProtocolError> {
    let data = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&data)
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
