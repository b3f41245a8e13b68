// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use tokio::net::UnixStream;
use tracing::{debug, error};

use drover_core::TaskId;
use drover_engine::orphaned_claims;

use crate::lifecycle::DaemonState;
use crate::protocol::{
    self, ProjectStatus, Query, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION,
};

/// Handle a single client connection
pub async fn handle_connection(
    daemon: &mut DaemonState,
    stream: UnixStream,
) -> Result<(), ServerError> {
    // Split stream for reading/writing
    let (mut reader, mut writer) = stream.into_split();

    // Read request with timeout
    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);

    // Handle request
    let response = handle_request(daemon, request);

    debug!("Sending response: {:?}", response);

    // Write response with timeout
    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Handle a single request and return a response
fn handle_request(daemon: &mut DaemonState, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Status => {
            let uptime_secs = daemon.start_time.elapsed().as_secs();
            let (workers_active, projects) = {
                let tracker = daemon.tracker.lock().unwrap_or_else(|e| e.into_inner());
                let projects = daemon
                    .registry
                    .projects
                    .iter()
                    .map(|p| ProjectStatus {
                        name: p.name.clone(),
                        active: tracker.active_count(&p.name),
                        ceiling: p.max_workers,
                    })
                    .collect();
                (tracker.active_total(), projects)
            };

            Response::Status {
                uptime_secs,
                workers_active,
                global_ceiling: daemon.registry.max_workers,
                projects,
            }
        }

        Request::Query { query } => handle_query(daemon, query),

        Request::Shutdown => {
            daemon.shutdown_requested = true;
            Response::ShuttingDown
        }
    }
}

/// Handle query requests
fn handle_query(daemon: &DaemonState, query: Query) -> Response {
    match query {
        Query::ListWorkers => {
            let tracker = daemon.tracker.lock().unwrap_or_else(|e| e.into_inner());
            Response::Workers {
                workers: tracker.snapshot(),
            }
        }

        Query::ListRuns { project } => match daemon.runs.list() {
            Ok(mut runs) => {
                if let Some(project) = project {
                    runs.retain(|r| r.project == project);
                }
                Response::Runs { runs }
            }
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Query::GetRun { task_id } => match daemon.runs.load(&TaskId::from(task_id)) {
            Ok(run) => Response::Run {
                run: run.map(Box::new),
            },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Query::Orphans => match daemon.runs.list() {
            Ok(records) => {
                let tracker = daemon.tracker.lock().unwrap_or_else(|e| e.into_inner());
                Response::Orphans {
                    orphans: orphaned_claims(&records, &tracker),
                }
            }
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}
