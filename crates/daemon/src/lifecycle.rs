// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fs2::FileExt;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use drover_adapters::{
    AnyBackend, BackendError, ClaudeAgent, GitAdapter, TracedRepoAdapter, TracedTaskBackend,
};
use drover_core::{ConfigError, Project, RegistryConfig, SystemClock, UuidIdGen};
use drover_engine::{
    orphaned_claims, CycleStats, Poller, PollerDeps, ProcessTracker, WorkerSettings,
};
use drover_storage::{RunStore, StorageError};

/// Task backend as the daemon runs it (wrapped with tracing)
pub type DaemonBackend = TracedTaskBackend<AnyBackend>;

/// Poller with concrete adapter types (wrapped with tracing)
pub type DaemonPoller = Poller<TracedRepoAdapter<GitAdapter>, ClaudeAgent, SystemClock, UuidIdGen>;

/// Wait before retrying a failed review creation
const FINALIZE_BACKOFF: Duration = Duration::from_secs(30);

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the registry file
    pub registry_path: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to run record directory
    pub runs_path: PathBuf,
    /// Path to workspaces directory
    pub workspaces_path: PathBuf,
}

impl Config {
    /// Create config for a registry file
    pub fn for_registry(registry_path: &Path) -> Result<Self, LifecycleError> {
        let canonical = registry_path
            .canonicalize()
            .map_err(|e| LifecycleError::RegistryNotFound(registry_path.to_path_buf(), e))?;

        let hash = registry_hash(&canonical);
        let state_dir = state_dir()?.join("registries").join(&hash);
        let socket_dir = socket_dir()?;

        Ok(Self {
            registry_path: canonical,
            socket_path: socket_dir.join(format!("{}.sock", hash)),
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            runs_path: state_dir.join("runs"),
            workspaces_path: state_dir.join("workspaces"),
        })
    }
}

/// Daemon state during operation
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    /// Current registry snapshot; replaced between cycles only
    pub registry: RegistryConfig,
    /// One backend per registered project, in registration order
    pub backends: Vec<(Project, DaemonBackend)>,
    /// Scheduling loop body
    pub poller: DaemonPoller,
    /// Worker handles (shared with the poller)
    pub tracker: Arc<Mutex<ProcessTracker>>,
    /// Run record store
    pub runs: RunStore,
    /// When daemon started
    pub start_time: Instant,
    /// Shutdown requested flag
    pub shutdown_requested: bool,
}

impl DaemonState {
    /// One scheduling pass over the current registry snapshot
    pub async fn run_cycle(&mut self) -> CycleStats {
        self.poller
            .run_cycle(self.registry.max_workers, &self.backends)
            .await
    }

    /// Re-read the registry file between cycles.
    ///
    /// A registry that fails to load or whose backends fail to build leaves
    /// the previous snapshot in place; the daemon keeps scheduling what it
    /// already knows.
    pub fn reload_registry(&mut self) {
        let fresh = match RegistryConfig::load(&self.config.registry_path) {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(error = %e, "registry reload failed, keeping previous");
                return;
            }
        };
        if fresh == self.registry {
            return;
        }
        match build_backends(&fresh) {
            Ok(backends) => {
                info!(projects = fresh.projects.len(), "registry reloaded");
                self.registry = fresh;
                self.backends = backends;
            }
            Err(e) => {
                warn!(error = %e, "registry reload failed, keeping previous");
            }
        }
    }

    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Abort live workers; their tasks stay claimed in their backends
        let aborted = {
            let mut tracker = self.tracker.lock().unwrap_or_else(|e| e.into_inner());
            tracker.abort_all()
        };
        if aborted > 0 {
            warn!(
                aborted,
                "aborted live workers; their tasks stay claimed in their backends"
            );
        }

        // 2. Remove socket file
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        // 3. Remove PID file
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // 4. Remove version file
        if self.config.version_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.version_path) {
                warn!("Failed to remove version file: {}", e);
            }
        }

        // 5. Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Registry not found at {0}: {1}")]
    RegistryNotFound(PathBuf, std::io::Error),

    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] ConfigError),

    #[error("Backend error for project {0}: {1}")]
    Backend(String, BackendError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create state and socket directories (needed for socket, lock, etc.)
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Some(parent) = config.lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire lock file FIRST - prevents races
    let lock_file = File::create(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file
    use std::io::Write;
    let mut lock_file = lock_file;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file; // Reborrow as immutable

    // 3. Create workspace directory and write version file
    std::fs::create_dir_all(&config.workspaces_path)?;
    std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

    // 4. Load registry and build backends BEFORE binding socket (fail fast,
    //    don't accept connections if invalid)
    let registry = RegistryConfig::load(&config.registry_path)?;
    let backends = build_backends(&registry)?;

    // 5. Open the run store and report claims left over from a previous life
    let runs = RunStore::open(&config.runs_path)?;
    report_orphans(&runs);

    // 6. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    // 7. Build the poller (adapters wrapped with tracing for observability)
    let tracker = Arc::new(Mutex::new(ProcessTracker::new()));
    let poller = Poller::new(
        PollerDeps {
            tracker: Arc::clone(&tracker),
            runs: runs.clone(),
            repo: TracedRepoAdapter::new(GitAdapter::new()),
            agent: ClaudeAgent::new(),
            clock: SystemClock,
            ids: UuidIdGen,
        },
        WorkerSettings {
            workspaces_root: config.workspaces_path.clone(),
            finalize_backoff: FINALIZE_BACKOFF,
        },
    );

    info!(
        projects = registry.projects.len(),
        "Daemon started for registry: {}",
        config.registry_path.display()
    );

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        registry,
        backends,
        poller,
        tracker,
        runs,
        start_time: Instant::now(),
        shutdown_requested: false,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    // Remove socket if we created it
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }

    // Remove version file
    if config.version_path.exists() {
        let _ = std::fs::remove_file(&config.version_path);
    }

    // Remove PID/lock file
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Build one backend per registered project
fn build_backends(
    registry: &RegistryConfig,
) -> Result<Vec<(Project, DaemonBackend)>, LifecycleError> {
    registry
        .projects
        .iter()
        .map(|project| {
            let backend = AnyBackend::from_project(project)
                .map_err(|e| LifecycleError::Backend(project.name.clone(), e))?;
            Ok((project.clone(), TracedTaskBackend::new(backend)))
        })
        .collect()
}

/// Report non-terminal run records left behind by a previous daemon.
///
/// These tasks may still hold claims in their backends. Releasing a claim is
/// a judgment call the daemon does not make on its own, so they are surfaced
/// and left alone.
fn report_orphans(runs: &RunStore) {
    let records = match runs.list() {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "could not read run records for orphan check");
            return;
        }
    };
    let orphans = orphaned_claims(&records, &ProcessTracker::new());
    if orphans.is_empty() {
        return;
    }
    warn!(
        count = orphans.len(),
        "found claims from a previous life with no worker; they stay claimed until resolved"
    );
    for orphan in &orphans {
        warn!(
            task_id = %orphan.task_id,
            project = %orphan.project,
            status = %orphan.status,
            "orphaned claim"
        );
    }
}

/// Get the state directory for drover
fn state_dir() -> Result<PathBuf, LifecycleError> {
    // Use XDG_STATE_HOME or default to ~/.local/state
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("drover"));
    }

    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/drover"))
}

/// Get the socket directory for drover
///
/// Uses /tmp/drover by default to keep paths short (macOS SUN_LEN = 104).
/// Can be overridden with DROVER_SOCKET_DIR for testing.
fn socket_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("DROVER_SOCKET_DIR") {
        return Ok(PathBuf::from(dir));
    }
    Ok(PathBuf::from("/tmp/drover"))
}

/// Compute registry hash for unique daemon directory
fn registry_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    // Take first 16 chars of hex digest
    hex_encode(&result[..8])
}

// Hex encoding helper
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
