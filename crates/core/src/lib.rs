//! drover-core: Core library for the drover task orchestrator
//!
//! This crate provides:
//! - Task identity, lifecycle stages, and the transition gate backends share
//! - Run records tracking one task's execution end to end
//! - Registry configuration: projects, ceilings, backends, agent settings
//! - Clock and ID abstractions for deterministic tests
//! - Agent prompt rendering

pub mod clock;
pub mod config;
pub mod id;
pub mod prompt;
pub mod run;
pub mod task;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    AgentConfig, ArtifactMode, BackendConfig, ConfigError, Project, RegistryConfig,
};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use prompt::{render_agent_prompt, PromptError};
pub use run::{RunRecord, RunStatus};
pub use task::{Task, TaskId, TaskStage, Transition};
