//! # engage-core
//!
//! The deterministic orchestration runtime for Engage agents.
//!
//! This crate provides:
//! - The four seam traits (`ModelClient`, `ToolHandler`, `ArgumentValidator`, `TranscriptSink`)
//! - `Conversation`, the append-only transcript with call/result bookkeeping
//! - `ToolRegistry`, the per-environment tool set and argument trust boundary
//! - `AgentLoop`, which drives a playbook to a terminal `RunResult`
//! - `render_inventory` and the deterministic test doubles in `testing`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use engage_core::{AgentLoop, RunConfig, registry::ToolRegistry};
//!
//! let agent = AgentLoop::new(model, registry, RunConfig::new(10)?);
//! let result = agent.run(&playbook).await;
//! ```

pub mod conversation;
pub mod executor;
pub mod inventory;
pub mod registry;
pub mod testing;
pub mod traits;

pub use conversation::Conversation;
pub use executor::{compose_system_prompt, AgentLoop, RunConfig, DEFAULT_SYSTEM_PROMPT};
pub use inventory::render_inventory;
pub use registry::{RegistryBuilder, ToolDescriptor, ToolRegistry};
