//! # engage-playbook
//!
//! Loads markdown playbooks into the structured `Playbook` the agent loop runs.
//!
//! Parsing is pure; `PlaybookLoader::from_file` is the only entry point that
//! touches the filesystem.

pub mod loader;

pub use loader::PlaybookLoader;
