//! In-memory implementation of `TranscriptSink`.
//!
//! `InMemoryTranscriptSink` keeps one hash chain per run id behind a single
//! `Mutex`, so one sink can be shared by concurrent runs. Use `export()` after
//! a run finishes to obtain a `SealedTranscript`, and `verify_integrity()` at
//! any time to confirm a chain has not been tampered with in memory.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;
use tracing::{debug, info};

use engage_contracts::{
    error::{EngageError, EngageResult},
    message::Message,
    run::RunStatus,
};
use engage_core::traits::TranscriptSink;

use crate::{
    chain::{verify_chain, ChainCursor},
    record::{SealedTranscript, TranscriptRecord},
};

// ── Internal mutable state ────────────────────────────────────────────────────

/// The chain of one run.
#[derive(Default)]
pub(crate) struct RunChain {
    pub(crate) cursor: ChainCursor,
    pub(crate) records: Vec<TranscriptRecord>,
    pub(crate) status: Option<RunStatus>,
}

pub(crate) type InMemoryState = HashMap<String, RunChain>;

// ── Public sink ───────────────────────────────────────────────────────────────

/// An in-memory, append-only transcript sink backed by SHA-256 hash chains.
///
/// Cloning is cheap and every clone observes the same chains.
#[derive(Clone, Default)]
pub struct InMemoryTranscriptSink {
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryTranscriptSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> EngageResult<MutexGuard<'_, InMemoryState>> {
        self.state.lock().map_err(|e| EngageError::TranscriptWrite {
            reason: format!("transcript state lock poisoned: {}", e),
        })
    }

    /// Export the transcript of `run_id`, or `None` if nothing was recorded
    /// for it.
    pub fn export(&self, run_id: &str) -> Option<SealedTranscript> {
        let state = self.lock().ok()?;
        let chain = state.get(run_id)?;
        let terminal_hash = chain
            .records
            .last()
            .map(|r| r.this_hash.clone())
            .unwrap_or_default();

        Some(SealedTranscript {
            run_id: run_id.to_string(),
            status: chain.status,
            records: chain.records.clone(),
            exported_at: Utc::now(),
            terminal_hash,
        })
    }

    /// Whether the chain of `run_id` is intact. Unknown runs are reported as
    /// intact (an empty chain).
    pub fn verify_integrity(&self, run_id: &str) -> bool {
        match self.lock() {
            Ok(state) => state
                .get(run_id)
                .map_or(true, |chain| verify_chain(&chain.records)),
            Err(_) => false,
        }
    }

    /// Ids of every run seen so far, sorted.
    pub fn run_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .lock()
            .map(|state| state.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

// ── TranscriptSink impl ───────────────────────────────────────────────────────

impl TranscriptSink for InMemoryTranscriptSink {
    /// Append one message to the chain of `run_id`.
    ///
    /// Fails once the run has been finalized.
    fn record(&self, run_id: &str, turn: u32, message: &Message) -> EngageResult<()> {
        let mut state = self.lock()?;
        let chain = state.entry(run_id.to_string()).or_default();

        if let Some(status) = chain.status {
            return Err(EngageError::TranscriptWrite {
                reason: format!("run {} was already finalized as {}", run_id, status),
            });
        }

        let record = chain.cursor.append(run_id, turn, message)?;
        debug!(
            run_id = %run_id,
            sequence = record.sequence,
            role = message.role(),
            "transcript record appended"
        );
        chain.records.push(record);
        Ok(())
    }

    fn finalize(&self, run_id: &str, status: RunStatus) -> EngageResult<()> {
        let mut state = self.lock()?;
        let chain = state.entry(run_id.to_string()).or_default();

        if let Some(previous) = chain.status {
            return Err(EngageError::TranscriptWrite {
                reason: format!("run {} was already finalized as {}", run_id, previous),
            });
        }
        chain.status = Some(status);

        info!(
            run_id = %run_id,
            status = %status,
            record_count = chain.records.len(),
            terminal_hash = %chain.cursor.last_hash(),
            "transcript finalized"
        );
        Ok(())
    }
}
