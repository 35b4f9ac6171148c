//! Transcript record and sealed transcript types.
//!
//! `TranscriptRecord` is a single entry in the hash chain of one run: it
//! wraps an appended `Message` with its sequence number, the turn it belongs
//! to, and the SHA-256 hashes that make tampering detectable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use engage_contracts::{message::Message, run::RunStatus};

/// One appended message in the hash chain of a run.
///
/// Modifying any field, including the embedded `message`, invalidates
/// `this_hash` and every later `prev_hash`, which `verify_chain` detects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    pub run_id: String,

    /// The model submission this message belongs to (0 for the seed messages).
    pub turn: u32,

    pub message: Message,

    pub recorded_at: DateTime<Utc>,

    /// SHA-256 hash (hex) of the previous record, or `GENESIS_HASH` for the
    /// first record.
    pub prev_hash: String,

    /// SHA-256 hash (hex) of this record's canonical content.
    pub this_hash: String,
}

impl TranscriptRecord {
    /// The `prev_hash` of the first record in every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// The exported transcript of one run.
///
/// `terminal_hash` is the `this_hash` of the last record and commits to the
/// whole chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedTranscript {
    pub run_id: String,

    /// The terminal status, once the run has been finalized.
    pub status: Option<RunStatus>,

    pub records: Vec<TranscriptRecord>,

    pub exported_at: DateTime<Utc>,

    /// Empty string if no record was written.
    pub terminal_hash: String,
}
