//! Hash-chain primitives: hashing, appending, and integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. run_id as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. turn as 4-byte little-endian
//!   4. recorded_at as RFC 3339 with nanoseconds, UTF-8
//!   5. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   6. compact JSON of the message

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use engage_contracts::{
    error::{EngageError, EngageResult},
    message::Message,
};

use crate::record::TranscriptRecord;

/// Compute the SHA-256 hash of one record's content.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_record(
    run_id: &str,
    sequence: u64,
    turn: u32,
    recorded_at: &DateTime<Utc>,
    message: &Message,
    prev_hash: &str,
) -> EngageResult<String> {
    let message_json = serde_json::to_vec(message).map_err(|e| EngageError::TranscriptWrite {
        reason: format!("message is not serializable: {}", e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(run_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(turn.to_le_bytes());
    hasher.update(recorded_at.to_rfc3339_opts(SecondsFormat::Nanos, true).as_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&message_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify the integrity of one run's chain.
///
/// Returns `true` when every record:
///
/// 1. sits at the sequence number matching its position,
/// 2. links to the preceding record's `this_hash` (or `GENESIS_HASH`), and
/// 3. carries a `this_hash` equal to the value recomputed from its fields.
///
/// An empty chain is valid.
pub fn verify_chain(records: &[TranscriptRecord]) -> bool {
    let mut expected_prev = TranscriptRecord::GENESIS_HASH;

    for (index, record) in records.iter().enumerate() {
        if record.sequence != index as u64 || record.prev_hash != expected_prev {
            return false;
        }

        let recomputed = hash_record(
            &record.run_id,
            record.sequence,
            record.turn,
            &record.recorded_at,
            &record.message,
            &record.prev_hash,
        );
        match recomputed {
            Ok(hash) if hash == record.this_hash => {}
            _ => return false,
        }

        expected_prev = &record.this_hash;
    }

    true
}

/// The append position of one run's chain.
#[derive(Debug, Clone)]
pub struct ChainCursor {
    sequence: u64,
    last_hash: String,
}

impl ChainCursor {
    pub fn new() -> Self {
        Self {
            sequence: 0,
            last_hash: TranscriptRecord::GENESIS_HASH.to_string(),
        }
    }

    /// Hash `message` onto the chain and advance.
    pub fn append(&mut self, run_id: &str, turn: u32, message: &Message) -> EngageResult<TranscriptRecord> {
        let recorded_at = Utc::now();
        let prev_hash = self.last_hash.clone();
        let this_hash = hash_record(run_id, self.sequence, turn, &recorded_at, message, &prev_hash)?;

        let record = TranscriptRecord {
            sequence: self.sequence,
            run_id: run_id.to_string(),
            turn,
            message: message.clone(),
            recorded_at,
            prev_hash,
            this_hash: this_hash.clone(),
        };

        self.sequence += 1;
        self.last_hash = this_hash;
        Ok(record)
    }

    /// Number of records appended so far.
    pub fn len(&self) -> u64 {
        self.sequence
    }

    pub fn is_empty(&self) -> bool {
        self.sequence == 0
    }

    /// `this_hash` of the last record, or `GENESIS_HASH` before the first.
    pub fn last_hash(&self) -> &str {
        &self.last_hash
    }
}

impl Default for ChainCursor {
    fn default() -> Self {
        Self::new()
    }
}
