//! Append-only JSONL transcript file.
//!
//! Each line is one `TranscriptEntry`: either a hash-chained record or the
//! finalization marker of a run. Several runs may share one file; each run
//! keeps its own chain.

use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use engage_contracts::{
    error::{EngageError, EngageResult},
    message::Message,
    run::RunStatus,
};
use engage_core::traits::TranscriptSink;

use crate::{
    chain::{verify_chain, ChainCursor},
    record::TranscriptRecord,
};

/// One line of a transcript file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum TranscriptEntry {
    Record(TranscriptRecord),
    Finalized {
        run_id: String,
        status: RunStatus,
        terminal_hash: String,
        finalized_at: DateTime<Utc>,
    },
}

impl TranscriptEntry {
    pub fn run_id(&self) -> &str {
        match self {
            TranscriptEntry::Record(record) => &record.run_id,
            TranscriptEntry::Finalized { run_id, .. } => run_id,
        }
    }
}

struct JsonlInner {
    file: File,
    chains: HashMap<String, ChainCursor>,
    /// Runs closed by `finalize`; their chains accept nothing further.
    finalized: HashMap<String, RunStatus>,
}

impl JsonlInner {
    fn ensure_open(&self, run_id: &str) -> EngageResult<()> {
        match self.finalized.get(run_id) {
            Some(status) => Err(write_error(format!(
                "run {} was already finalized as {}",
                run_id, status
            ))),
            None => Ok(()),
        }
    }
}

/// A `TranscriptSink` that appends to a JSONL file and fsyncs every line.
pub struct JsonlTranscriptSink {
    path: PathBuf,
    inner: Mutex<JsonlInner>,
}

fn write_error(reason: impl std::fmt::Display) -> EngageError {
    EngageError::TranscriptWrite {
        reason: reason.to_string(),
    }
}

impl JsonlTranscriptSink {
    /// Open (or create) the transcript file in append mode, creating parent
    /// directories as needed.
    pub fn open(path: impl AsRef<Path>) -> EngageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EngageError::Io {
                reason: format!("failed to create '{}': {}", parent.display(), e),
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| EngageError::Io {
                reason: format!("failed to open transcript '{}': {}", path.display(), e),
            })?;

        debug!(path = %path.display(), "transcript file opened");
        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(JsonlInner {
                file,
                chains: HashMap::new(),
                finalized: HashMap::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry of a transcript file in order. Blank lines are skipped.
    pub fn replay(path: impl AsRef<Path>) -> EngageResult<Vec<TranscriptEntry>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| EngageError::Io {
            reason: format!("failed to open transcript '{}': {}", path.display(), e),
        })?;

        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| EngageError::Io {
                reason: format!("failed to read '{}': {}", path.display(), e),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|e| EngageError::Parse {
                reason: format!("{} line {}: {}", path.display(), index + 1, e),
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Replay a file and check the chain of `run_id`.
    pub fn verify_run(path: impl AsRef<Path>, run_id: &str) -> EngageResult<bool> {
        let records: Vec<TranscriptRecord> = Self::replay(path)?
            .into_iter()
            .filter_map(|entry| match entry {
                TranscriptEntry::Record(record) if record.run_id == run_id => Some(record),
                _ => None,
            })
            .collect();
        Ok(verify_chain(&records))
    }

    fn append(file: &mut File, entry: &TranscriptEntry) -> EngageResult<()> {
        let json = serde_json::to_string(entry).map_err(write_error)?;
        writeln!(file, "{}", json).map_err(write_error)?;
        file.sync_all().map_err(write_error)
    }
}

impl TranscriptSink for JsonlTranscriptSink {
    fn record(&self, run_id: &str, turn: u32, message: &Message) -> EngageResult<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| write_error(format!("transcript file lock poisoned: {}", e)))?;
        inner.ensure_open(run_id)?;
        let JsonlInner { file, chains, .. } = &mut *inner;

        let cursor = chains.entry(run_id.to_string()).or_default();
        // Advance a copy so a failed write leaves the chain where it was.
        let mut next = cursor.clone();
        let record = next.append(run_id, turn, message)?;
        Self::append(file, &TranscriptEntry::Record(record))?;
        *cursor = next;
        Ok(())
    }

    fn finalize(&self, run_id: &str, status: RunStatus) -> EngageResult<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| write_error(format!("transcript file lock poisoned: {}", e)))?;
        inner.ensure_open(run_id)?;
        let JsonlInner {
            file,
            chains,
            finalized,
        } = &mut *inner;

        let terminal_hash = match chains.get(run_id) {
            Some(cursor) if !cursor.is_empty() => cursor.last_hash().to_string(),
            _ => String::new(),
        };

        Self::append(
            file,
            &TranscriptEntry::Finalized {
                run_id: run_id.to_string(),
                status,
                terminal_hash: terminal_hash.clone(),
                finalized_at: Utc::now(),
            },
        )?;
        chains.remove(run_id);
        finalized.insert(run_id.to_string(), status);

        info!(
            run_id = %run_id,
            status = %status,
            terminal_hash = %terminal_hash,
            path = %self.path.display(),
            "transcript finalized"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use engage_contracts::{error::EngageError, message::Message, run::RunStatus};
    use engage_core::traits::TranscriptSink;

    use super::{JsonlTranscriptSink, TranscriptEntry};

    #[test]
    fn records_and_finalization_are_replayed_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runs").join("transcript.jsonl");

        let sink = JsonlTranscriptSink::open(&path).unwrap();
        sink.record("run-1", 0, &Message::system("be careful")).unwrap();
        sink.record("run-1", 0, &Message::user("list tools")).unwrap();
        sink.record("run-1", 1, &Message::assistant_text("done")).unwrap();
        sink.finalize("run-1", RunStatus::Completed).unwrap();

        let entries = JsonlTranscriptSink::replay(&path).unwrap();
        assert_eq!(entries.len(), 4);

        let last_hash = match &entries[2] {
            TranscriptEntry::Record(record) => {
                assert_eq!(record.sequence, 2);
                assert_eq!(record.turn, 1);
                record.this_hash.clone()
            }
            other => panic!("expected Record, got {:?}", other),
        };
        match &entries[3] {
            TranscriptEntry::Finalized {
                status,
                terminal_hash,
                ..
            } => {
                assert_eq!(*status, RunStatus::Completed);
                assert_eq!(*terminal_hash, last_hash);
            }
            other => panic!("expected Finalized, got {:?}", other),
        }

        assert!(JsonlTranscriptSink::verify_run(&path, "run-1").unwrap());
    }

    #[test]
    fn interleaved_runs_keep_separate_chains() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transcript.jsonl");

        let sink = JsonlTranscriptSink::open(&path).unwrap();
        sink.record("a", 0, &Message::user("one")).unwrap();
        sink.record("b", 0, &Message::user("two")).unwrap();
        sink.record("a", 1, &Message::assistant_text("three")).unwrap();

        let entries = JsonlTranscriptSink::replay(&path).unwrap();
        let b_first = entries.iter().find(|e| e.run_id() == "b").unwrap();
        match b_first {
            TranscriptEntry::Record(record) => assert_eq!(record.sequence, 0),
            other => panic!("expected Record, got {:?}", other),
        }
        assert!(JsonlTranscriptSink::verify_run(&path, "a").unwrap());
        assert!(JsonlTranscriptSink::verify_run(&path, "b").unwrap());
    }

    #[test]
    fn edited_file_fails_verification() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transcript.jsonl");

        let sink = JsonlTranscriptSink::open(&path).unwrap();
        sink.record("run-1", 0, &Message::user("quarantine nothing")).unwrap();
        sink.record("run-1", 1, &Message::assistant_text("ok")).unwrap();
        drop(sink);

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, text.replace("quarantine nothing", "quarantine everything")).unwrap();

        assert!(!JsonlTranscriptSink::verify_run(&path, "run-1").unwrap());
    }

    #[test]
    fn finalized_run_rejects_further_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transcript.jsonl");

        let sink = JsonlTranscriptSink::open(&path).unwrap();
        sink.record("run-1", 0, &Message::user("list tools")).unwrap();
        sink.finalize("run-1", RunStatus::Completed).unwrap();

        let late = sink.record("run-1", 1, &Message::assistant_text("again"));
        assert!(matches!(late, Err(EngageError::TranscriptWrite { .. })));
        let twice = sink.finalize("run-1", RunStatus::Failed);
        assert!(matches!(twice, Err(EngageError::TranscriptWrite { .. })));

        // Nothing was appended by the rejected calls.
        assert_eq!(JsonlTranscriptSink::replay(&path).unwrap().len(), 2);
        assert!(JsonlTranscriptSink::verify_run(&path, "run-1").unwrap());

        // Other runs are unaffected.
        sink.record("run-2", 0, &Message::user("next")).unwrap();
        assert!(JsonlTranscriptSink::verify_run(&path, "run-2").unwrap());
    }

    #[test]
    fn replay_of_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = JsonlTranscriptSink::replay(dir.path().join("absent.jsonl"));
        assert!(matches!(result, Err(EngageError::Io { .. })));
    }
}
