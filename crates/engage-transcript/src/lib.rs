//! # engage-transcript
//!
//! Append-only, SHA-256 hash-chained run transcripts.
//!
//! ## Overview
//!
//! Every message appended to a run's conversation is wrapped in a
//! `TranscriptRecord` that links to the previous record of the same run via
//! its SHA-256 hash. Editing any recorded message breaks the chain and is
//! detected by `verify_chain`.
//!
//! Two sinks implement `engage_core::traits::TranscriptSink`:
//!
//! - [`InMemoryTranscriptSink`] for tests and single-process inspection.
//! - [`JsonlTranscriptSink`] for a durable, fsynced JSONL file.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use engage_transcript::InMemoryTranscriptSink;
//!
//! let sink = InMemoryTranscriptSink::new();
//! let agent = agent.with_transcript_sink(Arc::new(sink.clone()));
//! let result = agent.run(&playbook).await;
//!
//! let run_id = result.run_id.to_string();
//! assert!(sink.verify_integrity(&run_id));
//! let transcript = sink.export(&run_id);
//! ```

pub mod chain;
pub mod jsonl;
pub mod memory;
pub mod record;

pub use chain::{hash_record, verify_chain, ChainCursor};
pub use jsonl::{JsonlTranscriptSink, TranscriptEntry};
pub use memory::InMemoryTranscriptSink;
pub use record::{SealedTranscript, TranscriptRecord};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use engage_contracts::{
        message::Message,
        run::RunStatus,
        tool::{ToolCall, ToolOutcome, ToolResult},
    };
    use engage_core::traits::TranscriptSink;

    use super::{InMemoryTranscriptSink, TranscriptRecord};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn record_exchange(sink: &InMemoryTranscriptSink, run_id: &str) {
        let call = ToolCall::new("call-1", "siem_search_detections", json!({ "query": "*" }));
        let result = ToolResult::for_call(&call, ToolOutcome::Output(json!({ "detections": [] })));

        sink.record(run_id, 0, &Message::system("You are a SOC analyst.")).unwrap();
        sink.record(run_id, 0, &Message::user("Triage new detections.")).unwrap();
        sink.record(run_id, 1, &Message::AssistantToolCall(call)).unwrap();
        sink.record(run_id, 1, &Message::ToolResult(result)).unwrap();
        sink.record(run_id, 2, &Message::assistant_text("Nothing to triage.")).unwrap();
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[test]
    fn valid_chain_passes_integrity_check() {
        let sink = InMemoryTranscriptSink::new();
        record_exchange(&sink, "run-1");

        assert!(sink.verify_integrity("run-1"));
    }

    #[test]
    fn tampered_message_is_detected() {
        let sink = InMemoryTranscriptSink::new();
        record_exchange(&sink, "run-1");

        {
            let mut state = sink.state.lock().unwrap();
            let chain = state.get_mut("run-1").unwrap();
            chain.records[2].message = Message::user("injected");
        }

        assert!(!sink.verify_integrity("run-1"));
    }

    #[test]
    fn removed_record_is_detected() {
        let sink = InMemoryTranscriptSink::new();
        record_exchange(&sink, "run-1");

        {
            let mut state = sink.state.lock().unwrap();
            state.get_mut("run-1").unwrap().records.remove(1);
        }

        assert!(!sink.verify_integrity("run-1"));
    }

    #[test]
    fn first_record_links_to_genesis() {
        let sink = InMemoryTranscriptSink::new();
        sink.record("run-1", 0, &Message::user("hello")).unwrap();

        let transcript = sink.export("run-1").unwrap();
        assert_eq!(transcript.records[0].prev_hash, TranscriptRecord::GENESIS_HASH);
        assert_eq!(transcript.records[0].this_hash.len(), 64);
    }

    #[test]
    fn sequence_is_monotonic_and_linked() {
        let sink = InMemoryTranscriptSink::new();
        record_exchange(&sink, "run-1");

        let records = sink.export("run-1").unwrap().records;
        for (index, record) in records.iter().enumerate() {
            assert_eq!(record.sequence, index as u64);
            if index > 0 {
                assert_eq!(record.prev_hash, records[index - 1].this_hash);
            }
        }
    }

    #[test]
    fn export_carries_status_and_terminal_hash() {
        let sink = InMemoryTranscriptSink::new();
        record_exchange(&sink, "run-1");
        sink.finalize("run-1", RunStatus::Completed).unwrap();

        let transcript = sink.export("run-1").unwrap();
        assert_eq!(transcript.status, Some(RunStatus::Completed));
        assert_eq!(transcript.records.len(), 5);
        assert_eq!(
            transcript.terminal_hash,
            transcript.records.last().unwrap().this_hash
        );
    }

    #[test]
    fn finalized_run_rejects_further_records() {
        let sink = InMemoryTranscriptSink::new();
        sink.record("run-1", 0, &Message::user("hello")).unwrap();
        sink.finalize("run-1", RunStatus::Failed).unwrap();

        assert!(sink.record("run-1", 1, &Message::user("again")).is_err());
        assert!(sink.finalize("run-1", RunStatus::Completed).is_err());
    }

    #[test]
    fn runs_are_chained_independently() {
        let sink = InMemoryTranscriptSink::new();
        record_exchange(&sink, "run-a");
        sink.record("run-b", 0, &Message::user("other")).unwrap();

        assert_eq!(sink.run_ids(), vec!["run-a".to_string(), "run-b".to_string()]);
        let b = sink.export("run-b").unwrap();
        assert_eq!(b.records[0].sequence, 0);
        assert_eq!(b.records[0].prev_hash, TranscriptRecord::GENESIS_HASH);
        assert!(sink.verify_integrity("run-a"));
        assert!(sink.verify_integrity("run-b"));
    }

    #[test]
    fn unknown_run_exports_nothing() {
        let sink = InMemoryTranscriptSink::new();

        assert!(sink.export("missing").is_none());
        assert!(sink.verify_integrity("missing"));
        assert!(super::verify_chain(&[]));
    }
}
