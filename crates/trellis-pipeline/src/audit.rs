use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trellis_fitness::FitnessScore;
use trellis_types::{Generation, Mutation};
use uuid::Uuid;

use crate::error::AuditError;
use crate::report::{GateDecision, RejectionReason};

/// One append-only audit record: a decided mutation.
///
/// Immutable once recorded. Rejected mutations are first-class records with
/// `resulting_generation: None`; only accepted records advance the graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub record_id: Uuid,
    pub base_generation: Generation,
    /// Set iff the mutation was accepted.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resulting_generation: Option<Generation>,
    pub mutation: Mutation,
    pub outcome: GateDecision,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<RejectionReason>,
    /// Absent when the mutation was rejected structurally.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub score: Option<FitnessScore>,
    pub decided_at: DateTime<Utc>,
}

impl MutationRecord {
    pub fn accepted(&self) -> bool {
        self.outcome == GateDecision::Accepted
    }
}

/// The append-only mutation audit log — the only durable state in the
/// engine. No delete or modify operations exist; the current graph is a fold
/// over the accepted records.
///
/// With a file sink attached, every record is written through as one JSON
/// line before `append` returns.
#[derive(Debug)]
pub struct AuditLog {
    records: Vec<MutationRecord>,
    sink: Option<File>,
}

impl AuditLog {
    /// A log with no durable backing. Used by tests and one-shot commands
    /// that evaluate without recording.
    pub fn in_memory() -> Self {
        Self {
            records: Vec::new(),
            sink: None,
        }
    }

    /// Open (or create) a file-backed log, replaying any existing records.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        let mut records = Vec::new();
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            for (index, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: MutationRecord =
                    serde_json::from_str(&line).map_err(|source| AuditError::Malformed {
                        line: index + 1,
                        source,
                    })?;
                records.push(record);
            }
        }
        let sink = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            records,
            sink: Some(sink),
        })
    }

    /// Append a record, writing through to the file sink when present.
    pub fn append(&mut self, record: MutationRecord) -> Result<(), AuditError> {
        if let Some(sink) = &mut self.sink {
            let mut line = serde_json::to_string(&record)
                .expect("audit records always serialize");
            line.push('\n');
            sink.write_all(line.as_bytes())?;
            sink.flush()?;
        }
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[MutationRecord] {
        &self.records
    }

    /// Records decided at or after a base generation.
    pub fn since(&self, generation: Generation) -> impl Iterator<Item = &MutationRecord> {
        self.records
            .iter()
            .filter(move |record| record.base_generation >= generation)
    }

    /// Accepted records in generation order — the replay source.
    pub fn accepted(&self) -> impl Iterator<Item = &MutationRecord> {
        self.records.iter().filter(|record| record.accepted())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
