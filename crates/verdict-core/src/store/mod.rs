//! In-memory record store and its CSV snapshot codec.
//!
//! The store holds every loaded [`AnnotationRecord`], partitioned by
//! reviewer id. It never touches the filesystem; see [`snapshot`] for the
//! durable side.
//!
//! # Snapshot format
//!
//! ```text
//! id,label,contextual_agreement,contextual_factors,contextual_explanation,annotator
//! 101,correct,disagree,a; j,Different assay conditions,halil
//! 102,incorrect,,,,halil
//! 103,correct,agree,agree,,halil
//! ```
//!
//! All six columns are always written. On read, absent columns default to
//! the empty string and unknown columns are ignored, so snapshots written
//! before a column existed still load.

pub mod snapshot;

use std::collections::HashSet;
use std::io;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ErrorCode;
use crate::lock::LockError;
use crate::model::{Agreement, AnnotationRecord, ContextualFactors, Label};

pub use snapshot::SnapshotDir;

/// Fixed snapshot column order.
pub const SNAPSHOT_COLUMNS: [&str; 6] = [
    "id",
    "label",
    "contextual_agreement",
    "contextual_factors",
    "contextual_explanation",
    "annotator",
];

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("snapshot {origin} is not valid CSV: {source}")]
    Parse {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("snapshot {origin} row {row}: {reason}")]
    InvalidRow {
        origin: String,
        row: usize,
        reason: String,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] csv::Error),

    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Lock(#[from] LockError),
}

impl SnapshotError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } | Self::Parse { .. } | Self::InvalidRow { .. } => {
                ErrorCode::SnapshotCorrupt
            }
            Self::Encode(_) | Self::Write { .. } => ErrorCode::SnapshotWriteFailed,
            Self::Lock(err) => err.code(),
        }
    }
}

/// One snapshot row as it appears on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct SnapshotRow {
    id: String,
    label: String,
    contextual_agreement: String,
    contextual_factors: String,
    contextual_explanation: String,
    annotator: String,
}

impl SnapshotRow {
    fn from_record(record: &AnnotationRecord) -> Self {
        Self {
            id: record.item_id.clone(),
            label: record.label.map(|l| l.as_str().to_string()).unwrap_or_default(),
            contextual_agreement: record
                .contextual_agreement
                .map(|a| a.as_str().to_string())
                .unwrap_or_default(),
            contextual_factors: record.contextual_factors.to_cell(),
            contextual_explanation: record.contextual_explanation.clone(),
            annotator: record.reviewer_id.clone(),
        }
    }

    fn into_record(self, reviewer: &str) -> Result<AnnotationRecord, String> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err("empty id".to_string());
        }
        let label = non_empty(&self.label)
            .map(str::parse::<Label>)
            .transpose()
            .map_err(|e| e.to_string())?;
        let contextual_agreement = non_empty(&self.contextual_agreement)
            .map(str::parse::<Agreement>)
            .transpose()
            .map_err(|e| e.to_string())?;
        let contextual_factors =
            ContextualFactors::from_cell(&self.contextual_factors).map_err(|e| e.to_string())?;
        Ok(AnnotationRecord {
            item_id: id.to_string(),
            reviewer_id: reviewer.to_string(),
            label,
            contextual_agreement,
            contextual_factors,
            contextual_explanation: self.contextual_explanation,
        })
    }
}

fn non_empty(cell: &str) -> Option<&str> {
    let trimmed = cell.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Annotation progress for one reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

/// Every loaded annotation record, in upsert order.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<AnnotationRecord>,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a reviewer's snapshot into a fresh store.
    ///
    /// # Errors
    ///
    /// See [`RecordStore::load_snapshot`].
    pub fn from_snapshot(
        reviewer: &str,
        bytes: &[u8],
        origin: &str,
    ) -> Result<Self, SnapshotError> {
        let mut store = Self::new();
        store.load_snapshot(reviewer, bytes, origin)?;
        Ok(store)
    }

    /// Merge a reviewer's snapshot into this store, returning the number of
    /// rows applied.
    ///
    /// Rows are upserted in file order, so a duplicated id keeps its last
    /// row. Rows whose `annotator` names a different reviewer are skipped;
    /// an empty `annotator` belongs to the reviewer being loaded.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Parse`] for malformed CSV and
    /// [`SnapshotError::InvalidRow`] for a row with an empty id or a value
    /// outside its column's vocabulary.
    pub fn load_snapshot(
        &mut self,
        reviewer: &str,
        bytes: &[u8],
        origin: &str,
    ) -> Result<usize, SnapshotError> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
        let mut applied = 0;
        for (idx, row) in reader.deserialize::<SnapshotRow>().enumerate() {
            let row = row.map_err(|source| SnapshotError::Parse {
                origin: origin.to_string(),
                source,
            })?;
            let annotator = row.annotator.trim();
            if !annotator.is_empty() && annotator != reviewer {
                debug!(origin, annotator, "skipping row owned by another reviewer");
                continue;
            }
            let record = row
                .into_record(reviewer)
                .map_err(|reason| SnapshotError::InvalidRow {
                    origin: origin.to_string(),
                    row: idx + 1,
                    reason,
                })?;
            if !record.is_consistent() {
                warn!(origin, item = %record.item_id, "snapshot row has stale task 2 values");
            }
            self.upsert(record);
            applied += 1;
        }
        Ok(applied)
    }

    /// Insert or replace the record keyed by `(item_id, reviewer_id)`.
    ///
    /// The replaced record, if any, is returned. The new record always goes
    /// to the end so that snapshot order follows save order.
    pub fn upsert(&mut self, record: AnnotationRecord) -> Option<AnnotationRecord> {
        self.replace(record).map(|(_, previous)| previous)
    }

    /// [`RecordStore::upsert`], also returning the index the replaced record
    /// held so [`RecordStore::restore_at`] can put it back.
    pub fn replace(&mut self, record: AnnotationRecord) -> Option<(usize, AnnotationRecord)> {
        let previous = self
            .records
            .iter()
            .position(|existing| existing.key() == record.key())
            .map(|idx| (idx, self.records.remove(idx)));
        self.records.push(record);
        previous
    }

    /// Reinsert a record at `index` (clamped to the end).
    pub fn restore_at(&mut self, index: usize, record: AnnotationRecord) {
        let index = index.min(self.records.len());
        self.records.insert(index, record);
    }

    /// Drop the record keyed by `(item_id, reviewer)`, returning it.
    pub fn remove(&mut self, reviewer: &str, item_id: &str) -> Option<AnnotationRecord> {
        let idx = self
            .records
            .iter()
            .position(|r| r.reviewer_id == reviewer && r.item_id == item_id)?;
        Some(self.records.remove(idx))
    }

    #[must_use]
    pub fn get(&self, reviewer: &str, item_id: &str) -> Option<&AnnotationRecord> {
        self.records
            .iter()
            .find(|r| r.reviewer_id == reviewer && r.item_id == item_id)
    }

    /// A reviewer's records in upsert order.
    pub fn records<'a>(
        &'a self,
        reviewer: &'a str,
    ) -> impl Iterator<Item = &'a AnnotationRecord> {
        self.records.iter().filter(move |r| r.reviewer_id == reviewer)
    }

    /// Encode a reviewer's partition as a snapshot.
    ///
    /// The header row is always present, even for an empty partition.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Encode`] if the CSV writer fails.
    pub fn serialize(&self, reviewer: &str) -> Result<Vec<u8>, SnapshotError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(SNAPSHOT_COLUMNS)?;
        for record in self.records(reviewer) {
            let row = SnapshotRow::from_record(record);
            writer.write_record([
                &row.id,
                &row.label,
                &row.contextual_agreement,
                &row.contextual_factors,
                &row.contextual_explanation,
                &row.annotator,
            ])?;
        }
        writer
            .into_inner()
            .map_err(|err| SnapshotError::Encode(csv::Error::from(err.into_error())))
    }

    /// Count distinct annotated item ids, bounded by the dataset size.
    #[must_use]
    pub fn progress(&self, reviewer: &str, total: usize) -> Progress {
        let distinct: HashSet<&str> = self.records(reviewer).map(|r| r.item_id.as_str()).collect();
        Progress {
            done: distinct.len().min(total),
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Factor;

    fn record(item: &str, reviewer: &str, label: Label) -> AnnotationRecord {
        AnnotationRecord {
            label: Some(label),
            ..AnnotationRecord::empty(item, reviewer)
        }
    }

    #[test]
    fn upsert_replaces_same_key_and_moves_it_last() {
        let mut store = RecordStore::new();
        store.upsert(record("1", "halil", Label::Correct));
        store.upsert(record("2", "halil", Label::Correct));
        let previous = store.upsert(record("1", "halil", Label::Incorrect));

        assert_eq!(previous.and_then(|r| r.label), Some(Label::Correct));
        let ids: Vec<&str> = store.records("halil").map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(
            store.get("halil", "1").and_then(|r| r.label),
            Some(Label::Incorrect)
        );
    }

    #[test]
    fn replace_then_restore_at_keeps_original_order() {
        let mut store = RecordStore::new();
        for id in ["1", "2", "3"] {
            store.upsert(record(id, "halil", Label::Incorrect));
        }
        let (index, previous) = store
            .replace(record("2", "halil", Label::Correct))
            .expect("replaced");
        assert_eq!(index, 1);

        store.remove("halil", "2");
        store.restore_at(index, previous);
        let ids: Vec<&str> = store.records("halil").map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(store.get("halil", "2").and_then(|r| r.label), Some(Label::Incorrect));

        store.restore_at(99, record("4", "halil", Label::Correct));
        assert_eq!(store.records("halil").last().map(|r| r.item_id.as_str()), Some("4"));
    }

    #[test]
    fn partitions_do_not_overwrite_each_other() {
        let mut store = RecordStore::new();
        store.upsert(record("3", "a", Label::Incorrect));
        store.upsert(record("3", "b", Label::Correct));

        assert_eq!(store.get("a", "3").and_then(|r| r.label), Some(Label::Incorrect));
        assert_eq!(store.get("b", "3").and_then(|r| r.label), Some(Label::Correct));
    }

    #[test]
    fn empty_partition_serializes_header_only() {
        let bytes = RecordStore::new().serialize("halil").expect("encode");
        assert_eq!(
            String::from_utf8(bytes).expect("utf8"),
            "id,label,contextual_agreement,contextual_factors,contextual_explanation,annotator\n"
        );
    }

    #[test]
    fn serialize_writes_fixed_columns() {
        let mut store = RecordStore::new();
        store.upsert(AnnotationRecord {
            label: Some(Label::Correct),
            contextual_agreement: Some(Agreement::Disagree),
            contextual_factors: ContextualFactors::selected([Factor::J, Factor::A]),
            contextual_explanation: "assay, timing".to_string(),
            ..AnnotationRecord::empty("5", "halil")
        });
        store.upsert(record("6", "other", Label::Incorrect));

        let text = String::from_utf8(store.serialize("halil").expect("encode")).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "5,correct,disagree,a; j,\"assay, timing\",halil");
    }

    #[test]
    fn legacy_snapshot_without_newer_columns_loads() {
        let legacy = "id,label,contextual_factors,contextual_explanation\n\
                      10,correct,,\n\
                      11,incorrect,,\n";
        let store = RecordStore::from_snapshot("halil", legacy.as_bytes(), "legacy").expect("load");
        let first = store.get("halil", "10").expect("row 10");
        assert_eq!(first.label, Some(Label::Correct));
        assert_eq!(first.contextual_agreement, None);
        assert_eq!(first.reviewer_id, "halil");
        assert_eq!(store.progress("halil", 50), Progress { done: 2, total: 50 });
    }

    #[test]
    fn legacy_capitalized_values_load() {
        let legacy = "id,label,contextual_agreement,contextual_factors,contextual_explanation,annotator\n\
                      7,correct,Agree,Agree,,halil\n\
                      8,correct,Disagree,b. Population: The claims target; j. Other: None,why,halil\n";
        let store = RecordStore::from_snapshot("halil", legacy.as_bytes(), "legacy").expect("load");
        let agree = store.get("halil", "7").expect("row 7");
        assert_eq!(agree.contextual_agreement, Some(Agreement::Agree));
        assert_eq!(agree.contextual_factors, ContextualFactors::Agree);
        let disagree = store.get("halil", "8").expect("row 8");
        assert_eq!(
            disagree.contextual_factors,
            ContextualFactors::selected([Factor::B, Factor::J])
        );
        assert_eq!(disagree.contextual_explanation, "why");
    }

    #[test]
    fn duplicate_rows_keep_the_last() {
        let text = "id,label\n4,correct\n4,incorrect\n";
        let store = RecordStore::from_snapshot("halil", text.as_bytes(), "dup").expect("load");
        assert_eq!(store.records("halil").count(), 1);
        assert_eq!(store.get("halil", "4").and_then(|r| r.label), Some(Label::Incorrect));
    }

    #[test]
    fn foreign_annotator_rows_are_skipped() {
        let text = "id,label,annotator\n1,correct,halil\n2,correct,joe\n";
        let mut store = RecordStore::new();
        let applied = store.load_snapshot("halil", text.as_bytes(), "mixed").expect("load");
        assert_eq!(applied, 1);
        assert!(store.get("halil", "2").is_none());
    }

    #[test]
    fn invalid_label_is_a_corrupt_snapshot() {
        let text = "id,label\n1,maybe\n";
        let err = RecordStore::from_snapshot("halil", text.as_bytes(), "bad").unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidRow { row: 1, .. }));
        assert_eq!(err.code(), ErrorCode::SnapshotCorrupt);
    }

    #[test]
    fn empty_bytes_load_as_empty_store() {
        let store = RecordStore::from_snapshot("halil", b"", "empty").expect("load");
        assert_eq!(store.records("halil").count(), 0);
    }

    #[test]
    fn progress_counts_distinct_ids_bounded_by_total() {
        let mut store = RecordStore::new();
        for id in ["1", "2", "3", "2"] {
            store.upsert(record(id, "halil", Label::Incorrect));
        }
        assert_eq!(store.progress("halil", 10), Progress { done: 3, total: 10 });
        assert_eq!(store.progress("halil", 2), Progress { done: 2, total: 2 });
        assert_eq!(store.progress("nobody", 10), Progress { done: 0, total: 10 });
    }
}
