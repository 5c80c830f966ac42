//! Cursor movement with save-before-leave.
//!
//! `next`, `previous` and `save` share one sequence:
//!
//! ```text
//! validate ─▶ commit ─▶ upsert ─▶ write local snapshot ─▶ push ─▶ move ─▶ resync
//! ```
//!
//! A validation failure stops the sequence before anything is written. A
//! push failure does not: the record is already durable locally, so the move
//! still happens and the outcome carries [`SyncStatus::Failed`].
//! A remote that could not be built from the config fails every push the
//! same way.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::JumpPolicy;
use crate::dataset::Dataset;
use crate::error::ErrorCode;
use crate::model::{AnnotationRecord, Item};
use crate::reviewer::ReviewerId;
use crate::session::{SessionError, SessionState};
use crate::store::{Progress, RecordStore, SnapshotDir, SnapshotError};
use crate::sync::{PushOutcome, RemoteSync, SyncError};

#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("no item with id '{0}'")]
    UnknownItem(String),
}

impl NavError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Session(err) => err.code(),
            Self::Snapshot(err) => err.code(),
            Self::Sync(err) => err.code(),
            Self::UnknownItem(_) => ErrorCode::ItemNotFound,
        }
    }

    /// Whether the session cannot continue after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Snapshot(_))
    }
}

/// What happened to the remote copy after a local save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    Created { path: String },
    Updated { path: String },
    Skipped,
    Failed { code: String, message: String },
}

impl SyncStatus {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveReport {
    pub record: AnnotationRecord,
    pub snapshot_path: PathBuf,
    pub sync: SyncStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavOutcome {
    pub from: usize,
    pub to: usize,
    pub saved: Option<SaveReport>,
    /// Unsaved edits thrown away by an `inspect` jump.
    pub discarded_edits: bool,
}

impl NavOutcome {
    #[must_use]
    pub const fn moved(&self) -> bool {
        self.from != self.to
    }

    const fn stay(at: usize) -> Self {
        Self {
            from: at,
            to: at,
            saved: None,
            discarded_edits: false,
        }
    }
}

/// One reviewer's view over the dataset, their records, and where those
/// records are persisted.
#[derive(Debug)]
pub struct Navigator {
    dataset: Dataset,
    reviewer: ReviewerId,
    records: RecordStore,
    snapshots: SnapshotDir,
    /// `Err` when the configured remote is unusable.
    remote: Result<Option<RemoteSync>, SyncError>,
    jump_policy: JumpPolicy,
}

impl Navigator {
    /// Load the reviewer's snapshot and build a navigator over `dataset`.
    ///
    /// `remote` is whatever [`RemoteSync::from_config`] produced. An error
    /// there does not stop the session; each save reports it instead.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the existing snapshot is unreadable.
    pub fn open(
        dataset: Dataset,
        reviewer: ReviewerId,
        snapshots: SnapshotDir,
        remote: Result<Option<RemoteSync>, SyncError>,
        jump_policy: JumpPolicy,
    ) -> Result<Self, SnapshotError> {
        let records = snapshots.load(&reviewer)?;
        Ok(Self {
            dataset,
            reviewer,
            records,
            snapshots,
            remote,
            jump_policy,
        })
    }

    #[must_use]
    pub const fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    #[must_use]
    pub const fn reviewer(&self) -> &ReviewerId {
        &self.reviewer
    }

    #[must_use]
    pub const fn jump_policy(&self) -> JumpPolicy {
        self.jump_policy
    }

    #[must_use]
    pub fn remote(&self) -> Option<&RemoteSync> {
        self.remote.as_ref().ok().and_then(Option::as_ref)
    }

    /// Why the configured remote could not be built, if it could not.
    #[must_use]
    pub fn remote_error(&self) -> Option<&SyncError> {
        self.remote.as_ref().err()
    }

    /// Where this reviewer's local snapshot lives.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.snapshots.path_for(&self.reviewer)
    }

    /// A session positioned at `start` (clamped), with its buffer loaded.
    #[must_use]
    pub fn start(&self, start: usize) -> SessionState {
        let mut state = SessionState::new();
        self.place(&mut state, start);
        state
    }

    #[must_use]
    pub fn current_item(&self, state: &SessionState) -> Option<&Item> {
        self.dataset.get(state.cursor())
    }

    #[must_use]
    pub fn saved_record(&self, item_id: &str) -> Option<&AnnotationRecord> {
        self.records.get(self.reviewer.as_str(), item_id)
    }

    /// This reviewer's records in save order.
    pub fn records(&self) -> impl Iterator<Item = &AnnotationRecord> {
        self.records.records(self.reviewer.as_str())
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        self.records.progress(self.reviewer.as_str(), self.dataset.len())
    }

    /// Whether the buffer holds edits that are not in the record store.
    #[must_use]
    pub fn is_dirty(&self, state: &SessionState) -> bool {
        state
            .loaded_item_id()
            .is_some_and(|id| state.is_dirty(self.saved_record(id)))
    }

    /// Validate and persist the current item without moving.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Session`] if the buffer fails validation (nothing
    /// is written) or [`NavError::Snapshot`] if the local write fails.
    pub fn save(&mut self, state: &mut SessionState) -> Result<SaveReport, NavError> {
        let record = state.commit(&self.reviewer)?;
        let previous = self.records.replace(record.clone());

        let bytes = match self.records.serialize(self.reviewer.as_str()) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.restore(&record, previous);
                return Err(err.into());
            }
        };
        let snapshot_path = match self.snapshots.write(&self.reviewer, &bytes) {
            Ok(path) => path,
            Err(err) => {
                self.restore(&record, previous);
                return Err(err.into());
            }
        };
        info!(reviewer = %self.reviewer, item = %record.item_id, "annotation saved");

        let sync = self.push_bytes(&bytes);
        state.reload(&record.item_id, Some(&record));
        Ok(SaveReport {
            record,
            snapshot_path,
            sync,
        })
    }

    /// Save, then move one item forward. A no-op at the last item.
    ///
    /// # Errors
    ///
    /// See [`Navigator::save`].
    pub fn next(&mut self, state: &mut SessionState) -> Result<NavOutcome, NavError> {
        let from = state.cursor();
        if self.dataset.is_empty() || from + 1 >= self.dataset.len() {
            return Ok(NavOutcome::stay(from));
        }
        self.save_and_move(state, from + 1)
    }

    /// Save, then move one item back. A no-op at the first item.
    ///
    /// # Errors
    ///
    /// See [`Navigator::save`].
    pub fn previous(&mut self, state: &mut SessionState) -> Result<NavOutcome, NavError> {
        let from = state.cursor();
        if self.dataset.is_empty() || from == 0 {
            return Ok(NavOutcome::stay(from));
        }
        self.save_and_move(state, from - 1)
    }

    /// Move to the item with `item_id`, following the jump policy.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::UnknownItem`] (cursor unchanged) for an id not in
    /// the dataset; with `save-first`, also any [`Navigator::save`] error.
    pub fn jump_to(
        &mut self,
        state: &mut SessionState,
        item_id: &str,
    ) -> Result<NavOutcome, NavError> {
        let index = self
            .dataset
            .position(item_id.trim())
            .ok_or_else(|| NavError::UnknownItem(item_id.to_string()))?;
        self.jump_to_index(state, index)
    }

    /// Move to `index` (clamped), following the jump policy.
    ///
    /// # Errors
    ///
    /// With `save-first`, any [`Navigator::save`] error.
    pub fn jump_to_index(
        &mut self,
        state: &mut SessionState,
        index: usize,
    ) -> Result<NavOutcome, NavError> {
        let from = state.cursor();
        let to = self.dataset.clamp(index);
        if to == from {
            return Ok(NavOutcome::stay(from));
        }
        match self.jump_policy {
            JumpPolicy::SaveFirst => self.save_and_move(state, to),
            JumpPolicy::Inspect => {
                let discarded_edits = self.is_dirty(state);
                if discarded_edits {
                    warn!(
                        item = state.loaded_item_id().unwrap_or_default(),
                        "discarding unsaved edits on jump"
                    );
                }
                self.place(state, to);
                Ok(NavOutcome {
                    from,
                    to,
                    saved: None,
                    discarded_edits,
                })
            }
        }
    }

    /// Push the current local snapshot again, e.g. after a failed sync.
    ///
    /// Unlike the push that follows a save, a failure here is returned.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Snapshot`] if the local snapshot cannot be read,
    /// or [`NavError::Sync`] if the push fails.
    pub fn push_snapshot(&self) -> Result<SyncStatus, NavError> {
        let bytes = match self.snapshots.read(&self.reviewer)? {
            Some(bytes) => bytes,
            None => self.records.serialize(self.reviewer.as_str())?,
        };
        Ok(self.try_push(&bytes)?)
    }

    fn save_and_move(
        &mut self,
        state: &mut SessionState,
        to: usize,
    ) -> Result<NavOutcome, NavError> {
        let from = state.cursor();
        let saved = self.save(state)?;
        self.place(state, to);
        Ok(NavOutcome {
            from,
            to: state.cursor(),
            saved: Some(saved),
            discarded_edits: false,
        })
    }

    fn place(&self, state: &mut SessionState, index: usize) {
        let cursor = self.dataset.clamp(index);
        state.set_cursor(cursor);
        if let Some(item) = self.dataset.get(cursor) {
            let saved = self.records.get(self.reviewer.as_str(), &item.id);
            state.resync(&item.id, saved);
        }
    }

    fn try_push(&self, bytes: &[u8]) -> Result<SyncStatus, SyncError> {
        let remote = match &self.remote {
            Ok(Some(remote)) => remote,
            Ok(None) => return Ok(SyncStatus::Skipped),
            Err(err) => return Err(err.clone()),
        };
        let path = remote.remote_path(&self.reviewer);
        Ok(match remote.push(&self.reviewer, bytes)? {
            PushOutcome::Created => SyncStatus::Created { path },
            PushOutcome::Updated => SyncStatus::Updated { path },
        })
    }

    fn push_bytes(&self, bytes: &[u8]) -> SyncStatus {
        self.try_push(bytes).unwrap_or_else(|err| {
            warn!(
                reviewer = %self.reviewer,
                code = err.code().code(),
                error = %err,
                "sync failed; annotation kept locally"
            );
            SyncStatus::Failed {
                code: err.code().code().to_string(),
                message: err.to_string(),
            }
        })
    }

    /// Undo a `replace` whose snapshot write failed, so memory keeps
    /// matching the file on disk.
    fn restore(
        &mut self,
        record: &AnnotationRecord,
        previous: Option<(usize, AnnotationRecord)>,
    ) {
        self.records
            .remove(record.reviewer_id.as_str(), record.item_id.as_str());
        if let Some((index, previous)) = previous {
            self.records.restore_at(index, previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Agreement, Factor, Label};
    use crate::session::ValidationError;
    use crate::sync::MemoryStore;
    use std::time::Duration;
    use tempfile::TempDir;

    fn dataset(n: usize) -> Dataset {
        let items = (1..=n)
            .map(|i| Item {
                id: i.to_string(),
                ..Item::default()
            })
            .collect();
        Dataset::from_items(items).expect("dataset")
    }

    fn navigator(dir: &TempDir, remote: Option<RemoteSync>, policy: JumpPolicy) -> Navigator {
        Navigator::open(
            dataset(5),
            ReviewerId::parse("halil").expect("valid"),
            SnapshotDir::new(dir.path().join("annotations"), Duration::from_millis(200)),
            Ok(remote),
            policy,
        )
        .expect("open")
    }

    #[test]
    fn start_clamps_cursor() {
        let dir = TempDir::new().expect("tempdir");
        let nav = navigator(&dir, None, JumpPolicy::Inspect);
        let state = nav.start(99);
        assert_eq!(state.cursor(), 4);
        assert_eq!(state.loaded_item_id(), Some("5"));
    }

    #[test]
    fn next_saves_then_moves() {
        let dir = TempDir::new().expect("tempdir");
        let mut nav = navigator(&dir, None, JumpPolicy::Inspect);
        let mut state = nav.start(0);
        state.set_label(Label::Incorrect).expect("label");

        let outcome = nav.next(&mut state).expect("next");
        assert!(outcome.moved());
        assert_eq!(state.cursor(), 1);
        assert_eq!(state.loaded_item_id(), Some("2"));
        let saved = outcome.saved.expect("saved");
        assert_eq!(saved.sync, SyncStatus::Skipped);
        assert!(saved.snapshot_path.exists());
        assert_eq!(nav.progress(), Progress { done: 1, total: 5 });
    }

    #[test]
    fn validation_failure_blocks_move_and_keeps_buffer() {
        let dir = TempDir::new().expect("tempdir");
        let mut nav = navigator(&dir, None, JumpPolicy::Inspect);
        let mut state = nav.start(0);
        state.set_label(Label::Correct).expect("label");

        let err = nav.next(&mut state).unwrap_err();
        assert!(matches!(
            err,
            NavError::Session(SessionError::Invalid(ValidationError::MissingContextualAgreement))
        ));
        assert!(!err.is_fatal());
        assert_eq!(state.cursor(), 0);
        assert_eq!(state.buffer().label, Some(Label::Correct));
        assert_eq!(nav.records().count(), 0);
    }

    #[test]
    fn boundaries_are_no_ops() {
        let dir = TempDir::new().expect("tempdir");
        let mut nav = navigator(&dir, None, JumpPolicy::Inspect);
        let mut state = nav.start(0);
        let outcome = nav.previous(&mut state).expect("previous");
        assert!(!outcome.moved());
        assert!(outcome.saved.is_none());

        let mut state = nav.start(4);
        assert!(!nav.next(&mut state).expect("next").moved());
        assert_eq!(nav.records().count(), 0);
    }

    #[test]
    fn previous_reloads_saved_answers() {
        let dir = TempDir::new().expect("tempdir");
        let mut nav = navigator(&dir, None, JumpPolicy::Inspect);
        let mut state = nav.start(0);
        state.set_label(Label::Correct).expect("label");
        state.set_contextual_agreement(Agreement::Disagree).expect("agree");
        state.set_factors([Factor::A, Factor::J]).expect("factors");
        state.set_explanation(" odd wording ").expect("explain");
        nav.next(&mut state).expect("next");

        state.set_label(Label::Incorrect).expect("label");
        nav.previous(&mut state).expect("previous");
        assert_eq!(state.loaded_item_id(), Some("1"));
        assert_eq!(state.buffer().contextual_explanation, "odd wording");
        assert_eq!(state.buffer().contextual_factors.len(), 2);
    }

    #[test]
    fn sync_failure_still_moves() {
        let dir = TempDir::new().expect("tempdir");
        let store = MemoryStore::new();
        store.fail_next(SyncError::Unavailable("offline".into()));
        let remote = RemoteSync::new(Box::new(store.clone()), "annotations");
        let mut nav = navigator(&dir, Some(remote), JumpPolicy::Inspect);
        let mut state = nav.start(0);
        state.set_label(Label::Incorrect).expect("label");

        let outcome = nav.next(&mut state).expect("next");
        assert_eq!(state.cursor(), 1);
        let sync = outcome.saved.expect("saved").sync;
        assert!(sync.is_failure());
        assert!(store.content("annotations/halil.csv").is_none());

        store.fail_next(SyncError::Unavailable("still offline".into()));
        let err = nav.push_snapshot().unwrap_err();
        assert!(matches!(err, NavError::Sync(_)));
        assert!(!err.is_fatal());

        assert!(matches!(
            nav.push_snapshot().expect("retry"),
            SyncStatus::Created { .. }
        ));
        assert!(store.content("annotations/halil.csv").is_some());
    }

    #[test]
    fn unusable_remote_fails_every_save() {
        let dir = TempDir::new().expect("tempdir");
        let mut nav = Navigator::open(
            dataset(5),
            ReviewerId::parse("halil").expect("valid"),
            SnapshotDir::new(dir.path().join("annotations"), Duration::from_millis(200)),
            Err(SyncError::Misconfigured("environment variable GITHUB_TOKEN is not set".into())),
            JumpPolicy::Inspect,
        )
        .expect("open");
        assert!(nav.remote().is_none());
        assert_eq!(nav.remote_error().map(SyncError::code), Some(ErrorCode::RemoteMisconfigured));

        let mut state = nav.start(0);
        for _ in 0..2 {
            state.set_label(Label::Incorrect).expect("label");
            let saved = nav.next(&mut state).expect("next").saved.expect("saved");
            assert!(saved.snapshot_path.exists());
            assert!(matches!(
                saved.sync,
                SyncStatus::Failed { ref code, .. } if code == "E5003"
            ));
        }
        assert_eq!(state.cursor(), 2);
        assert!(matches!(
            nav.push_snapshot(),
            Err(NavError::Sync(SyncError::Misconfigured(_)))
        ));
    }

    #[test]
    fn failed_write_leaves_records_and_order_untouched() {
        let dir = TempDir::new().expect("tempdir");
        let mut nav = navigator(&dir, None, JumpPolicy::Inspect);
        let mut state = nav.start(0);
        state.set_label(Label::Incorrect).expect("label");
        nav.next(&mut state).expect("save 1");
        state.set_label(Label::Incorrect).expect("label");
        nav.save(&mut state).expect("save 2");

        nav.jump_to(&mut state, "1").expect("jump");
        state.set_label(Label::Correct).expect("label");
        state.set_contextual_agreement(Agreement::Agree).expect("agree");

        let snapshots = dir.path().join("annotations");
        std::fs::remove_dir_all(&snapshots).expect("remove snapshot dir");
        std::fs::write(&snapshots, b"not a directory").expect("block snapshot dir");

        let err = nav.save(&mut state).unwrap_err();
        assert!(matches!(err, NavError::Snapshot(_)));
        assert!(err.is_fatal());
        let ids: Vec<&str> = nav.records().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(nav.saved_record("1").and_then(|r| r.label), Some(Label::Incorrect));

        std::fs::remove_file(&snapshots).expect("unblock");
        state.set_label(Label::Incorrect).expect("label");
        nav.save(&mut state).expect("save again");
        let ids: Vec<&str> = nav.records().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        let text = std::fs::read_to_string(nav.snapshot_path()).expect("snapshot");
        let on_disk: Vec<&str> = text
            .lines()
            .skip(1)
            .filter_map(|line| line.split(',').next())
            .collect();
        assert_eq!(on_disk, ids);
    }

    #[test]
    fn failed_first_save_leaves_no_record() {
        let dir = TempDir::new().expect("tempdir");
        let mut nav = navigator(&dir, None, JumpPolicy::Inspect);
        std::fs::write(dir.path().join("annotations"), b"").expect("block snapshot dir");
        let mut state = nav.start(0);
        state.set_label(Label::Incorrect).expect("label");

        assert!(nav.save(&mut state).is_err());
        assert_eq!(nav.records().count(), 0);
        assert!(nav.is_dirty(&state));
    }

    #[test]
    fn inspect_jump_discards_unsaved_edits() {
        let dir = TempDir::new().expect("tempdir");
        let mut nav = navigator(&dir, None, JumpPolicy::Inspect);
        let mut state = nav.start(0);
        state.set_label(Label::Correct).expect("label");

        let outcome = nav.jump_to(&mut state, "4").expect("jump");
        assert_eq!(state.cursor(), 3);
        assert!(outcome.discarded_edits);
        assert!(outcome.saved.is_none());
        assert_eq!(nav.records().count(), 0);

        nav.jump_to(&mut state, "1").expect("jump back");
        assert_eq!(state.buffer().label, None);
    }

    #[test]
    fn save_first_jump_validates() {
        let dir = TempDir::new().expect("tempdir");
        let mut nav = navigator(&dir, None, JumpPolicy::SaveFirst);
        let mut state = nav.start(0);
        assert!(nav.jump_to(&mut state, "3").is_err());
        assert_eq!(state.cursor(), 0);

        state.set_label(Label::Incorrect).expect("label");
        let outcome = nav.jump_to(&mut state, "3").expect("jump");
        assert!(outcome.saved.is_some());
        assert_eq!(state.cursor(), 2);
    }

    #[test]
    fn unknown_jump_target_keeps_cursor() {
        let dir = TempDir::new().expect("tempdir");
        let mut nav = navigator(&dir, None, JumpPolicy::Inspect);
        let mut state = nav.start(2);
        let err = nav.jump_to(&mut state, "nope").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ItemNotFound);
        assert_eq!(state.cursor(), 2);
    }

    #[test]
    fn jump_to_index_clamps() {
        let dir = TempDir::new().expect("tempdir");
        let mut nav = navigator(&dir, None, JumpPolicy::Inspect);
        let mut state = nav.start(0);
        nav.jump_to_index(&mut state, 42).expect("jump");
        assert_eq!(state.cursor(), 4);
    }

    #[test]
    fn save_reloads_normalized_record() {
        let dir = TempDir::new().expect("tempdir");
        let mut nav = navigator(&dir, None, JumpPolicy::Inspect);
        let mut state = nav.start(0);
        state.set_label(Label::Correct).expect("label");
        state.set_contextual_agreement(Agreement::Disagree).expect("agree");
        state.set_factors([Factor::B]).expect("factors");
        state.set_explanation("dropped").expect("explain");

        let report = nav.save(&mut state).expect("save");
        assert_eq!(report.record.contextual_explanation, "");
        assert_eq!(state.buffer().contextual_explanation, "");
        assert!(!nav.is_dirty(&state));
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn empty_dataset_is_idle() {
        let dir = TempDir::new().expect("tempdir");
        let mut nav = Navigator::open(
            Dataset::from_items(Vec::new()).expect("empty"),
            ReviewerId::parse("halil").expect("valid"),
            SnapshotDir::new(dir.path(), Duration::from_millis(200)),
            Ok(None),
            JumpPolicy::Inspect,
        )
        .expect("open");
        let mut state = nav.start(0);
        assert!(nav.current_item(&state).is_none());
        assert!(!nav.next(&mut state).expect("next").moved());
        assert!(matches!(
            nav.save(&mut state),
            Err(NavError::Session(SessionError::Idle))
        ));
    }
}
