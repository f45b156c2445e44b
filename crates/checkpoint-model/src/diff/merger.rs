use crate::{
    checkpoint::{chunk::ChunkCheckpointKey, engine::WHOLE_TABLE_ENGINE_ID},
    checksum::KvChecksum,
    diff::{AutoIdBases, ChunkCheckpointDiff, TableCheckpointDiff},
    status::CheckpointStatus,
};

/// A partial update that folds itself into a table's pending diff.
pub trait TableCheckpointMerger: Send + Sync {
    fn merge_into(&self, diff: &mut TableCheckpointDiff);
}

/// Moves an engine, or the whole table, to a new status.
///
/// `WHOLE_TABLE_ENGINE_ID` addresses the table row. A failed status reported
/// for an engine is recorded on the table as well, so recovery scoped by
/// table sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCheckpointMerger {
    pub engine_id: i32,
    pub status: CheckpointStatus,
}

impl StatusCheckpointMerger {
    pub fn new(engine_id: i32, status: CheckpointStatus) -> Self {
        Self { engine_id, status }
    }

    pub fn for_table(status: CheckpointStatus) -> Self {
        Self::new(WHOLE_TABLE_ENGINE_ID, status)
    }

    /// Turns the reported status into the failure of its phase.
    pub fn set_invalid(&mut self) {
        self.status = self.status.into_failed();
    }
}

impl TableCheckpointMerger for StatusCheckpointMerger {
    fn merge_into(&self, diff: &mut TableCheckpointDiff) {
        if self.engine_id == WHOLE_TABLE_ENGINE_ID || self.status.is_error() {
            diff.set_status(self.status);
        }
        if self.engine_id != WHOLE_TABLE_ENGINE_ID {
            diff.engine_mut(self.engine_id).status = Some(self.status);
        }
    }
}

/// Raises the auto-id allocator bases; never lowers them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebaseCheckpointMerger {
    pub auto_rand_base: i64,
    pub auto_incr_base: i64,
    pub auto_row_id_base: i64,
}

impl TableCheckpointMerger for RebaseCheckpointMerger {
    fn merge_into(&self, diff: &mut TableCheckpointDiff) {
        diff.rebase_to(AutoIdBases {
            auto_rand_base: self.auto_rand_base,
            auto_incr_base: self.auto_incr_base,
            auto_row_id_base: self.auto_row_id_base,
        });
    }
}

/// Table-level checksum, already aggregated by the caller. Replaces any
/// pending value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableChecksumMerger {
    pub checksum: KvChecksum,
}

impl TableCheckpointMerger for TableChecksumMerger {
    fn merge_into(&self, diff: &mut TableCheckpointDiff) {
        diff.set_checksum(self.checksum);
    }
}

/// Progress of one chunk. The reported checksum is the chunk's running
/// total, so a newer report for the same key replaces the pending one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkCheckpointMerger {
    pub engine_id: i32,
    pub key: ChunkCheckpointKey,
    pub checksum: KvChecksum,
    pub pos: i64,
    pub real_pos: i64,
    pub row_id: i64,
    pub column_permutation: Option<Vec<i32>>,
}

impl TableCheckpointMerger for ChunkCheckpointMerger {
    fn merge_into(&self, diff: &mut TableCheckpointDiff) {
        diff.engine_mut(self.engine_id).chunks.insert(
            self.key.clone(),
            ChunkCheckpointDiff {
                pos: self.pos,
                real_pos: self.real_pos,
                row_id: self.row_id,
                checksum: self.checksum,
                column_permutation: self.column_permutation.clone(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::CheckpointPhase;

    #[test]
    fn status_last_write_wins_per_engine() {
        let mut diff = TableCheckpointDiff::new();
        StatusCheckpointMerger::new(0, CheckpointStatus::CLOSED).merge_into(&mut diff);
        StatusCheckpointMerger::new(0, CheckpointStatus::IMPORTED).merge_into(&mut diff);
        StatusCheckpointMerger::new(1, CheckpointStatus::ALL_WRITTEN).merge_into(&mut diff);

        assert_eq!(
            diff.engine(0).and_then(|e| e.status),
            Some(CheckpointStatus::IMPORTED)
        );
        assert_eq!(
            diff.engine(1).and_then(|e| e.status),
            Some(CheckpointStatus::ALL_WRITTEN)
        );
        assert_eq!(diff.status(), None);
    }

    #[test]
    fn whole_table_status_targets_table_only() {
        let mut diff = TableCheckpointDiff::new();
        StatusCheckpointMerger::for_table(CheckpointStatus::ALL_WRITTEN).merge_into(&mut diff);

        assert_eq!(diff.status(), Some(CheckpointStatus::ALL_WRITTEN));
        assert!(diff.engine(WHOLE_TABLE_ENGINE_ID).is_none());
    }

    #[test]
    fn failed_engine_status_marks_table() {
        let mut merger = StatusCheckpointMerger::new(3, CheckpointStatus::IMPORTED);
        merger.set_invalid();
        let mut diff = TableCheckpointDiff::new();
        merger.merge_into(&mut diff);

        let failed = CheckpointStatus::Failed(CheckpointPhase::Imported);
        assert_eq!(diff.status(), Some(failed));
        assert_eq!(diff.engine(3).and_then(|e| e.status), Some(failed));
    }

    #[test]
    fn rebase_keeps_maximum_per_field() {
        let mut diff = TableCheckpointDiff::new();
        RebaseCheckpointMerger {
            auto_rand_base: 10,
            auto_incr_base: 500,
            auto_row_id_base: 7,
        }
        .merge_into(&mut diff);
        RebaseCheckpointMerger {
            auto_rand_base: 20,
            auto_incr_base: 100,
            auto_row_id_base: 7,
        }
        .merge_into(&mut diff);

        assert_eq!(
            diff.rebase(),
            Some(AutoIdBases {
                auto_rand_base: 20,
                auto_incr_base: 500,
                auto_row_id_base: 7,
            })
        );
    }

    #[test]
    fn table_checksum_replaces() {
        let mut diff = TableCheckpointDiff::new();
        TableChecksumMerger {
            checksum: KvChecksum::new(1, 1, 1),
        }
        .merge_into(&mut diff);
        TableChecksumMerger {
            checksum: KvChecksum::new(5, 6, 7),
        }
        .merge_into(&mut diff);

        assert_eq!(diff.checksum(), Some(KvChecksum::new(5, 6, 7)));
    }

    #[test]
    fn chunk_report_replaces_pending_entry() {
        let key = ChunkCheckpointKey::new("/tmp/path/1.sql", 0);
        let mut diff = TableCheckpointDiff::new();
        ChunkCheckpointMerger {
            engine_id: 0,
            key: key.clone(),
            checksum: KvChecksum::new(10, 1, 3),
            pos: 100,
            real_pos: 90,
            row_id: 5,
            column_permutation: None,
        }
        .merge_into(&mut diff);
        ChunkCheckpointMerger {
            engine_id: 0,
            key: key.clone(),
            checksum: KvChecksum::new(20, 2, 9),
            pos: 200,
            real_pos: 180,
            row_id: 9,
            column_permutation: Some(vec![]),
        }
        .merge_into(&mut diff);

        assert_eq!(diff.chunk_count(), 1);
        let pending = &diff.engine(0).unwrap().chunks[&key];
        assert_eq!(pending.pos, 200);
        assert_eq!(pending.real_pos, 180);
        assert_eq!(pending.row_id, 9);
        assert_eq!(pending.checksum, KvChecksum::new(20, 2, 9));
        assert_eq!(pending.column_permutation, Some(vec![]));
    }

    #[test]
    fn empty_diff_reports_empty() {
        let mut diff = TableCheckpointDiff::new();
        assert!(diff.is_empty());
        TableChecksumMerger::default().merge_into(&mut diff);
        assert!(!diff.is_empty());
    }
}
