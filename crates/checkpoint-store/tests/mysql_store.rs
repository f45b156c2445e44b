//! Live tests against a MySQL compatible server. Run with
//! `TEST_MYSQL_URL=mysql://root@127.0.0.1:3306/ cargo test -- --ignored`.

use checkpoint_model::{
    CheckpointStatus, CheckpointTarget, ChunkCheckpoint, ChunkCheckpointKey,
    ChunkCheckpointMerger, EngineCheckpoint, KvChecksum, StatusCheckpointMerger,
    TableCheckpointDiff, TableCheckpointMerger, TableDescriptor, TableInfo, TaskCheckpoint,
    WHOLE_TABLE_ENGINE_ID,
    source::{Chunk, SourceFileMeta, SourceType},
};
use checkpoint_store::{CheckpointError, CheckpointsDb, MySqlCheckpointsDb};
use std::collections::{BTreeMap, HashMap};

const T2: &str = "`db1`.`t2`";

fn url() -> String {
    std::env::var("TEST_MYSQL_URL").unwrap_or_else(|_| "mysql://root@127.0.0.1:3306/".into())
}

async fn fresh_store(schema: &str) -> MySqlCheckpointsDb {
    let store = MySqlCheckpointsDb::connect(&url(), schema).await.unwrap();
    store.remove_checkpoint(&CheckpointTarget::All).await.unwrap();
    store
}

fn task() -> TaskCheckpoint {
    TaskCheckpoint {
        task_id: 123,
        source_dir: "/data".into(),
        backend: "local".into(),
        importer_addr: "127.0.0.1:8287".into(),
        tidb_host: "127.0.0.1".into(),
        tidb_port: 4000,
        pd_addr: "127.0.0.1:2379".into(),
        sorted_kv_dir: "/tmp/sorted-kv".into(),
        tool_version: "v1.0.0".into(),
    }
}

fn t2() -> TableDescriptor {
    TableDescriptor {
        schema: "db1".into(),
        name: "t2".into(),
        id: 2,
        desired: Some(TableInfo(serde_json::json!({ "name": "t2" }))),
    }
}

fn t2_engines() -> BTreeMap<i32, EngineCheckpoint> {
    let chunk = ChunkCheckpoint {
        key: ChunkCheckpointKey::new("/tmp/path/1.sql", 0),
        file_meta: SourceFileMeta {
            path: "/tmp/path/1.sql".into(),
            source_type: SourceType::Sql,
            file_size: 456,
            ..Default::default()
        },
        chunk: Chunk {
            offset: 0,
            real_offset: 0,
            end_offset: 102400,
            prev_row_id_max: 1,
            row_id_max: 5000,
        },
        timestamp: 1555555555,
        ..Default::default()
    };
    let mut engines = BTreeMap::new();
    engines.insert(
        0,
        EngineCheckpoint {
            status: CheckpointStatus::LOADED,
            chunks: vec![chunk],
        },
    );
    engines.insert(
        WHOLE_TABLE_ENGINE_ID,
        EngineCheckpoint::new(CheckpointStatus::LOADED),
    );
    engines
}

#[tokio::test]
#[ignore = "needs a MySQL server at TEST_MYSQL_URL"]
async fn round_trips_table_progress() {
    let store = fresh_store("checkpoint_it_progress").await;
    store.initialize(&task(), &[t2()]).await.unwrap();
    store.insert_engine_checkpoints(T2, &t2_engines()).await.unwrap();

    let mut diff = TableCheckpointDiff::new();
    StatusCheckpointMerger::new(0, CheckpointStatus::IMPORTED).merge_into(&mut diff);
    StatusCheckpointMerger::for_table(CheckpointStatus::ALL_WRITTEN).merge_into(&mut diff);
    ChunkCheckpointMerger {
        engine_id: 0,
        key: ChunkCheckpointKey::new("/tmp/path/1.sql", 0),
        checksum: KvChecksum::new(4491, 586, 486070148917),
        pos: 55904,
        real_pos: 55902,
        row_id: 681,
        column_permutation: Some(vec![]),
    }
    .merge_into(&mut diff);
    let mut diffs = HashMap::new();
    diffs.insert(T2.to_string(), diff);
    store.update(&diffs).await.unwrap();

    let cp = store.get(T2).await.unwrap();
    assert_eq!(cp.status, CheckpointStatus::ALL_WRITTEN);
    assert_eq!(cp.engines[&0].status, CheckpointStatus::IMPORTED);
    assert_eq!(cp.engines[&WHOLE_TABLE_ENGINE_ID].status, CheckpointStatus::LOADED);
    assert_eq!(cp.engines[&0].chunks[0].chunk.offset, 55904);
    assert_eq!(cp.engines[&0].chunks[0].column_permutation, Some(vec![]));
    assert_eq!(store.task_checkpoint().await.unwrap(), Some(task()));

    store.close().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a MySQL server at TEST_MYSQL_URL"]
async fn changed_table_info_is_rejected() {
    let store = fresh_store("checkpoint_it_mismatch").await;
    store.initialize(&task(), &[t2()]).await.unwrap();

    let mut changed = t2();
    changed.desired = Some(TableInfo(serde_json::json!({ "name": "t2", "v": 2 })));
    let err = store.initialize(&task(), &[changed]).await.unwrap_err();
    assert!(matches!(err, CheckpointError::TableInfoMismatch(_)));

    store.close().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a MySQL server at TEST_MYSQL_URL"]
async fn destroy_and_remove() {
    let store = fresh_store("checkpoint_it_destroy").await;
    store.initialize(&task(), &[t2()]).await.unwrap();
    store.insert_engine_checkpoints(T2, &t2_engines()).await.unwrap();

    let mut failed = StatusCheckpointMerger::new(0, CheckpointStatus::CLOSED);
    failed.set_invalid();
    let mut diff = TableCheckpointDiff::new();
    failed.merge_into(&mut diff);
    let mut diffs = HashMap::new();
    diffs.insert(T2.to_string(), diff);
    store.update(&diffs).await.unwrap();

    let destroyed = store
        .destroy_error_checkpoint(&CheckpointTarget::All)
        .await
        .unwrap();
    assert_eq!(destroyed.len(), 1);
    assert_eq!(destroyed[0].min_engine_id, -1);
    assert_eq!(destroyed[0].max_engine_id, 0);
    assert!(store.get(T2).await.unwrap_err().is_not_found());

    store.remove_checkpoint(&CheckpointTarget::All).await.unwrap();
    assert!(store.get(T2).await.unwrap_err().is_not_found());
    store.close().await.unwrap();
    assert!(matches!(store.close().await, Err(CheckpointError::Closed)));
}

#[tokio::test]
#[ignore = "needs a MySQL server at TEST_MYSQL_URL"]
async fn rotation_never_merges_backups() {
    let store = fresh_store("checkpoint_it_rotate").await;
    let suffix = chrono::Utc::now().timestamp();
    store.initialize(&task(), &[t2()]).await.unwrap();
    store.move_checkpoints(suffix).await.unwrap();

    store.initialize(&task(), &[t2()]).await.unwrap();
    let err = store.move_checkpoints(suffix).await.unwrap_err();
    assert!(matches!(err, CheckpointError::BackupExists(_)));
    assert!(store.get(T2).await.is_ok());
    store.close().await.unwrap();
}
