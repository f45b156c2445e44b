//! Embedded checkpoint store backed by sled.
//!
//! Each relation is a sled tree named `<schema>/<relation>`. Values are
//! bincode encoded rows. Multi-row operations run inside sled transactions
//! spanning every tree they touch; the async gate keeps readers from
//! observing a store that a writer is halfway through scanning and rewriting.

pub mod keys;


use crate::{
    db::CheckpointsDb,
    dump,
    error::CheckpointError,
    rows::{self, ChunkRow, EngineRow, TableRow, TaskRow, unix_now},
    schema::{CURRENT_SCHEMA_VERSION, CheckpointTables},
};
use async_trait::async_trait;
use checkpoint_model::{
    CheckpointStatus, CheckpointTarget, DestroyedTableCheckpoint, EngineCheckpoint,
    TableCheckpoint, TableCheckpointDiff, TableDescriptor, TaskCheckpoint,
    WHOLE_TABLE_ENGINE_ID,
};
use keys::{TASK_KEY, VERSION_KEY, chunk_key, engine_key, table_key, table_prefix};
use serde::{Serialize, de::DeserializeOwned};
use sled::{
    Transactional, Tree,
    transaction::{ConflictableTransactionError, TransactionError, TransactionResult},
};
use std::{
    collections::{BTreeMap, HashMap},
    io::Write,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

type TxResult<T> = Result<T, ConflictableTransactionError<CheckpointError>>;

struct Trees {
    task: Tree,
    table: Tree,
    engine: Tree,
    chunk: Tree,
}

impl Trees {
    fn open(db: &sled::Db, schema: &str, tables: &CheckpointTables) -> Result<Self, sled::Error> {
        let open = |name: &str| db.open_tree(format!("{schema}/{name}"));
        Ok(Self {
            task: open(&tables.task)?,
            table: open(&tables.table)?,
            engine: open(&tables.engine)?,
            chunk: open(&tables.chunk)?,
        })
    }
}

pub struct SledCheckpointsDb {
    db: sled::Db,
    schema: String,
    tables: CheckpointTables,
    trees: Trees,
    gate: RwLock<()>,
    closed: AtomicBool,
}

impl SledCheckpointsDb {
    /// Opens (or creates) the store under `path`. A store written with a
    /// different schema version is refused.
    pub fn open(path: impl AsRef<Path>, schema: &str) -> Result<Self, CheckpointError> {
        let path = path.as_ref();
        let bootstrap = |reason: String| CheckpointError::SchemaBootstrap {
            schema: schema.to_string(),
            reason,
        };

        let db = sled::open(path).map_err(|e| bootstrap(format!("{}: {e}", path.display())))?;
        let meta = db
            .open_tree(format!("{schema}/meta"))
            .map_err(|e| bootstrap(e.to_string()))?;
        let tables = match meta.get(VERSION_KEY)? {
            Some(bytes) => CheckpointTables::for_version(bincode::deserialize(&bytes)?)?,
            None => {
                meta.insert(VERSION_KEY, bincode::serialize(&CURRENT_SCHEMA_VERSION)?)?;
                CheckpointTables::current()
            }
        };

        let trees = Trees::open(&db, schema, &tables).map_err(|e| bootstrap(e.to_string()))?;

        info!(
            schema,
            path = %path.display(),
            version = tables.version,
            "Opened file checkpoint store"
        );

        Ok(Self {
            db,
            schema: schema.to_string(),
            tables,
            trees,
            gate: RwLock::new(()),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), CheckpointError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CheckpointError::Closed);
        }
        Ok(())
    }

    async fn read_gate(&self) -> Result<RwLockReadGuard<'_, ()>, CheckpointError> {
        let guard = self.gate.read().await;
        self.ensure_open()?;
        Ok(guard)
    }

    /// The closed flag is checked after the gate is taken, so an operation
    /// queued behind `close` never touches the flushed store.
    async fn write_gate(&self) -> Result<RwLockWriteGuard<'_, ()>, CheckpointError> {
        let guard = self.gate.write().await;
        self.ensure_open()?;
        Ok(guard)
    }

    /// Table rows addressed by `target`, in name order.
    fn table_rows(&self, target: &CheckpointTarget) -> Result<Vec<TableRow>, CheckpointError> {
        match target {
            CheckpointTarget::All => scan(&self.trees.table, b""),
            CheckpointTarget::Table(name) => match self.trees.table.get(table_key(name))? {
                Some(bytes) => Ok(vec![decode(&bytes)?]),
                None => Ok(Vec::new()),
            },
        }
    }

    fn engine_prefix(target: &CheckpointTarget) -> Vec<u8> {
        match target {
            CheckpointTarget::All => Vec::new(),
            CheckpointTarget::Table(name) => table_prefix(name),
        }
    }

    /// Deletes chunk, engine and table rows of the given tables in one
    /// transaction.
    fn delete_tables<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), CheckpointError> {
        let mut chunk_keys = Vec::new();
        let mut engine_keys = Vec::new();
        let mut table_keys = Vec::new();
        for name in names {
            let prefix = table_prefix(name);
            chunk_keys.extend(scan_keys(&self.trees.chunk, &prefix)?);
            engine_keys.extend(scan_keys(&self.trees.engine, &prefix)?);
            table_keys.push(table_key(name));
        }

        finish(
            (&self.trees.chunk, &self.trees.engine, &self.trees.table).transaction(
                |(chunk_tx, engine_tx, table_tx)| {
                    for key in &chunk_keys {
                        chunk_tx.remove(key.as_slice())?;
                    }
                    for key in &engine_keys {
                        engine_tx.remove(key.as_slice())?;
                    }
                    for key in &table_keys {
                        table_tx.remove(key.as_slice())?;
                    }
                    Ok(())
                },
            ),
        )
    }
}

#[async_trait]
impl CheckpointsDb for SledCheckpointsDb {
    async fn initialize(
        &self,
        task: &TaskCheckpoint,
        tables: &[TableDescriptor],
    ) -> Result<(), CheckpointError> {
        let _guard = self.write_gate().await?;

        let now = unix_now();
        let task_row = bincode::serialize(&TaskRow {
            task: task.clone(),
            create_time: now,
            update_time: now,
        })?;
        let table_rows = tables
            .iter()
            .map(|t| {
                let row = TableRow::new(task.task_id, t, now)?;
                let bytes = bincode::serialize(&row)?;
                Ok((row, bytes))
            })
            .collect::<Result<Vec<_>, CheckpointError>>()?;

        finish(
            (&self.trees.task, &self.trees.table).transaction(|(task_tx, table_tx)| {
                task_tx.insert(TASK_KEY, task_row.as_slice())?;
                for (row, bytes) in &table_rows {
                    let key = table_key(&row.table_name);
                    if let Some(existing) = table_tx.get(&key)? {
                        let existing: TableRow = tx_decode(&existing)?;
                        if existing.hash != row.hash {
                            return Err(abort(CheckpointError::TableInfoMismatch(
                                row.table_name.clone(),
                            )));
                        }
                        continue;
                    }
                    table_tx.insert(key, bytes.as_slice())?;
                }
                Ok(())
            }),
        )?;

        info!(
            schema = %self.schema,
            task_id = task.task_id,
            tables = tables.len(),
            "Initialized checkpoints"
        );
        Ok(())
    }

    async fn task_checkpoint(&self) -> Result<Option<TaskCheckpoint>, CheckpointError> {
        let _guard = self.read_gate().await?;
        match self.trees.task.get(TASK_KEY)? {
            Some(bytes) => Ok(Some(decode::<TaskRow>(&bytes)?.task)),
            None => Ok(None),
        }
    }

    async fn get(&self, table_name: &str) -> Result<TableCheckpoint, CheckpointError> {
        let _guard = self.read_gate().await?;

        let prefix = table_prefix(table_name);
        let engines: Vec<EngineRow> = scan(&self.trees.engine, &prefix)?;
        let chunks: Vec<ChunkRow> = scan(&self.trees.chunk, &prefix)?;
        let table: TableRow = match self.trees.table.get(table_key(table_name))? {
            Some(bytes) => decode(&bytes)?,
            None => return Err(CheckpointError::NotFound(table_name.to_string())),
        };

        debug!(
            table = table_name,
            engines = engines.len(),
            chunks = chunks.len(),
            "Loaded checkpoint"
        );
        rows::assemble(table, engines, chunks)
    }

    async fn insert_engine_checkpoints(
        &self,
        table_name: &str,
        engines: &BTreeMap<i32, EngineCheckpoint>,
    ) -> Result<(), CheckpointError> {
        let _guard = self.write_gate().await?;

        let (engine_rows, chunk_rows) = rows::engine_rows(table_name, engines, unix_now())?;
        let engine_entries = engine_rows
            .iter()
            .map(|r| Ok((engine_key(table_name, r.engine_id), bincode::serialize(r)?)))
            .collect::<Result<Vec<_>, CheckpointError>>()?;
        let chunk_entries = chunk_rows
            .iter()
            .map(|r| {
                Ok((
                    chunk_key(table_name, r.engine_id, &r.key()),
                    bincode::serialize(r)?,
                ))
            })
            .collect::<Result<Vec<_>, CheckpointError>>()?;

        finish(
            (&self.trees.engine, &self.trees.chunk).transaction(|(engine_tx, chunk_tx)| {
                for (key, value) in &engine_entries {
                    engine_tx.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, value) in &chunk_entries {
                    chunk_tx.insert(key.as_slice(), value.as_slice())?;
                }
                Ok(())
            }),
        )?;

        debug!(
            table = table_name,
            engines = engine_entries.len(),
            chunks = chunk_entries.len(),
            "Inserted engine checkpoints"
        );
        Ok(())
    }

    async fn update(
        &self,
        diffs: &HashMap<String, TableCheckpointDiff>,
    ) -> Result<(), CheckpointError> {
        if diffs.is_empty() {
            return self.ensure_open();
        }
        let _guard = self.write_gate().await?;
        let now = unix_now();

        finish(
            (&self.trees.table, &self.trees.engine, &self.trees.chunk).transaction(
                |(table_tx, engine_tx, chunk_tx)| {
                    for (table_name, diff) in diffs {
                        for (engine_id, key, chunk_diff) in diff.chunks() {
                            let key = chunk_key(table_name, engine_id, key);
                            if let Some(bytes) = chunk_tx.get(&key)? {
                                let mut row: ChunkRow = tx_decode(&bytes)?;
                                row.apply(chunk_diff, now).map_err(abort)?;
                                chunk_tx.insert(key, tx_encode(&row)?)?;
                            }
                        }

                        let key = table_key(table_name);
                        let mut table_row = match table_tx.get(&key)? {
                            Some(bytes) => Some(tx_decode::<TableRow>(&bytes)?),
                            None => None,
                        };

                        if let (Some(row), Some(bases)) = (table_row.as_mut(), diff.rebase()) {
                            row.auto_rand_base = row.auto_rand_base.max(bases.auto_rand_base);
                            row.auto_incr_base = row.auto_incr_base.max(bases.auto_incr_base);
                            row.auto_row_id_base =
                                row.auto_row_id_base.max(bases.auto_row_id_base);
                        }

                        for (engine_id, engine_diff) in diff.engines() {
                            let Some(status) = engine_diff.status else {
                                continue;
                            };
                            let key = engine_key(table_name, *engine_id);
                            if let Some(bytes) = engine_tx.get(&key)? {
                                let mut row: EngineRow = tx_decode(&bytes)?;
                                note_transition(table_name, *engine_id, row.status, status);
                                row.status = status.code();
                                row.update_time = now;
                                engine_tx.insert(key, tx_encode(&row)?)?;
                            }
                        }

                        if let Some(mut row) = table_row {
                            if let Some(status) = diff.status() {
                                note_transition(
                                    table_name,
                                    WHOLE_TABLE_ENGINE_ID,
                                    row.status,
                                    status,
                                );
                                row.status = status.code();
                            }
                            if let Some(checksum) = diff.checksum() {
                                row.set_checksum(checksum);
                            }
                            row.update_time = now;
                            table_tx.insert(key, tx_encode(&row)?)?;
                        }
                    }
                    Ok(())
                },
            ),
        )?;

        debug!(tables = diffs.len(), "Applied checkpoint diffs");
        Ok(())
    }

    async fn remove_checkpoint(&self, target: &CheckpointTarget) -> Result<(), CheckpointError> {
        let _guard = self.write_gate().await?;

        match target {
            CheckpointTarget::All => {
                let chunk_keys = scan_keys(&self.trees.chunk, b"")?;
                let engine_keys = scan_keys(&self.trees.engine, b"")?;
                let table_keys = scan_keys(&self.trees.table, b"")?;
                finish(
                    (
                        &self.trees.chunk,
                        &self.trees.engine,
                        &self.trees.table,
                        &self.trees.task,
                    )
                        .transaction(|(chunk_tx, engine_tx, table_tx, task_tx)| {
                            for key in &chunk_keys {
                                chunk_tx.remove(key.as_slice())?;
                            }
                            for key in &engine_keys {
                                engine_tx.remove(key.as_slice())?;
                            }
                            for key in &table_keys {
                                table_tx.remove(key.as_slice())?;
                            }
                            task_tx.remove(TASK_KEY)?;
                            Ok(())
                        }),
                )?;
            }
            CheckpointTarget::Table(name) => self.delete_tables([name.as_str()])?,
        }

        info!(schema = %self.schema, target = %target, "Removed checkpoints");
        Ok(())
    }

    async fn ignore_error_checkpoint(
        &self,
        target: &CheckpointTarget,
    ) -> Result<(), CheckpointError> {
        let _guard = self.write_gate().await?;
        let now = unix_now();
        let loaded = CheckpointStatus::LOADED.code();

        let mut engine_entries = Vec::new();
        for mut row in scan::<EngineRow>(&self.trees.engine, &Self::engine_prefix(target))? {
            if CheckpointStatus::is_failed_code(row.status) {
                row.status = loaded;
                row.update_time = now;
                let key = engine_key(&row.table_name, row.engine_id);
                engine_entries.push((key, bincode::serialize(&row)?));
            }
        }
        let mut table_entries = Vec::new();
        for mut row in self.table_rows(target)? {
            if CheckpointStatus::is_failed_code(row.status) {
                row.status = loaded;
                row.update_time = now;
                table_entries.push((table_key(&row.table_name), bincode::serialize(&row)?));
            }
        }

        finish(
            (&self.trees.engine, &self.trees.table).transaction(|(engine_tx, table_tx)| {
                for (key, value) in &engine_entries {
                    engine_tx.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, value) in &table_entries {
                    table_tx.insert(key.as_slice(), value.as_slice())?;
                }
                Ok(())
            }),
        )?;

        info!(
            target = %target,
            engines = engine_entries.len(),
            tables = table_entries.len(),
            "Reset failed checkpoints"
        );
        Ok(())
    }

    async fn destroy_error_checkpoint(
        &self,
        target: &CheckpointTarget,
    ) -> Result<Vec<DestroyedTableCheckpoint>, CheckpointError> {
        let _guard = self.write_gate().await?;

        let mut destroyed = Vec::new();
        for table in self.table_rows(target)? {
            let engines: Vec<EngineRow> =
                scan(&self.trees.engine, &table_prefix(&table.table_name))?;
            let failed = CheckpointStatus::is_failed_code(table.status)
                || engines
                    .iter()
                    .any(|e| CheckpointStatus::is_failed_code(e.status));
            if !failed {
                continue;
            }
            destroyed.push(DestroyedTableCheckpoint {
                min_engine_id: engines.iter().map(|e| e.engine_id).min().unwrap_or(0),
                max_engine_id: engines.iter().map(|e| e.engine_id).max().unwrap_or(-1),
                table_name: table.table_name,
            });
        }

        self.delete_tables(destroyed.iter().map(|d| d.table_name.as_str()))?;

        info!(target = %target, tables = destroyed.len(), "Destroyed failed checkpoints");
        Ok(destroyed)
    }

    async fn dump_tables(&self, out: &mut (dyn Write + Send)) -> Result<(), CheckpointError> {
        let _guard = self.read_gate().await?;
        let rows: Vec<TableRow> = scan(&self.trees.table, b"")?;
        dump::write_tables(out, &rows)
    }

    async fn dump_engines(&self, out: &mut (dyn Write + Send)) -> Result<(), CheckpointError> {
        let _guard = self.read_gate().await?;
        let rows: Vec<EngineRow> = scan(&self.trees.engine, b"")?;
        dump::write_engines(out, &rows)
    }

    async fn dump_chunks(&self, out: &mut (dyn Write + Send)) -> Result<(), CheckpointError> {
        let _guard = self.read_gate().await?;
        let rows: Vec<ChunkRow> = scan(&self.trees.chunk, b"")?;
        dump::write_chunks(out, &rows)
    }

    async fn move_checkpoints(&self, suffix: i64) -> Result<(), CheckpointError> {
        let _guard = self.write_gate().await?;

        let backup_schema = format!("{}.{suffix}.bak", self.schema);
        let backup = Trees::open(&self.db, &backup_schema, &self.tables)?;
        if [&backup.chunk, &backup.engine, &backup.table, &backup.task]
            .iter()
            .any(|tree| !tree.is_empty())
        {
            return Err(CheckpointError::BackupExists(backup_schema));
        }
        self.db
            .open_tree(format!("{backup_schema}/meta"))?
            .insert(VERSION_KEY, bincode::serialize(&self.tables.version)?)?;

        let chunks = entries(&self.trees.chunk)?;
        let engines = entries(&self.trees.engine)?;
        let tables = entries(&self.trees.table)?;
        let tasks = entries(&self.trees.task)?;

        finish(
            (
                &self.trees.chunk,
                &self.trees.engine,
                &self.trees.table,
                &self.trees.task,
                &backup.chunk,
                &backup.engine,
                &backup.table,
                &backup.task,
            )
                .transaction(|(chunk, engine, table, task, b_chunk, b_engine, b_table, b_task)| {
                    for (src, dst, rows) in [
                        (chunk, b_chunk, &chunks),
                        (engine, b_engine, &engines),
                        (table, b_table, &tables),
                        (task, b_task, &tasks),
                    ] {
                        for (key, value) in rows {
                            dst.insert(key.as_slice(), value.as_slice())?;
                            src.remove(key.as_slice())?;
                        }
                    }
                    Ok(())
                }),
        )?;
        self.db.flush_async().await?;

        info!(
            schema = %self.schema,
            backup = %backup_schema,
            tables = tables.len(),
            "Moved checkpoints to backup"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), CheckpointError> {
        // In-flight operations finish first; anything queued behind the gate
        // sees the flag and fails.
        let _guard = self.gate.write().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(CheckpointError::Closed);
        }
        self.db.flush_async().await?;
        info!(schema = %self.schema, "Closed file checkpoint store");
        Ok(())
    }
}

/// Statuses are written as given; a move the state machine does not allow
/// is only reported.
fn note_transition(table: &str, engine_id: i32, stored: u8, next: CheckpointStatus) {
    if let Ok(current) = CheckpointStatus::from_code(stored) {
        if !current.can_transition_to(next) {
            debug!(
                table,
                engine_id,
                from = %current,
                to = %next,
                "Checkpoint status moved backwards"
            );
        }
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CheckpointError> {
    Ok(bincode::deserialize(bytes)?)
}

fn scan<T: DeserializeOwned>(tree: &Tree, prefix: &[u8]) -> Result<Vec<T>, CheckpointError> {
    let mut rows = Vec::new();
    for item in tree.scan_prefix(prefix) {
        let (_key, value) = item?;
        rows.push(decode(&value)?);
    }
    Ok(rows)
}

fn scan_keys(tree: &Tree, prefix: &[u8]) -> Result<Vec<Vec<u8>>, CheckpointError> {
    let mut keys = Vec::new();
    for item in tree.scan_prefix(prefix) {
        let (key, _value) = item?;
        keys.push(key.to_vec());
    }
    Ok(keys)
}

fn entries(tree: &Tree) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CheckpointError> {
    let mut out = Vec::new();
    for item in tree.iter() {
        let (key, value) = item?;
        out.push((key.to_vec(), value.to_vec()));
    }
    Ok(out)
}

fn abort(err: CheckpointError) -> ConflictableTransactionError<CheckpointError> {
    ConflictableTransactionError::Abort(err)
}

fn tx_decode<T: DeserializeOwned>(bytes: &[u8]) -> TxResult<T> {
    bincode::deserialize(bytes).map_err(|e| abort(e.into()))
}

fn tx_encode<T: Serialize>(value: &T) -> TxResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| abort(e.into()))
}

fn finish<T>(result: TransactionResult<T, CheckpointError>) -> Result<T, CheckpointError> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(e.into()),
    }
}
