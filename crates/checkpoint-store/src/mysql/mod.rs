//! Checkpoint store kept in a MySQL compatible server.

pub mod sql;

use crate::{
    db::CheckpointsDb,
    dump,
    error::CheckpointError,
    rows::{self, ChunkRow, EngineRow, TableRow, unix_now},
    schema::{self, CheckpointTables},
};
use async_trait::async_trait;
use checkpoint_model::{
    CheckpointStatus, CheckpointTarget, DestroyedTableCheckpoint, EngineCheckpoint,
    TableCheckpoint, TableCheckpointDiff, TableDescriptor, TaskCheckpoint,
};
use mysql_async::{
    Conn, Opts, Params, Pool, Row, Transaction, TxOpts, Value, prelude::*,
};
use sql::CheckpointSql;
use std::{
    collections::{BTreeMap, HashMap},
    io::Write,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const ER_BAD_DB_ERROR: u16 = 1049;
const ER_BAD_NULL_ERROR: u16 = 1048;
const ER_NO_SUCH_TABLE: u16 = 1146;
const ER_TABLE_EXISTS_ERROR: u16 = 1050;

pub struct MySqlCheckpointsDb {
    pool: Mutex<Option<Pool>>,
    schema: String,
    sql: CheckpointSql,
}

impl MySqlCheckpointsDb {
    /// Connects to `url` and makes sure the checkpoint schema exists. No store
    /// is returned when the schema cannot be created.
    pub async fn connect(url: &str, schema: &str) -> Result<Self, CheckpointError> {
        let opts = Opts::from_url(url).map_err(|e| CheckpointError::InvalidConfig(e.to_string()))?;
        let store = Self {
            pool: Mutex::new(Some(Pool::new(opts))),
            schema: schema.to_string(),
            sql: CheckpointSql::new(schema, &CheckpointTables::current()),
        };

        let bootstrap = async {
            let mut conn = store.pool().await?.get_conn().await?;
            store.ensure_schema(&mut conn).await
        };
        match bootstrap.await {
            Ok(()) => {}
            Err(CheckpointError::MySql(e)) => {
                store.disconnect().await;
                return Err(CheckpointError::SchemaBootstrap {
                    schema: schema.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                store.disconnect().await;
                return Err(e);
            }
        }

        info!(schema, "Connected to MySQL checkpoint store");
        Ok(store)
    }

    async fn pool(&self) -> Result<Pool, CheckpointError> {
        self.pool.lock().await.clone().ok_or(CheckpointError::Closed)
    }

    async fn disconnect(&self) {
        let pool = self.pool.lock().await.take();
        if let Some(pool) = pool {
            if let Err(e) = pool.disconnect().await {
                warn!(error = %e, "Failed to disconnect checkpoint pool");
            }
        }
    }

    async fn begin(&self) -> Result<Transaction<'static>, CheckpointError> {
        Ok(self.pool().await?.start_transaction(TxOpts::default()).await?)
    }

    async fn ensure_schema(&self, conn: &mut Conn) -> Result<(), CheckpointError> {
        conn.query_drop(self.sql.create_schema()).await?;
        let existing: Vec<String> = conn.query(self.sql.show_tables()).await?;
        schema::check_existing(&self.schema, existing.iter().map(String::as_str))?;
        for statement in self.sql.create_tables()? {
            conn.query_drop(statement).await?;
        }
        debug!(schema = %self.schema, "Checkpoint schema ready");
        Ok(())
    }

    async fn initialize_in(
        &self,
        tx: &mut Transaction<'_>,
        task: &TaskCheckpoint,
        tables: &[TableDescriptor],
    ) -> Result<(), CheckpointError> {
        tx.exec_drop(
            self.sql.replace_task(),
            (
                task.task_id,
                task.source_dir.as_str(),
                task.backend.as_str(),
                task.importer_addr.as_str(),
                task.tidb_host.as_str(),
                task.tidb_port,
                task.pd_addr.as_str(),
                task.sorted_kv_dir.as_str(),
                task.tool_version.as_str(),
            ),
        )
        .await?;

        let stmt = tx.prep(self.sql.insert_table()).await?;
        for table in tables {
            let name = table.unique_name();
            let (info, hash) = table.encoded_info()?;
            tx.exec_drop(&stmt, (task.task_id, name.as_str(), hash.to_vec(), table.id, info))
                .await
                .map_err(|e| match server_code(&e) {
                    Some(ER_BAD_NULL_ERROR) => CheckpointError::TableInfoMismatch(name.clone()),
                    _ => e.into(),
                })?;
        }
        Ok(())
    }

    async fn get_in(
        &self,
        tx: &mut Transaction<'_>,
        table_name: &str,
    ) -> Result<TableCheckpoint, CheckpointError> {
        let engines = tx
            .exec::<Row, _, _>(self.sql.select_engines(), (table_name,))
            .await?
            .into_iter()
            .map(|row| engine_row(row, table_name))
            .collect::<Result<Vec<_>, _>>()?;
        let chunks = tx
            .exec::<Row, _, _>(self.sql.select_chunks(), (table_name,))
            .await?
            .into_iter()
            .map(|row| chunk_row(row, table_name))
            .collect::<Result<Vec<_>, _>>()?;
        let table = match tx
            .exec_first::<Row, _, _>(self.sql.select_table(), (table_name,))
            .await?
        {
            Some(row) => table_row(row, table_name)?,
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

    async fn insert_engines_in(
        &self,
        tx: &mut Transaction<'_>,
        table_name: &str,
        engines: &BTreeMap<i32, EngineCheckpoint>,
    ) -> Result<(), CheckpointError> {
        let (engine_rows, chunk_rows) = rows::engine_rows(table_name, engines, unix_now())?;

        let stmt = tx.prep(self.sql.replace_engine()).await?;
        for row in &engine_rows {
            tx.exec_drop(&stmt, (table_name, row.engine_id, row.status))
                .await?;
        }

        let stmt = tx.prep(self.sql.replace_chunk()).await?;
        for row in &chunk_rows {
            let params: Vec<Value> = vec![
                table_name.into(),
                row.engine_id.into(),
                row.path.as_str().into(),
                row.offset.into(),
                row.source_type.into(),
                row.compression.into(),
                row.sort_key.as_str().into(),
                row.file_size.into(),
                row.columns.as_str().into(),
                row.pos.into(),
                row.real_pos.into(),
                row.end_offset.into(),
                row.prev_rowid_max.into(),
                row.rowid_max.into(),
                row.kvc_bytes.into(),
                row.kvc_kvs.into(),
                row.kvc_checksum.into(),
                row.create_time.into(),
            ];
            tx.exec_drop(&stmt, Params::Positional(params)).await?;
        }

        debug!(
            table = table_name,
            engines = engine_rows.len(),
            chunks = chunk_rows.len(),
            "Inserted engine checkpoints"
        );
        Ok(())
    }

    /// Applies each diff in a fixed order: chunks, auto-id bases, engine
    /// statuses, table status, table checksum. One prepared statement per
    /// kind of update serves every table.
    async fn update_in(
        &self,
        tx: &mut Transaction<'_>,
        diffs: &HashMap<String, TableCheckpointDiff>,
    ) -> Result<(), CheckpointError> {
        let chunk_stmt = tx.prep(self.sql.update_chunk()).await?;
        let rebase_stmt = tx.prep(self.sql.rebase_table()).await?;
        let engine_stmt = tx.prep(self.sql.update_engine_status()).await?;
        let status_stmt = tx.prep(self.sql.update_table_status()).await?;
        let checksum_stmt = tx.prep(self.sql.update_table_checksum()).await?;

        for (table_name, diff) in diffs {
            let table_name = table_name.as_str();
            for (engine_id, key, chunk) in diff.chunks() {
                let columns = serde_json::to_string(&chunk.column_permutation)?;
                let params: Vec<Value> = vec![
                    chunk.pos.into(),
                    chunk.real_pos.into(),
                    chunk.row_id.into(),
                    chunk.checksum.bytes.into(),
                    chunk.checksum.kvs.into(),
                    chunk.checksum.checksum.into(),
                    columns.into(),
                    table_name.into(),
                    engine_id.into(),
                    key.path.as_str().into(),
                    key.offset.into(),
                ];
                tx.exec_drop(&chunk_stmt, Params::Positional(params)).await?;
            }
            if let Some(bases) = diff.rebase() {
                tx.exec_drop(
                    &rebase_stmt,
                    (
                        bases.auto_rand_base,
                        bases.auto_incr_base,
                        bases.auto_row_id_base,
                        table_name,
                    ),
                )
                .await?;
            }
            for (engine_id, engine) in diff.engines() {
                if let Some(status) = engine.status {
                    tx.exec_drop(&engine_stmt, (status.code(), table_name, *engine_id))
                        .await?;
                }
            }
            if let Some(status) = diff.status() {
                tx.exec_drop(&status_stmt, (status.code(), table_name)).await?;
            }
            if let Some(checksum) = diff.checksum() {
                tx.exec_drop(
                    &checksum_stmt,
                    (checksum.bytes, checksum.kvs, checksum.checksum, table_name),
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn remove_table_in(
        &self,
        tx: &mut Transaction<'_>,
        table_name: &str,
    ) -> Result<(), CheckpointError> {
        for statement in self.sql.delete_table() {
            tx.exec_drop(statement, (table_name,)).await?;
        }
        Ok(())
    }

    async fn ignore_in(
        &self,
        tx: &mut Transaction<'_>,
        target: &CheckpointTarget,
    ) -> Result<u64, CheckpointError> {
        let loaded = CheckpointStatus::LOADED.code();
        let mut affected = 0;
        for statement in self.sql.ignore_errors(target.table().is_some()) {
            match target.table() {
                Some(name) => tx.exec_drop(statement, (loaded, name)).await?,
                None => tx.exec_drop(statement, (loaded,)).await?,
            }
            affected += tx.affected_rows();
        }
        Ok(affected)
    }

    async fn destroy_in(
        &self,
        tx: &mut Transaction<'_>,
        target: &CheckpointTarget,
    ) -> Result<Vec<DestroyedTableCheckpoint>, CheckpointError> {
        let select = self.sql.select_failed_tables(target.table().is_some());
        let failed: Vec<(String, i32, i32)> = match target.table() {
            Some(name) => tx.exec(select, (name,)).await?,
            None => tx.exec(select, ()).await?,
        };
        if failed.is_empty() {
            return Ok(Vec::new());
        }

        for statement in self.sql.delete_tables(failed.len()) {
            let names: Vec<Value> = failed
                .iter()
                .map(|(name, _, _)| name.as_str().into())
                .collect();
            tx.exec_drop(statement, Params::Positional(names)).await?;
        }

        Ok(failed
            .into_iter()
            .map(|(table_name, min_engine_id, max_engine_id)| DestroyedTableCheckpoint {
                table_name,
                min_engine_id,
                max_engine_id,
            })
            .collect())
    }
}

#[async_trait]
impl CheckpointsDb for MySqlCheckpointsDb {
    async fn initialize(
        &self,
        task: &TaskCheckpoint,
        tables: &[TableDescriptor],
    ) -> Result<(), CheckpointError> {
        {
            let mut conn = self.pool().await?.get_conn().await?;
            self.ensure_schema(&mut conn).await?;
        }

        let mut tx = self.begin().await?;
        let result = self.initialize_in(&mut tx, task, tables).await;
        finish(tx, result).await?;

        info!(
            schema = %self.schema,
            task_id = task.task_id,
            tables = tables.len(),
            "Initialized checkpoints"
        );
        Ok(())
    }

    async fn task_checkpoint(&self) -> Result<Option<TaskCheckpoint>, CheckpointError> {
        let mut conn = self.pool().await?.get_conn().await?;
        let row = match conn.exec_first::<Row, _, _>(self.sql.select_task(), ()).await {
            Ok(row) => row,
            Err(e) if is_missing_schema(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        row.map(task_row).transpose()
    }

    async fn get(&self, table_name: &str) -> Result<TableCheckpoint, CheckpointError> {
        let result = async {
            let mut tx = self.begin().await?;
            let result = self.get_in(&mut tx, table_name).await;
            finish(tx, result).await
        }
        .await;

        match result {
            Err(CheckpointError::MySql(e)) if is_missing_schema(&e) => {
                Err(CheckpointError::NotFound(table_name.to_string()))
            }
            other => other,
        }
    }

    async fn insert_engine_checkpoints(
        &self,
        table_name: &str,
        engines: &BTreeMap<i32, EngineCheckpoint>,
    ) -> Result<(), CheckpointError> {
        let mut tx = self.begin().await?;
        let result = self.insert_engines_in(&mut tx, table_name, engines).await;
        finish(tx, result).await
    }

    async fn update(
        &self,
        diffs: &HashMap<String, TableCheckpointDiff>,
    ) -> Result<(), CheckpointError> {
        if diffs.is_empty() {
            // still report a closed store
            self.pool().await?;
            return Ok(());
        }
        let mut tx = self.begin().await?;
        let result = self.update_in(&mut tx, diffs).await;
        finish(tx, result).await?;
        debug!(tables = diffs.len(), "Applied checkpoint diffs");
        Ok(())
    }

    async fn remove_checkpoint(&self, target: &CheckpointTarget) -> Result<(), CheckpointError> {
        match target {
            CheckpointTarget::All => {
                let mut conn = self.pool().await?.get_conn().await?;
                conn.query_drop(self.sql.drop_schema()).await?;
            }
            CheckpointTarget::Table(name) => {
                let mut tx = self.begin().await?;
                let result = self.remove_table_in(&mut tx, name).await;
                finish(tx, result).await?;
            }
        }
        info!(schema = %self.schema, target = %target, "Removed checkpoints");
        Ok(())
    }

    async fn ignore_error_checkpoint(
        &self,
        target: &CheckpointTarget,
    ) -> Result<(), CheckpointError> {
        let mut tx = self.begin().await?;
        let result = self.ignore_in(&mut tx, target).await;
        let affected = finish(tx, result).await?;
        info!(target = %target, rows = affected, "Reset failed checkpoints");
        Ok(())
    }

    async fn destroy_error_checkpoint(
        &self,
        target: &CheckpointTarget,
    ) -> Result<Vec<DestroyedTableCheckpoint>, CheckpointError> {
        let mut tx = self.begin().await?;
        let result = self.destroy_in(&mut tx, target).await;
        let destroyed = finish(tx, result).await?;
        info!(target = %target, tables = destroyed.len(), "Destroyed failed checkpoints");
        Ok(destroyed)
    }

    async fn dump_tables(&self, out: &mut (dyn Write + Send)) -> Result<(), CheckpointError> {
        let mut conn = self.pool().await?.get_conn().await?;
        let rows = conn
            .query::<Row, _>(self.sql.dump_tables())
            .await?
            .into_iter()
            .map(|row| table_row(row, "table"))
            .collect::<Result<Vec<TableRow>, _>>()?;
        dump::write_tables(out, &rows)
    }

    async fn dump_engines(&self, out: &mut (dyn Write + Send)) -> Result<(), CheckpointError> {
        let mut conn = self.pool().await?.get_conn().await?;
        let rows = conn
            .query::<Row, _>(self.sql.dump_engines())
            .await?
            .into_iter()
            .map(|row| engine_row(row, "engine"))
            .collect::<Result<Vec<EngineRow>, _>>()?;
        dump::write_engines(out, &rows)
    }

    async fn dump_chunks(&self, out: &mut (dyn Write + Send)) -> Result<(), CheckpointError> {
        let mut conn = self.pool().await?.get_conn().await?;
        let rows = conn
            .query::<Row, _>(self.sql.dump_chunks())
            .await?
            .into_iter()
            .map(|row| chunk_row(row, "chunk"))
            .collect::<Result<Vec<ChunkRow>, _>>()?;
        dump::write_chunks(out, &rows)
    }

    async fn move_checkpoints(&self, suffix: i64) -> Result<(), CheckpointError> {
        let mut conn = self.pool().await?.get_conn().await?;
        for statement in self.sql.move_to_backup(&self.schema, suffix) {
            conn.query_drop(statement)
                .await
                .map_err(|e| match server_code(&e) {
                    Some(ER_TABLE_EXISTS_ERROR) => {
                        CheckpointError::BackupExists(format!("{}.{suffix}.bak", self.schema))
                    }
                    _ => e.into(),
                })?;
        }
        info!(schema = %self.schema, suffix, "Moved checkpoints to backup");
        Ok(())
    }

    async fn close(&self) -> Result<(), CheckpointError> {
        let pool = self.pool.lock().await.take();
        match pool {
            Some(pool) => {
                pool.disconnect().await?;
                info!(schema = %self.schema, "Closed MySQL checkpoint store");
                Ok(())
            }
            None => Err(CheckpointError::Closed),
        }
    }
}

/// Commits on success. On failure the transaction is rolled back and the
/// original error returned.
async fn finish<T>(
    tx: Transaction<'_>,
    result: Result<T, CheckpointError>,
) -> Result<T, CheckpointError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(e) = tx.rollback().await {
                warn!(error = %e, "Failed to roll back checkpoint transaction");
            }
            Err(err)
        }
    }
}

fn server_code(err: &mysql_async::Error) -> Option<u16> {
    match err {
        mysql_async::Error::Server(e) => Some(e.code),
        _ => None,
    }
}

fn is_missing_schema(err: &mysql_async::Error) -> bool {
    matches!(
        server_code(err),
        Some(ER_NO_SUCH_TABLE) | Some(ER_BAD_DB_ERROR)
    )
}

fn take<T: FromValue>(row: &mut Row, index: usize, table: &str) -> Result<T, CheckpointError> {
    match row.take_opt::<T, _>(index) {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(CheckpointError::inconsistent(
            table,
            format!("column {index}: {e:?}"),
        )),
        None => Err(CheckpointError::inconsistent(
            table,
            format!("missing column {index}"),
        )),
    }
}

fn task_row(mut row: Row) -> Result<TaskCheckpoint, CheckpointError> {
    let table = "task";
    Ok(TaskCheckpoint {
        task_id: take(&mut row, 0, table)?,
        source_dir: take(&mut row, 1, table)?,
        backend: take(&mut row, 2, table)?,
        importer_addr: take::<Option<String>>(&mut row, 3, table)?.unwrap_or_default(),
        tidb_host: take(&mut row, 4, table)?,
        tidb_port: take(&mut row, 5, table)?,
        pd_addr: take(&mut row, 6, table)?,
        sorted_kv_dir: take(&mut row, 7, table)?,
        tool_version: take(&mut row, 8, table)?,
    })
}

fn table_row(mut row: Row, table: &str) -> Result<TableRow, CheckpointError> {
    Ok(TableRow {
        task_id: take(&mut row, 0, table)?,
        table_name: take(&mut row, 1, table)?,
        hash: take(&mut row, 2, table)?,
        status: take(&mut row, 3, table)?,
        table_id: take(&mut row, 4, table)?,
        table_info: take(&mut row, 5, table)?,
        kv_bytes: take(&mut row, 6, table)?,
        kv_kvs: take(&mut row, 7, table)?,
        kv_checksum: take(&mut row, 8, table)?,
        auto_rand_base: take(&mut row, 9, table)?,
        auto_incr_base: take(&mut row, 10, table)?,
        auto_row_id_base: take(&mut row, 11, table)?,
        create_time: take(&mut row, 12, table)?,
        update_time: take(&mut row, 13, table)?,
    })
}

fn engine_row(mut row: Row, table: &str) -> Result<EngineRow, CheckpointError> {
    Ok(EngineRow {
        table_name: take(&mut row, 0, table)?,
        engine_id: take(&mut row, 1, table)?,
        status: take(&mut row, 2, table)?,
        create_time: take(&mut row, 3, table)?,
        update_time: take(&mut row, 4, table)?,
    })
}

fn chunk_row(mut row: Row, table: &str) -> Result<ChunkRow, CheckpointError> {
    Ok(ChunkRow {
        table_name: take(&mut row, 0, table)?,
        engine_id: take(&mut row, 1, table)?,
        path: take(&mut row, 2, table)?,
        offset: take(&mut row, 3, table)?,
        source_type: take(&mut row, 4, table)?,
        compression: take(&mut row, 5, table)?,
        sort_key: take(&mut row, 6, table)?,
        file_size: take(&mut row, 7, table)?,
        columns: take::<Option<String>>(&mut row, 8, table)?
            .unwrap_or_else(|| "null".to_string()),
        pos: take(&mut row, 9, table)?,
        real_pos: take(&mut row, 10, table)?,
        end_offset: take(&mut row, 11, table)?,
        prev_rowid_max: take(&mut row, 12, table)?,
        rowid_max: take(&mut row, 13, table)?,
        kvc_bytes: take(&mut row, 14, table)?,
        kvc_kvs: take(&mut row, 15, table)?,
        kvc_checksum: take(&mut row, 16, table)?,
        create_time: take(&mut row, 17, table)?,
        update_time: take(&mut row, 18, table)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkpoint_model::{TableInfo, source::SourceType};
    use mysql_async::{Column, ServerError, consts::ColumnType};
    use mysql_common::row::new_row;
    use std::sync::Arc;

    const T2: &str = "`db1`.`t2`";

    fn row(values: Vec<Value>) -> Row {
        let columns: Arc<[Column]> = values
            .iter()
            .map(|_| Column::new(ColumnType::MYSQL_TYPE_VAR_STRING))
            .collect();
        new_row(values, columns)
    }

    fn bytes(s: &str) -> Value {
        Value::Bytes(s.as_bytes().to_vec())
    }

    fn t2_table_row() -> Row {
        row(vec![
            Value::Int(123),
            bytes(T2),
            Value::Bytes(vec![0xab; 32]),
            Value::Int(60),
            Value::Int(2),
            bytes(r#"{"name":"t2"}"#),
            Value::UInt(4492),
            Value::UInt(686),
            Value::UInt(486070148910),
            Value::Int(132861),
            Value::Int(132862),
            Value::Int(132863),
            Value::Int(1555555555),
            Value::Int(1555555556),
        ])
    }

    fn t2_chunk_row(columns: Value) -> Row {
        row(vec![
            bytes(T2),
            Value::Int(0),
            bytes("/tmp/path/1.sql"),
            Value::Int(0),
            Value::Int(3),
            Value::Int(0),
            bytes(""),
            Value::Int(456),
            columns,
            Value::Int(55904),
            Value::Int(55902),
            Value::Int(102400),
            Value::Int(1),
            Value::Int(5000),
            Value::UInt(4491),
            Value::UInt(586),
            Value::UInt(486070148917),
            Value::Int(1555555555),
            Value::Int(1555555556),
        ])
    }

    #[test]
    fn decodes_rows_into_a_table_checkpoint() {
        let table = table_row(t2_table_row(), "table").unwrap();
        assert_eq!(table.table_name, T2);
        assert_eq!(table.hash, vec![0xab; 32]);
        assert_eq!(table.kv_checksum, 486070148910);

        let engines = vec![
            engine_row(
                row(vec![
                    bytes(T2),
                    Value::Int(-1),
                    Value::Int(30),
                    Value::Int(1555555555),
                    Value::Int(1555555555),
                ]),
                "engine",
            )
            .unwrap(),
            engine_row(
                row(vec![
                    bytes(T2),
                    Value::Int(0),
                    Value::Int(120),
                    Value::Int(1555555555),
                    Value::Int(1555555556),
                ]),
                "engine",
            )
            .unwrap(),
        ];
        let chunks = vec![chunk_row(t2_chunk_row(bytes("[]")), "chunk").unwrap()];

        let cp = rows::assemble(table, engines, chunks).unwrap();
        assert_eq!(cp.status, CheckpointStatus::ALL_WRITTEN);
        assert_eq!(cp.table_id, 2);
        assert_eq!(cp.table_info, Some(TableInfo(serde_json::json!({ "name": "t2" }))));
        assert_eq!(cp.auto_row_id_base, 132863);
        assert_eq!(cp.engines[&-1].status, CheckpointStatus::LOADED);
        assert_eq!(cp.engines[&0].status, CheckpointStatus::IMPORTED);

        let chunk = &cp.engines[&0].chunks[0];
        assert_eq!(chunk.file_meta.source_type, SourceType::Sql);
        assert_eq!(chunk.chunk.offset, 55904);
        assert_eq!(chunk.chunk.real_offset, 55902);
        assert_eq!(chunk.column_permutation, Some(vec![]));
        assert_eq!(chunk.checksum.kvs, 586);
    }

    #[test]
    fn null_columns_decode_as_no_permutation() {
        let chunk = chunk_row(t2_chunk_row(Value::NULL), "chunk").unwrap();
        assert_eq!(chunk.columns, "null");
        assert_eq!(chunk.to_checkpoint().unwrap().column_permutation, None);
    }

    #[test]
    fn undecodable_values_are_inconsistent() {
        let mut values = t2_table_row().unwrap();
        values[3] = bytes("not a status");
        let err = table_row(row(values), "table").unwrap_err();
        assert!(matches!(err, CheckpointError::InconsistentRow { ref table, .. } if table == "table"));

        let short = row(vec![bytes(T2), Value::Int(0)]);
        assert!(matches!(
            engine_row(short, "engine"),
            Err(CheckpointError::InconsistentRow { .. })
        ));
    }

    #[test]
    fn task_row_tolerates_missing_importer() {
        let task = task_row(row(vec![
            Value::Int(123),
            bytes("/data"),
            bytes("local"),
            Value::NULL,
            bytes("127.0.0.1"),
            Value::Int(4000),
            bytes("127.0.0.1:2379"),
            bytes("/tmp/sorted-kv"),
            bytes("v1.0.0"),
        ]))
        .unwrap();
        assert_eq!(task.task_id, 123);
        assert_eq!(task.importer_addr, "");
        assert_eq!(task.tidb_port, 4000);
    }

    #[test]
    fn missing_schema_codes() {
        let server = |code| {
            mysql_async::Error::Server(ServerError {
                code,
                message: String::new(),
                state: "42S02".into(),
            })
        };
        assert!(is_missing_schema(&server(ER_NO_SUCH_TABLE)));
        assert!(is_missing_schema(&server(ER_BAD_DB_ERROR)));
        assert!(!is_missing_schema(&server(ER_BAD_NULL_ERROR)));
        assert_eq!(server_code(&server(ER_TABLE_EXISTS_ERROR)), Some(1050));
    }
}
