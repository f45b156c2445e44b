//! Statement text of the MySQL backend.
//!
//! Relation names depend on the checkpoint schema and version, so every
//! statement is rendered once per store and kept for its lifetime.

use crate::{error::CheckpointError, schema::CheckpointTables};
use checkpoint_model::{ERROR_THRESHOLD, naming::escape_name};

const TABLE_COLUMNS: &str = "task_id, table_name, hash, status, table_id, table_info, \
     kv_bytes, kv_kvs, kv_checksum, auto_rand_base, auto_incr_base, auto_row_id_base, \
     UNIX_TIMESTAMP(create_time), UNIX_TIMESTAMP(update_time)";

const ENGINE_COLUMNS: &str =
    "table_name, engine_id, status, UNIX_TIMESTAMP(create_time), UNIX_TIMESTAMP(update_time)";

const CHUNK_COLUMNS: &str = "table_name, engine_id, path, offset, type, compression, \
     sort_key, file_size, columns, pos, real_pos, end_offset, prev_rowid_max, rowid_max, \
     kvc_bytes, kvc_kvs, kvc_checksum, \
     UNIX_TIMESTAMP(create_time), UNIX_TIMESTAMP(update_time)";

#[derive(Debug, Clone)]
pub struct CheckpointSql {
    schema: String,
    task: String,
    table: String,
    engine: String,
    chunk: String,
    tables: CheckpointTables,
}

impl CheckpointSql {
    pub fn new(schema: &str, tables: &CheckpointTables) -> Self {
        let schema = escape_name(schema);
        let qualify = |name: &str| format!("{schema}.{}", escape_name(name));
        Self {
            task: qualify(&tables.task),
            table: qualify(&tables.table),
            engine: qualify(&tables.engine),
            chunk: qualify(&tables.chunk),
            schema,
            tables: tables.clone(),
        }
    }

    pub fn create_schema(&self) -> String {
        format!("CREATE DATABASE IF NOT EXISTS {}", self.schema)
    }

    pub fn show_tables(&self) -> String {
        format!("SHOW TABLES FROM {}", self.schema)
    }

    /// DDL of every relation for the store's schema version.
    pub fn create_tables(&self) -> Result<Vec<String>, CheckpointError> {
        match self.tables.version {
            1 => Ok(vec![
                format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        id tinyint(1) PRIMARY KEY,
                        task_id bigint NOT NULL,
                        source_dir varchar(256) NOT NULL,
                        backend varchar(16) NOT NULL,
                        importer_addr varchar(256),
                        tidb_host varchar(128) NOT NULL,
                        tidb_port int NOT NULL,
                        pd_addr varchar(128) NOT NULL,
                        sorted_kv_dir varchar(256) NOT NULL,
                        tool_version varchar(48) NOT NULL
                    )",
                    self.task
                ),
                format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        task_id bigint NOT NULL,
                        table_name varchar(261) NOT NULL PRIMARY KEY,
                        hash binary(32) NOT NULL,
                        status tinyint unsigned DEFAULT 30,
                        table_id bigint NOT NULL DEFAULT 0,
                        table_info longblob NOT NULL,
                        kv_bytes bigint unsigned NOT NULL DEFAULT 0,
                        kv_kvs bigint unsigned NOT NULL DEFAULT 0,
                        kv_checksum bigint unsigned NOT NULL DEFAULT 0,
                        auto_rand_base bigint NOT NULL DEFAULT 0,
                        auto_incr_base bigint NOT NULL DEFAULT 0,
                        auto_row_id_base bigint NOT NULL DEFAULT 0,
                        create_time timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP,
                        update_time timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                        INDEX(task_id)
                    )",
                    self.table
                ),
                format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        table_name varchar(261) NOT NULL,
                        engine_id int NOT NULL,
                        status tinyint unsigned DEFAULT 30,
                        create_time timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP,
                        update_time timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                        PRIMARY KEY(table_name, engine_id DESC)
                    )",
                    self.engine
                ),
                format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        table_name varchar(261) NOT NULL,
                        engine_id int NOT NULL,
                        path varchar(2048) NOT NULL,
                        offset bigint NOT NULL,
                        type int NOT NULL,
                        compression int NOT NULL,
                        sort_key varchar(256) NOT NULL,
                        file_size bigint NOT NULL,
                        columns text NULL,
                        pos bigint NOT NULL,
                        real_pos bigint NOT NULL,
                        end_offset bigint NOT NULL,
                        prev_rowid_max bigint NOT NULL,
                        rowid_max bigint NOT NULL,
                        kvc_bytes bigint unsigned NOT NULL DEFAULT 0,
                        kvc_kvs bigint unsigned NOT NULL DEFAULT 0,
                        kvc_checksum bigint unsigned NOT NULL DEFAULT 0,
                        create_time timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP,
                        update_time timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                        PRIMARY KEY(table_name, engine_id, path(500), offset)
                    )",
                    self.chunk
                ),
            ]),
            found => Err(CheckpointError::UnsupportedSchemaVersion {
                found,
                supported: crate::schema::CURRENT_SCHEMA_VERSION,
            }),
        }
    }

    pub fn replace_task(&self) -> String {
        format!(
            "REPLACE INTO {} (id, task_id, source_dir, backend, importer_addr, tidb_host, \
             tidb_port, pd_addr, sorted_kv_dir, tool_version) \
             VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.task
        )
    }

    pub fn select_task(&self) -> String {
        format!(
            "SELECT task_id, source_dir, backend, importer_addr, tidb_host, tidb_port, \
             pd_addr, sorted_kv_dir, tool_version FROM {} WHERE id = 1",
            self.task
        )
    }

    /// Registers a table. Re-registering with the same hash keeps the row;
    /// a different hash sets `task_id` to NULL, which the NOT NULL
    /// constraint rejects.
    pub fn insert_table(&self) -> String {
        format!(
            "INSERT INTO {} (task_id, table_name, hash, table_id, table_info) \
             VALUES (?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE task_id = CASE WHEN hash = VALUES(hash) \
             THEN VALUES(task_id) END",
            self.table
        )
    }

    pub fn select_engines(&self) -> String {
        format!(
            "SELECT {ENGINE_COLUMNS} FROM {} WHERE table_name = ? ORDER BY engine_id DESC",
            self.engine
        )
    }

    pub fn select_chunks(&self) -> String {
        format!(
            "SELECT {CHUNK_COLUMNS} FROM {} WHERE table_name = ? \
             ORDER BY engine_id, path, offset",
            self.chunk
        )
    }

    pub fn select_table(&self) -> String {
        format!("SELECT {TABLE_COLUMNS} FROM {} WHERE table_name = ?", self.table)
    }

    pub fn replace_engine(&self) -> String {
        format!(
            "REPLACE INTO {} (table_name, engine_id, status) VALUES (?, ?, ?)",
            self.engine
        )
    }

    pub fn replace_chunk(&self) -> String {
        format!(
            "REPLACE INTO {} (table_name, engine_id, path, offset, type, compression, \
             sort_key, file_size, columns, pos, real_pos, end_offset, prev_rowid_max, \
             rowid_max, kvc_bytes, kvc_kvs, kvc_checksum, create_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, FROM_UNIXTIME(?))",
            self.chunk
        )
    }

    pub fn update_chunk(&self) -> String {
        format!(
            "UPDATE {} SET pos = ?, real_pos = ?, prev_rowid_max = ?, kvc_bytes = ?, \
             kvc_kvs = ?, kvc_checksum = ?, columns = ? \
             WHERE (table_name, engine_id, path, offset) = (?, ?, ?, ?)",
            self.chunk
        )
    }

    pub fn rebase_table(&self) -> String {
        format!(
            "UPDATE {} SET auto_rand_base = GREATEST(auto_rand_base, ?), \
             auto_incr_base = GREATEST(auto_incr_base, ?), \
             auto_row_id_base = GREATEST(auto_row_id_base, ?) WHERE table_name = ?",
            self.table
        )
    }

    pub fn update_engine_status(&self) -> String {
        format!(
            "UPDATE {} SET status = ? WHERE (table_name, engine_id) = (?, ?)",
            self.engine
        )
    }

    pub fn update_table_status(&self) -> String {
        format!("UPDATE {} SET status = ? WHERE table_name = ?", self.table)
    }

    pub fn update_table_checksum(&self) -> String {
        format!(
            "UPDATE {} SET kv_bytes = ?, kv_kvs = ?, kv_checksum = ? WHERE table_name = ?",
            self.table
        )
    }

    pub fn drop_schema(&self) -> String {
        format!("DROP SCHEMA IF EXISTS {}", self.schema)
    }

    /// Deletes of one table's rows, children first.
    pub fn delete_table(&self) -> [String; 3] {
        [
            format!("DELETE FROM {} WHERE table_name = ?", self.chunk),
            format!("DELETE FROM {} WHERE table_name = ?", self.engine),
            format!("DELETE FROM {} WHERE table_name = ?", self.table),
        ]
    }

    /// Statuses at or below the error threshold back to `Loaded`, for
    /// engines then tables. Bound with the new status code (and the table
    /// name when `scoped`).
    pub fn ignore_errors(&self, scoped: bool) -> [String; 2] {
        let filter = if scoped { "table_name = ? AND " } else { "" };
        [
            format!(
                "UPDATE {} SET status = ? WHERE {filter}status <= {ERROR_THRESHOLD}",
                self.engine
            ),
            format!(
                "UPDATE {} SET status = ? WHERE {filter}status <= {ERROR_THRESHOLD}",
                self.table
            ),
        ]
    }

    /// Failed tables with the engine id range they used.
    pub fn select_failed_tables(&self, scoped: bool) -> String {
        let filter = if scoped { "t.table_name = ? AND " } else { "" };
        format!(
            "SELECT t.table_name, COALESCE(MIN(e.engine_id), 0), COALESCE(MAX(e.engine_id), -1) \
             FROM {table} t LEFT JOIN {engine} e ON t.table_name = e.table_name \
             WHERE {filter}(t.status <= {ERROR_THRESHOLD} OR EXISTS (\
             SELECT 1 FROM {engine} f WHERE f.table_name = t.table_name \
             AND f.status <= {ERROR_THRESHOLD})) \
             GROUP BY t.table_name ORDER BY t.table_name",
            table = self.table,
            engine = self.engine,
        )
    }

    /// Deletes of a set of tables, children first.
    pub fn delete_tables(&self, count: usize) -> [String; 3] {
        let placeholders = vec!["?"; count].join(", ");
        [
            format!(
                "DELETE FROM {} WHERE table_name IN ({placeholders})",
                self.chunk
            ),
            format!(
                "DELETE FROM {} WHERE table_name IN ({placeholders})",
                self.engine
            ),
            format!(
                "DELETE FROM {} WHERE table_name IN ({placeholders})",
                self.table
            ),
        ]
    }

    pub fn dump_tables(&self) -> String {
        format!("SELECT {TABLE_COLUMNS} FROM {} ORDER BY table_name", self.table)
    }

    pub fn dump_engines(&self) -> String {
        format!(
            "SELECT {ENGINE_COLUMNS} FROM {} ORDER BY table_name, engine_id",
            self.engine
        )
    }

    pub fn dump_chunks(&self) -> String {
        format!(
            "SELECT {CHUNK_COLUMNS} FROM {} ORDER BY table_name, engine_id, path, offset",
            self.chunk
        )
    }

    /// Moves every relation into the backup schema `<schema>.<suffix>.bak`.
    pub fn move_to_backup(&self, original_schema: &str, suffix: i64) -> Vec<String> {
        let backup = escape_name(&format!("{original_schema}.{suffix}.bak"));
        let mut statements = vec![format!("CREATE SCHEMA IF NOT EXISTS {backup}")];
        for name in self.tables.names() {
            statements.push(format!(
                "RENAME TABLE {}.{name} TO {backup}.{name}",
                self.schema,
                name = escape_name(name)
            ));
        }
        statements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql() -> CheckpointSql {
        CheckpointSql::new("mock-schema", &CheckpointTables::current())
    }

    #[test]
    fn qualifies_versioned_relations() {
        assert_eq!(
            sql().update_table_status(),
            "UPDATE `mock-schema`.`table_v1` SET status = ? WHERE table_name = ?"
        );
        assert_eq!(sql().create_schema(), "CREATE DATABASE IF NOT EXISTS `mock-schema`");
    }

    #[test]
    fn creates_every_relation() {
        let ddl = sql().create_tables().unwrap();
        assert_eq!(ddl.len(), 4);
        assert!(ddl[0].starts_with("CREATE TABLE IF NOT EXISTS `mock-schema`.`task_v1`"));
        assert!(ddl[3].contains("PRIMARY KEY(table_name, engine_id, path(500), offset)"));
    }

    #[test]
    fn registers_tables_without_clobbering_progress() {
        assert_eq!(
            sql().insert_table(),
            "INSERT INTO `mock-schema`.`table_v1` (task_id, table_name, hash, table_id, table_info) \
             VALUES (?, ?, ?, ?, ?) ON DUPLICATE KEY UPDATE task_id = CASE WHEN hash = VALUES(hash) \
             THEN VALUES(task_id) END"
        );
    }

    #[test]
    fn rebase_only_raises() {
        let stmt = sql().rebase_table();
        assert!(stmt.contains("auto_rand_base = GREATEST(auto_rand_base, ?)"));
        assert!(stmt.contains("auto_incr_base = GREATEST(auto_incr_base, ?)"));
        assert!(stmt.contains("auto_row_id_base = GREATEST(auto_row_id_base, ?)"));
    }

    #[test]
    fn chunk_update_is_keyed_by_full_identity() {
        assert_eq!(
            sql().update_chunk(),
            "UPDATE `mock-schema`.`chunk_v1` SET pos = ?, real_pos = ?, prev_rowid_max = ?, \
             kvc_bytes = ?, kvc_kvs = ?, kvc_checksum = ?, columns = ? \
             WHERE (table_name, engine_id, path, offset) = (?, ?, ?, ?)"
        );
    }

    #[test]
    fn ignore_filters_by_threshold() {
        let [engine, table] = sql().ignore_errors(false);
        assert_eq!(
            engine,
            "UPDATE `mock-schema`.`engine_v1` SET status = ? WHERE status <= 25"
        );
        assert_eq!(
            table,
            "UPDATE `mock-schema`.`table_v1` SET status = ? WHERE status <= 25"
        );
        let [engine, _] = sql().ignore_errors(true);
        assert_eq!(
            engine,
            "UPDATE `mock-schema`.`engine_v1` SET status = ? WHERE table_name = ? AND status <= 25"
        );
    }

    #[test]
    fn destroy_selects_engine_range() {
        let stmt = sql().select_failed_tables(true);
        assert!(stmt.starts_with(
            "SELECT t.table_name, COALESCE(MIN(e.engine_id), 0), COALESCE(MAX(e.engine_id), -1) \
             FROM `mock-schema`.`table_v1` t LEFT JOIN `mock-schema`.`engine_v1` e"
        ));
        assert!(stmt.contains("WHERE t.table_name = ? AND (t.status <= 25 OR EXISTS"));

        let [chunks, engines, tables] = sql().delete_tables(2);
        assert_eq!(
            chunks,
            "DELETE FROM `mock-schema`.`chunk_v1` WHERE table_name IN (?, ?)"
        );
        assert!(engines.starts_with("DELETE FROM `mock-schema`.`engine_v1`"));
        assert!(tables.starts_with("DELETE FROM `mock-schema`.`table_v1`"));
    }

    #[test]
    fn moves_children_first_into_backup() {
        let statements = sql().move_to_backup("mock-schema", 1234567890);
        assert_eq!(
            statements,
            vec![
                "CREATE SCHEMA IF NOT EXISTS `mock-schema.1234567890.bak`",
                "RENAME TABLE `mock-schema`.`chunk_v1` TO `mock-schema.1234567890.bak`.`chunk_v1`",
                "RENAME TABLE `mock-schema`.`engine_v1` TO `mock-schema.1234567890.bak`.`engine_v1`",
                "RENAME TABLE `mock-schema`.`table_v1` TO `mock-schema.1234567890.bak`.`table_v1`",
                "RENAME TABLE `mock-schema`.`task_v1` TO `mock-schema.1234567890.bak`.`task_v1`",
            ]
        );
    }
}
