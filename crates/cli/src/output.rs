use crate::error::CliError;
use checkpoint_model::{DestroyedTableCheckpoint, TableCheckpoint};
use checkpoint_store::CheckpointsDb;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub fn print_checkpoint(table: &str, cp: &TableCheckpoint, summary: bool) -> Result<(), CliError> {
    if summary {
        print!("{}", format_summary(table, cp));
    } else {
        println!("{}", serde_json::to_string_pretty(cp)?);
    }
    Ok(())
}

/// Status, chunk progress and the running checksum of a table, one line per
/// engine.
pub fn format_summary(table: &str, cp: &TableCheckpoint) -> String {
    let total = cp.chunk_checksum_total();
    let mut out = format!(
        "{table}: status={}{} table_id={} chunks={} kvs={} bytes={}\n",
        cp.status,
        if cp.status.is_completed() { " (complete)" } else { "" },
        cp.table_id,
        cp.count_chunks(),
        total.kvs,
        total.bytes,
    );
    for (engine_id, engine) in &cp.engines {
        let finished = engine.chunks.iter().filter(|c| c.chunk.is_finished()).count();
        let remaining: i64 = engine.chunks.iter().map(|c| c.chunk.remaining()).sum();
        out.push_str(&format!(
            "  engine {engine_id:>4}: status={} chunks={finished}/{} remaining_bytes={remaining}\n",
            engine.status,
            engine.chunks.len()
        ));
    }
    out
}

/// One line per destroyed table with the engine ids whose data must be
/// cleaned up by hand.
pub fn format_destroyed(destroyed: &[DestroyedTableCheckpoint]) -> String {
    if destroyed.is_empty() {
        return "No failed checkpoints\n".to_string();
    }

    let width = destroyed
        .iter()
        .map(|d| d.table_name.len())
        .max()
        .unwrap_or(0)
        .max("TABLE".len());
    let mut out = format!("{:<width$}  MIN_ENGINE  MAX_ENGINE\n", "TABLE");
    for d in destroyed {
        out.push_str(&format!(
            "{:<width$}  {:>10}  {:>10}\n",
            d.table_name, d.min_engine_id, d.max_engine_id
        ));
    }
    out
}

/// Writes the three CSV dumps into `dir` and returns the written paths.
pub async fn dump_all(db: &dyn CheckpointsDb, dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    tokio::fs::create_dir_all(dir).await?;

    let tables = dir.join("tables.csv");
    let mut out = BufWriter::new(File::create(&tables)?);
    db.dump_tables(&mut out).await?;
    out.flush()?;

    let engines = dir.join("engines.csv");
    let mut out = BufWriter::new(File::create(&engines)?);
    db.dump_engines(&mut out).await?;
    out.flush()?;

    let chunks = dir.join("chunks.csv");
    let mut out = BufWriter::new(File::create(&chunks)?);
    db.dump_chunks(&mut out).await?;
    out.flush()?;

    Ok(vec![tables, engines, chunks])
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkpoint_model::{
        CheckpointPhase, CheckpointStatus, ChunkCheckpoint, EngineCheckpoint, KvChecksum,
        TableDescriptor, TaskCheckpoint, source::Chunk,
    };
    use checkpoint_store::SledCheckpointsDb;
    use tempfile::tempdir;

    #[test]
    fn destroyed_tables_are_aligned() {
        let text = format_destroyed(&[
            DestroyedTableCheckpoint {
                table_name: "`db`.`orders`".into(),
                min_engine_id: -1,
                max_engine_id: 3,
            },
            DestroyedTableCheckpoint {
                table_name: "`db`.`t`".into(),
                min_engine_id: 0,
                max_engine_id: -1,
            },
        ]);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "TABLE          MIN_ENGINE  MAX_ENGINE");
        assert_eq!(lines[1], "`db`.`orders`          -1           3");
        assert_eq!(lines[2], "`db`.`t`                0          -1");
        assert_eq!(format_destroyed(&[]), "No failed checkpoints\n");
    }

    #[test]
    fn summary_reports_chunk_progress() {
        let chunk = |offset: i64, end_offset: i64, kvs: u64| ChunkCheckpoint {
            chunk: Chunk {
                offset,
                end_offset,
                ..Default::default()
            },
            checksum: KvChecksum::new(kvs * 10, kvs, 0),
            ..Default::default()
        };
        let mut cp = TableCheckpoint {
            status: CheckpointStatus::Reached(CheckpointPhase::Analyzed),
            table_id: 7,
            ..Default::default()
        };
        cp.engines.insert(
            0,
            EngineCheckpoint {
                status: CheckpointStatus::IMPORTED,
                chunks: vec![chunk(100, 100, 3), chunk(40, 100, 2)],
            },
        );

        let text = format_summary("`db`.`t`", &cp);
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].contains("(complete)"), "{}", lines[0]);
        assert!(lines[0].ends_with("chunks=2 kvs=5 bytes=50"), "{}", lines[0]);
        assert!(lines[1].ends_with("chunks=1/2 remaining_bytes=60"), "{}", lines[1]);

        cp.status = CheckpointStatus::IMPORTED;
        assert!(!format_summary("`db`.`t`", &cp).contains("(complete)"));
    }

    #[tokio::test]
    async fn dump_writes_three_files() {
        let store_dir = tempdir().unwrap();
        let db = SledCheckpointsDb::open(store_dir.path(), "cp").unwrap();
        let table = TableDescriptor {
            schema: "db".into(),
            name: "t".into(),
            id: 7,
            desired: None,
        };
        db.initialize(&TaskCheckpoint::default(), &[table])
            .await
            .unwrap();

        let out_dir = tempdir().unwrap();
        let target = out_dir.path().join("nested");
        let paths = dump_all(&db, &target).await.unwrap();
        assert_eq!(paths.len(), 3);

        let tables = std::fs::read_to_string(target.join("tables.csv")).unwrap();
        let mut lines = tables.lines();
        assert!(lines.next().unwrap().starts_with("task_id,table_name,"));
        assert!(lines.next().unwrap().contains("`db`.`t`"));
        let chunks = std::fs::read_to_string(target.join("chunks.csv")).unwrap();
        assert_eq!(chunks.lines().count(), 1);
    }
}
