use crate::{
    error::CheckpointError,
    rows::{ChunkRow, EngineRow, TableRow},
};
use std::io::Write;

pub const TABLE_COLUMNS: [&str; 9] = [
    "task_id",
    "table_name",
    "hash",
    "status",
    "create_time",
    "update_time",
    "auto_rand_base",
    "auto_incr_base",
    "auto_row_id_base",
];

pub const ENGINE_COLUMNS: [&str; 5] = [
    "table_name",
    "engine_id",
    "status",
    "create_time",
    "update_time",
];

pub const CHUNK_COLUMNS: [&str; 18] = [
    "table_name",
    "path",
    "offset",
    "type",
    "compression",
    "sort_key",
    "file_size",
    "columns",
    "pos",
    "real_pos",
    "end_offset",
    "prev_rowid_max",
    "rowid_max",
    "kvc_bytes",
    "kvc_kvs",
    "kvc_checksum",
    "create_time",
    "update_time",
];

fn write_csv<W, R>(out: W, header: &[&str], rows: R) -> Result<(), CheckpointError>
where
    W: Write,
    R: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);
    writer.write_record(header)?;
    for record in rows {
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_tables<W: Write>(out: W, rows: &[TableRow]) -> Result<(), CheckpointError> {
    write_csv(out, &TABLE_COLUMNS, rows.iter().map(TableRow::csv_record))
}

pub fn write_engines<W: Write>(out: W, rows: &[EngineRow]) -> Result<(), CheckpointError> {
    write_csv(out, &ENGINE_COLUMNS, rows.iter().map(EngineRow::csv_record))
}

pub fn write_chunks<W: Write>(out: W, rows: &[ChunkRow]) -> Result<(), CheckpointError> {
    write_csv(out, &CHUNK_COLUMNS, rows.iter().map(ChunkRow::csv_record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_only_values_that_need_it() {
        let row = EngineRow {
            table_name: "`db`.`a,b`".into(),
            engine_id: -1,
            status: 30,
            create_time: 0,
            update_time: 0,
        };
        let mut out = Vec::new();
        write_engines(&mut out, &[row]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "table_name,engine_id,status,create_time,update_time\n\
             \"`db`.`a,b`\",-1,30,1970-01-01 00:00:00 +0000 UTC,1970-01-01 00:00:00 +0000 UTC\n"
        );
    }

    #[test]
    fn empty_dump_has_header_only() {
        let mut out = Vec::new();
        write_tables(&mut out, &[]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "task_id,table_name,hash,status,create_time,update_time,auto_rand_base,auto_incr_base,auto_row_id_base\n"
        );
    }
}
