//! Key layout of the embedded store.
//!
//! Table rows are keyed by the unique table name. Engine and chunk keys
//! start with the name followed by a NUL byte, so a prefix scan returns
//! exactly one table's rows. Integers are stored big-endian with the sign
//! bit flipped, which keeps byte order equal to numeric order.

use checkpoint_model::ChunkCheckpointKey;

const SEP: u8 = 0;

pub const TASK_KEY: &[u8] = b"task";
pub const VERSION_KEY: &[u8] = b"version";

pub fn table_key(table_name: &str) -> Vec<u8> {
    table_name.as_bytes().to_vec()
}

/// Prefix of every engine and chunk key of a table.
pub fn table_prefix(table_name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(table_name.len() + 1);
    key.extend_from_slice(table_name.as_bytes());
    key.push(SEP);
    key
}

pub fn engine_key(table_name: &str, engine_id: i32) -> Vec<u8> {
    let mut key = table_prefix(table_name);
    key.extend_from_slice(&((engine_id as u32) ^ 0x8000_0000).to_be_bytes());
    key
}

pub fn chunk_key(table_name: &str, engine_id: i32, chunk: &ChunkCheckpointKey) -> Vec<u8> {
    let mut key = engine_key(table_name, engine_id);
    key.extend_from_slice(chunk.path.as_bytes());
    key.push(SEP);
    key.extend_from_slice(&((chunk.offset as u64) ^ 0x8000_0000_0000_0000).to_be_bytes());
    key
}
