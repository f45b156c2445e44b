//! Source file metadata and chunk progress carried by chunk checkpoints.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// Kind of source file a chunk was cut from. Persisted as its numeric code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum SourceType {
    #[default]
    Ignore,
    SchemaSchema,
    TableSchema,
    Sql,
    Csv,
    Parquet,
    ViewSchema,
}

impl SourceType {
    pub const fn code(self) -> i32 {
        match self {
            SourceType::Ignore => 0,
            SourceType::SchemaSchema => 1,
            SourceType::TableSchema => 2,
            SourceType::Sql => 3,
            SourceType::Csv => 4,
            SourceType::Parquet => 5,
            SourceType::ViewSchema => 6,
        }
    }
}

impl TryFrom<i32> for SourceType {
    type Error = ModelError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SourceType::Ignore),
            1 => Ok(SourceType::SchemaSchema),
            2 => Ok(SourceType::TableSchema),
            3 => Ok(SourceType::Sql),
            4 => Ok(SourceType::Csv),
            5 => Ok(SourceType::Parquet),
            6 => Ok(SourceType::ViewSchema),
            other => Err(ModelError::InvalidSourceType(other)),
        }
    }
}

impl From<SourceType> for i32 {
    fn from(value: SourceType) -> i32 {
        value.code()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Snappy,
    Zstd,
}

impl Compression {
    pub const fn code(self) -> i32 {
        match self {
            Compression::None => 0,
            Compression::Gzip => 1,
            Compression::Snappy => 2,
            Compression::Zstd => 3,
        }
    }
}

impl TryFrom<i32> for Compression {
    type Error = ModelError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Gzip),
            2 => Ok(Compression::Snappy),
            3 => Ok(Compression::Zstd),
            other => Err(ModelError::InvalidCompression(other)),
        }
    }
}

impl From<Compression> for i32 {
    fn from(value: Compression) -> i32 {
        value.code()
    }
}

/// Immutable description of the file a chunk belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFileMeta {
    pub path: String,
    pub source_type: SourceType,
    pub compression: Compression,
    pub sort_key: String,
    /// Declared size of the file in bytes.
    pub file_size: i64,
}

/// Progress within a chunk. `offset` and `real_offset` differ only for
/// compressed sources, where `real_offset` tracks the position in the
/// compressed stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub offset: i64,
    pub real_offset: i64,
    pub end_offset: i64,
    pub prev_row_id_max: i64,
    pub row_id_max: i64,
}

impl Chunk {
    pub fn is_finished(&self) -> bool {
        self.offset >= self.end_offset
    }

    pub fn remaining(&self) -> i64 {
        (self.end_offset - self.offset).max(0)
    }
}
