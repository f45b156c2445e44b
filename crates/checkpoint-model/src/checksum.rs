use serde::{Deserialize, Serialize};
use std::{
    iter::Sum,
    ops::{Add, AddAssign},
};

/// Running checksum over a set of encoded key-value pairs.
///
/// Checksums of disjoint KV sets combine by adding the byte and pair counts
/// and XOR-ing the checksum word, so the result does not depend on the
/// order in which chunks report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KvChecksum {
    pub bytes: u64,
    pub kvs: u64,
    pub checksum: u64,
}

impl KvChecksum {
    pub const fn new(bytes: u64, kvs: u64, checksum: u64) -> Self {
        Self {
            bytes,
            kvs,
            checksum,
        }
    }

    /// Folds another checksum into this one.
    pub fn merge(&mut self, other: &KvChecksum) {
        self.bytes = self.bytes.wrapping_add(other.bytes);
        self.kvs = self.kvs.wrapping_add(other.kvs);
        self.checksum ^= other.checksum;
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for KvChecksum {
    type Output = KvChecksum;

    fn add(mut self, rhs: KvChecksum) -> KvChecksum {
        self.merge(&rhs);
        self
    }
}

impl AddAssign for KvChecksum {
    fn add_assign(&mut self, rhs: KvChecksum) {
        self.merge(&rhs);
    }
}

impl Sum for KvChecksum {
    fn sum<I: Iterator<Item = KvChecksum>>(iter: I) -> Self {
        iter.fold(KvChecksum::default(), Add::add)
    }
}

impl<'a> Sum<&'a KvChecksum> for KvChecksum {
    fn sum<I: Iterator<Item = &'a KvChecksum>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
