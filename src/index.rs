//! Block index — the sparse `(first_read_id, byte_offset)` table.
//!
//! On disk the index is a single bzip2 stream (see `codec.rs`) whose
//! plaintext is a run of `{zero-terminated id}{u64 LE offset}` pairs, one per
//! block, terminated by the sentinel pair `(SENTINEL_ID, body_len)`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Read;

use crate::error::{DamError, Result};
use crate::format::SENTINEL_ID;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub offset: u64,
}

#[derive(Debug, Clone, Default)]
pub struct BlockIndex {
    /// Strictly ascending by `id`; the last entry is always the sentinel.
    entries: Vec<IndexEntry>,
}

impl BlockIndex {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append a `(first_read_id, offset)` pair for a just-flushed block.
    /// Callers are responsible for appending entries in ascending order.
    pub fn push_block(&mut self, first_id: String, offset: u64) {
        self.entries.push(IndexEntry { id: first_id, offset });
    }

    /// Append the terminal sentinel. Must be called exactly once, after all
    /// blocks have been pushed.
    pub fn push_sentinel(&mut self, body_len: u64) {
        self.entries.push(IndexEntry {
            id: SENTINEL_ID.to_string(),
            offset: body_len,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, i: usize) -> Option<&IndexEntry> {
        self.entries.get(i)
    }

    /// Byte extent `[start, end)` of block `i` within the block region.
    pub fn extent(&self, i: usize) -> Option<(u64, u64)> {
        let start = self.entries.get(i)?.offset;
        let end = self.entries.get(i + 1)?.offset;
        Some((start, end))
    }

    /// Number of real blocks (excludes the sentinel).
    pub fn block_count(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    /// Locate the candidate block position for read id `k`.
    ///
    /// Finds `i`, the first entry whose id is `>= k`. If `entries[i].id`
    /// equals `k` exactly, the candidate is `i` itself; otherwise it's
    /// `i - 1`. Returns `None` if `k` falls before the first block's id.
    pub fn candidate_block(&self, k: &str) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let i = self.entries.partition_point(|e| e.id.as_str() < k);
        if i < self.entries.len() && self.entries[i].id == k {
            return Some(i);
        }
        if i == 0 {
            return None; // k is before every block's first id
        }
        Some(i - 1)
    }

    /// Serialize to the on-disk (uncompressed) byte form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(entry.id.as_bytes());
            out.push(0u8);
            out.write_u64::<LittleEndian>(entry.offset)?;
        }
        Ok(out)
    }

    /// Parse the uncompressed byte form written by `to_bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut pos = 0usize;
        while pos < bytes.len() {
            let nul = bytes[pos..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| DamError::MalformedArchive("index entry missing NUL terminator".into()))?;
            let id = String::from_utf8_lossy(&bytes[pos..pos + nul]).into_owned();
            pos += nul + 1;

            if pos + 8 > bytes.len() {
                return Err(DamError::MalformedArchive("index entry truncated before its offset".into()));
            }
            let mut cursor = std::io::Cursor::new(&bytes[pos..pos + 8]);
            let offset = cursor.read_u64::<LittleEndian>()?;
            pos += 8;

            entries.push(IndexEntry { id, offset });
        }

        if entries.last().map(|e| e.id.as_str()) != Some(SENTINEL_ID) {
            return Err(DamError::MalformedArchive("index is missing its terminal sentinel".into()));
        }
        for pair in entries.windows(2) {
            if pair[0].id >= pair[1].id {
                return Err(DamError::MalformedArchive("index is not strictly ascending by id".into()));
            }
        }

        Ok(Self { entries })
    }
}

/// Decompress and parse the index region `[index_offset, EOF)`.
pub fn load<R: Read>(mut r: R) -> Result<BlockIndex> {
    let mut compressed = Vec::new();
    r.read_to_end(&mut compressed)?;
    let raw = crate::codec::decompress(&compressed)?;
    BlockIndex::from_bytes(&raw)
}
