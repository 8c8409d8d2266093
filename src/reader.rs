//! Reader — the read-side archive facade.
//!
//! A thin public facade (`Reader`) over a lazily-populated inner state
//! (`Opened`) holding the file handle, parsed header, loaded index, and
//! block cache. The archive is not touched on disk until the first accessor
//! call.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::cache::{BlockCache, CachedBlock};
use crate::error::{DamError, Result};
use crate::header::Header;
use crate::index::BlockIndex;
use crate::iterator::{IterState, ReadIterator};

struct Opened {
    file: File,
    header: Header,
    index: BlockIndex,
    cache: BlockCache,
}

pub struct Reader {
    path: PathBuf,
    inner: RefCell<Option<Opened>>,
    hidden_iter: RefCell<Option<IterState>>,
}

impl Reader {
    /// Construct a reader for `path`. No I/O happens until an accessor is
    /// called.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            inner: RefCell::new(None),
            hidden_iter: RefCell::new(None),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.borrow().is_some() {
            return Ok(());
        }

        let mut file = File::open(&self.path)?;
        let header = Header::read(&mut file)?;

        file.seek(SeekFrom::Start(header.index_offset))?;
        let index = crate::index::load(&mut file)?;

        log::info!(
            "opened archive {:?}: {} block(s), format version {}",
            self.path,
            index.block_count(),
            header.version,
        );

        *self.inner.borrow_mut() = Some(Opened {
            file,
            header,
            index,
            cache: BlockCache::with_default_capacity(),
        });
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format_version(&self) -> Result<u32> {
        self.ensure_open()?;
        Ok(self.inner.borrow().as_ref().unwrap().header.version)
    }

    pub fn header_offset(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.inner.borrow().as_ref().unwrap().header.header_offset)
    }

    pub fn block_offset(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.inner.borrow().as_ref().unwrap().header.block_offset)
    }

    pub fn index_offset(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.inner.borrow().as_ref().unwrap().header.index_offset)
    }

    pub fn source_path(&self) -> Result<PathBuf> {
        self.ensure_open()?;
        Ok(self.inner.borrow().as_ref().unwrap().header.source_path.clone())
    }

    /// Raw bytes of the SAM text header: `[header_offset, block_offset)`.
    pub fn sam_header(&self) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let mut guard = self.inner.borrow_mut();
        let opened = guard.as_mut().unwrap();
        let start = opened.header.header_offset;
        let len = opened.header.block_offset.saturating_sub(start);
        opened.file.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; len as usize];
        opened.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub(crate) fn block_count(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.inner.borrow().as_ref().unwrap().index.block_count())
    }

    pub(crate) fn candidate_block(&self, id: &str) -> Result<Option<usize>> {
        self.ensure_open()?;
        Ok(self.inner.borrow().as_ref().unwrap().index.candidate_block(id))
    }

    /// Fetch and decompress block `i`, consulting (and populating) the LRU
    /// cache. Returns an empty block if the computed extent is non-positive.
    pub(crate) fn fetch_block(&self, i: usize) -> Result<CachedBlock> {
        self.ensure_open()?;
        let mut guard = self.inner.borrow_mut();
        let opened = guard.as_mut().unwrap();

        if let Some(cached) = opened.cache.get(i) {
            return Ok(cached);
        }

        let (start, end) = opened
            .index
            .extent(i)
            .ok_or_else(|| DamError::MalformedArchive(format!("block index position {i} out of range")))?;
        if end <= start {
            return Ok(opened.cache.insert(i, Vec::new()));
        }

        let length = (end - start) as usize;
        opened.file.seek(SeekFrom::Start(start))?;
        let mut compressed = vec![0u8; length];
        opened.file.read_exact(&mut compressed)?;

        let plaintext = crate::codec::decompress(&compressed)?;
        let text = String::from_utf8_lossy(&plaintext).into_owned();
        let mut lines: Vec<String> = text.split('\n').map(|s| s.to_string()).collect();
        if lines.last().map(|s| s.is_empty()).unwrap_or(false) {
            lines.pop();
        }

        Ok(opened.cache.insert(i, lines))
    }

    /// Fetch every record line for `id`, star-reinflated (columns 9/10
    /// restored as `*`). Fails with `NotFound` if no line matches.
    pub fn fetch_read(&self, id: &str) -> Result<Vec<String>> {
        let candidate = self
            .candidate_block(id)?
            .ok_or_else(|| DamError::NotFound(id.to_string()))?;
        let lines = self.fetch_block(candidate)?;

        let prefix = format!("{id}\t");
        let start = lines.partition_point(|line| line.as_str() < prefix.as_str());
        let mut matches = Vec::new();
        for line in &lines[start..] {
            if line.starts_with(&prefix) {
                matches.push(reinflate(line));
            } else {
                break;
            }
        }

        if matches.is_empty() {
            return Err(DamError::NotFound(id.to_string()));
        }
        Ok(matches)
    }

    /// Build a forward iterator over the inclusive `[start_id, end_id]`
    /// range. `None` on either bound means unbounded in that direction.
    pub fn iterator<'a>(&'a self, start_id: Option<&str>, end_id: Option<&str>) -> Result<ReadIterator<'a>> {
        let state = IterState::new(self, start_id, end_id)?;
        Ok(ReadIterator::new(self, state))
    }

    /// Convenience wrapper owning a hidden iterator: the first call with a
    /// given range starts it, subsequent calls advance it, and exhaustion
    /// resets the hidden state so the next call starts fresh.
    pub fn next_read(&self, start_id: Option<&str>, end_id: Option<&str>) -> Result<Option<String>> {
        {
            let mut hidden = self.hidden_iter.borrow_mut();
            if hidden.is_none() {
                *hidden = Some(IterState::new(self, start_id, end_id)?);
            }
        }

        let next = {
            let mut hidden = self.hidden_iter.borrow_mut();
            hidden.as_mut().unwrap().advance(self)?
        };

        if next.is_none() {
            *self.hidden_iter.borrow_mut() = None;
        }
        Ok(next)
    }
}

/// Insert `*` as columns 9 and 10 (0-indexed) of a dessicated line, and
/// restore the trailing newline that was stripped when the block was split.
pub(crate) fn reinflate(line: &str) -> String {
    let mut parts: Vec<&str> = line.split('\t').collect();
    if parts.len() >= 9 {
        parts.insert(9, "*");
        parts.insert(10, "*");
    }
    let mut out = parts.join("\t");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creator::create_from_lines;
    use tempfile::NamedTempFile;

    fn build(lines: &[&str]) -> NamedTempFile {
        let tmp = NamedTempFile::new().unwrap();
        create_from_lines(tmp.path(), "@HD\tVN:1.6\n", lines, Path::new("/in.sam")).unwrap();
        tmp
    }

    #[test]
    fn single_record_round_trip() {
        let tmp = build(&["r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII"]);
        let reader = Reader::new(tmp.path());
        let recs = reader.fetch_read("r1").unwrap();
        assert_eq!(recs, vec!["r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\t*\t*\n".to_string()]);
    }

    #[test]
    fn grouped_ids_share_a_block() {
        let tmp = build(&[
            "r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\tAAAAAAAAAA\tIIIIIIIIII",
            "r1\t0\tchrA\t150\t60\t10M\t*\t0\t0\tAAAAAAAAAA\tIIIIIIIIII",
            "r2\t0\tchrA\t200\t60\t10M\t*\t0\t0\tAAAAAAAAAA\tIIIIIIIIII",
        ]);
        let reader = Reader::new(tmp.path());
        assert_eq!(reader.fetch_read("r1").unwrap().len(), 2);
        assert_eq!(reader.block_count().unwrap(), 1);
    }

    #[test]
    fn fetch_read_not_found() {
        let tmp = build(&["r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\tAAAAAAAAAA\tIIIIIIIIII"]);
        let reader = Reader::new(tmp.path());
        assert!(matches!(reader.fetch_read("zzz"), Err(DamError::NotFound(_))));
        assert!(matches!(reader.fetch_read("a"), Err(DamError::NotFound(_))));
    }

    #[test]
    fn bad_magic_surfaces_on_first_access() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"NOPE not a dam file at all").unwrap();
        let reader = Reader::new(tmp.path());
        assert!(matches!(reader.format_version(), Err(DamError::BadMagic)));
    }
}
