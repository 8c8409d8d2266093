//! Header codec — the fixed 512-byte region at the start of every archive.
//!
//! # On-disk layout (512 bytes, all integer fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      4   magic          = "DAM1"
//!    4      4   version        = FORMAT_VERSION (LE u32, encodes version×100)
//!    8      8   header_offset  always HEADER_SIZE (LE u64)
//!   16      8   block_offset   byte offset of the first compressed block (LE u64)
//!   24      8   index_offset   byte offset of the compressed index (LE u64)
//!   32    ...   source_path    zero-terminated absolute path of the source file
//!   ...    ...  zero padding to exactly HEADER_SIZE bytes
//! ```
//!
//! `block_offset` and `index_offset` are zero in a freshly written
//! preliminary header and are patched in place once the archive body is
//! complete (see `creator.rs`).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{DamError, Result};
use crate::format::{FORMAT_VERSION, HEADER_SIZE, MAGIC};

/// Fixed byte size of everything before `source_path`: magic + version + 3 offsets.
const FIXED_PREFIX_SIZE: usize = 4 + 4 + 8 + 8 + 8;

#[derive(Debug, Clone)]
pub struct Header {
    pub version: u32,
    pub header_offset: u64,
    pub block_offset: u64,
    pub index_offset: u64,
    pub source_path: PathBuf,
}

impl Header {
    /// Build a preliminary header for a new archive: offsets beyond
    /// `header_offset` are zero until the body is written and the header is
    /// patched.
    pub fn preliminary(source_path: &Path) -> Result<Self> {
        let header = Self {
            version: FORMAT_VERSION,
            header_offset: HEADER_SIZE as u64,
            block_offset: 0,
            index_offset: 0,
            source_path: source_path.to_path_buf(),
        };
        header.check_path_fits()?;
        Ok(header)
    }

    fn check_path_fits(&self) -> Result<()> {
        let path_bytes = path_bytes(&self.source_path);
        if FIXED_PREFIX_SIZE + path_bytes.len() + 1 > HEADER_SIZE {
            return Err(DamError::PathTooLong(self.source_path.clone()));
        }
        Ok(())
    }

    /// Write the header, padded to exactly `HEADER_SIZE` bytes.
    pub fn write<W: Write>(&self, mut w: W) -> Result<()> {
        self.check_path_fits()?;

        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(MAGIC);
        buf.write_u32::<LittleEndian>(self.version)?;
        buf.write_u64::<LittleEndian>(self.header_offset)?;
        buf.write_u64::<LittleEndian>(self.block_offset)?;
        buf.write_u64::<LittleEndian>(self.index_offset)?;
        buf.extend_from_slice(&path_bytes(&self.source_path));
        buf.push(0u8);

        debug_assert!(buf.len() <= HEADER_SIZE);
        buf.resize(HEADER_SIZE, 0u8);

        w.write_all(&buf)?;
        Ok(())
    }

    /// Read and validate the header: magic and version are checked before
    /// anything else is trusted.
    pub fn read<R: Read>(mut r: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(DamError::BadMagic);
        }

        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&magic);
        r.read_exact(&mut buf[4..])?;

        let mut cursor = io::Cursor::new(&buf[4..]);
        let version = cursor.read_u32::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(DamError::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }
        let header_offset = cursor.read_u64::<LittleEndian>()?;
        let block_offset = cursor.read_u64::<LittleEndian>()?;
        let index_offset = cursor.read_u64::<LittleEndian>()?;

        let path_start = FIXED_PREFIX_SIZE;
        let nul = buf[path_start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| DamError::MalformedArchive("header source_path is not NUL-terminated".into()))?;
        let source_path = PathBuf::from(String::from_utf8_lossy(&buf[path_start..path_start + nul]).into_owned());

        Ok(Self {
            version,
            header_offset,
            block_offset,
            index_offset,
            source_path,
        })
    }

    /// Patch `block_offset` and `index_offset` in an already-written header,
    /// seeking to the offsets field (byte 8) first.
    pub fn patch<W: Write + io::Seek>(&self, mut w: W) -> Result<()> {
        w.seek(io::SeekFrom::Start(8))?;
        let mut buf = Vec::with_capacity(24);
        buf.write_u64::<LittleEndian>(self.header_offset)?;
        buf.write_u64::<LittleEndian>(self.block_offset)?;
        buf.write_u64::<LittleEndian>(self.index_offset)?;
        w.write_all(&buf)?;
        Ok(())
    }
}

#[cfg(unix)]
fn path_bytes(p: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    p.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(p: &Path) -> Vec<u8> {
    p.to_string_lossy().into_owned().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut h = Header::preliminary(Path::new("/data/in.bam")).unwrap();
        h.block_offset = 700;
        h.index_offset = 90000;

        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);

        let read_back = Header::read(io::Cursor::new(&buf)).unwrap();
        assert_eq!(read_back.version, FORMAT_VERSION);
        assert_eq!(read_back.header_offset, HEADER_SIZE as u64);
        assert_eq!(read_back.block_offset, 700);
        assert_eq!(read_back.index_offset, 90000);
        assert_eq!(read_back.source_path, Path::new("/data/in.bam"));
    }

    #[test]
    fn bad_magic() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"NOPE");
        assert!(matches!(Header::read(io::Cursor::new(&buf)), Err(DamError::BadMagic)));
    }

    #[test]
    fn unsupported_version() {
        let h = Header::preliminary(Path::new("/x")).unwrap();
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        buf[4..8].copy_from_slice(&200u32.to_le_bytes());
        match Header::read(io::Cursor::new(&buf)) {
            Err(DamError::UnsupportedVersion { found, .. }) => assert_eq!(found, 200),
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn path_too_long_fails() {
        let huge = "/".to_string() + &"a".repeat(HEADER_SIZE);
        assert!(matches!(
            Header::preliminary(Path::new(&huge)),
            Err(DamError::PathTooLong(_))
        ));
    }

    #[test]
    fn patch_updates_offsets_in_place() {
        let h = Header::preliminary(Path::new("/data/in.bam")).unwrap();
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();

        let mut cursor = io::Cursor::new(buf);
        let mut patched = h.clone();
        patched.block_offset = 555;
        patched.index_offset = 9999;
        patched.patch(&mut cursor).unwrap();

        let read_back = Header::read(io::Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(read_back.block_offset, 555);
        assert_eq!(read_back.index_offset, 9999);
    }
}
