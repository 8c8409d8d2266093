//! On-disk format constants shared by every other module.
//!
//! # Archive layout
//!
//! ```text
//! [0, HEADER_SIZE)                fixed header (see header.rs)
//! [HEADER_SIZE, block_offset)     SAM text header, verbatim
//! [block_offset, index_offset)    bzip2-compressed record blocks, back to back
//! [index_offset, EOF)             one bzip2 stream: the block index
//! ```
//!
//! # Endianness
//! All numeric fields in the header and the index are little-endian. This is
//! frozen for `FORMAT_VERSION` and is not renegotiated at runtime.

/// On-disk magic, 4 ASCII bytes, not itself byte-order sensitive.
pub const MAGIC: &[u8; 4] = b"DAM1";

/// `version` field on disk is this value × 100 (currently encodes 1.01).
pub const FORMAT_VERSION: u32 = 101;

/// Fixed byte size of the header region.
pub const HEADER_SIZE: usize = 512;

/// Target uncompressed size of a record block before compression.
///
/// A block may exceed this when a single read id's records don't fit — see
/// the rollover rule in `creator.rs`.
pub const BLOCKSIZE: usize = 1_048_576;

/// Default byte budget for the LRU block cache: 100 × `BLOCKSIZE`.
pub const DEFAULT_CACHE_BYTES: usize = 100 * BLOCKSIZE;

/// Sentinel read id terminating the block index. Sorts greater than any
/// printable-ASCII read id in practice, but not greater than every possible
/// byte value — read ids containing bytes above `0x7E` are out of scope.
pub const SENTINEL_ID: &str = "~";
