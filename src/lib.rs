//! # dam — DAM ("dessicated BAM") archive format reference implementation
//!
//! Format guarantees:
//! - All integer fields are little-endian, frozen and documented at every codec boundary
//! - The fixed 512-byte header precedes a raw SAM text header, a run of bzip2-compressed
//!   sorted record blocks, and a bzip2-compressed sparse block index
//! - All records sharing a read id live in exactly one block
//! - The index is strictly ascending by id and ends with the `"~"` sentinel
//! - Archives are append-only at creation and read-only thereafter; there is no
//!   in-place mutation support

pub mod cache;
pub mod codec;
pub mod creator;
pub mod error;
pub mod format;
pub mod header;
pub mod index;
pub mod iterator;
pub mod procs;
pub mod reader;
pub mod rehydrator;

pub use creator::{create_from_lines, dessicate};
pub use error::{DamError, Result};
pub use header::Header;
pub use index::{BlockIndex, IndexEntry};
pub use iterator::ReadIterator;
pub use reader::Reader;
pub use rehydrator::{rehydrate, RehydrationStats};
