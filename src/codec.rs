//! Block codec — bzip2 compression for record blocks and for the index.
//!
//! No framing is added beyond bzip2's own stream format: a compressed block
//! on disk is exactly one bzip2 stream, nothing more.

use bzip2::read::{BzDecoder, BzEncoder};
use bzip2::Compression;
use std::io::Read;

use crate::error::{DamError, Result};

/// Compression level used for both record blocks and the index. bzip2 is the
/// only codec this format uses, so this is a module constant rather than a
/// user-configurable knob.
const LEVEL: Compression = Compression::best();

/// Compress `data` into a standalone bzip2 stream.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = BzEncoder::new(data, LEVEL);
    let mut out = Vec::new();
    encoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Decompress a single bzip2 stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = BzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| DamError::MalformedArchive(format!("bzip2 decompression failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let data = b"r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\nr2\t0\tchrA\t200\t60\t10M\t*\t0\t0\n".to_vec();
        let compressed = compress(&data).unwrap();
        assert_ne!(compressed, data);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn empty_round_trip() {
        let compressed = compress(&[]).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        assert!(decompressed.is_empty());
    }

    #[test]
    fn decompress_garbage_fails() {
        assert!(decompress(b"not a bzip2 stream").is_err());
    }
}
