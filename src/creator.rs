//! Dessication — streams a sorted alignment source into a DAM archive.
//!
//! Writes a stub header, accumulates body content, flushes, then patches the
//! header in place once the true offsets are known. Blocks roll over only
//! once the accumulated size crosses the target *and* the read id has
//! changed, so a single oversized read-id group always stays in one block.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::{Child, ChildStdout};

use crate::codec;
use crate::error::{DamError, Result};
use crate::format::BLOCKSIZE;
use crate::header::Header;
use crate::index::BlockIndex;
use crate::procs;

/// Dessicate a coordinate- or name-sorted BAM/SAM/CRAM file at `source_path`
/// into a new archive at `archive_path`. Delegates header extraction and
/// read-id sorting to `samtools`/`sort` via `procs`, then streams the sorted
/// records through the same packing core used by `create_from_lines`.
/// `tmpdirs` are passed through to `sort` as one `-T DIR` per hint.
pub fn dessicate<P: AsRef<Path>>(archive_path: P, source_path: &Path, tmpdirs: &[std::path::PathBuf]) -> Result<()> {
    let src = source_path.to_string_lossy().into_owned();

    let sam_header = procs::run_capturing("samtools", &["view", "-H", &src], None)?;

    let mut sort_args: Vec<String> = vec!["-k1,1".to_string(), "-s".to_string()];
    for dir in tmpdirs {
        sort_args.push("-T".to_string());
        sort_args.push(dir.to_string_lossy().into_owned());
    }
    let sort_args: Vec<&str> = sort_args.iter().map(String::as_str).collect();

    let view = procs::spawn_streaming("samtools", &["view", &src])?;
    let sorted = procs::pipe_into(view, "sort", &sort_args)?;

    let records = SortedRecordStream::new(sorted)?;
    write_archive(archive_path, &sam_header, source_path, records)
}

/// Iterates the stdout of a spawned `sort` stage one line at a time,
/// surfacing the child's exit status as an error once the stream ends.
struct SortedRecordStream {
    child: Option<Child>,
    lines: std::io::Lines<BufReader<ChildStdout>>,
}

impl SortedRecordStream {
    fn new(mut child: Child) -> Result<Self> {
        let stdout = child
            .stdout
            .take()
            .expect("sort stage must have been spawned with a piped stdout");
        Ok(Self {
            child: Some(child),
            lines: BufReader::new(stdout).lines(),
        })
    }
}

impl Iterator for SortedRecordStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lines.next() {
            Some(Ok(line)) => Some(Ok(line)),
            Some(Err(e)) => Some(Err(DamError::Io(e))),
            None => {
                let mut child = self.child.take()?;
                match child.wait() {
                    Ok(status) if status.success() => None,
                    Ok(status) => Some(Err(DamError::ExternalToolError {
                        command: "sort".to_string(),
                        status: status.to_string(),
                        stderr_tail: String::new(),
                    })),
                    Err(e) => Some(Err(DamError::Io(e))),
                }
            }
        }
    }
}

/// Build an archive directly from a slice of full-form SAM record lines
/// (i.e. with real sequence/quality columns still present). Used by tests
/// and by callers that already have records in memory; the production path
/// is [`dessicate`], which streams from an external tool instead.
pub fn create_from_lines<P: AsRef<Path>>(
    archive_path: P,
    sam_header: &str,
    lines: &[&str],
    source_path: &Path,
) -> Result<()> {
    let records = lines.iter().map(|l| Ok(l.to_string()));
    write_archive(archive_path.as_ref(), sam_header.as_bytes(), source_path, records)
}

/// Core packing pipeline shared by every producer of dessicated archives.
///
/// `records` yields full-form SAM lines in non-decreasing read-id order;
/// each is dessicated (seq/qual columns replaced by their on-disk absence)
/// before being packed into the current block.
pub fn write_archive<P, I>(archive_path: P, sam_header: &[u8], source_path: &Path, records: I) -> Result<()>
where
    P: AsRef<Path>,
    I: Iterator<Item = Result<String>>,
{
    let archive_path = archive_path.as_ref();
    let mut file = BufWriter::new(File::create(archive_path)?);

    let mut header = Header::preliminary(source_path)?;
    header.write(&mut file)?;

    file.write_all(sam_header)?;
    let block_offset = header.header_offset + sam_header.len() as u64;

    let mut index = BlockIndex::new();
    let mut body_len: u64 = 0;

    let mut current_block = String::new();
    let mut current_block_first_id: Option<String> = None;
    let mut last_id: Option<String> = None;

    for record in records {
        let full_line = record?;
        let id = read_id(&full_line).to_string();
        let dessicated = dessicate_line(&full_line);

        // The size cap is checked against what the buffer would become if
        // this line were appended (`>`, not `>=`), so a block may run one
        // line past BLOCKSIZE before rolling over — and never rolls over
        // mid read-id-group regardless of size.
        let id_changed = last_id.as_deref() != Some(id.as_str());
        let would_exceed = current_block.len() + dessicated.len() + 1 > BLOCKSIZE;
        if id_changed && !current_block.is_empty() && would_exceed {
            let first_id = current_block_first_id.take().unwrap_or_default();
            index.push_block(first_id, body_len);
            body_len += flush_block(&mut file, &mut current_block)?;
        }

        if current_block.is_empty() {
            current_block_first_id = Some(id.clone());
        }
        current_block.push_str(&dessicated);
        current_block.push('\n');
        last_id = Some(id);
    }

    if !current_block.is_empty() {
        let first_id = current_block_first_id.take().unwrap_or_default();
        index.push_block(first_id, body_len);
        body_len += flush_block(&mut file, &mut current_block)?;
    }

    index.push_sentinel(body_len);
    let index_offset = block_offset + body_len;

    let compressed_index = codec::compress(&index.to_bytes()?)?;
    file.write_all(&compressed_index)?;
    file.flush()?;
    drop(file);

    header.block_offset = block_offset;
    header.index_offset = index_offset;
    let mut patch_file = std::fs::OpenOptions::new().write(true).open(archive_path)?;
    header.patch(&mut patch_file)?;

    log::info!(
        "dessicated {:?} -> {:?}: {} block(s)",
        source_path,
        archive_path,
        index.block_count(),
    );
    Ok(())
}

fn flush_block<W: Write>(w: &mut W, buf: &mut String) -> Result<u64> {
    let compressed = codec::compress(buf.as_bytes())?;
    w.write_all(&compressed)?;
    let written = compressed.len() as u64;
    buf.clear();
    Ok(written)
}

fn read_id(line: &str) -> &str {
    line.split('\t').next().unwrap_or("")
}

/// Strip the sequence (column 9) and quality (column 10) fields, the
/// defining space saving of the format. Reinflated as `*`/`*` on read.
fn dessicate_line(line: &str) -> String {
    let mut parts: Vec<&str> = line.split('\t').collect();
    if parts.len() > 10 {
        parts.remove(10);
        parts.remove(9);
    } else if parts.len() == 10 {
        parts.remove(9);
    }
    parts.join("\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;
    use tempfile::NamedTempFile;

    #[test]
    fn dessicate_line_strips_seq_and_qual() {
        let line = "r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\tACGT\tIIII";
        assert_eq!(dessicate_line(line), "r1\t0\tchrA\t100\t60\t10M\t*\t0\t0");
    }

    #[test]
    fn small_archive_round_trips_through_reader() {
        let tmp = NamedTempFile::new().unwrap();
        let lines = [
            "r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\tACGT\tIIII",
            "r2\t0\tchrA\t200\t60\t10M\t*\t0\t0\tACGT\tIIII",
        ];
        create_from_lines(tmp.path(), "@HD\tVN:1.6\n", &lines, Path::new("/in.sam")).unwrap();

        let reader = Reader::new(tmp.path());
        assert_eq!(reader.sam_header().unwrap(), b"@HD\tVN:1.6\n".to_vec());
        assert_eq!(
            reader.fetch_read("r1").unwrap(),
            vec!["r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\t*\t*\n".to_string()]
        );
    }
}
