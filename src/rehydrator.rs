//! Rehydration — merges an archive against an external sequence source to
//! reconstruct full SAM records.
//!
//! A classic merge-join: advance the lagging side until ids line up, then
//! emit or skip based on which side is ahead.

use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{DamError, Result};
use crate::procs;
use crate::reader::Reader;

/// One parsed line from the sequence source: its read id plus the sequence
/// and quality strings to reinject.
struct SeqRecord {
    id: String,
    seq: String,
    qual: String,
}

/// Counts surfaced in the `info!` summary logged once rehydration completes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RehydrationStats {
    pub emitted: u64,
    pub reinjected: u64,
    pub left_dessicated: u64,
}

/// Rehydrate `reader`'s archive against the sequence source at
/// `seq_source_path`, writing full SAM text (header followed by records) to
/// `sink`.
pub fn rehydrate<W: Write>(reader: &Reader, seq_source_path: &Path, sink: &mut W) -> Result<RehydrationStats> {
    sink.write_all(&reader.sam_header()?)?;

    let mut seq_stream = open_sequence_stream(seq_source_path)?;
    let mut pending: Option<SeqRecord> = seq_stream.next().transpose()?;

    let mut stats = RehydrationStats::default();

    for line in reader.iterator(None, None)? {
        let dam_line = line?;
        let dam_id = dam_id_of(&dam_line);

        while let Some(rec) = &pending {
            if rec.id.as_str() < dam_id {
                pending = seq_stream.next().transpose()?;
            } else {
                break;
            }
        }

        match &pending {
            Some(rec) if rec.id == dam_id => {
                sink.write_all(reinject(&dam_line, &rec.seq, &rec.qual).as_bytes())?;
                stats.reinjected += 1;
            }
            _ => {
                // Sequence stream exhausted or ahead of this id: emit the
                // dessicated line unchanged, with its missing columns, per
                // the documented (not silently "fixed") source behavior.
                // Iterator lines come newline-stripped, so restore it here.
                sink.write_all(dam_line.as_bytes())?;
                sink.write_all(b"\n")?;
                stats.left_dessicated += 1;
            }
        }
        stats.emitted += 1;
    }

    log::info!(
        "rehydrated {:?}: {} emitted, {} reinjected, {} left dessicated",
        reader.path(),
        stats.emitted,
        stats.reinjected,
        stats.left_dessicated,
    );
    Ok(stats)
}

fn dam_id_of(line: &str) -> &str {
    line.split('\t').next().unwrap_or("")
}

/// Splice `seq`/`qual` into columns 9/10 of an otherwise-dessicated line.
fn reinject(dam_line: &str, seq: &str, qual: &str) -> String {
    let trimmed = dam_line.trim_end_matches('\n');
    let mut parts: Vec<&str> = trimmed.split('\t').collect();
    if parts.len() >= 9 {
        parts.insert(9, seq);
        parts.insert(10, qual);
    }
    let mut out = parts.join("\t");
    out.push('\n');
    out
}

/// A sorted stream of `SeqRecord`s, id-ascending, regardless of source kind.
struct SequenceStream {
    lines: Box<dyn Iterator<Item = Result<String>>>,
    parse: fn(&str) -> Result<SeqRecord>,
}

impl Iterator for SequenceStream {
    type Item = Result<SeqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.next().map(|r| r.and_then(|l| (self.parse)(&l)))
    }
}

/// Build the sorted sequence stream for `path`, dispatching on extension.
/// Fails with `UnknownExtension` before spawning anything if the extension
/// is not recognized.
fn open_sequence_stream(path: &Path) -> Result<SequenceStream> {
    let name = path.to_string_lossy();

    if has_ext(path, "bam") {
        let view = procs::spawn_streaming("samtools", &["view", &name])?;
        let sorted = procs::pipe_into(view, "sort", &["-k1,1", "-s"])?;
        Ok(SequenceStream {
            lines: Box::new(child_lines(sorted)),
            parse: parse_sam_fields,
        })
    } else if has_ext(path, "sam") || has_ext(path, "tam") {
        let grep = procs::spawn_streaming("grep", &["-v", "^@", &name])?;
        let sorted = procs::pipe_into(grep, "sort", &["-k1,1", "-s"])?;
        Ok(SequenceStream {
            lines: Box::new(child_lines(sorted)),
            parse: parse_sam_fields,
        })
    } else if name.ends_with(".fastq.gz") {
        let gunzip = procs::spawn_streaming("gunzip", &["-c", &name])?;
        fastq_stream(gunzip)
    } else if name.ends_with(".fastq.bz2") {
        let bunzip2 = procs::spawn_streaming("bunzip2", &["-c", &name])?;
        fastq_stream(bunzip2)
    } else if has_ext(path, "fastq") {
        let cat = procs::spawn_streaming("cat", &[&name])?;
        fastq_stream(cat)
    } else {
        Err(DamError::UnknownExtension(path.to_path_buf()))
    }
}

fn fastq_stream(decompressed: std::process::Child) -> Result<SequenceStream> {
    let records = fastq_to_tsv(decompressed)?;
    let sorted = procs::pipe_into_stdin(records, "sort", &["-k1,1", "-s"])?;
    Ok(SequenceStream {
        lines: Box::new(child_lines(sorted)),
        parse: parse_fastq_tsv,
    })
}

/// Turn a decompressed FASTQ stream into synthetic tab-delimited
/// `id<TAB>(9 empty columns)<TAB>seq<TAB>qual` lines so it can be sorted and
/// parsed the same way as the SAM-derived streams.
fn fastq_to_tsv(child: std::process::Child) -> Result<Vec<u8>> {
    let mut reader = BufReader::new(
        child
            .stdout
            .ok_or_else(|| DamError::MalformedArchive("fastq decompressor produced no stdout".into()))?,
    );
    let mut out = Vec::new();
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            break;
        }
        let mut seq = String::new();
        let mut plus = String::new();
        let mut qual = String::new();
        reader.read_line(&mut seq)?;
        reader.read_line(&mut plus)?;
        reader.read_line(&mut qual)?;

        let id = header
            .trim_start_matches('@')
            .trim_end()
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string();
        let empties = "\t".repeat(9);
        out.extend_from_slice(format!("{id}{empties}\t{}\t{}\n", seq.trim_end(), qual.trim_end()).as_bytes());
    }
    Ok(out)
}

fn parse_sam_fields(line: &str) -> Result<SeqRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 11 {
        return Err(DamError::MalformedArchive(format!(
            "sequence source line has too few columns: {line:?}"
        )));
    }
    Ok(SeqRecord {
        id: fields[0].to_string(),
        seq: fields[9].to_string(),
        qual: fields[10].to_string(),
    })
}

fn parse_fastq_tsv(line: &str) -> Result<SeqRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 11 {
        return Err(DamError::MalformedArchive(format!(
            "synthetic fastq line has too few columns: {line:?}"
        )));
    }
    Ok(SeqRecord {
        id: fields[0].to_string(),
        seq: fields[9].to_string(),
        qual: fields[10].to_string(),
    })
}

fn has_ext(path: &Path, ext: &str) -> bool {
    path.extension().and_then(OsStr::to_str).map(|e| e.eq_ignore_ascii_case(ext)) == Some(true)
}

fn child_lines(child: std::process::Child) -> impl Iterator<Item = Result<String>> {
    struct Lines {
        child: Option<std::process::Child>,
        inner: std::io::Lines<BufReader<std::process::ChildStdout>>,
    }
    impl Iterator for Lines {
        type Item = Result<String>;
        fn next(&mut self) -> Option<Self::Item> {
            match self.inner.next() {
                Some(Ok(l)) => Some(Ok(l)),
                Some(Err(e)) => Some(Err(DamError::Io(e))),
                None => {
                    let mut child = self.child.take()?;
                    match child.wait() {
                        Ok(status) if status.success() => None,
                        Ok(status) => Some(Err(DamError::ExternalToolError {
                            command: "<sequence source stage>".to_string(),
                            status: status.to_string(),
                            stderr_tail: String::new(),
                        })),
                        Err(e) => Some(Err(DamError::Io(e))),
                    }
                }
            }
        }
    }

    let mut child = child;
    let stdout = child.stdout.take().expect("sequence source child must have piped stdout");
    Lines {
        child: Some(child),
        inner: BufReader::new(stdout).lines(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinject_inserts_seq_and_qual() {
        let dam = "r1\t0\tchrA\t100\t60\t10M\t*\t0\t0";
        assert_eq!(reinject(dam, "ACGT", "IIII"), "r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\tACGT\tIIII\n");
    }

    #[test]
    fn unknown_extension_fails_before_spawning_anything() {
        let err = open_sequence_stream(Path::new("/tmp/reads.xyz")).unwrap_err();
        assert!(matches!(err, DamError::UnknownExtension(_)));
    }

    #[test]
    fn parse_sam_fields_rejects_short_lines() {
        assert!(parse_sam_fields("only\tthree\tcols").is_err());
    }
}
