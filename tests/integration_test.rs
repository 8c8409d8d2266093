use dam::{create_from_lines, DamError, Reader};
use std::path::Path;
use tempfile::NamedTempFile;

fn sample_lines() -> Vec<&'static str> {
    vec![
        "r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII",
        "r1\t0\tchrA\t150\t60\t10M\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII",
        "r2\t0\tchrA\t200\t60\t10M\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII",
        "r3\t0\tchrA\t300\t60\t10M\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII",
        "r4\t0\tchrA\t400\t60\t10M\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII",
        "r5\t0\tchrA\t500\t60\t10M\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII",
    ]
}

#[test]
fn dessicate_then_fetch_and_iterate_round_trip() {
    let archive = NamedTempFile::new().unwrap();
    let lines = sample_lines();
    create_from_lines(archive.path(), "@HD\tVN:1.6\n@SQ\tSN:chrA\tLN:1000\n", &lines, Path::new("/data/in.bam")).unwrap();

    let reader = Reader::new(archive.path());
    assert_eq!(reader.format_version().unwrap(), 101);
    assert_eq!(reader.source_path().unwrap(), Path::new("/data/in.bam"));
    assert_eq!(reader.sam_header().unwrap(), b"@HD\tVN:1.6\n@SQ\tSN:chrA\tLN:1000\n".to_vec());

    let r1 = reader.fetch_read("r1").unwrap();
    assert_eq!(r1.len(), 2);
    assert!(r1.iter().all(|l| l.contains("\t*\t*\n")));

    let ids: Vec<String> = reader
        .iterator(None, None)
        .unwrap()
        .map(|l| l.unwrap().split('\t').next().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["r1", "r1", "r2", "r3", "r4", "r5"]);
}

#[test]
fn bounded_iteration_matches_range() {
    let archive = NamedTempFile::new().unwrap();
    let lines = sample_lines();
    create_from_lines(archive.path(), "@HD\tVN:1.6\n", &lines, Path::new("/in.sam")).unwrap();

    let reader = Reader::new(archive.path());
    let ids: Vec<String> = reader
        .iterator(Some("r2"), Some("r4"))
        .unwrap()
        .map(|l| l.unwrap().split('\t').next().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["r2", "r3", "r4"]);
}

#[test]
fn fetch_read_missing_id_is_not_found() {
    let archive = NamedTempFile::new().unwrap();
    let lines = sample_lines();
    create_from_lines(archive.path(), "@HD\tVN:1.6\n", &lines, Path::new("/in.sam")).unwrap();

    let reader = Reader::new(archive.path());
    assert!(matches!(reader.fetch_read("nonexistent"), Err(DamError::NotFound(_))));
}

#[test]
fn empty_input_produces_an_archive_with_no_blocks() {
    let archive = NamedTempFile::new().unwrap();
    let lines: Vec<&str> = Vec::new();
    create_from_lines(archive.path(), "@HD\tVN:1.6\n", &lines, Path::new("/in.sam")).unwrap();

    let reader = Reader::new(archive.path());
    assert_eq!(reader.iterator(None, None).unwrap().count(), 0);
    assert!(matches!(reader.fetch_read("r1"), Err(DamError::NotFound(_))));
}

#[test]
fn opening_a_non_dam_file_surfaces_bad_magic() {
    let not_an_archive = NamedTempFile::new().unwrap();
    std::fs::write(not_an_archive.path(), b"this is definitely not a dam archive").unwrap();

    let reader = Reader::new(not_an_archive.path());
    assert!(matches!(reader.format_version(), Err(DamError::BadMagic)));
}
