//! Contig-size provider: "given a BAI, return an ordered
//! list of `(contig_name, length_bp)` pairs matching the BAI's reference
//! index." Two concrete sources: a tab-separated sizes file, or a BAM
//! header's `@SQ` lines.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rust_htslib::bam;

use crate::error::IndexToolsError;

#[derive(Debug, Clone)]
pub enum ContigSource {
    SizesFile(PathBuf),
    Bam(PathBuf),
}

/// Load the ordered `(name, length_bp)` list from whichever source was
/// configured.
pub fn load(source: &ContigSource) -> Result<Vec<(String, u64)>, IndexToolsError> {
    match source {
        ContigSource::SizesFile(path) => load_sizes_file(path),
        ContigSource::Bam(path) => load_bam_header(path),
    }
}

fn load_sizes_file(path: &Path) -> Result<Vec<(String, u64)>, IndexToolsError> {
    let file = File::open(path).map_err(|e| IndexToolsError::io(path, e))?;
    let reader = BufReader::new(file);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| IndexToolsError::io(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let name = fields.next().ok_or_else(|| {
            IndexToolsError::InconsistentInputs(format!(
                "malformed contig sizes line: {line:?}"
            ))
        })?;
        let length: u64 = fields
            .next()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| {
                IndexToolsError::InconsistentInputs(format!(
                    "malformed contig length in line: {line:?}"
                ))
            })?;
        out.push((name.to_string(), length));
    }
    Ok(out)
}

fn load_bam_header(path: &Path) -> Result<Vec<(String, u64)>, IndexToolsError> {
    let reader = bam::Reader::from_path(path).map_err(|e| IndexToolsError::IOError {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
    })?;
    let header = reader.header().to_owned();
    let mut out = Vec::with_capacity(header.target_count() as usize);
    for tid in 0..header.target_count() {
        let name = String::from_utf8_lossy(header.tid2name(tid)).into_owned();
        let length = header.target_len(tid).unwrap_or(0);
        out.push((name, length));
    }
    Ok(out)
}

/// Validate that the contig list and the BAI's reference slots agree in
/// count, and (when both are available by name) in name order.
pub fn validate_against_bai(
    contigs: &[(String, u64)],
    n_bai_references: usize,
) -> Result<(), IndexToolsError> {
    if contigs.len() != n_bai_references {
        return Err(IndexToolsError::InconsistentInputs(format!(
            "contig provider yielded {} contigs but BAI has {} reference slots",
            contigs.len(),
            n_bai_references
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn sizes_file_parses_and_skips_blank_lines() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "chr1\t1000").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "chr2\t2000").unwrap();
        let contigs = load_sizes_file(f.path()).unwrap();
        assert_eq!(contigs, vec![("chr1".to_string(), 1000), ("chr2".to_string(), 2000)]);
    }

    #[test]
    fn validate_rejects_count_mismatch() {
        let contigs = vec![("chr1".to_string(), 1000)];
        let err = validate_against_bai(&contigs, 2).unwrap_err();
        assert!(matches!(err, IndexToolsError::InconsistentInputs(_)));
    }

    #[test]
    fn validate_accepts_matching_count() {
        let contigs = vec![("chr1".to_string(), 1000), ("chr2".to_string(), 2000)];
        assert!(validate_against_bai(&contigs, 2).is_ok());
    }
}
