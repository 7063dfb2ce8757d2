//! BED writer: emits the partitioned genome as a BED file.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::IndexToolsError;
use crate::partition::Partition;

/// Write `partitions` (already sorted by BAI contig order then `start_bp`
/// by construction) to `path` atomically: write to a temp file in the
/// same directory, then rename into place on success.
pub fn write_bed(
    partitions: &[Partition],
    contig_names: &[String],
    path: &Path,
) -> Result<(), IndexToolsError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new(),
    }
    .map_err(|e| IndexToolsError::io(path, e))?;

    {
        let writer = tmp.as_file_mut();
        for p in partitions {
            let contig = contig_names
                .get(p.contig_idx)
                .map(String::as_str)
                .unwrap_or("?");
            match p.feature_count {
                Some(count) => writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{}\t.\t{}",
                    contig, p.start_bp, p.end_bp, p.name, p.total_volume, count
                ),
                None => writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{}\t.",
                    contig, p.start_bp, p.end_bp, p.name, p.total_volume
                ),
            }
            .map_err(|e| IndexToolsError::io(path, e))?;
        }
        writer.flush().map_err(|e| IndexToolsError::io(path, e))?;
    }

    tmp.persist(path)
        .map_err(|e| IndexToolsError::io(path, e.error))?;
    Ok(())
}
