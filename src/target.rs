//! Target BED loading and the target intersector.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use fxhash::FxHashMap;
use log::warn;

use crate::error::IndexToolsError;
use crate::volume::Window;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub contig_idx: usize,
    pub start_bp: u64,
    pub end_bp: u64,
    pub id: u64,
}

/// One window after target intersection: volume outside any target is
/// zeroed. A window overlapping several targets keeps a single record —
/// spec §3 models a partition as a list of whole windows, so a window's
/// own sub-target split is never allowed to fragment it across a
/// partition boundary — but records every target id it overlaps, so the
/// partitioner can still tell two adjacent windows apart from the same
/// target (rule b) or from different targets.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedWindow {
    pub window: Window,
    pub volume: u64,
    pub target_ids: Vec<u64>,
}

impl TaggedWindow {
    /// Whether `self` and `other` overlap a common target — used by the
    /// partitioner to avoid splitting a single target's windows apart.
    pub fn shares_target_with(&self, other: &TaggedWindow) -> bool {
        self.target_ids.iter().any(|id| other.target_ids.contains(id))
    }
}

/// Load a target BED, keeping only contigs present in `contig_order`
/// (BAI reference order), merging overlaps per contig, and renumbering
/// ids in file order after merge. Absent contigs are warned about and
/// skipped).
pub fn load_targets(path: &Path, contig_order: &[String]) -> Result<Vec<Target>, IndexToolsError> {
    let contig_index: FxHashMap<&str, usize> = contig_order
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let file = File::open(path).map_err(|e| IndexToolsError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut by_contig: Vec<Vec<(u64, u64)>> = vec![Vec::new(); contig_order.len()];
    let mut unknown_contigs: Vec<String> = Vec::new();

    for line in reader.lines() {
        let line = line.map_err(|e| IndexToolsError::io(path, e))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("track") {
            continue;
        }
        let mut fields = line.split_whitespace();
        let contig = fields.next().ok_or_else(|| {
            IndexToolsError::InconsistentInputs(format!("malformed target BED line: {line:?}"))
        })?;
        let start: u64 = fields
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                IndexToolsError::InconsistentInputs(format!(
                    "malformed target BED start in line: {line:?}"
                ))
            })?;
        let end: u64 = fields
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                IndexToolsError::InconsistentInputs(format!(
                    "malformed target BED end in line: {line:?}"
                ))
            })?;

        match contig_index.get(contig) {
            Some(&idx) => by_contig[idx].push((start, end)),
            None => unknown_contigs.push(contig.to_string()),
        }
    }

    for contig in unknown_contigs {
        warn!("target BED references contig {contig:?}, absent from the BAI; skipping");
    }

    let mut targets = Vec::new();
    let mut next_id = 0u64;
    for (contig_idx, mut ivs) in by_contig.into_iter().enumerate() {
        ivs.sort_unstable();
        for (start, end) in merge_intervals(ivs) {
            targets.push(Target {
                contig_idx,
                start_bp: start,
                end_bp: end,
                id: next_id,
            });
            next_id += 1;
        }
    }
    Ok(targets)
}

/// Merge touching/overlapping, already start-sorted intervals. Applying
/// this to an already-merged, sorted set is the identity.
fn merge_intervals(ivs: Vec<(u64, u64)>) -> Vec<(u64, u64)> {
    if ivs.is_empty() {
        return ivs;
    }
    let mut merged = Vec::with_capacity(ivs.len());
    let mut cur = ivs[0];
    for (s, e) in ivs.into_iter().skip(1) {
        if s <= cur.1 {
            cur.1 = cur.1.max(e);
        } else {
            merged.push(cur);
            cur = (s, e);
        }
    }
    merged.push(cur);
    merged
}

/// Intersect a window sequence with the (sorted, per-contig) target list.
/// With no targets this is the identity.
pub fn intersect(windows: &[Window], targets: &[Target]) -> Vec<TaggedWindow> {
    if targets.is_empty() {
        return windows
            .iter()
            .map(|&w| TaggedWindow {
                window: w,
                volume: w.volume,
                target_ids: Vec::new(),
            })
            .collect();
    }

    // Targets grouped per contig, sorted by start, for a sweeping pointer.
    let mut by_contig: FxHashMap<usize, Vec<&Target>> = FxHashMap::default();
    for t in targets {
        by_contig.entry(t.contig_idx).or_default().push(t);
    }
    for v in by_contig.values_mut() {
        v.sort_unstable_by_key(|t| t.start_bp);
    }

    let mut out = Vec::with_capacity(windows.len());
    for &w in windows {
        let Some(contig_targets) = by_contig.get(&w.contig_idx) else {
            out.push(TaggedWindow {
                window: w,
                volume: 0,
                target_ids: Vec::new(),
            });
            continue;
        };

        let overlaps: Vec<&&Target> = contig_targets
            .iter()
            .filter(|t| t.start_bp < w.end_bp && t.end_bp > w.start_bp)
            .collect();

        if overlaps.is_empty() {
            out.push(TaggedWindow {
                window: w,
                volume: 0,
                target_ids: Vec::new(),
            });
            continue;
        }

        let window_len = (w.end_bp - w.start_bp) as f64;

        // A window overlapping several targets keeps one record: sum each
        // target's proportional share into the window's total volume and
        // record every target id it touches, rather than fragmenting the
        // window into one sub-record per target (spec §3 models a
        // partition as whole windows only).
        let mut total_share = 0.0f64;
        let mut ids = Vec::with_capacity(overlaps.len());
        for t in &overlaps {
            let overlap_bp = t.end_bp.min(w.end_bp).saturating_sub(t.start_bp.max(w.start_bp));
            if overlap_bp == 0 {
                continue;
            }
            total_share += w.volume as f64 * (overlap_bp as f64 / window_len.max(1.0));
            ids.push(t.id);
        }
        ids.sort_unstable();
        ids.dedup();

        out.push(TaggedWindow {
            window: w,
            volume: total_share.round() as u64,
            target_ids: ids,
        });
    }
    out
}
