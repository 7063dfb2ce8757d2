//! Volume estimator: turns a reference's BAI index into a
//! sequence of fixed windows annotated with an estimated volume `V`.

use rayon::prelude::*;

use crate::bai::ReferenceIndex;
use crate::vfo::{self, VirtualPosition};

pub const WINDOW_BP: u64 = 16384;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub contig_idx: usize,
    pub start_bp: u64,
    pub end_bp: u64,
    pub volume: u64,
}

fn num_tiles(length_bp: u64) -> usize {
    if length_bp == 0 {
        0
    } else {
        ((length_bp + WINDOW_BP - 1) / WINDOW_BP) as usize
    }
}

/// Smallest tile index `t` with `linear[t] > v`, minus one, saturating at zero. Doubles as the "or tile 0 if none" case
/// (`t == 0`) and the "segment past the last tile" case (`t ==
/// linear.len()`), both handled by `saturating_sub`.
///
/// Classifies a point that is itself part of the segment (the segment's
/// start `v_i`): a VFO equal to a linear-index entry belongs to the tile
/// that entry opens.
fn tile_for_offset(linear: &[VirtualPosition], v: VirtualPosition) -> usize {
    let t = linear.partition_point(|&l| l <= v);
    t.saturating_sub(1)
}

/// Smallest tile index `t` with `linear[t] >= v`, minus one, saturating at
/// zero.
///
/// Classifies the segment's exclusive end `v_next`: `[v_i, v_next)` is
/// half-open, so a VFO equal to a linear-index entry does NOT belong to
/// this segment — it opens the tile the *next* segment starts in. Using
/// `tile_for_offset` here would misclassify the common case where
/// `v_next` is itself a linear-index entry, spuriously splitting the
/// segment's volume across a tile boundary it doesn't actually cross.
fn tile_end_for_offset(linear: &[VirtualPosition], v: VirtualPosition) -> usize {
    let t = linear.partition_point(|&l| l < v);
    t.saturating_sub(1)
}

/// Unique, sorted VFOs from the linear index and all non-metadata bin
/// chunks for one reference.
fn collect_vfos(index: &ReferenceIndex) -> Vec<VirtualPosition> {
    let mut v: Vec<VirtualPosition> = Vec::with_capacity(index.linear_index.len() * 2);
    v.extend(index.linear_index.iter().copied());
    for bin in &index.bins {
        for chunk in &bin.chunks {
            v.push(chunk.begin);
            v.push(chunk.end);
        }
    }
    v.sort_unstable();
    v.dedup();
    v
}

/// Emit the lazy, finite window sequence for one reference.
///
/// Returns an empty `Vec` when the reference carries no coverage data at
/// all (no bins, no linear index): the contig's length is still known to
/// the caller via the contig-size provider, so the partitioner can treat
/// it as an empty contig.
pub fn estimate_reference(contig_idx: usize, length_bp: u64, index: &ReferenceIndex) -> Vec<Window> {
    if index.bins.is_empty() && index.linear_index.is_empty() {
        return Vec::new();
    }

    let tiles = num_tiles(length_bp);
    if tiles == 0 {
        return Vec::new();
    }

    let mut tile_volume = vec![0f64; tiles];
    let vfos = collect_vfos(index);
    let linear = &index.linear_index;

    for pair in vfos.windows(2) {
        let (v_i, v_next) = (pair[0], pair[1]);
        let seg_volume = vfo::bytes(v_next).saturating_sub(vfo::bytes(v_i));
        if seg_volume == 0 {
            continue;
        }

        let tile_start = tile_for_offset(linear, v_i).min(tiles - 1);
        let tile_end = tile_end_for_offset(linear, v_next).min(tiles - 1);

        if tile_end <= tile_start {
            tile_volume[tile_start] += seg_volume as f64;
        } else {
            // Open question (a): strict proportionality by tile count.
            let span = (tile_end - tile_start + 1) as f64;
            let share = seg_volume as f64 / span;
            for t in tile_start..=tile_end {
                tile_volume[t] += share;
            }
        }
    }

    tile_volume
        .into_iter()
        .enumerate()
        .map(|(t, v)| {
            let start_bp = t as u64 * WINDOW_BP;
            let end_bp = (start_bp + WINDOW_BP).min(length_bp);
            Window {
                contig_idx,
                start_bp,
                end_bp,
                volume: v.round() as u64,
            }
        })
        .collect()
}

/// Per-reference estimation may run in parallel; results are
/// reassembled in BAI reference order before being handed to later stages.
pub fn estimate_all(lengths_bp: &[u64], indices: &[ReferenceIndex]) -> Vec<Window> {
    let mut per_ref: Vec<(usize, Vec<Window>)> = (0..indices.len())
        .into_par_iter()
        .map(|i| (i, estimate_reference(i, lengths_bp[i], &indices[i])))
        .collect();
    per_ref.sort_unstable_by_key(|(i, _)| *i);
    per_ref.into_iter().flat_map(|(_, w)| w).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bai::{Bin, Chunk, ReferenceIndex};

    fn vfo(raw: u64) -> VirtualPosition {
        VirtualPosition::from(raw)
    }

    #[test]
    fn empty_reference_yields_zero_windows() {
        let idx = ReferenceIndex {
            bins: vec![],
            linear_index: vec![],
            metadata: None,
        };
        assert!(estimate_reference(0, 100_000, &idx).is_empty());
    }

    #[test]
    fn uniform_single_tile_volume() {
        // One bin whose chunk spans exactly tile 0; linear index anchors
        // tile 0 at offset 0 and tile 1 starts after the chunk.
        let idx = ReferenceIndex {
            bins: vec![Bin {
                id: 0,
                chunks: vec![Chunk {
                    begin: vfo(0),
                    end: vfo(1000),
                }],
            }],
            linear_index: vec![vfo(0)],
            metadata: None,
        };
        let windows = estimate_reference(0, WINDOW_BP, &idx);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].volume, 1000);
    }

    #[test]
    fn terminal_window_is_shorter() {
        let idx = ReferenceIndex {
            bins: vec![],
            linear_index: vec![vfo(0)],
            metadata: None,
        };
        let windows = estimate_reference(0, WINDOW_BP + 100, &idx);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].start_bp, WINDOW_BP);
        assert_eq!(windows[1].end_bp, WINDOW_BP + 100);
    }

    #[test]
    fn segment_spanning_tiles_splits_proportionally() {
        let idx = ReferenceIndex {
            bins: vec![Bin {
                id: 0,
                chunks: vec![Chunk {
                    begin: vfo(0),
                    end: vfo(2000),
                }],
            }],
            linear_index: vec![vfo(0), vfo(1000)],
            metadata: None,
        };
        let windows = estimate_reference(0, 2 * WINDOW_BP, &idx);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].volume, 1000);
        assert_eq!(windows[1].volume, 1000);
    }
}
