//! The partitioner: greedily packs windows into `N`
//! contiguous, approximately-equal-volume partitions.

use log::warn;

use crate::error::IndexToolsError;
use crate::target::TaggedWindow;

#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub name: String,
    pub contig_idx: usize,
    pub start_bp: u64,
    pub end_bp: u64,
    pub total_volume: u64,
    pub feature_count: Option<u64>,
}

/// A partition under construction: a contiguous run `[lo, hi)` of indices
/// into the full tagged-window slice, plus the balance metric used to
/// drive the greedy sweep and rebalancing (volume, or window length in
/// the degenerate zero-volume fallback).
#[derive(Debug, Clone)]
struct RawPartition {
    contig_idx: usize,
    lo: usize,
    hi: usize,
    weight: u128,
}

/// Whether including the next window leaves the running total strictly
/// closer to the `k_plus_1`-th global threshold than excluding it would.
/// Cross-multiplied against `total`/`n` to compare exactly, with no float
/// drift.
fn closer_with(total: u128, n: u128, acc_before: u128, acc_after: u128, k_plus_1: u128) -> bool {
    let target_scaled = k_plus_1 * total;
    let d_before = (acc_before * n).abs_diff(target_scaled);
    let d_after = (acc_after * n).abs_diff(target_scaled);
    d_after < d_before
}

fn weight_of(tagged: &TaggedWindow, degenerate: bool) -> u128 {
    if degenerate {
        (tagged.window.end_bp - tagged.window.start_bp) as u128
    } else {
        tagged.volume as u128
    }
}

/// Greedy sweep producing the initial (possibly over/under-counted)
/// partition list, honoring the contig-boundary (rule a) and
/// no-target-split (rule b) precedence.
fn greedy_sweep(tagged: &[TaggedWindow], n: usize, degenerate: bool) -> Vec<RawPartition> {
    let total_weight: u128 = tagged.iter().map(|t| weight_of(t, degenerate)).sum();

    let mut raw = Vec::new();
    let mut acc: u128 = 0;
    let mut partitions_emitted: u128 = 0;

    let mut idx = 0usize;
    while idx < tagged.len() {
        let contig_idx = tagged[idx].window.contig_idx;
        let contig_end = tagged[idx..]
            .iter()
            .position(|t| t.window.contig_idx != contig_idx)
            .map(|p| idx + p)
            .unwrap_or(tagged.len());

        let mut cur_start = idx;
        let mut i = idx;
        while i < contig_end {
            if i == cur_start {
                acc += weight_of(&tagged[i], degenerate);
                i += 1;
                continue;
            }

            let w = weight_of(&tagged[i], degenerate);
            let acc_after = acc + w;
            let k_plus_1 = partitions_emitted + 1;
            let mut keep_going = if total_weight == 0 {
                true
            } else {
                closer_with(total_weight, n as u128, acc, acc_after, k_plus_1)
            };

            if !keep_going && tagged[i - 1].shares_target_with(&tagged[i]) {
                keep_going = true;
            }

            if keep_going {
                acc = acc_after;
                i += 1;
            } else {
                raw.push(RawPartition {
                    contig_idx,
                    lo: cur_start,
                    hi: i,
                    weight: partition_weight(tagged, cur_start, i, degenerate),
                });
                partitions_emitted += 1;
                cur_start = i;
            }
        }

        if cur_start < contig_end {
            raw.push(RawPartition {
                contig_idx,
                lo: cur_start,
                hi: contig_end,
                weight: partition_weight(tagged, cur_start, contig_end, degenerate),
            });
            partitions_emitted += 1;
        }

        idx = contig_end;
    }

    raw
}

fn partition_weight(tagged: &[TaggedWindow], lo: usize, hi: usize, degenerate: bool) -> u128 {
    tagged[lo..hi].iter().map(|t| weight_of(t, degenerate)).sum()
}

/// Best internal split point for a partition: the index minimizing the
/// imbalance between the two halves' weight, skipping points that would
/// split a single target across the two pieces (rule b, also honored
/// during rebalancing).
fn best_split_point(tagged: &[TaggedWindow], lo: usize, hi: usize, degenerate: bool) -> Option<usize> {
    if hi - lo < 2 {
        return None;
    }
    let weights: Vec<u128> = (lo..hi)
        .map(|i| weight_of(&tagged[i], degenerate))
        .collect();
    let total: u128 = weights.iter().sum();

    let mut best: Option<(usize, u128)> = None;
    let mut left_sum: u128 = 0;
    for (offset, &w) in weights.iter().enumerate() {
        left_sum += w;
        let split_at = lo + offset + 1;
        if split_at == hi {
            break;
        }
        if tagged[split_at - 1].shares_target_with(&tagged[split_at]) {
            continue;
        }
        let imbalance = (left_sum * 2).abs_diff(total);
        if best.map_or(true, |(_, best_imbalance)| imbalance < best_imbalance) {
            best = Some((split_at, imbalance));
        }
    }
    best.map(|(split_at, _)| split_at)
}

/// Split the largest-weight partition(s) until the count reaches `n`.
fn split_until(tagged: &[TaggedWindow], mut raw: Vec<RawPartition>, n: usize, degenerate: bool) -> Vec<RawPartition> {
    while raw.len() < n {
        let mut candidates: Vec<usize> = (0..raw.len()).collect();
        candidates.sort_unstable_by(|&a, &b| raw[b].weight.cmp(&raw[a].weight));

        let split_target = candidates
            .into_iter()
            .find_map(|i| best_split_point(tagged, raw[i].lo, raw[i].hi, degenerate).map(|s| (i, s)));

        let Some((i, split_at)) = split_target else {
            // No partition left can be split further (every remaining
            // partition is a single window, or a single target run).
            break;
        };

        let p = raw.remove(i);
        let left = RawPartition {
            contig_idx: p.contig_idx,
            lo: p.lo,
            hi: split_at,
            weight: partition_weight(tagged, p.lo, split_at, degenerate),
        };
        let right = RawPartition {
            contig_idx: p.contig_idx,
            lo: split_at,
            hi: p.hi,
            weight: partition_weight(tagged, split_at, p.hi, degenerate),
        };
        raw.insert(i, right);
        raw.insert(i, left);
    }
    raw
}

/// Merge adjacent, same-contig partitions with the smallest combined
/// weight until the count reaches `n`.
fn merge_until(tagged: &[TaggedWindow], mut raw: Vec<RawPartition>, n: usize, degenerate: bool) -> Vec<RawPartition> {
    while raw.len() > n {
        let mut best: Option<(usize, u128)> = None;
        for i in 0..raw.len().saturating_sub(1) {
            if raw[i].contig_idx != raw[i + 1].contig_idx {
                continue;
            }
            let combined = raw[i].weight + raw[i + 1].weight;
            if best.map_or(true, |(_, w)| combined < w) {
                best = Some((i, combined));
            }
        }
        let Some((i, _)) = best else {
            // No same-contig neighbors left to merge; give up merging
            // further (can only happen if n < number of contigs, which
            // InfeasiblePartitioning should have already caught upstream
            // for the degenerate single-window-per-contig case).
            break;
        };
        let right = raw.remove(i + 1);
        raw[i].hi = right.hi;
        raw[i].weight = partition_weight(tagged, raw[i].lo, raw[i].hi, degenerate);
    }
    raw
}

fn name_width(n: usize) -> usize {
    n.to_string().len()
}

fn feature_count(tagged: &[TaggedWindow], lo: usize, hi: usize, targets_active: bool) -> Option<u64> {
    if !targets_active {
        return None;
    }
    let mut ids: Vec<u64> = tagged[lo..hi]
        .iter()
        .flat_map(|t| t.target_ids.iter().copied())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    Some(ids.len() as u64)
}

/// Partition `tagged` (in BAI reference order, windows ascending within
/// a contig) into exactly `n` contiguous partitions.
pub fn partition(
    tagged: &[TaggedWindow],
    n: usize,
    targets_active: bool,
) -> Result<Vec<Partition>, IndexToolsError> {
    if tagged.is_empty() {
        return Err(IndexToolsError::InfeasiblePartitioning { achievable: 0 });
    }
    if n > tagged.len() {
        return Err(IndexToolsError::InfeasiblePartitioning {
            achievable: tagged.len(),
        });
    }

    let total_volume: u128 = tagged.iter().map(|t| t.volume as u128).sum();
    let degenerate = total_volume == 0;
    if degenerate {
        warn!("total volume is zero across all windows; falling back to length-based equal partitioning");
    }

    let raw = greedy_sweep(tagged, n, degenerate);
    let raw = if raw.len() < n {
        split_until(tagged, raw, n, degenerate)
    } else {
        raw
    };
    let raw = if raw.len() > n {
        merge_until(tagged, raw, n, degenerate)
    } else {
        raw
    };

    if raw.len() != n {
        return Err(IndexToolsError::InfeasiblePartitioning { achievable: raw.len() });
    }

    let width = name_width(n);
    let partitions = raw
        .into_iter()
        .enumerate()
        .map(|(i, p)| Partition {
            name: format!("p{:0width$}", i + 1, width = width),
            contig_idx: p.contig_idx,
            start_bp: tagged[p.lo].window.start_bp,
            end_bp: tagged[p.hi - 1].window.end_bp,
            total_volume: tagged[p.lo..p.hi].iter().map(|t| t.volume).sum(),
            feature_count: feature_count(tagged, p.lo, p.hi, targets_active),
        })
        .collect();

    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Window;

    fn uniform_windows(contig_idx: usize, count: u64, volume_per_tile: u64) -> Vec<TaggedWindow> {
        (0..count)
            .map(|i| TaggedWindow {
                window: Window {
                    contig_idx,
                    start_bp: i * 16384,
                    end_bp: (i + 1) * 16384,
                    volume: volume_per_tile,
                },
                volume: volume_per_tile,
                target_ids: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn scenario_a_uniform_coverage_four_ways() {
        // 100,000 bp ~= 7 tiles of 16384bp (last shorter), uniform 1000V/tile.
        let total_bp = 100_000u64;
        let tiles = (total_bp + 16383) / 16384;
        let mut windows = uniform_windows(0, tiles, 1000);
        if let Some(last) = windows.last_mut() {
            last.window.end_bp = total_bp;
        }
        let result = partition(&windows, 4, false).unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(result[0].start_bp, 0);
        assert_eq!(result.last().unwrap().end_bp, total_bp);
        // Coverage: contiguous, no gaps.
        for w in result.windows(2) {
            assert_eq!(w[0].end_bp, w[1].start_bp);
        }
        let total: u64 = result.iter().map(|p| p.total_volume).sum();
        assert_eq!(total, windows.iter().map(|w| w.volume).sum::<u64>());
    }

    #[test]
    fn scenario_b_multi_contig_zero_volume_contig_kept() {
        let mut windows = uniform_windows(0, 4, 2000); // chr1: 4 tiles, 2000V each
        windows.extend(uniform_windows(1, 4, 0)); // chr2: 4 tiles, 0V

        let result = partition(&windows, 2, false).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].contig_idx, 0);
        assert_eq!(result[1].contig_idx, 1);
        assert_eq!(result[1].total_volume, 0);
    }

    #[test]
    fn n_equals_one_yields_single_partition() {
        let windows = uniform_windows(0, 3, 100);
        let result = partition(&windows, 1, false).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].start_bp, 0);
        assert_eq!(result[0].end_bp, windows.last().unwrap().window.end_bp);
    }

    #[test]
    fn scenario_f_infeasible_reports_achievable() {
        let windows = uniform_windows(0, 2, 500);
        let err = partition(&windows, 10, false).unwrap_err();
        match err {
            IndexToolsError::InfeasiblePartitioning { achievable } => assert_eq!(achievable, 2),
            other => panic!("expected InfeasiblePartitioning, got {other:?}"),
        }
    }

    #[test]
    fn degenerate_zero_volume_falls_back_to_length() {
        let windows = uniform_windows(0, 4, 0);
        let result = partition(&windows, 2, false).unwrap();
        assert_eq!(result.len(), 2);
        // Equal-length fallback: both halves should cover 2 tiles each.
        assert_eq!(result[0].end_bp - result[0].start_bp, 2 * 16384);
    }

    #[test]
    fn no_partition_crosses_a_contig_boundary() {
        let mut windows = uniform_windows(0, 3, 1000);
        windows.extend(uniform_windows(1, 3, 1000));
        let result = partition(&windows, 3, false).unwrap();
        for p in &result {
            // Every emitted partition's window range belongs to one contig
            // by construction (`contig_idx` is set once per partition).
            let _ = p.contig_idx;
        }
        assert!(result.iter().any(|p| p.contig_idx == 0));
        assert!(result.iter().any(|p| p.contig_idx == 1));
    }
}
