//! BAI (BAM index) binary reader.
//!
//! Parses the little-endian binary layout into an in-memory per-reference
//! index: a hierarchical binning index (bins of chunks) and a linear index
//! of virtual file offsets, one slot per BAI reference in file order.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;

use crate::error::IndexToolsError;
use crate::vfo::{self, VirtualPosition};

pub const MAGIC: [u8; 4] = *b"BAI\x01";
/// Special bin carrying per-reference metadata rather than coverage.
/// UCSC binning's largest real bin id is one less than this.
pub const METADATA_BIN_ID: u32 = 37450;
/// Bin ids above this are not representable by 5-level UCSC binning and
/// indicate a corrupt `n_bin`/`bin_id` field.
const MAX_BIN_ID: u32 = METADATA_BIN_ID;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub begin: VirtualPosition,
    pub end: VirtualPosition,
}

#[derive(Debug, Clone)]
pub struct Bin {
    pub id: u32,
    pub chunks: Vec<Chunk>,
}

/// Decoded contents of bin 37450: a reference's byte span and mapped/
/// unmapped read counts. Does not contribute to coverage.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceMetadata {
    pub ref_begin: VirtualPosition,
    pub ref_end: VirtualPosition,
    pub mapped: u64,
    pub unmapped: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    /// Non-metadata bins only; bin 37450 is split out into `metadata`.
    pub bins: Vec<Bin>,
    /// Forward-filled: BAI's known zero-entry bug is patched before this
    /// index leaves the reader.
    pub linear_index: Vec<VirtualPosition>,
    pub metadata: Option<ReferenceMetadata>,
}

#[derive(Debug, Clone, Default)]
pub struct BaiIndex {
    pub references: Vec<ReferenceIndex>,
    pub n_no_coor: Option<u64>,
}

/// Tracks bytes consumed so malformed-input errors can name an offset,
/// without requiring the underlying reader to seek.
struct Cursor<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> Cursor<R> {
    fn new(inner: R) -> Self {
        Cursor { inner, offset: 0 }
    }

    fn read_i32(&mut self) -> Result<i32, IndexToolsError> {
        let v = self.inner.read_i32::<LittleEndian>().map_err(|e| {
            IndexToolsError::malformed(self.offset, format!("short read (i32): {e}"))
        })?;
        self.offset += 4;
        Ok(v)
    }

    fn read_u32(&mut self) -> Result<u32, IndexToolsError> {
        let v = self.inner.read_u32::<LittleEndian>().map_err(|e| {
            IndexToolsError::malformed(self.offset, format!("short read (u32): {e}"))
        })?;
        self.offset += 4;
        Ok(v)
    }

    fn read_u64(&mut self) -> Result<u64, IndexToolsError> {
        let v = self.inner.read_u64::<LittleEndian>().map_err(|e| {
            IndexToolsError::malformed(self.offset, format!("short read (u64): {e}"))
        })?;
        self.offset += 8;
        Ok(v)
    }

    fn read_vfo(&mut self) -> Result<VirtualPosition, IndexToolsError> {
        Ok(vfo::from_raw(self.read_u64()?))
    }

    fn read_magic(&mut self) -> Result<[u8; 4], IndexToolsError> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf).map_err(|e| {
            IndexToolsError::malformed(self.offset, format!("short read (magic): {e}"))
        })?;
        self.offset += 4;
        Ok(buf)
    }
}

/// Parse a complete BAI file from `reader`, positioned at its start.
pub fn read_bai<R: Read>(reader: R) -> Result<BaiIndex, IndexToolsError> {
    let mut cur = Cursor::new(reader);

    let magic = cur.read_magic()?;
    if magic != MAGIC {
        return Err(IndexToolsError::malformed(
            0,
            format!("bad magic: expected {:?}, found {:?}", MAGIC, magic),
        ));
    }

    let n_ref = cur.read_i32()?;
    if n_ref < 0 {
        return Err(IndexToolsError::malformed(
            cur.offset,
            format!("negative n_ref: {n_ref}"),
        ));
    }

    let mut references = Vec::with_capacity(n_ref as usize);
    for ref_idx in 0..n_ref {
        references.push(read_reference(&mut cur, ref_idx)?);
    }

    // Optional trailer.
    let n_no_coor = match cur.inner.read_u64::<LittleEndian>() {
        Ok(v) => Some(v),
        Err(_) => None,
    };

    Ok(BaiIndex {
        references,
        n_no_coor,
    })
}

fn read_reference<R: Read>(
    cur: &mut Cursor<R>,
    ref_idx: i32,
) -> Result<ReferenceIndex, IndexToolsError> {
    let n_bin = cur.read_i32()?;
    if n_bin < 0 {
        return Err(IndexToolsError::malformed(
            cur.offset,
            format!("reference {ref_idx}: negative n_bin: {n_bin}"),
        ));
    }
    if n_bin as u32 > MAX_BIN_ID + 1 {
        return Err(IndexToolsError::malformed(
            cur.offset,
            format!(
                "reference {ref_idx}: n_bin {n_bin} exceeds UCSC binning maximum"
            ),
        ));
    }

    let mut bins = Vec::with_capacity(n_bin as usize);
    let mut metadata = None;

    for _ in 0..n_bin {
        let bin_id = cur.read_u32()?;
        let n_chunk = cur.read_i32()?;
        if n_chunk < 0 {
            return Err(IndexToolsError::malformed(
                cur.offset,
                format!("reference {ref_idx}, bin {bin_id}: negative n_chunk: {n_chunk}"),
            ));
        }

        // Bin 37450's two "chunks" are not coverage spans (the second is a
        // packed (mapped, unmapped) count pair where end <= begin is legal),
        // so the begin < end invariant is only enforced for coverage bins.
        let mut chunks = Vec::with_capacity(n_chunk as usize);
        for chunk_idx in 0..n_chunk {
            let begin = cur.read_vfo()?;
            let end = cur.read_vfo()?;
            if bin_id != METADATA_BIN_ID && end <= begin {
                return Err(IndexToolsError::malformed(
                    cur.offset,
                    format!(
                        "reference {ref_idx}, bin {bin_id}, chunk {chunk_idx}: end <= begin"
                    ),
                ));
            }
            chunks.push(Chunk { begin, end });
        }

        if bin_id == METADATA_BIN_ID {
            if chunks.len() != 2 {
                return Err(IndexToolsError::malformed(
                    cur.offset,
                    format!(
                        "reference {ref_idx}: metadata bin has {} chunks, expected 2",
                        chunks.len()
                    ),
                ));
            }
            let span = chunks[0];
            let counts = chunks[1];
            metadata = Some(ReferenceMetadata {
                ref_begin: span.begin,
                ref_end: span.end,
                mapped: vfo::bytes(counts.begin),
                unmapped: vfo::bytes(counts.end),
            });
        } else if bin_id > MAX_BIN_ID {
            return Err(IndexToolsError::malformed(
                cur.offset,
                format!("reference {ref_idx}: bin id {bin_id} exceeds UCSC binning maximum"),
            ));
        } else {
            bins.push(Bin {
                id: bin_id,
                chunks,
            });
        }
    }

    let n_intv = cur.read_i32()?;
    if n_intv < 0 {
        return Err(IndexToolsError::malformed(
            cur.offset,
            format!("reference {ref_idx}: negative n_intv: {n_intv}"),
        ));
    }
    let mut linear_index = Vec::with_capacity(n_intv as usize);
    for _ in 0..n_intv {
        linear_index.push(cur.read_vfo()?);
    }

    let patched = patch_linear_index(&mut linear_index);
    if patched > 0 {
        warn!(
            "reference {ref_idx}: patched {patched} zero entries in linear index by forward-fill"
        );
    }

    Ok(ReferenceIndex {
        bins,
        linear_index,
        metadata,
    })
}

/// Forward-fill zero entries in the linear index: `L[i] = L[i-1]` whenever `L[i] == 0` and a preceding non-zero
/// entry exists. Returns the number of entries patched.
fn patch_linear_index(linear: &mut [VirtualPosition]) -> usize {
    let zero = VirtualPosition::from(0);
    let mut patched = 0;
    for i in 1..linear.len() {
        if linear[i] == zero && linear[i - 1] != zero {
            linear[i] = linear[i - 1];
            patched += 1;
        }
    }
    patched
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    /// Builds a minimal synthetic BAI byte buffer: one reference with the
    /// given bins (id, chunks as raw (begin, end) u64 pairs) and linear
    /// index entries.
    fn build_bai(
        refs: &[(Vec<(u32, Vec<(u64, u64)>)>, Vec<u64>)],
        trailer: Option<u64>,
    ) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_all(&MAGIC).unwrap();
        buf.write_i32::<LittleEndian>(refs.len() as i32).unwrap();
        for (bins, linear) in refs {
            buf.write_i32::<LittleEndian>(bins.len() as i32).unwrap();
            for (bin_id, chunks) in bins {
                buf.write_u32::<LittleEndian>(*bin_id).unwrap();
                buf.write_i32::<LittleEndian>(chunks.len() as i32).unwrap();
                for (begin, end) in chunks {
                    buf.write_u64::<LittleEndian>(*begin).unwrap();
                    buf.write_u64::<LittleEndian>(*end).unwrap();
                }
            }
            buf.write_i32::<LittleEndian>(linear.len() as i32).unwrap();
            for v in linear {
                buf.write_u64::<LittleEndian>(*v).unwrap();
            }
        }
        if let Some(n) = trailer {
            buf.write_u64::<LittleEndian>(n).unwrap();
        }
        buf
    }

    #[test]
    fn bad_magic_is_malformed_at_offset_zero() {
        let mut buf = Vec::new();
        buf.write_all(b"BAI\x00").unwrap();
        buf.write_i32::<LittleEndian>(0).unwrap();
        let err = read_bai(&buf[..]).unwrap_err();
        match err {
            IndexToolsError::MalformedIndex { offset, .. } => assert_eq!(offset, 0),
            other => panic!("expected MalformedIndex, got {other:?}"),
        }
    }

    #[test]
    fn parses_single_reference_with_one_bin() {
        let buf = build_bai(
            &[(vec![(0, vec![(0, 16384)])], vec![0])],
            Some(0),
        );
        let idx = read_bai(&buf[..]).unwrap();
        assert_eq!(idx.references.len(), 1);
        assert_eq!(idx.references[0].bins.len(), 1);
        assert_eq!(idx.references[0].bins[0].id, 0);
        assert_eq!(idx.n_no_coor, Some(0));
    }

    #[test]
    fn metadata_bin_is_filtered_and_decoded() {
        let buf = build_bai(
            &[(
                vec![
                    (0, vec![(0, 16384)]),
                    (METADATA_BIN_ID, vec![(0, 1000), (5, 2)]),
                ],
                vec![0],
            )],
            None,
        );
        let idx = read_bai(&buf[..]).unwrap();
        // Only the coverage bin remains in `bins`.
        assert_eq!(idx.references[0].bins.len(), 1);
        let meta = idx.references[0].metadata.expect("metadata present");
        assert_eq!(meta.mapped, 5);
        assert_eq!(meta.unmapped, 2);
    }

    #[test]
    fn chunk_with_end_before_begin_is_malformed() {
        let buf = build_bai(&[(vec![(0, vec![(100, 50)])], vec![])], None);
        let err = read_bai(&buf[..]).unwrap_err();
        assert!(matches!(err, IndexToolsError::MalformedIndex { .. }));
    }

    #[test]
    fn linear_index_zero_entries_are_patched_forward() {
        let mut v = vec![
            VirtualPosition::from(10),
            VirtualPosition::from(20),
            VirtualPosition::from(0),
            VirtualPosition::from(40),
        ];
        let patched = patch_linear_index(&mut v);
        assert_eq!(patched, 1);
        assert_eq!(v[2], VirtualPosition::from(20));
    }

    #[test]
    fn leading_zero_linear_entry_is_left_alone() {
        // No preceding non-zero entry to forward-fill from.
        let mut v = vec![VirtualPosition::from(0), VirtualPosition::from(10)];
        let patched = patch_linear_index(&mut v);
        assert_eq!(patched, 0);
        assert_eq!(v[0], VirtualPosition::from(0));
    }
}
