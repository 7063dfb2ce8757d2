//! Virtual file offsets (VFOs), as used by the BAI linear index and bin
//! chunks: a 48-bit BGZF block coffset packed with a 16-bit within-block
//! uoffset into one `u64`. We reuse `noodles`'s BGZF virtual-position type
//! rather than re-deriving the bit packing ourselves.

pub use noodles::bgzf::VirtualPosition;

/// Scale factor calibrated so the coffset delta dominates the volume
/// estimate while the low 16 bits still carry within-block deltas. With
/// `coffset`/`uoffset` already packed this way by BAI, this reproduces the
/// raw VFO integer, but is kept as an explicit formula rather than
/// collapsed since the shift width is a documented tunable.
const BYTE_SHIFT: u32 = 16;

/// The notional uncompressed-stream byte position a VFO denotes. Used only
/// for subtracting to get segment volumes; never meaningful as an absolute
/// byte count.
pub fn bytes(v: VirtualPosition) -> u64 {
    (v.compressed() << BYTE_SHIFT) + u64::from(v.uncompressed())
}

/// Parse a raw little-endian VFO as stored in a BAI file.
pub fn from_raw(raw: u64) -> VirtualPosition {
    VirtualPosition::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_is_monotone_in_coffset() {
        let a = from_raw(100u64 << 16);
        let b = from_raw(101u64 << 16);
        assert!(bytes(a) < bytes(b));
    }

    #[test]
    fn bytes_reflects_low_bits() {
        let a = from_raw((5u64 << 16) | 10);
        let b = from_raw((5u64 << 16) | 20);
        assert_eq!(bytes(b) - bytes(a), 10);
    }
}
