//! MoCA version codes and node presence masks.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Raw one-byte MoCA version code: upper nibble major, lower nibble minor.
///
/// Comparisons use the raw byte, so `0x25` (2.5) sorts above `0x20` (2.0)
/// and every 2.x code sorts above every 1.x code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MocaVersion(pub u8);

impl MocaVersion {
    pub const V1_1: MocaVersion = MocaVersion(0x11);
    pub const V2_0: MocaVersion = MocaVersion(0x20);
    pub const V2_5: MocaVersion = MocaVersion(0x25);

    pub fn major(self) -> u8 {
        self.0 >> 4
    }

    pub fn minor(self) -> u8 {
        self.0 & 0x0F
    }

    /// True for any MoCA 2.x code (raw byte >= 0x20).
    pub fn is_moca2(self) -> bool {
        self >= Self::V2_0
    }

    /// True only for the two codes that use the 48-bit FMR entry layout.
    pub fn has_wide_entries(self) -> bool {
        self == Self::V2_0 || self == Self::V2_5
    }
}

impl From<u8> for MocaVersion {
    fn from(raw: u8) -> Self {
        MocaVersion(raw)
    }
}

impl fmt::Display for MocaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

/// Version governing the FMR field widths for one (entry, destination) pair.
///
/// A 1.x network controller forces the lowest common format along the path;
/// a 2.x controller lets the entry node report in its own format.
pub fn effective_version(entry: MocaVersion, nc: MocaVersion, dest: MocaVersion) -> MocaVersion {
    if nc.is_moca2() {
        entry
    } else {
        entry.min(nc).min(dest)
    }
}

/// Second parameter of the FMR query: 1 for a 1.x exchange, 2 for 2.x.
pub fn fmr_request_version(entry: MocaVersion, nc: MocaVersion) -> u32 {
    if entry.min(nc).is_moca2() {
        2
    } else {
        1
    }
}

/// 16-bit node presence bitmask; bit `n` set means node `n` is on the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeMask(pub u16);

impl NodeMask {
    /// Mask selecting exactly one node, as used by the FMR query.
    pub fn single(node: u8) -> Self {
        NodeMask(1u16 << (node & 0x0F))
    }

    pub fn contains(self, node: u8) -> bool {
        node < crate::MAX_NUM_NODES && self.0 & (1u16 << node) != 0
    }

    /// Present node slots in ascending order.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..crate::MAX_NUM_NODES).filter(move |&n| self.contains(n))
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    #[test]
    fn test_version_nibbles_and_display() {
        assert_eq!(MocaVersion::V2_5.major(), 2);
        assert_eq!(MocaVersion::V2_5.minor(), 5);
        assert_eq!(MocaVersion::V2_5.to_string(), "2.5");
        assert_eq!(MocaVersion::V1_1.to_string(), "1.1");
        assert_eq!(MocaVersion(0x20).to_string(), "2.0");
        assert!(MocaVersion(0x21).is_moca2());
        assert!(!MocaVersion(0x21).has_wide_entries());
        assert!(!MocaVersion(0x1F).is_moca2());
    }

    #[test]
    fn test_effective_version_nc_moca1_takes_weakest() {
        let v = effective_version(MocaVersion::V2_5, MocaVersion::V1_1, MocaVersion::V2_0);
        assert_eq!(v, MocaVersion::V1_1);

        let v = effective_version(MocaVersion::V1_1, MocaVersion(0x1F), MocaVersion(0x10));
        assert_eq!(v, MocaVersion(0x10));
    }

    #[test]
    fn test_effective_version_nc_moca2_keeps_entry() {
        // Destination capability does not narrow the entry's own format.
        let v = effective_version(MocaVersion::V2_5, MocaVersion::V2_0, MocaVersion::V1_1);
        assert_eq!(v, MocaVersion::V2_5);

        let v = effective_version(MocaVersion::V1_1, MocaVersion::V2_5, MocaVersion::V2_5);
        assert_eq!(v, MocaVersion::V1_1);
    }

    #[test]
    fn test_fmr_request_version() {
        assert_eq!(fmr_request_version(MocaVersion::V2_5, MocaVersion::V2_0), 2);
        assert_eq!(fmr_request_version(MocaVersion::V2_5, MocaVersion::V1_1), 1);
        assert_eq!(fmr_request_version(MocaVersion::V1_1, MocaVersion::V2_5), 1);
    }

    #[test]
    fn test_node_mask() {
        let mask = NodeMask(0b1000_0000_0000_0101);
        assert!(mask.contains(0));
        assert!(!mask.contains(1));
        assert!(mask.contains(15));
        assert!(!mask.contains(16));
        assert_eq!(mask.iter().collect::<Vec<_>>(), [0, 2, 15]);
        assert_eq!(mask.count(), 3);
        assert_eq!(NodeMask::single(3), NodeMask(0b1000));
    }
}
