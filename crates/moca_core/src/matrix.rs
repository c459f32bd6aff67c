//! Per-entry-node rate rows and their assembly from an FMR payload.

use alloc::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use crate::cursor::{mixed_mode_gcd_fields, FrameCursor};
use crate::error::DecodeError;
use crate::rates::{gcd_rate, nper_rate, rate_50mhz, vlper_rate};
use crate::version::{effective_version, MocaVersion, NodeMask};
use crate::MAX_NUM_NODES;

/// Rates reported by one entry node towards every present destination.
///
/// A destination key exists only if that destination is in the presence mask.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RateMatrixRow {
    pub entry_node: u8,
    /// Destination -> NPER rate in Mbps.
    pub nper: BTreeMap<u8, u32>,
    /// Destination -> VLPER rate in Mbps (zero when not applicable).
    pub vlper: BTreeMap<u8, u32>,
    /// The entry node's own GCD rate in Mbps.
    pub gcd: Option<u32>,
}

impl RateMatrixRow {
    pub fn new(entry_node: u8) -> Self {
        Self {
            entry_node,
            ..Self::default()
        }
    }
}

/// Rows from one scrape, keyed by entry node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateMatrix {
    rows: BTreeMap<u8, RateMatrixRow>,
}

impl RateMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row, replacing any earlier row for the same entry node.
    pub fn insert(&mut self, row: RateMatrixRow) {
        self.rows.insert(row.entry_node, row);
    }

    pub fn get(&self, entry_node: u8) -> Option<&RateMatrixRow> {
        self.rows.get(&entry_node)
    }

    pub fn rows(&self) -> impl Iterator<Item = &RateMatrixRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Decode one entry node's FMR payload into its rate row.
///
/// Destination slots 0..16 are visited in order. Absent slots are skipped
/// by bit width only. Present slots are decoded in the payload format
/// (`min(entry, nc)` narrowed per pair) and rated at the per-pair effective
/// version of the entry node itself. Running out of words anywhere fails the whole row. A node
/// missing from `node_versions` resolves as the weakest possible version.
///
/// When a 2.x node reports through a 2.x controller on a network running in
/// 1.x mode, its GCD rate is taken from the fixed mixed-mode word instead;
/// if that word is missing the per-slot GCD rate stands.
pub fn compute_rates(
    entry_node: u8,
    words: &[u32],
    entry_version: MocaVersion,
    nc_version: MocaVersion,
    network_version: MocaVersion,
    presence: NodeMask,
    node_versions: &BTreeMap<u8, MocaVersion>,
) -> Result<RateMatrixRow, DecodeError> {
    let self_version = entry_version.min(nc_version);
    let mut row = RateMatrixRow::new(entry_node);
    let mut cursor = FrameCursor::new();

    for dest in 0..MAX_NUM_NODES {
        if !presence.contains(dest) {
            cursor = cursor.skip(self_version);
            continue;
        }

        let dest_version = node_versions.get(&dest).copied().unwrap_or_default();
        // The payload is laid out in the entry's reported format, but rate
        // selection keys off the node's own version.
        let layout = effective_version(self_version, nc_version, dest_version);
        let version = effective_version(entry_version, nc_version, dest_version);
        let (next, entry) = cursor.decode(words, layout)?;
        cursor = next;

        row.nper.insert(
            dest,
            nper_rate(entry.gap_nper, entry.symbols_nper, version, entry.gap_vlper),
        );
        row.vlper
            .insert(dest, vlper_rate(entry.gap_vlper, entry.symbols_vlper));

        if dest == entry_node {
            row.gcd = Some(gcd_rate(entry.gap_nper, entry.symbols_nper, entry_version));
        }
    }

    if !network_version.is_moca2() && nc_version.is_moca2() && entry_version.is_moca2() {
        if let Ok((gap, symbols)) = mixed_mode_gcd_fields(words) {
            row.gcd = Some(rate_50mhz(gap, symbols));
        }
    }

    Ok(row)
}
