//! End-to-end decoding of synthetic FMR payloads.
//!
//! Payloads are built with a small MSB-first bit packer that lays entries out
//! the way an adapter does: back to back from word 10, absent destinations
//! still occupying their width.

use std::collections::BTreeMap;

use moca_core::rates::{rate_100mhz, rate_50mhz};
use moca_core::{
    compute_rates, DecodeError, FrameCursor, MocaVersion, NodeMask, Phase, RateMatrix,
    FMR_PAYLOAD_START,
};

/// MSB-first bit writer over 32-bit words.
struct BitPacker {
    words: Vec<u32>,
    bit: usize,
}

impl BitPacker {
    fn new() -> Self {
        Self {
            words: vec![0; FMR_PAYLOAD_START],
            bit: FMR_PAYLOAD_START * 32,
        }
    }

    fn push(&mut self, value: u32, width: usize) {
        for i in (0..width).rev() {
            let word = self.bit / 32;
            if word >= self.words.len() {
                self.words.push(0);
            }
            if value >> i & 1 == 1 {
                self.words[word] |= 1 << (31 - self.bit % 32);
            }
            self.bit += 1;
        }
    }

    fn wide(&mut self, gap_nper: u32, gap_vlper: u32, symbols_nper: u32, symbols_vlper: u32) {
        self.push(gap_nper, 8);
        self.push(gap_vlper, 8);
        self.push(symbols_nper, 16);
        self.push(symbols_vlper, 16);
    }

    fn narrow(&mut self, gap: u32, symbols: u32) {
        self.push(gap, 5);
        self.push(symbols, 11);
    }

    fn finish(mut self, len: usize) -> Vec<u32> {
        self.words.resize(len.max(self.words.len()), 0);
        self.words
    }
}

fn versions(pairs: &[(u8, u8)]) -> BTreeMap<u8, MocaVersion> {
    pairs.iter().map(|&(n, v)| (n, MocaVersion(v))).collect()
}

#[test]
fn two_node_moca25_network() {
    let words = vec![0x1234_5678u32; 50];
    let node_versions = versions(&[(0, 0x25), (1, 0x25)]);

    let row = compute_rates(
        0,
        &words,
        MocaVersion::V2_5,
        MocaVersion::V2_5,
        MocaVersion::V2_5,
        NodeMask(0b11),
        &node_versions,
    )
    .expect("50 words cover two 2.5 entries");

    assert_eq!(row.nper.keys().copied().collect::<Vec<_>>(), [0, 1]);
    assert_eq!(row.vlper.keys().copied().collect::<Vec<_>>(), [0, 1]);

    // Node 0, aligned at word 10: gaps 0x12/0x34, symbols 0x5678 and the
    // upper half of word 11.
    assert_eq!(row.nper[&0], rate_100mhz(0x12, 0x5678));
    assert_eq!(row.nper[&0], 3304);
    assert_eq!(row.vlper[&0], rate_100mhz(0x34, 0x1234));
    // Node 1, unaligned at word 11: gaps 0x56/0x78, symbols from word 12.
    assert_eq!(row.nper[&1], rate_100mhz(0x56, 0x1234));
    assert_eq!(row.vlper[&1], rate_100mhz(0x78, 0x5678));

    // Self entry carries the GCD; the mixed-mode word 34 is not consulted.
    assert_eq!(row.gcd, Some(rate_100mhz(0x12, 0x5678)));
    assert_ne!(row.gcd, Some(rate_50mhz(0x12, 0x3456)));
}

#[test]
fn decoding_is_idempotent() {
    let words = vec![0x1234_5678u32; 50];
    let node_versions = versions(&[(0, 0x25), (1, 0x25)]);
    let run = || {
        compute_rates(
            1,
            &words,
            MocaVersion::V2_5,
            MocaVersion::V2_5,
            MocaVersion::V2_5,
            NodeMask(0b11),
            &node_versions,
        )
    };
    assert_eq!(run(), run());
}

#[test]
fn full_moca25_network_with_holes() {
    // Nodes 0, 3, 4, 9 and 15 present; every other slot is a 48-bit hole.
    let mask = NodeMask(0b1000_0010_0001_1001);
    let mut packer = BitPacker::new();
    for slot in 0..16u32 {
        if mask.contains(slot as u8) {
            packer.wide(10 + slot, 5 + slot, 1000 + slot * 100, 2000 + slot * 100);
        } else {
            packer.wide(0xFF, 0xFF, 0xFFFF, 0xFFFF);
        }
    }
    let words = packer.finish(40);
    let node_versions: BTreeMap<u8, MocaVersion> =
        mask.iter().map(|n| (n, MocaVersion::V2_5)).collect();

    let row = compute_rates(
        4,
        &words,
        MocaVersion::V2_5,
        MocaVersion::V2_5,
        MocaVersion::V2_5,
        mask,
        &node_versions,
    )
    .unwrap();

    assert_eq!(row.nper.len(), 5);
    for slot in mask.iter() {
        let s = slot as u32;
        assert_eq!(row.nper[&slot], rate_100mhz(10 + s, 1000 + s * 100), "nper {}", slot);
        assert_eq!(row.vlper[&slot], rate_100mhz(5 + s, 2000 + s * 100), "vlper {}", slot);
    }
    assert_eq!(row.gcd, Some(rate_100mhz(14, 1400)));
}

#[test]
fn moca1_network_with_holes() {
    let mask = NodeMask(0b0000_0000_0010_0110);
    let mut packer = BitPacker::new();
    for slot in 0..16u32 {
        if mask.contains(slot as u8) {
            packer.narrow(slot + 3, 700 + slot);
        } else {
            packer.narrow(0x1F, 0x7FF);
        }
    }
    let words = packer.finish(20);
    let node_versions = versions(&[(1, 0x11), (2, 0x11), (5, 0x11)]);

    let row = compute_rates(
        2,
        &words,
        MocaVersion::V1_1,
        MocaVersion::V1_1,
        MocaVersion::V1_1,
        mask,
        &node_versions,
    )
    .unwrap();

    assert_eq!(row.nper.keys().copied().collect::<Vec<_>>(), [1, 2, 5]);
    assert_eq!(row.nper[&5], rate_100mhz(8, 705));
    assert!(row.vlper.values().all(|&r| r == 0));
    assert_eq!(row.gcd, Some(rate_50mhz(5, 702)));
}

#[test]
fn moca2_entry_under_moca1_controller_skips_narrow() {
    // The 2.0 entry node reports in 1.x format because the NC is 1.1, so
    // absent slots are 16-bit holes even though the node itself is 2.x.
    let mask = NodeMask(0b1001);
    let mut packer = BitPacker::new();
    for slot in 0..16u32 {
        if mask.contains(slot as u8) {
            packer.narrow(12, 900 + slot);
        } else {
            packer.narrow(0, 0);
        }
    }
    let words = packer.finish(20);
    let node_versions = versions(&[(0, 0x11), (3, 0x20)]);

    let row = compute_rates(
        3,
        &words,
        MocaVersion::V2_0,
        MocaVersion::V1_1,
        MocaVersion::V1_1,
        mask,
        &node_versions,
    )
    .unwrap();

    assert_eq!(row.nper[&0], rate_100mhz(12, 900));
    assert_eq!(row.nper[&3], rate_100mhz(12, 903));
    assert_eq!(row.gcd, Some(rate_100mhz(12, 903)));
}

#[test]
fn skip_and_decode_consume_the_same_width() {
    let words = vec![0u32; 20];
    let aligned = FrameCursor::new();
    let (decoded, _) = aligned.decode(&words, MocaVersion::V2_5).unwrap();
    assert_eq!(aligned.skip(MocaVersion::V2_5), decoded);
    assert_eq!(decoded, FrameCursor::at(11, Phase::Unaligned));
}

#[test]
fn truncated_payload_is_reported_with_index() {
    let mut packer = BitPacker::new();
    packer.wide(20, 0, 2000, 0);
    let words = packer.finish(0);

    let err = compute_rates(
        0,
        &words,
        MocaVersion::V2_5,
        MocaVersion::V2_5,
        MocaVersion::V2_5,
        NodeMask(0b11),
        &versions(&[(0, 0x25), (1, 0x25)]),
    )
    .unwrap_err();

    assert_eq!(err, DecodeError::InsufficientData { index: 11, len: 12 });
    assert_eq!(
        err.to_string(),
        "insufficient FMR data at index 11 (12 words available)"
    );
}

#[test]
fn rate_matrix_serializes_by_entry_node() {
    let words = vec![0x1234_5678u32; 50];
    let node_versions = versions(&[(0, 0x25), (1, 0x25)]);
    let mut matrix = RateMatrix::new();
    for entry in [1u8, 0] {
        matrix.insert(
            compute_rates(
                entry,
                &words,
                MocaVersion::V2_5,
                MocaVersion::V2_5,
                MocaVersion::V2_5,
                NodeMask(0b11),
                &node_versions,
            )
            .unwrap(),
        );
    }

    let json = serde_json::to_value(&matrix).unwrap();
    assert_eq!(json["0"]["entry_node"], 0);
    assert_eq!(json["1"]["nper"]["0"], 3304);
    assert!(json["1"]["gcd"].is_number());
}
