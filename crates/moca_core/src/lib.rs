//! MoCA FMR payload decoder.
//!
//! Turns the raw 32-bit word dump returned by a MoCA node's Frame Management
//! Request into PHY rates (Mbps) between every pair of nodes on the coax
//! network. Everything here is pure and allocation-light so it can run on the
//! adapter side as well as inside the exporter daemon.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod cursor;
pub mod error;
pub mod matrix;
pub mod rates;
pub mod version;

pub use cursor::{FmrEntry, FrameCursor, Phase};
pub use error::DecodeError;
pub use matrix::{compute_rates, RateMatrix, RateMatrixRow};
pub use version::{effective_version, fmr_request_version, MocaVersion, NodeMask};

/// Maximum number of nodes on one coax network.
pub const MAX_NUM_NODES: u8 = 16;

/// Word index at which per-destination entries start; words before it are header.
pub const FMR_PAYLOAD_START: usize = 10;

/// Fixed word holding the 50 MHz GCD fields of a 2.x node on a 1.x network.
/// Does not move with node count or entry layout.
pub const MIXED_MODE_GCD_OFFSET: usize = 34;
