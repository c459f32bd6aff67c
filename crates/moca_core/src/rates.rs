//! PHY rate formulas.
//!
//! Each rate is `LDPC codeword length * OFDM symbol count` over the symbol
//! duration implied by the FFT length and cyclic-prefix gap. Two fixed
//! hardware profiles exist: 100 MHz channels with a 512-point FFT and 50 MHz
//! channels with a 256-point FFT. All arithmetic is integer with floor
//! division; denominators are non-zero for every input.

use crate::version::MocaVersion;

pub const LDPC_LEN_100MHZ: u32 = 3900;
pub const LDPC_LEN_50MHZ: u32 = 1200;
pub const FFT_LEN_100MHZ: u32 = 512;
pub const FFT_LEN_50MHZ: u32 = 256;

const DIVISOR_100MHZ: u64 = 46;
const DIVISOR_50MHZ: u64 = 26;

/// Intermediates are `u64` so no `u32` input can overflow; a quotient that
/// does not fit back into `u32` saturates.
fn saturate(rate: u64) -> u32 {
    u32::try_from(rate).unwrap_or(u32::MAX)
}

/// Rate in Mbps on the 100 MHz / 512-point profile.
pub fn rate_100mhz(gap: u32, symbols: u32) -> u32 {
    let (gap, symbols) = (u64::from(gap), u64::from(symbols));
    saturate(
        (u64::from(LDPC_LEN_100MHZ) * symbols)
            / ((u64::from(FFT_LEN_100MHZ) + (gap + 10) * 2) * DIVISOR_100MHZ),
    )
}

/// Rate in Mbps on the 50 MHz / 256-point profile.
pub fn rate_50mhz(gap: u32, symbols: u32) -> u32 {
    let (gap, symbols) = (u64::from(gap), u64::from(symbols));
    saturate(
        (u64::from(LDPC_LEN_50MHZ) * symbols)
            / ((u64::from(FFT_LEN_50MHZ) + (gap * 2 + 10)) * DIVISOR_50MHZ),
    )
}

/// Normal packet-error-rate PHY rate.
///
/// A plain 2.0 entry without a VLPER profile was measured on a 50 MHz
/// channel; everything else uses the 100 MHz profile.
pub fn nper_rate(gap_nper: u32, symbols_nper: u32, version: MocaVersion, gap_vlper: u32) -> u32 {
    if gap_nper == 0 {
        return 0;
    }
    if gap_vlper == 0 && version == MocaVersion::V2_0 {
        return rate_50mhz(gap_nper, symbols_nper);
    }
    rate_100mhz(gap_nper, symbols_nper)
}

/// Very-low packet-error-rate PHY rate (MoCA 2.5 only; zero elsewhere).
pub fn vlper_rate(gap_vlper: u32, symbols_vlper: u32) -> u32 {
    if gap_vlper == 0 {
        return 0;
    }
    rate_100mhz(gap_vlper, symbols_vlper)
}

/// Greatest-common-denominator (broadcast) rate of a node.
pub fn gcd_rate(gap: u32, symbols: u32, node_version: MocaVersion) -> u32 {
    if node_version.is_moca2() {
        rate_100mhz(gap, symbols)
    } else {
        rate_50mhz(gap, symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_gap_is_zero_rate() {
        for version in [MocaVersion::V1_1, MocaVersion::V2_0, MocaVersion::V2_5] {
            assert_eq!(nper_rate(0, 2000, version, 15), 0);
            assert_eq!(nper_rate(0, 65535, version, 0), 0);
        }
        assert_eq!(vlper_rate(0, 3000), 0);
    }

    #[test]
    fn test_nper_moca20_without_vlper_uses_50mhz() {
        // 1200 * 2000 / ((256 + 50) * 26)
        assert_eq!(nper_rate(20, 2000, MocaVersion::V2_0, 0), 301);
        assert_eq!(nper_rate(20, 1000, MocaVersion::V2_0, 0), 150);
    }

    #[test]
    fn test_nper_uses_100mhz_otherwise() {
        // 3900 * 2000 / ((512 + 60) * 46) = 7_800_000 / 26_312
        assert_eq!(nper_rate(20, 2000, MocaVersion::V2_5, 15), 296);
        assert_eq!(nper_rate(20, 2000, MocaVersion::V2_5, 0), 296);
        assert_eq!(nper_rate(20, 2000, MocaVersion::V2_0, 15), 296);
    }

    #[test]
    fn test_vlper_rate() {
        // 3900 * 3000 / ((512 + 50) * 46) = 11_700_000 / 25_852
        assert_eq!(vlper_rate(15, 3000), 452);
    }

    #[test]
    fn test_gcd_rate_profiles() {
        // 1200 * 1200 / ((256 + 40) * 26) = 1_440_000 / 7_696
        assert_eq!(gcd_rate(15, 1200, MocaVersion::V1_1), 187);
        // 3900 * 2500 / ((512 + 60) * 46) = 9_750_000 / 26_312
        assert_eq!(gcd_rate(20, 2500, MocaVersion::V2_0), 370);
    }

    #[test]
    fn test_max_fields_do_not_overflow() {
        assert_eq!(rate_100mhz(255, 65535), 3900 * 65535 / ((512 + 530) * 46));
        assert_eq!(rate_50mhz(31, 2047), 1200 * 2047 / ((256 + 72) * 26));
    }

    #[test]
    fn test_out_of_range_inputs_stay_total() {
        // 3900 * 2_000_000 / ((512 + 60) * 46) = 7_800_000_000 / 26_312
        assert_eq!(nper_rate(20, 2_000_000, MocaVersion::V2_5, 15), 296_442);
        assert_eq!(gcd_rate(u32::MAX, 1, MocaVersion::V2_5), 0);
        assert_eq!(gcd_rate(u32::MAX, u32::MAX, MocaVersion::V1_1), 23);
        assert_eq!(vlper_rate(1, u32::MAX), 681_907_362);
    }
}
