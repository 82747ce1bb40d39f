use serde::{Deserialize, Serialize};

use crate::state::LinkState;

const LOW_MAX_BPS: u64 = 5_000;
const MEDIUM_MAX_BPS: u64 = 50_000;
const HIGH_MAX_BPS: u64 = 500_000;

/// How aggressively to compress outgoing content before sending, ordered
/// from most constrained to unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompressionPreset {
    Low,
    Medium,
    High,
    Original,
}

impl CompressionPreset {
    pub fn from_bitrate(bps: u64) -> Self {
        if bps < LOW_MAX_BPS {
            CompressionPreset::Low
        } else if bps < MEDIUM_MAX_BPS {
            CompressionPreset::Medium
        } else if bps < HIGH_MAX_BPS {
            CompressionPreset::High
        } else {
            CompressionPreset::Original
        }
    }
}

/// Best available throughput estimate for the link, in trust order:
/// actual transfer measurements, then handshake measurements, then the raw
/// first-hop bitrate. First present positive value wins.
pub fn best_rate_bps(state: &LinkState) -> Option<u64> {
    [
        state.expected_rate_bps,
        state.establishment_rate_bps,
        state.next_hop_bitrate_bps,
    ]
    .into_iter()
    .flatten()
    .find(|&rate| rate > 0)
}

/// Recommend a compression preset from the current link metrics.
///
/// Actual link measurements always override interface-speed guesses. A fast
/// first hop is only trusted when it is the whole path; with more hops
/// behind it the recommendation stays at Medium.
pub fn recommend_preset(state: &LinkState) -> CompressionPreset {
    let measured = [state.expected_rate_bps, state.establishment_rate_bps]
        .into_iter()
        .flatten()
        .find(|&rate| rate > 0);
    if let Some(rate) = measured {
        return CompressionPreset::from_bitrate(rate);
    }

    if let Some(bitrate) = state.next_hop_bitrate_bps {
        return if bitrate < MEDIUM_MAX_BPS {
            // Likely a low-bandwidth radio link on the first hop.
            CompressionPreset::from_bitrate(bitrate)
        } else if state.hops == Some(1) && bitrate >= HIGH_MAX_BPS {
            CompressionPreset::from_bitrate(bitrate)
        } else if state.hops.is_some_and(|hops| hops > 1) {
            CompressionPreset::Medium
        } else {
            CompressionPreset::from_bitrate(bitrate)
        };
    }

    // No rate data at all: fall back to hop count.
    match state.hops {
        Some(hops) if hops <= 1 => CompressionPreset::High,
        Some(hops) if hops <= 3 => CompressionPreset::Medium,
        Some(_) => CompressionPreset::Low,
        None if state.error.is_some() => CompressionPreset::Low,
        None => CompressionPreset::Medium,
    }
}

/// Estimated transfer time in seconds, or None without a usable rate.
pub fn estimate_transfer_secs(size_bytes: u64, state: &LinkState) -> Option<f64> {
    let rate = best_rate_bps(state)?;
    Some((size_bytes * 8) as f64 / rate as f64)
}

pub fn format_transfer_time(seconds: f64) -> String {
    if seconds < 1.0 {
        "< 1s".to_string()
    } else if seconds < 60.0 {
        format!("~{}s", seconds as u64)
    } else if seconds < 3600.0 {
        let total = seconds as u64;
        let mins = total / 60;
        let secs = total % 60;
        if secs == 0 {
            format!("~{}m", mins)
        } else {
            format!("~{}m {}s", mins, secs)
        }
    } else {
        let total = seconds as u64;
        let hours = total / 3600;
        let mins = (total % 3600) / 60;
        if mins == 0 {
            format!("~{}h", hours)
        } else {
            format!("~{}h {}m", hours, mins)
        }
    }
}
