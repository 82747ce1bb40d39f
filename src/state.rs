use serde::{Deserialize, Serialize};

use crate::transport::LinkMetrics;

/// Per-peer link snapshot held by the registry.
///
/// Exactly one of these exists per tracked peer. Snapshots are replaced
/// whole on every transition, never mutated in place, so a reader holding
/// one never observes a half-applied update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkState {
    pub is_active: bool,
    pub is_establishing: bool,
    pub establishment_rate_bps: Option<u64>,
    pub expected_rate_bps: Option<u64>,
    pub next_hop_bitrate_bps: Option<u64>,
    pub rtt_seconds: Option<f64>,
    pub hops: Option<u32>,
    pub link_mtu: Option<u32>,
    pub rssi_dbm: Option<i32>,
    pub snr_db: Option<f64>,
    /// Last failure reason, cleared on any successful transition.
    pub error: Option<String>,
}

impl LinkState {
    /// An establishment attempt is in flight.
    pub fn establishing() -> Self {
        Self {
            is_establishing: true,
            ..Default::default()
        }
    }

    /// Establishment (or refresh/close) failed; link is not usable.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn from_metrics(metrics: &LinkMetrics) -> Self {
        Self {
            is_active: metrics.is_active,
            is_establishing: false,
            establishment_rate_bps: metrics.establishment_rate_bps,
            expected_rate_bps: metrics.expected_rate_bps,
            next_hop_bitrate_bps: metrics.next_hop_bitrate_bps,
            rtt_seconds: metrics.rtt_seconds,
            hops: metrics.hops,
            link_mtu: metrics.link_mtu,
            rssi_dbm: metrics.rssi_dbm,
            snr_db: metrics.snr_db,
            error: None,
        }
    }
}
