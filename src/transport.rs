use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::peer::PeerKeyError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("link establishment timed out after {0:.1}s")]
    Timeout(f32),
    #[error("no path to destination")]
    NoPath,
    #[error("invalid peer hash: {0}")]
    InvalidPeer(#[from] PeerKeyError),
    #[error("{0}")]
    Other(String),
}

/// Raw link metrics as reported by the mesh transport.
///
/// The three rate signals carry different levels of trust: `expected_rate_bps`
/// is measured from actual prior transfers, `establishment_rate_bps` from the
/// handshake, and `next_hop_bitrate_bps` is only the first physical hop and
/// may not represent the full multi-hop path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkMetrics {
    pub is_active: bool,
    pub establishment_rate_bps: Option<u64>,
    pub expected_rate_bps: Option<u64>,
    pub next_hop_bitrate_bps: Option<u64>,
    pub rtt_seconds: Option<f64>,
    pub hops: Option<u32>,
    pub link_mtu: Option<u32>,
    /// Interface-wide RSSI at status time (RNode and BLE interfaces).
    pub rssi_dbm: Option<i32>,
    /// Interface-wide SNR at status time (RNode interfaces only).
    pub snr_db: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EstablishOutcome {
    pub metrics: LinkMetrics,
    /// True when the transport reused a live link instead of creating one.
    pub already_existed: bool,
}

/// Contract for the underlying mesh transport (a Reticulum-equivalent stack).
///
/// Every call is a suspension point. `establish_link` must give up after
/// `timeout_secs` and report the timeout as an ordinary error; `link_status`
/// must return promptly without initiating any network activity of its own.
pub trait MeshTransport: Send + Sync + 'static {
    fn establish_link(
        &self,
        peer_hash: &[u8],
        timeout_secs: f32,
    ) -> impl Future<Output = Result<EstablishOutcome, TransportError>> + Send;

    fn link_status(
        &self,
        peer_hash: &[u8],
    ) -> impl Future<Output = Result<LinkMetrics, TransportError>> + Send;

    /// Tears down the link if one exists. Returns whether a live link was
    /// actually closed.
    fn close_link(
        &self,
        peer_hash: &[u8],
    ) -> impl Future<Output = Result<bool, TransportError>> + Send;
}
