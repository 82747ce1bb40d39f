use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::peer::PeerKey;

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Per-peer last-send timestamps, read by the inactivity reaper.
///
/// Written when a message goes out to a peer and when a genuinely new link
/// is established. Deliberately NOT written when an existing link is reused,
/// and never written for links the remote peer opened toward us.
#[derive(Debug, Default)]
pub(crate) struct ActivityTracker {
    last_sent: Mutex<HashMap<PeerKey, u64>>,
}

impl ActivityTracker {
    pub fn mark(&self, peer: &PeerKey) {
        self.mark_at(peer, now_millis());
    }

    pub fn mark_at(&self, peer: &PeerKey, millis: u64) {
        self.last_sent.lock().unwrap().insert(peer.clone(), millis);
    }

    pub fn last_sent_millis(&self, peer: &PeerKey) -> Option<u64> {
        self.last_sent.lock().unwrap().get(peer).copied()
    }

    pub fn remove(&self, peer: &PeerKey) {
        self.last_sent.lock().unwrap().remove(peer);
    }
}
