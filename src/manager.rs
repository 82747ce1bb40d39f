use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::activity::{now_millis, ActivityTracker};
use crate::peer::PeerKey;
use crate::state::LinkState;
use crate::transport::{MeshTransport, TransportError};

/// How long a single establishment attempt may take. Kept short: callers
/// want a fast "is this peer reachable" answer, not a patient multi-hop
/// retry. A slow or absent peer must not stall the caller.
pub const ESTABLISH_TIMEOUT_SECS: f32 = 5.0;

/// Scan interval of the inactivity reaper.
pub const REAPER_INTERVAL: Duration = Duration::from_secs(30);

/// A locally-opened link idle longer than this is torn down.
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Poll interval of the incoming-link detector.
pub const DETECTOR_INTERVAL: Duration = Duration::from_secs(5);

/// Immutable snapshot of the whole registry. Replaced wholesale on every
/// mutation, so holders never observe a partially applied update.
pub type LinkTable = Arc<HashMap<PeerKey, LinkState>>;

struct Inner<T> {
    transport: T,
    links: watch::Sender<LinkTable>,
    activity: ActivityTracker,
    reaper: Mutex<Option<JoinHandle<()>>>,
    detector: Mutex<Option<JoinHandle<()>>>,
}

/// Tracks conversation links to mesh peers for one messaging session.
///
/// Cheap to clone; all clones share the same registry. Opening a link
/// starts up to two background tasks: the inactivity reaper, which closes
/// locally-opened links after ten minutes without outbound traffic, and the
/// incoming-link detector, which polls non-active peers for links they
/// opened toward us. Both stop on their own once no links are tracked and
/// are restarted by the next `open`.
///
/// Transport and peer-identifier failures never escape to callers; they are
/// folded into [`LinkState::error`] for the last attempt on that peer.
pub struct LinkManager<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for LinkManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: MeshTransport> LinkManager<T> {
    pub fn new(transport: T) -> Self {
        let (links, _) = watch::channel(Arc::new(HashMap::new()));
        Self {
            inner: Arc::new(Inner {
                transport,
                links,
                activity: ActivityTracker::default(),
                reaper: Mutex::new(None),
                detector: Mutex::new(None),
            }),
        }
    }

    /// Current state for one peer. Pure read.
    pub fn state(&self, peer: &PeerKey) -> Option<LinkState> {
        self.inner.links.borrow().get(peer).cloned()
    }

    /// Snapshot of the whole registry.
    pub fn links(&self) -> LinkTable {
        self.inner.links.borrow().clone()
    }

    /// Subscribe to registry snapshots. Every mutation publishes a fresh
    /// table; UI layers can await `changed()` and re-render from `borrow()`.
    pub fn subscribe(&self) -> watch::Receiver<LinkTable> {
        self.inner.links.subscribe()
    }

    /// Open a link to a peer, or do nothing if one is already active or an
    /// attempt is in flight. The guard check and the establishing insert are
    /// a single atomic update, so two concurrent opens for the same peer
    /// admit exactly one establishment attempt.
    pub async fn open(&self, peer: &PeerKey) {
        if !self.try_begin_establish(peer) {
            log::debug!("Link to <{}> active or establishing, skipping open", peer);
            return;
        }

        log::debug!("Establishing link to <{}>", peer);
        let result = match peer.to_bytes() {
            Ok(hash) => {
                self.inner
                    .transport
                    .establish_link(&hash, ESTABLISH_TIMEOUT_SECS)
                    .await
            }
            Err(e) => Err(TransportError::from(e)),
        };

        match result {
            Ok(outcome) => {
                let state = LinkState::from_metrics(&outcome.metrics);
                let is_active = state.is_active;
                self.insert_state(peer, state);
                if is_active && !outcome.already_existed {
                    // A reused link keeps whatever activity clock it already
                    // had; only a genuinely new link starts one.
                    self.inner.activity.mark(peer);
                }
                if is_active {
                    self.ensure_reaper();
                    log::info!(
                        "Link to <{}> established (reused: {})",
                        peer,
                        outcome.already_existed
                    );
                } else {
                    log::debug!("Establishment to <{}> returned an inactive link", peer);
                }
            }
            Err(e) => {
                log::warn!("Link establishment to <{}> failed: {}", peer, e);
                self.insert_state(peer, LinkState::failed(e.to_string()));
            }
        }

        // Even after a failed outgoing attempt the peer may still reach us.
        self.ensure_detector();
    }

    /// Close the link to a peer. The registry entry and activity record are
    /// removed regardless of what the transport reports.
    pub async fn close(&self, peer: &PeerKey) {
        let result = match peer.to_bytes() {
            Ok(hash) => self.inner.transport.close_link(&hash).await,
            Err(e) => Err(TransportError::from(e)),
        };
        match result {
            Ok(was_active) => {
                log::debug!("Closed link to <{}> (was active: {})", peer, was_active)
            }
            Err(e) => log::warn!("Error closing link to <{}>: {}", peer, e),
        }

        self.inner.links.send_if_modified(|table| {
            if !table.contains_key(peer) {
                return false;
            }
            let mut next = HashMap::clone(table);
            next.remove(peer);
            *table = Arc::new(next);
            true
        });
        self.inner.activity.remove(peer);
    }

    /// Query the transport for the peer's current link status, bypassing
    /// the establishment path, and store whatever comes back.
    pub async fn refresh(&self, peer: &PeerKey) -> LinkState {
        let state = match peer.to_bytes() {
            Ok(hash) => match self.inner.transport.link_status(&hash).await {
                Ok(metrics) => LinkState::from_metrics(&metrics),
                Err(e) => LinkState::failed(e.to_string()),
            },
            Err(e) => LinkState::failed(e.to_string()),
        };
        self.insert_state(peer, state.clone());
        state
    }

    /// Reset the peer's inactivity clock. Call whenever a message goes out,
    /// independent of link open/close.
    pub fn on_message_sent(&self, peer: &PeerKey) {
        self.inner.activity.mark(peer);
    }

    /// Abort both background loops. For session teardown; normal operation
    /// lets them stop on their own when the registry empties.
    pub fn shutdown(&self) {
        for task in [&self.inner.reaper, &self.inner.detector] {
            if let Some(handle) = task.lock().unwrap().take() {
                handle.abort();
            }
        }
    }

    /// Atomically insert an establishing entry unless the peer is already
    /// active or establishing. Returns whether this caller won the attempt.
    fn try_begin_establish(&self, peer: &PeerKey) -> bool {
        let mut admitted = false;
        self.inner.links.send_if_modified(|table| {
            if table
                .get(peer)
                .is_some_and(|s| s.is_active || s.is_establishing)
            {
                return false;
            }
            let mut next = HashMap::clone(table);
            next.insert(peer.clone(), LinkState::establishing());
            *table = Arc::new(next);
            admitted = true;
            true
        });
        admitted
    }

    fn insert_state(&self, peer: &PeerKey, state: LinkState) {
        self.inner.links.send_if_modified(|table| {
            let mut next = HashMap::clone(table);
            next.insert(peer.clone(), state);
            *table = Arc::new(next);
            true
        });
    }

    fn is_empty(&self) -> bool {
        self.inner.links.borrow().is_empty()
    }

    fn ensure_reaper(&self) {
        let mut guard = self.inner.reaper.lock().unwrap();
        if guard.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let manager = self.clone();
        *guard = Some(tokio::spawn(manager.reaper_loop()));
    }

    fn ensure_detector(&self) {
        let mut guard = self.inner.detector.lock().unwrap();
        if guard.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let manager = self.clone();
        *guard = Some(tokio::spawn(manager.detector_loop()));
    }

    /// One shared scan for every tracked link instead of a timer per peer.
    /// The only automatic trigger for closing a locally-opened link.
    async fn reaper_loop(self) {
        log::debug!("Inactivity reaper started");
        let mut links_rx = self.inner.links.subscribe();
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + REAPER_INTERVAL, REAPER_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reap_stale(now_millis()).await;
                }
                // Wakes on any registry change, in particular the removal
                // that empties it, so we never wait out a full interval
                // before noticing there is nothing left to watch.
                changed = links_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if self.is_empty() {
                break;
            }
        }
        log::debug!("Inactivity reaper stopped");
    }

    /// Close every active link whose last outbound activity is older than
    /// the inactivity timeout. A peer with no activity record at all counts
    /// as idle since epoch and is closed immediately.
    pub(crate) async fn reap_stale(&self, now_millis: u64) {
        let timeout_millis = INACTIVITY_TIMEOUT.as_millis() as u64;
        let snapshot = self.links();
        for (peer, state) in snapshot.iter() {
            if !state.is_active {
                continue;
            }
            let last = self.inner.activity.last_sent_millis(peer).unwrap_or(0);
            if now_millis.saturating_sub(last) > timeout_millis {
                log::info!("Closing idle link to <{}>", peer);
                self.close(peer).await;
            }
        }
    }

    async fn detector_loop(self) {
        log::debug!("Incoming-link detector started");
        let mut links_rx = self.inner.links.subscribe();
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + DETECTOR_INTERVAL,
            DETECTOR_INTERVAL,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.detect_incoming().await;
                }
                changed = links_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if self.is_empty() {
                break;
            }
        }
        log::debug!("Incoming-link detector stopped");
    }

    /// Poll the transport for links the remote side opened toward us. A
    /// local attempt may have failed or never happened, yet the peer can
    /// open a link independently; without this poll such links would never
    /// show up in local state.
    pub(crate) async fn detect_incoming(&self) {
        let snapshot = self.links();
        for (peer, state) in snapshot.iter() {
            if state.is_active || state.is_establishing {
                continue;
            }
            let Ok(hash) = peer.to_bytes() else {
                continue;
            };
            match self.inner.transport.link_status(&hash).await {
                Ok(metrics) if metrics.is_active => {
                    log::info!("Detected incoming link from <{}>", peer);
                    // The remote peer owns this link's keep-alive lifecycle;
                    // the activity clock is deliberately left untouched.
                    self.insert_state(peer, LinkState::from_metrics(&metrics));
                }
                Ok(_) => {}
                Err(e) => {
                    log::trace!("Status poll for <{}> failed: {}", peer, e);
                }
            }
        }
    }
}
