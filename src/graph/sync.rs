//! Graph sync controller
//!
//! Keeps the local snapshot in step with the authority: a fixed-interval
//! poll, plus an immediate reconcile after every mutation. Mutations are
//! never applied optimistically.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{EdgeRequest, PortRef, Snapshot};
use crate::authority::Authority;
use crate::error::Result;

/// Default polling cadence
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Running poll task and its shutdown signal
struct Poller {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Reconciles the local snapshot against the authority
///
/// Cheap to clone; clones share the authority, the published snapshot and
/// the poller slot.
#[derive(Clone)]
pub struct GraphSync {
    authority: Arc<dyn Authority>,
    snapshot_tx: Arc<watch::Sender<Arc<Snapshot>>>,
    poller: Arc<Mutex<Option<Poller>>>,
    poll_interval: Duration,
}

impl GraphSync {
    pub fn new(authority: Arc<dyn Authority>, poll_interval: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            authority,
            snapshot_tx: Arc::new(snapshot_tx),
            poller: Arc::new(Mutex::new(None)),
            poll_interval,
        }
    }

    /// Latest applied snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver notified each time a snapshot is applied
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Fetch the authority's state and replace the local snapshot with it
    ///
    /// On failure the previous snapshot stays in place. Replies are applied
    /// in arrival order: the last one to arrive wins.
    pub async fn reconcile(&self) -> Result<Arc<Snapshot>> {
        let status = self.authority.status().await?;
        let snapshot = Arc::new(Snapshot::from_status(status));
        debug!(
            "Snapshot applied: {} device(s), {} edge(s)",
            snapshot.devices().count(),
            snapshot.edge_count()
        );
        self.snapshot_tx.send_replace(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Request an edge, then reconcile
    ///
    /// Fails with `InvalidEdge` without contacting the authority when either
    /// endpoint is unknown or lacks the needed capability.
    pub async fn connect(&self, from: PortRef, to: PortRef) -> Result<Arc<Snapshot>> {
        self.snapshot().validate_edge(&from, &to)?;
        info!("🔗 Connecting {} -> {}", from, to);
        self.authority.connect(EdgeRequest { from, to }).await?;
        self.reconcile().await
    }

    /// Request removal of an edge, then reconcile
    ///
    /// An edge missing from the local snapshot is still forwarded; the
    /// authority's reply decides the new state.
    pub async fn disconnect(&self, from: PortRef, to: PortRef) -> Result<Arc<Snapshot>> {
        let snapshot = self.snapshot();
        snapshot.validate_edge(&from, &to)?;
        if !snapshot.has_edge(&from, &to) {
            debug!("Edge {} -> {} not in local snapshot, forwarding anyway", from, to);
        }
        info!("✂️  Disconnecting {} -> {}", from, to);
        self.authority.disconnect(EdgeRequest { from, to }).await?;
        self.reconcile().await
    }

    /// Ask the authority to reset, drop all local graph state and rebuild it
    ///
    /// The rebuilt snapshot replaces the local one wholesale, nothing from the
    /// old graph carries over. If the follow-up fetch fails, the previous
    /// snapshot stays in place.
    pub async fn reset(&self) -> Result<Arc<Snapshot>> {
        info!("🔄 Resetting authority state");
        self.authority.reset().await?;

        let status = self.authority.status().await?;
        let snapshot = Arc::new(Snapshot::from_status(status));
        self.snapshot_tx.send_replace(Arc::clone(&snapshot));
        debug!("Snapshot rebuilt after reset: {} edge(s)", snapshot.edge_count());
        Ok(snapshot)
    }

    pub fn is_polling(&self) -> bool {
        self.poller.lock().is_some()
    }

    /// Start the poll loop: one reconcile now, then one per interval
    ///
    /// Calling `start` while already polling is a no-op.
    pub fn start(&self) {
        let mut slot = self.poller.lock();
        if slot.is_some() {
            debug!("Graph poller already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let sync = self.clone_for_task();
        let handle = tokio::spawn(sync.poll_loop(shutdown_rx));

        *slot = Some(Poller {
            shutdown_tx,
            handle,
        });
        info!("Graph poller started (every {:?})", self.poll_interval);
    }

    /// Halt the poll loop and wait for it to finish
    pub async fn stop(&self) {
        let poller = self.poller.lock().take();
        if let Some(poller) = poller {
            let _ = poller.shutdown_tx.send(());
            if let Err(e) = poller.handle.await {
                warn!("Graph poller ended abnormally: {}", e);
            }
            info!("Graph poller stopped");
        }
    }

    fn clone_for_task(&self) -> Self {
        Self {
            authority: Arc::clone(&self.authority),
            snapshot_tx: Arc::clone(&self.snapshot_tx),
            poller: Arc::clone(&self.poller),
            poll_interval: self.poll_interval,
        }
    }

    async fn poll_loop(self, mut shutdown_rx: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("Graph poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    // A failed tick must not end the loop; the next one retries.
                    if let Err(e) = self.reconcile().await {
                        warn!("Graph reconcile failed (keeping previous snapshot): {}", e);
                    }
                }
            }
        }
    }
}
