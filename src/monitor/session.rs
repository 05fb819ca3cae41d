//! Live monitoring session for one port
//!
//! `Idle -> Opening -> Streaming -> Closing -> Idle`. Each inbound frame is
//! decoded, appended to the event log and folded into the key state, in
//! that order, before the next frame is read.

use std::mem;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::channel::{ChannelOpener, PushChannel, CLOSE_SENTINEL};
use super::event_log::EventLog;
use super::keys::KeyState;
use crate::error::Result;
use crate::graph::PortRef;
use crate::midi::{self, Event};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening,
    Streaming,
    Closing,
}

/// Owns at most one live channel plus the log and key state fed by it
pub struct MonitorSession {
    opener: Arc<dyn ChannelOpener>,
    state: SessionState,
    port: Option<PortRef>,
    channel: Option<Box<dyn PushChannel>>,
    log: EventLog,
    keys: KeyState,
}

impl MonitorSession {
    pub fn new(opener: Arc<dyn ChannelOpener>) -> Self {
        Self {
            opener,
            state: SessionState::Idle,
            port: None,
            channel: None,
            log: EventLog::new(),
            keys: KeyState::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Port being monitored, if any
    pub fn port(&self) -> Option<PortRef> {
        self.port
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn keys(&self) -> &KeyState {
        &self.keys
    }

    /// Advance the fade marks after the log has been drawn
    pub fn mark_painted(&mut self) {
        self.log.mark_painted();
    }

    /// Open a channel for `port`
    ///
    /// A channel already open is closed first, so there is never more than
    /// one. If the open fails the session returns to `Idle`.
    pub async fn start(&mut self, port: PortRef) -> Result<()> {
        if self.channel.is_some() {
            if let Err(e) = self.stop().await {
                warn!("Previous monitor channel did not close cleanly: {}", e);
            }
        }

        self.log = EventLog::new();
        self.keys = KeyState::new();
        self.port = Some(port);
        self.state = SessionState::Opening;
        debug!("Monitor session opening for {}", port);

        match self.opener.open(port).await {
            Ok(channel) => {
                self.channel = Some(channel);
                self.state = SessionState::Streaming;
                info!("🎹 Monitoring {}", port);
                Ok(())
            }
            Err(e) => {
                self.port = None;
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Wait for the next frame and apply it
    ///
    /// `Ok(None)` means there is nothing to stream: the session is not
    /// streaming, or the channel closed under it (the session is then
    /// `Idle`, with log and keys readable until `stop`). A malformed frame is
    /// returned as an error and changes nothing; the session keeps
    /// streaming.
    pub async fn next_event(&mut self) -> Result<Option<Event>> {
        let Some(channel) = self.channel.as_mut() else {
            return Ok(None);
        };

        match channel.next_frame().await {
            Ok(Some(frame)) => self.ingest(&frame).map(Some),
            Ok(None) => {
                info!("Monitor channel for {:?} closed unexpectedly", self.port);
                self.drop_channel();
                Ok(None)
            }
            Err(e) => {
                warn!("Monitor channel failed: {}", e);
                self.drop_channel();
                Err(e)
            }
        }
    }

    /// Decode one frame into the log and key state
    pub fn ingest(&mut self, frame: &[u8]) -> Result<Event> {
        let event = midi::decode(frame)?;

        let (log, id) = mem::take(&mut self.log).append(event);
        self.log = log;

        let event = Event { id, ..event };
        self.keys = mem::take(&mut self.keys).fold(&event);

        debug!("#{} {}", id, event.kind);
        Ok(event)
    }

    /// Send the close sentinel, close the channel and clear all state
    ///
    /// The session ends `Idle` even when the sentinel or the close fails;
    /// the first failure is returned.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut channel) = self.channel.take() else {
            // Channel already gone on its own; nothing to send
            self.clear();
            return Ok(());
        };

        self.state = SessionState::Closing;
        debug!("Monitor session closing for {:?}", self.port);

        let sent = channel.send_text(CLOSE_SENTINEL).await;
        let closed = channel.close().await;
        drop(channel);

        self.clear();
        info!("Monitor session closed");

        sent.and(closed)
    }

    fn clear(&mut self) {
        self.state = SessionState::Idle;
        self.port = None;
        self.log = EventLog::new();
        self.keys = KeyState::new();
    }

    fn drop_channel(&mut self) {
        self.channel = None;
        self.state = SessionState::Idle;
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        if self.channel.is_some() {
            warn!("Monitor session dropped while streaming {:?}; call stop() first", self.port);
        }
    }
}
