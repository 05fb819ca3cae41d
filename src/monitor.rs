//! Live monitoring of one port: push channel, event log, held keys

pub mod channel;
pub mod event_log;
pub mod keys;
pub mod session;

pub use channel::{ChannelOpener, PushChannel, WsChannelOpener, CLOSE_SENTINEL};
pub use event_log::{EventLog, EVENT_LOG_CAPACITY};
pub use keys::KeyState;
pub use session::{MonitorSession, SessionState};
