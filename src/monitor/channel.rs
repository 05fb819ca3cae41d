//! Push channel carrying raw MIDI frames for one monitored port
//!
//! The authority streams each MIDI message on the port as one binary
//! WebSocket message. The only thing the client ever sends is the close
//! sentinel.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

use crate::authority::normalize_base;
use crate::error::{Error, Result};
use crate::graph::PortRef;

/// Text message sent right before the client closes the channel
pub const CLOSE_SENTINEL: &str = "CLOSE";

/// An open channel
#[async_trait]
pub trait PushChannel: Send {
    /// Next raw frame; `Ok(None)` once the channel has closed
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>>;

    /// Send a text message to the authority
    async fn send_text(&mut self, text: &str) -> Result<()>;

    /// Close the channel
    async fn close(&mut self) -> Result<()>;
}

/// Opens channels for ports; returning means the open was acknowledged
#[async_trait]
pub trait ChannelOpener: Send + Sync {
    async fn open(&self, port: PortRef) -> Result<Box<dyn PushChannel>>;
}

/// Opens WebSocket channels next to the authority's HTTP endpoint
pub struct WsChannelOpener {
    base_url: Url,
}

impl WsChannelOpener {
    pub fn new(authority_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base(authority_url)?,
        })
    }

    /// `ws(s)://host/.../monitor?port=D:P`
    pub fn channel_url(&self, port: PortRef) -> Result<Url> {
        let mut url = self.base_url.join("monitor")?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| Error::Transport(format!("cannot derive channel URL from {}", url)))?;
        url.query_pairs_mut()
            .clear()
            .append_pair("port", &port.to_string());
        Ok(url)
    }
}

#[async_trait]
impl ChannelOpener for WsChannelOpener {
    async fn open(&self, port: PortRef) -> Result<Box<dyn PushChannel>> {
        let url = self.channel_url(port)?;
        info!("📡 Opening monitor channel {}", url);
        let (stream, _response) = connect_async(url.as_str()).await?;
        Ok(Box::new(WsChannel { stream }))
    }
}

/// WebSocket-backed channel
pub struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushChannel for WsChannel {
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(message) = self.stream.next().await {
            match message? {
                Message::Binary(data) => return Ok(Some(data)),
                Message::Close(frame) => {
                    debug!("Monitor channel closed by peer: {:?}", frame);
                    return Ok(None);
                }
                Message::Text(text) => debug!("Ignoring text on monitor channel: {}", text),
                _ => {}
            }
        }
        Ok(None)
    }

    async fn send_text(&mut self, text: &str) -> Result<()> {
        self.stream.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            // Peer may already have gone
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_url() {
        let opener = WsChannelOpener::new("http://pi.local:8001").unwrap();
        assert_eq!(
            opener.channel_url(PortRef::new(20, 0)).unwrap().as_str(),
            "ws://pi.local:8001/monitor?port=20%3A0"
        );

        let secure = WsChannelOpener::new("https://pi.local/aseq/").unwrap();
        assert_eq!(
            secure.channel_url(PortRef::new(128, 1)).unwrap().as_str(),
            "wss://pi.local/aseq/monitor?port=128%3A1"
        );
    }

    #[tokio::test]
    async fn test_open_fails_without_server() {
        let opener = WsChannelOpener::new("http://127.0.0.1:9/").unwrap();
        let err = opener.open(PortRef::new(1, 0)).await.err().unwrap();
        assert!(err.is_transport());
    }
}
