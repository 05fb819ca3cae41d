//! Routing authority client
//!
//! The authority is the service that owns the MIDI hardware and performs the
//! actual routing. This module only speaks its HTTP contract.

use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::graph::{EdgeRequest, StatusResponse};

/// Operations the routing authority exposes
///
/// All methods take `&self` so one instance can be shared as
/// `Arc<dyn Authority>` between the poller and user commands.
#[async_trait]
pub trait Authority: Send + Sync {
    /// `GET status`: devices, connections and host config
    async fn status(&self) -> Result<StatusResponse>;

    /// `POST connect`: request an edge from an output to an input port
    async fn connect(&self, edge: EdgeRequest) -> Result<()>;

    /// `POST disconnect`: request removal of an edge
    async fn disconnect(&self, edge: EdgeRequest) -> Result<()>;

    /// `POST reset`: ask the authority to rebuild its state
    async fn reset(&self) -> Result<()>;
}

/// Authority reached over HTTP with JSON bodies
pub struct HttpAuthority {
    client: Client,
    base_url: Url,
}

impl HttpAuthority {
    /// Create a client for the authority at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: normalize_base(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn post<T: serde::Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<()> {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);
        let response = self.client.post(url).json(body).send().await?;
        check_status(path, response).await?;
        Ok(())
    }
}

/// Make sure relative joins land under the base path
pub(crate) fn normalize_base(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn check_status(what: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Transport(format!(
        "{} failed with HTTP {}: {}",
        what,
        status.as_u16(),
        body.trim()
    )))
}

#[async_trait]
impl Authority for HttpAuthority {
    async fn status(&self) -> Result<StatusResponse> {
        let url = self.endpoint("status")?;
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let response = check_status("status", response).await?;
        Ok(response.json::<StatusResponse>().await?)
    }

    async fn connect(&self, edge: EdgeRequest) -> Result<()> {
        self.post("connect", &edge).await
    }

    async fn disconnect(&self, edge: EdgeRequest) -> Result<()> {
        self.post("disconnect", &edge).await
    }

    async fn reset(&self) -> Result<()> {
        self.post("reset", &serde_json::json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PortRef;
    use mockito::Matcher;

    fn edge() -> EdgeRequest {
        EdgeRequest {
            from: PortRef::new(20, 0),
            to: PortRef::new(14, 0),
        }
    }

    #[test]
    fn test_normalize_base() {
        assert_eq!(
            normalize_base("http://pi.local:8001").unwrap().as_str(),
            "http://pi.local:8001/"
        );
        assert_eq!(
            normalize_base("http://pi.local/aseq").unwrap().join("status").unwrap().as_str(),
            "http://pi.local/aseq/status"
        );
        assert!(normalize_base("not a url").is_err());
    }

    #[tokio::test]
    async fn test_status_roundtrip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"devices":{"14":{"name":"Midi Through","ports":{"0":{"name":"Port-0","is_input":true,"is_output":true}}}},
                    "outputtoinput":{},"config":{"hostname":"pi"}}"#,
            )
            .create_async()
            .await;

        let authority = HttpAuthority::new(&server.url(), Duration::from_secs(2)).unwrap();
        let status = authority.status().await.unwrap();

        mock.assert_async().await;
        assert_eq!(status.config.unwrap().hostname, "pi");
        assert_eq!(status.devices.unwrap()[&14].name, "Midi Through");
    }

    #[tokio::test]
    async fn test_connect_posts_edge_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/connect")
            .match_body(Matcher::Json(serde_json::json!({
                "from": {"device_id": 20, "port_id": 0},
                "to": {"device_id": 14, "port_id": 0}
            })))
            .with_status(200)
            .with_body(r#"{"details":"ok"}"#)
            .create_async()
            .await;

        let authority = HttpAuthority::new(&server.url(), Duration::from_secs(2)).unwrap();
        authority.connect(edge()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejection_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/disconnect")
            .with_status(500)
            .with_body(r#"{"details":"no such subscription"}"#)
            .create_async()
            .await;

        let authority = HttpAuthority::new(&server.url(), Duration::from_secs(2)).unwrap();
        let err = authority.disconnect(edge()).await.unwrap_err();

        assert!(err.is_transport());
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_reset_posts_empty_object() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/reset")
            .match_body(Matcher::Json(serde_json::json!({})))
            .with_status(200)
            .create_async()
            .await;

        let authority = HttpAuthority::new(&server.url(), Duration::from_secs(2)).unwrap();
        authority.reset().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_authority() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let authority =
            HttpAuthority::new("http://127.0.0.1:9/", Duration::from_millis(500)).unwrap();
        let err = authority.status().await.unwrap_err();
        assert!(err.is_transport());
    }
}
