//! WebSocket kernel channel: `{ws_base}/api/kernels/{id}/channels`.
//!
//! Messages travel as JSON text frames in the standard kernel message shape.
//! One task reads frames into the sink, another drains the outbound queue
//! into the socket.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use kernelmix_core::{BackendError, BackendResult, KernelChannel, MessageSink};
use kernelmix_types::{ChannelMessage, SessionId};

use crate::error::{connect_timeout, map_ws_error};

/// A kernel channel over a gateway WebSocket.
pub struct GatewayChannel {
    url: String,
    headers: Vec<(String, String)>,
    connect_timeout: Duration,
    outbound: Option<mpsc::UnboundedSender<ChannelMessage>>,
    reader: Option<JoinHandle<()>>,
}

impl GatewayChannel {
    pub fn new(
        ws_base: &str,
        kernel_id: &str,
        session: SessionId,
        headers: Vec<(String, String)>,
        connect_timeout: Duration,
    ) -> BackendResult<Self> {
        Ok(Self {
            url: channel_url(ws_base, kernel_id, session)?,
            headers,
            connect_timeout,
            outbound: None,
            reader: None,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// WebSocket URL for one kernel and session. The kernel id is
/// percent-encoded as a single path segment.
pub fn channel_url(ws_base: &str, kernel_id: &str, session: SessionId) -> BackendResult<String> {
    let mut url = Url::parse(ws_base)
        .map_err(|e| BackendError::Protocol(format!("invalid WebSocket URL {ws_base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| BackendError::Protocol(format!("WebSocket URL {ws_base} cannot be a base")))?
        .pop_if_empty()
        .extend(["api", "kernels", kernel_id, "channels"]);
    url.query_pairs_mut()
        .append_pair("session_id", &session.to_string());
    Ok(url.into())
}

#[async_trait]
impl KernelChannel for GatewayChannel {
    async fn connect(&mut self, sink: MessageSink) -> BackendResult<()> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(map_ws_error)?;
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| BackendError::Protocol(format!("invalid header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| BackendError::Protocol(format!("invalid header value: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        debug!(url = %self.url, "Connecting kernel channel");
        let (stream, _) = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await
        .map_err(|_| connect_timeout(self.connect_timeout))?
        .map_err(map_ws_error)?;
        let (mut write, mut read) = stream.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<ChannelMessage>();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode kernel message");
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::text(text)).await {
                    debug!(error = %e, "Kernel channel write failed");
                    break;
                }
            }
            let _ = write.close().await;
        });

        let url = self.url.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ChannelMessage>(&text) {
                        Ok(msg) => {
                            if sink.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(url = %url, error = %e, "Undecodable kernel message"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(url = %url, error = %e, "Kernel channel read failed");
                        break;
                    }
                }
            }
        });

        if let Some(previous) = self.reader.replace(reader) {
            previous.abort();
        }
        self.outbound = Some(tx);
        Ok(())
    }

    async fn send(&mut self, msg: ChannelMessage) -> BackendResult<()> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| BackendError::Transport("channel not connected".into()))?;
        outbound
            .send(msg)
            .map_err(|_| BackendError::Transport("kernel channel closed".into()))
    }

    async fn disconnect(&mut self) -> BackendResult<()> {
        // Dropping the sender lets the writer close the socket.
        self.outbound = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        Ok(())
    }
}

impl Drop for GatewayChannel {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
