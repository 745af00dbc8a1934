//! WebSocket transport (§4.2): one frame per packet, no length prefix.

use std::time::Duration;

use async_trait::async_trait;
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::Mutex;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

use bytes::Bytes;

use super::Transport;
use crate::config::EngineIoConfig;
use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::session::EngineIoSession;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct WebSocketTransport {
    write: Mutex<SplitSink<WsStream, Message>>,
    read: Mutex<SplitStream<WsStream>>,
    timeout: Mutex<Option<Duration>>,
}

impl WebSocketTransport {
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(Error::WebSocket)?;
        let (write, read) = stream.split();
        Ok(WebSocketTransport {
            write: Mutex::new(write),
            read: Mutex::new(read),
            timeout: Mutex::new(None),
        })
    }

    async fn recv_message(&self) -> Result<Message> {
        let timeout = *self.timeout.lock().await;
        let mut read = self.read.lock().await;
        let next = read.next();
        let msg = match timeout {
            Some(d) => tokio::time::timeout(d, next)
                .await
                .map_err(|_| Error::Timeout)?,
            None => next.await,
        };
        match msg {
            Some(Ok(m)) => Ok(m),
            Some(Err(e)) => Err(Error::connection_lost(e)),
            None => Err(Error::connection_lost("websocket stream closed")),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn recv_packet(&self) -> Result<Packet> {
        loop {
            match self.recv_message().await? {
                Message::Text(text) => {
                    let bytes = text.into_bytes();
                    if bytes.is_empty() {
                        return Err(Error::packet("empty websocket frame"));
                    }
                    let type_digit = bytes[0];
                    let data = bytes::Bytes::copy_from_slice(&bytes[1..]);
                    return Packet::decode(type_digit, data);
                }
                Message::Binary(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        "binary websocket attachment received, attachments are not reassembled"
                    );
                    continue;
                }
                Message::Close(_) => return Err(Error::connection_lost("websocket closed")),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn send_packet(&self, packet: Packet) -> Result<()> {
        let text = String::from_utf8(packet.encode_text().to_vec())
            .map_err(|e| Error::packet(e.to_string()))?;
        let mut write = self.write.lock().await;
        write
            .send(Message::Text(text))
            .await
            .map_err(Error::WebSocket)?;
        write.flush().await.map_err(Error::WebSocket)
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        if let Ok(mut guard) = self.timeout.try_lock() {
            *guard = timeout;
        }
    }

    async fn close(&self) {
        let mut write = self.write.lock().await;
        let _ = write.send(Message::Close(None)).await;
        let _ = write.close().await;
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// Open a WebSocket transport against `config`'s host using the `sid` from
/// an established handshake, then run the upgrade probe (§4.4.1): send
/// `Ping("probe")`, await `Pong("probe")`, send `Upgrade`. Any failure
/// leaves the caller's existing long-polling transport authoritative.
pub async fn probe_and_upgrade(
    config: &EngineIoConfig,
    session: &EngineIoSession,
) -> Result<WebSocketTransport> {
    let scheme = if config.secure { "wss" } else { "ws" };
    let mut url = url::Url::parse(&format!(
        "{scheme}://{}:{}{}/{}/",
        config.host, config.port, config.base_path, config.resource
    ))?;
    {
        let mut qp = url.query_pairs_mut();
        qp.append_pair("EIO", "3");
        qp.append_pair("transport", "websocket");
        qp.append_pair("sid", &session.id);
    }

    let transport = WebSocketTransport::connect(url.as_str()).await?;
    transport
        .send_packet(Packet::Ping(Bytes::from_static(b"probe")))
        .await?;

    match transport.recv_packet().await? {
        Packet::Pong(data) if data.as_ref() == b"probe" => {}
        other => {
            return Err(Error::connection_lost(format!(
                "upgrade probe failed: unexpected reply {other:?}"
            )))
        }
    }

    transport.send_packet(Packet::Upgrade).await?;
    Ok(transport)
}
