//! HTTP long-polling transport (§4.2).
//!
//! Sends are POSTs carrying a framed payload; receives are GETs whose
//! body is decoded into zero or more packets and buffered locally so a
//! single poll satisfying several packets doesn't require a round trip
//! per packet.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use hyper::{Body, Client, Method, Request};
use hyper_tls::HttpsConnector;
use tokio::sync::Mutex as AsyncMutex;

use super::{timestamp_param, Transport};
use crate::config::EngineIoConfig;
use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::payload;
use crate::session::EngineIoSession;

type HttpClient = Client<HttpsConnector<hyper::client::HttpConnector>>;

/// Query-string parameters fixed for the lifetime of a transport instance.
#[derive(Debug, Clone)]
pub struct PollingParams {
    pub base_url: String,
    pub sid: Option<String>,
    pub extra: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub cookie_header: Option<String>,
}

pub struct LongPollingTransport {
    client: HttpClient,
    params: PollingParams,
    request_index: AtomicU64,
    timeout: StdMutex<Option<Duration>>,
    buffer: AsyncMutex<VecDeque<Packet>>,
    send_lock: AsyncMutex<()>,
}

impl LongPollingTransport {
    pub fn new(params: PollingParams) -> Self {
        let https = HttpsConnector::new();
        let start_index = if params.sid.is_some() { 1 } else { 0 };
        LongPollingTransport {
            client: Client::builder().build(https),
            params,
            request_index: AtomicU64::new(start_index),
            timeout: StdMutex::new(None),
            buffer: AsyncMutex::new(VecDeque::new()),
            send_lock: AsyncMutex::new(()),
        }
    }

    fn request_url(&self, extra: &[(&str, String)]) -> Result<hyper::Uri> {
        let mut url = url::Url::parse(&self.params.base_url)?;
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("EIO", "3");
            qp.append_pair("transport", "polling");
            if let Some(sid) = &self.params.sid {
                qp.append_pair("sid", sid);
            }
            for (k, v) in &self.params.extra {
                qp.append_pair(k, v);
            }
            for (k, v) in extra {
                qp.append_pair(k, v);
            }
        }
        url.as_str().parse::<hyper::Uri>().map_err(|e| Error::packet(e.to_string()))
    }

    fn next_timestamp(&self) -> String {
        let idx = self.request_index.fetch_add(1, Ordering::SeqCst);
        timestamp_param(idx)
    }

    async fn poll_once(&self) -> Result<()> {
        let t = self.next_timestamp();
        let url = self.request_url(&[("t", t)])?;
        let mut req = Request::builder().method(Method::GET).uri(url);
        for (k, v) in &self.params.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        if let Some(cookie) = &self.params.cookie_header {
            req = req.header("cookie", cookie.as_str());
        }
        let req = req.body(Body::empty())?;

        let timeout = *self.timeout.lock().unwrap();
        let response = self.send_with_timeout(req, timeout).await?;

        if response.status() != hyper::StatusCode::OK {
            return Err(Error::connection_lost(format!(
                "unexpected status code {}",
                response.status()
            )));
        }
        let body = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(Error::Http)?;
        let packets = payload::decode(&body);
        let mut buffer = self.buffer.lock().await;
        buffer.extend(packets);
        Ok(())
    }

    async fn send_with_timeout(
        &self,
        req: Request<Body>,
        timeout: Option<Duration>,
    ) -> Result<hyper::Response<Body>> {
        match timeout {
            Some(d) => match tokio::time::timeout(d, self.client.request(req)).await {
                Ok(res) => res.map_err(Error::Http),
                Err(_) => Err(Error::Timeout),
            },
            None => self.client.request(req).await.map_err(Error::Http),
        }
    }
}

#[async_trait]
impl Transport for LongPollingTransport {
    async fn recv_packet(&self) -> Result<Packet> {
        loop {
            {
                let mut buffer = self.buffer.lock().await;
                if let Some(packet) = buffer.pop_front() {
                    return Ok(packet);
                }
            }
            self.poll_once().await?;
        }
    }

    async fn send_packet(&self, packet: Packet) -> Result<()> {
        let _guard = self.send_lock.lock().await;
        let t = self.next_timestamp();
        let url = self.request_url(&[("t", t)])?;
        let body = payload::encode(&[packet]);
        let mut req = Request::builder()
            .method(Method::POST)
            .uri(url)
            .header("content-type", "application/octet-stream");
        for (k, v) in &self.params.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        if let Some(cookie) = &self.params.cookie_header {
            req = req.header("cookie", cookie.as_str());
        }
        let req = req.body(Body::from(body))?;

        let timeout = *self.timeout.lock().unwrap();
        let response = self.send_with_timeout(req, timeout).await?;
        if response.status() != hyper::StatusCode::OK {
            return Err(Error::connection_lost(format!(
                "unexpected status code {}",
                response.status()
            )));
        }
        let body = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(Error::Http)?;
        if &body[..] != b"ok" {
            #[cfg(feature = "tracing")]
            tracing::warn!("unexpected polling POST response body");
        }
        Ok(())
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        *self.timeout.lock().unwrap() = timeout;
    }

    async fn close(&self) {
        let _ = self.send_packet(Packet::Close).await;
    }

    fn name(&self) -> &'static str {
        "xhr-polling"
    }
}

/// Perform the Engine.IO handshake: a single GET with no `sid`, whose body
/// is one framed Open packet. Returns the parsed session alongside a
/// polling transport already configured with the discovered `sid` for
/// steady-state use.
pub async fn handshake(config: &EngineIoConfig) -> Result<(EngineIoSession, LongPollingTransport)> {
    let https = HttpsConnector::new();
    let client: HttpClient = Client::builder().build(https);

    let mut url = url::Url::parse(&config.base_url())?;
    {
        let mut qp = url.query_pairs_mut();
        qp.append_pair("EIO", "3");
        qp.append_pair("transport", "polling");
        qp.append_pair("t", &timestamp_param(0));
        for (k, v) in &config.params {
            qp.append_pair(k, v);
        }
    }
    let uri: hyper::Uri = url
        .as_str()
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| Error::packet(e.to_string()))?;

    let mut req = Request::builder().method(Method::GET).uri(uri);
    for (k, v) in &config.headers {
        req = req.header(k.as_str(), v.as_str());
    }
    if let Some(cookie) = config.cookie_header() {
        req = req.header("cookie", cookie);
    }
    let req = req.body(Body::empty())?;

    let response = client.request(req).await.map_err(Error::Http)?;
    if response.status() != hyper::StatusCode::OK {
        return Err(Error::connection_lost(format!(
            "handshake returned status {}",
            response.status()
        )));
    }
    let body = hyper::body::to_bytes(response.into_body())
        .await
        .map_err(Error::Http)?;
    let session = EngineIoSession::from_handshake_body(&body)?;

    let params = PollingParams {
        base_url: config.base_url(),
        sid: Some(session.id.clone()),
        extra: config.params.clone(),
        headers: config.headers.clone(),
        cookie_header: config.cookie_header(),
    };
    Ok((session, LongPollingTransport::new(params)))
}
