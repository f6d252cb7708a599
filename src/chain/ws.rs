//! JSON-RPC chain client over WebSocket.
//!
//! # Responsibilities
//! - Open and keep a WebSocket to a Substrate node
//! - Correlate JSON-RPC responses with pending requests
//! - Run the runtime handshake that makes the API ready
//! - Reconnect with backoff when the socket drops
//!
//! # Data Flow
//! ```text
//! request() → pending[id] → outbound queue → socket writer
//! socket reader → response{id} → pending[id].send(result)
//! connect → Connected → handshake → Ready (first time only)
//! drop → fail pending → Disconnected → backoff → connect ...
//! ```
//!
//! # Design Decisions
//! - The loop ends when the milestone receiver is dropped
//! - Pending requests fail with `NotConnected` when their socket drops

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::Instrument;
use url::Url;

use crate::chain::service::{ApiHandle, ChainApi, ChainConnection, ChainConnector};
use crate::chain::types::{ApiOptions, ChainEvent, ChainResult, ConnectionError, RuntimeInfo};
use crate::definitions::TypeDefinitions;
use crate::observability::metrics;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens [`WsApi`] connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl ChainConnector for WsConnector {
    fn open(&self, options: &ApiOptions) -> ChainResult<ChainConnection> {
        let url = parse_endpoint(&options.endpoint)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let api = Arc::new(WsApi::new(options));

        let span = tracing::info_span!("ws_client", endpoint = %options.endpoint);
        tokio::spawn(connection_loop(api.clone(), url, options.clone(), events_tx).instrument(span));

        Ok(ChainConnection {
            api: ApiHandle::new(api),
            events: events_rx,
        })
    }
}

/// Validate a node endpoint. Only `ws` and `wss` are accepted.
pub fn parse_endpoint(endpoint: &str) -> ChainResult<Url> {
    let url = Url::parse(endpoint).map_err(|e| ConnectionError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConnectionError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Chain API backed by a WebSocket JSON-RPC connection.
pub struct WsApi {
    endpoint: String,
    ready: watch::Sender<bool>,
    announced: AtomicBool,
    outbound: ArcSwapOption<mpsc::UnboundedSender<Message>>,
    pending: DashMap<u64, oneshot::Sender<ChainResult<Value>>>,
    next_id: AtomicU64,
    runtime: ArcSwapOption<RuntimeInfo>,
    types: Option<TypeDefinitions>,
    request_timeout: Duration,
}

impl WsApi {
    fn new(options: &ApiOptions) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            endpoint: options.endpoint.clone(),
            ready,
            announced: AtomicBool::new(false),
            outbound: ArcSwapOption::empty(),
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
            runtime: ArcSwapOption::empty(),
            types: options.types.clone(),
            request_timeout: options.request_timeout,
        }
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    fn handle_text(&self, text: &str) {
        let response: RpcResponse = match serde_json::from_str(text) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed frame");
                return;
            }
        };

        let Some(id) = response.id else {
            tracing::trace!("Ignoring notification frame");
            return;
        };

        let Some((_, tx)) = self.pending.remove(&id) else {
            tracing::debug!(id, "Response for unknown request");
            return;
        };

        let result = match response.error {
            Some(error) => Err(ConnectionError::Rpc {
                code: error.code,
                message: error.message,
            }),
            None => Ok(response.result.unwrap_or(Value::Null)),
        };
        let _ = tx.send(result);
    }

    /// Drop socket-bound state after the socket closed.
    fn reset(&self) {
        self.outbound.store(None);
        self.ready.send_replace(false);
        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(ConnectionError::NotConnected));
            }
        }
    }

    async fn fetch_runtime(&self) -> ChainResult<RuntimeInfo> {
        let chain = self.request("system_chain", json!([])).await?;
        let version = self.request("state_getRuntimeVersion", json!([])).await?;
        let properties = self.request("system_properties", json!([])).await?;

        let chain = chain
            .as_str()
            .ok_or_else(|| ConnectionError::Protocol("system_chain returned a non-string".into()))?
            .to_string();
        let spec_name = version
            .get("specName")
            .and_then(Value::as_str)
            .ok_or_else(|| ConnectionError::Protocol("runtime version without specName".into()))?
            .to_string();
        let spec_version = version
            .get("specVersion")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| ConnectionError::Protocol("runtime version without specVersion".into()))?;

        Ok(RuntimeInfo {
            chain,
            spec_name,
            spec_version,
            properties,
        })
    }

    async fn run_session(self: &Arc<Self>, stream: WsStream, events: &mpsc::UnboundedSender<ChainEvent>) {
        let (mut write, mut read) = stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        self.outbound.store(Some(Arc::new(out_tx)));

        let handshake = tokio::spawn(handshake(self.clone(), events.clone()).in_current_span());

        loop {
            tokio::select! {
                _ = events.closed() => break,
                outgoing = out_rx.recv() => match outgoing {
                    Some(message) => {
                        if !write_frame(&mut write, message, events).await {
                            break;
                        }
                    }
                    None => break,
                },
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
                    Some(Ok(Message::Ping(data))) => {
                        if !write_frame(&mut write, Message::Pong(data), events).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Socket read failed");
                        let _ = events.send(ChainEvent::Error(ConnectionError::Transport(e.to_string())));
                        break;
                    }
                },
            }
        }

        handshake.abort();
        let _ = write.close().await;
    }
}

#[async_trait]
impl ChainApi for WsApi {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn is_ready(&self) {
        let mut rx = self.ready.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    fn runtime(&self) -> Option<RuntimeInfo> {
        self.runtime.load_full().map(|runtime| (*runtime).clone())
    }

    async fn request(&self, method: &str, params: Value) -> ChainResult<Value> {
        let outbound = self.outbound.load_full().ok_or(ConnectionError::NotConnected)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        if outbound.send(Message::Text(payload.to_string().into())).is_err() {
            self.pending.remove(&id);
            return Err(ConnectionError::NotConnected);
        }

        let result = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ConnectionError::NotConnected),
            Err(_) => {
                self.pending.remove(&id);
                Err(ConnectionError::RequestTimeout {
                    method: method.to_string(),
                    millis: u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        };
        metrics::record_rpc_request(method, result.is_ok());
        result
    }

    fn types(&self) -> Option<&TypeDefinitions> {
        self.types.as_ref()
    }
}

/// Write one frame. A failed write is reported as a transport error and
/// ends the session (`false`).
async fn write_frame<S>(write: &mut S, message: Message, events: &mpsc::UnboundedSender<ChainEvent>) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    match write.send(message).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to write frame");
            let _ = events.send(ChainEvent::Error(ConnectionError::Transport(e.to_string())));
            false
        }
    }
}

async fn connect(url: &Url, timeout: Duration) -> ChainResult<WsStream> {
    match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
        Ok(Ok((stream, _))) => Ok(stream),
        Ok(Err(e)) => Err(ConnectionError::Transport(e.to_string())),
        Err(_) => Err(ConnectionError::Timeout(timeout.as_secs())),
    }
}

async fn handshake(api: Arc<WsApi>, events: mpsc::UnboundedSender<ChainEvent>) {
    match api.fetch_runtime().await {
        Ok(runtime) => {
            tracing::info!(
                chain = %runtime.chain,
                spec_name = %runtime.spec_name,
                spec_version = runtime.spec_version,
                registered_types = api.types.as_ref().map_or(0, |t| t.types.len()),
                "Runtime handshake complete"
            );
            api.runtime.store(Some(Arc::new(runtime)));
            api.ready.send_replace(true);
            if !api.announced.swap(true, Ordering::SeqCst) {
                let _ = events.send(ChainEvent::Ready);
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Runtime handshake failed");
            let _ = events.send(ChainEvent::Error(e));
        }
    }
}

async fn connection_loop(
    api: Arc<WsApi>,
    url: Url,
    options: ApiOptions,
    events: mpsc::UnboundedSender<ChainEvent>,
) {
    let mut attempt = 0u32;

    loop {
        if events.is_closed() {
            break;
        }

        match connect(&url, options.connect_timeout).await {
            Ok(stream) => {
                attempt = 0;
                tracing::info!("WebSocket connected");
                let _ = events.send(ChainEvent::Connected);
                api.run_session(stream, &events).await;
                api.reset();
                if events.is_closed() {
                    break;
                }
                tracing::warn!("WebSocket disconnected");
                let _ = events.send(ChainEvent::Disconnected);
            }
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket connect failed");
                let _ = events.send(ChainEvent::Error(e));
            }
        }

        if !options.reconnect.enabled {
            tracing::info!("Auto-reconnect disabled, client stopped");
            break;
        }

        attempt = attempt.saturating_add(1);
        let delay = options.reconnect.delay_for(attempt);
        metrics::record_reconnect_attempt(&api.endpoint);
        tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = events.closed() => break,
        }
    }

    api.reset();
    tracing::debug!("Connection loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::ReconnectPolicy;
    use tokio::net::TcpListener;

    fn options(endpoint: &str) -> ApiOptions {
        ApiOptions {
            request_timeout: Duration::from_millis(500),
            connect_timeout: Duration::from_millis(500),
            reconnect: ReconnectPolicy::disabled(),
            ..ApiOptions::new(endpoint)
        }
    }

    /// Minimal node answering the handshake methods.
    async fn spawn_node() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(message)) = ws.next().await {
                        let Message::Text(text) = message else { continue };
                        let request: Value = serde_json::from_str(text.as_str()).unwrap();
                        let id = request["id"].clone();
                        let reply = match request["method"].as_str().unwrap_or_default() {
                            "system_chain" => json!({ "jsonrpc": "2.0", "id": id, "result": "Litentry" }),
                            "state_getRuntimeVersion" => json!({
                                "jsonrpc": "2.0",
                                "id": id,
                                "result": { "specName": "litentry-parachain", "specVersion": 9100 }
                            }),
                            "system_properties" => json!({
                                "jsonrpc": "2.0",
                                "id": id,
                                "result": { "ss58Format": 31, "tokenSymbol": "LIT" }
                            }),
                            "test_silent" => continue,
                            _ => json!({
                                "jsonrpc": "2.0",
                                "id": id,
                                "error": { "code": -32601, "message": "Method not found" }
                            }),
                        };
                        if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        format!("ws://{}", addr)
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<ChainEvent>) -> ChainEvent {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event expected")
            .expect("stream open")
    }

    #[test]
    fn test_parse_endpoint() {
        assert!(parse_endpoint("ws://127.0.0.1:9944").is_ok());
        assert!(parse_endpoint("wss://rpc.litentry-parachain.litentry.io").is_ok());

        let err = parse_endpoint("http://127.0.0.1:9933").unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidEndpoint { ref reason, .. } if reason.contains("http")));
        assert!(matches!(
            parse_endpoint("not a url"),
            Err(ConnectionError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_rejects_bad_endpoint() {
        let err = WsConnector.open(&options("https://example.com")).unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidEndpoint { .. }));
    }

    #[tokio::test]
    async fn test_request_without_socket() {
        let api = WsApi::new(&options("ws://127.0.0.1:1"));
        let err = api.request("system_chain", json!([])).await.unwrap_err();
        assert_eq!(err, ConnectionError::NotConnected);
    }

    #[test]
    fn test_handle_text_routes_by_id() {
        let api = WsApi::new(&options("ws://127.0.0.1:1"));
        let (ok_tx, mut ok_rx) = oneshot::channel();
        let (err_tx, mut err_rx) = oneshot::channel();
        api.pending.insert(1, ok_tx);
        api.pending.insert(2, err_tx);

        api.handle_text(r#"{"jsonrpc":"2.0","method":"chain_newHead","params":{}}"#);
        api.handle_text(r#"{"jsonrpc":"2.0","id":2,"error":{"code":-32000,"message":"boom"}}"#);
        api.handle_text(r#"{"jsonrpc":"2.0","id":1,"result":null}"#);
        api.handle_text("garbage");

        assert_eq!(ok_rx.try_recv().unwrap(), Ok(Value::Null));
        assert_eq!(
            err_rx.try_recv().unwrap(),
            Err(ConnectionError::Rpc { code: -32000, message: "boom".into() })
        );
        assert_eq!(api.pending_requests(), 0);
    }

    #[test]
    fn test_reset_fails_pending() {
        let api = WsApi::new(&options("ws://127.0.0.1:1"));
        let (tx, mut rx) = oneshot::channel();
        api.pending.insert(7, tx);
        api.reset();
        assert_eq!(rx.try_recv().unwrap(), Err(ConnectionError::NotConnected));
    }

    #[tokio::test]
    async fn test_handshake_against_local_node() {
        let endpoint = spawn_node().await;
        let mut opts = options(&endpoint);
        opts.types = Some(crate::definitions::nft::definitions().unwrap());

        let ChainConnection { api, mut events } = WsConnector.open(&opts).unwrap();
        assert_eq!(next_event(&mut events).await, ChainEvent::Connected);
        assert_eq!(next_event(&mut events).await, ChainEvent::Ready);

        tokio::time::timeout(Duration::from_secs(1), api.is_ready()).await.unwrap();
        let runtime = api.runtime().unwrap();
        assert_eq!(runtime.chain, "Litentry");
        assert_eq!(runtime.spec_version, 9100);
        assert_eq!(runtime.ss58_format(), Some(31));
        assert_eq!(api.types().map(|t| t.types.len()), Some(18));

        let err = api.request("author_rotateKeys", json!([])).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Rpc { code: -32601, .. }));
    }

    #[tokio::test]
    async fn test_request_timeout_in_millis() {
        let endpoint = spawn_node().await;
        let mut opts = options(&endpoint);
        opts.request_timeout = Duration::from_millis(200);

        let ChainConnection { api, mut events } = WsConnector.open(&opts).unwrap();
        assert_eq!(next_event(&mut events).await, ChainEvent::Connected);
        assert_eq!(next_event(&mut events).await, ChainEvent::Ready);

        let err = api.request("test_silent", json!([])).await.unwrap_err();
        assert_eq!(
            err,
            ConnectionError::RequestTimeout {
                method: "test_silent".into(),
                millis: 200
            }
        );
    }

    #[tokio::test]
    async fn test_failed_write_reports_transport_error() {
        let mut closed = Box::pin(futures_util::sink::unfold((), |(), _message: Message| async move {
            Err::<(), _>(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
        }));
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(!write_frame(&mut closed, Message::Pong(Default::default()), &tx).await);
        assert!(matches!(rx.try_recv(), Ok(ChainEvent::Error(ConnectionError::Transport(_)))));
    }

    #[tokio::test]
    async fn test_unreachable_node_reports_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);

        let ChainConnection { mut events, .. } = WsConnector.open(&options(&endpoint)).unwrap();
        assert!(matches!(next_event(&mut events).await, ChainEvent::Error(_)));
    }
}
