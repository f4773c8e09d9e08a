//! Bridge lifecycle
//!
//! `Idle -> Connecting -> Initializing -> Serving -> Closing -> Idle`
//!
//! The backend is installed in the session manager through a [`BackendLease`],
//! whose `Drop` removes it again. Every way out of a run releases it, including
//! errors, panics and the run future being dropped.

use super::backend::BackendHandle;
use super::cache::Slot;
use super::connector::{Connector, HttpConnector};
use super::front_end::FrontEnd;
use super::session::SessionManager;
use crate::config::{BACKEND_CLOSE_TIMEOUT, BridgeConfig};
use crate::error::{BridgeError, BridgeResult};
use crate::mcp::client::NotificationHandler;
use crate::mcp::protocol::methods;
use crate::mcp::transport::McpTransport;
use crate::mcp::McpError;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where a bridge run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Connecting,
    Initializing,
    Serving,
    Closing,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Initializing => "initializing",
            Self::Serving => "serving",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Installs a backend for as long as it lives
pub struct BackendLease {
    session: Arc<SessionManager>,
    state: Arc<watch::Sender<LifecycleState>>,
    generation: u64,
}

impl BackendLease {
    fn acquire(
        session: Arc<SessionManager>,
        state: Arc<watch::Sender<LifecycleState>>,
        backend: BackendHandle,
    ) -> Self {
        let generation = session.set_backend(Some(backend));
        Self {
            session,
            state,
            generation,
        }
    }

    /// Generation the backend was installed under
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for BackendLease {
    fn drop(&mut self) {
        self.session.set_backend(None);
        self.state.send_replace(LifecycleState::Idle);
        info!("Disconnected from Recaf MCP");
    }
}

const UNBOUND: u64 = 0;

/// Invalidates a cache slot when the backend says its listing changed
struct ListChangedHandler {
    session: Weak<SessionManager>,
    generation: AtomicU64,
}

impl ListChangedHandler {
    fn new(session: &Arc<SessionManager>) -> Self {
        Self {
            session: Arc::downgrade(session),
            generation: AtomicU64::new(UNBOUND),
        }
    }

    /// Accept notifications for the backend installed under `generation`
    fn bind(&self, generation: u64) {
        self.generation.store(generation, Ordering::SeqCst);
    }
}

impl NotificationHandler for ListChangedHandler {
    fn handle(&self, method: &str, _params: Option<Value>) {
        let slot = match method {
            methods::TOOLS_LIST_CHANGED => Slot::Tools,
            methods::RESOURCES_LIST_CHANGED => Slot::Resources,
            other => {
                debug!("Ignoring backend notification: {}", other);
                return;
            }
        };

        let generation = self.generation.load(Ordering::SeqCst);
        if generation == UNBOUND {
            return;
        }
        let Some(session) = self.session.upgrade() else {
            return;
        };
        if session.invalidate(slot, generation) {
            debug!("Backend {} changed, cache slot dropped", slot);
        }
    }
}

/// Drives one backend connection from connect to release
pub struct Bridge {
    config: BridgeConfig,
    session: Arc<SessionManager>,
    connector: Arc<dyn Connector>,
    state: Arc<watch::Sender<LifecycleState>>,
}

impl Bridge {
    /// Bridge to the Streamable HTTP backend described by `config`
    pub fn new(config: BridgeConfig) -> Self {
        let connector = Arc::new(HttpConnector::new(config.connect_timeout));
        Self::with_connector(config, connector)
    }

    /// Bridge that opens backends through `connector`
    pub fn with_connector(config: BridgeConfig, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            session: Arc::new(SessionManager::with_ttl(config.cache_ttl)),
            config,
            connector,
            state: Arc::new(state),
        }
    }

    /// The session manager requests are served from
    pub fn session(&self) -> Arc<SessionManager> {
        Arc::clone(&self.session)
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Connect, serve `local` until it ends or `cancel` fires, then release.
    ///
    /// Connect failures are returned as [`BridgeError::BackendUnavailable`]
    /// and are not retried.
    pub async fn run(
        &self,
        local: Arc<dyn McpTransport>,
        cancel: CancellationToken,
    ) -> BridgeResult<()> {
        self.config.validate()?;
        let endpoint = self.config.endpoint();

        let handler = Arc::new(ListChangedHandler::new(&self.session));
        let backend = match self.connect(&endpoint, handler.clone(), &cancel).await {
            Ok(backend) => backend,
            Err(e) => {
                self.set_state(LifecycleState::Idle);
                return Err(e);
            }
        };

        let lease = BackendLease::acquire(
            Arc::clone(&self.session),
            Arc::clone(&self.state),
            Arc::clone(&backend),
        );
        handler.bind(lease.generation());

        self.set_state(LifecycleState::Serving);
        let outcome = FrontEnd::new(local, Arc::clone(&self.session))
            .serve(cancel)
            .await;

        self.set_state(LifecycleState::Closing);
        match &outcome {
            Ok(()) => debug!("Local client finished"),
            Err(e) => debug!("Serving ended: {}", e),
        }
        drop(lease);
        self.session.log_cache_stats();

        match tokio::time::timeout(BACKEND_CLOSE_TIMEOUT, backend.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Error closing backend session: {}", e),
            Err(_) => warn!(
                "Backend session did not close within {:?}, abandoning it",
                BACKEND_CLOSE_TIMEOUT
            ),
        }

        outcome
    }

    async fn connect(
        &self,
        endpoint: &str,
        handler: Arc<dyn NotificationHandler>,
        cancel: &CancellationToken,
    ) -> BridgeResult<BackendHandle> {
        self.set_state(LifecycleState::Connecting);
        info!("Connecting to Recaf MCP at {}...", endpoint);

        let limit = self.config.connect_timeout;
        let attempt = self.open_and_initialize(endpoint, handler);

        tokio::select! {
            _ = cancel.cancelled() => Err(BridgeError::Cancelled),
            result = tokio::time::timeout(limit, attempt) => match result {
                Ok(Ok(backend)) => Ok(backend),
                Ok(Err(e)) => Err(BridgeError::backend_unavailable(endpoint, e)),
                Err(_) => Err(BridgeError::backend_unavailable(
                    endpoint,
                    McpError::timeout(limit).with_context("connect"),
                )),
            },
        }
    }

    async fn open_and_initialize(
        &self,
        endpoint: &str,
        handler: Arc<dyn NotificationHandler>,
    ) -> Result<BackendHandle, McpError> {
        let backend = self.connector.open(endpoint, handler).await?;

        self.set_state(LifecycleState::Initializing);
        match backend.initialize().await {
            Ok(server) => {
                info!("Connected to {} v{}", server.name, server.version);
                Ok(backend)
            }
            Err(e) => {
                if let Err(close_err) = backend.close().await {
                    debug!("Closing failed backend: {}", close_err);
                }
                Err(e)
            }
        }
    }

    fn set_state(&self, state: LifecycleState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Bridge {} -> {}", previous, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::backend::Backend;
    use crate::bridge::cache::Tools;
    use crate::mcp::transport::StdioTransport;
    use crate::mcp::types::{
        McpResource, McpResourceContent, McpServerInfo, McpTool, McpToolResult,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[derive(Default)]
    struct FakeBackend {
        fail_initialize: bool,
        hang_initialize: bool,
        hang_close: bool,
        closed: AtomicUsize,
        list_tools_calls: AtomicUsize,
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn initialize(&self) -> Result<McpServerInfo, McpError> {
            if self.hang_initialize {
                std::future::pending::<()>().await;
            }
            if self.fail_initialize {
                return Err(McpError::protocol("unsupported protocol version"));
            }
            Ok(McpServerInfo::new("recaf", "4.0.0"))
        }

        async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
            self.list_tools_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![McpTool::new("tool-a")])
        }

        async fn call_tool(
            &self,
            _name: &str,
            _arguments: Value,
        ) -> Result<McpToolResult, McpError> {
            Ok(McpToolResult::text("ok"))
        }

        async fn list_resources(&self) -> Result<Vec<McpResource>, McpError> {
            Ok(vec![])
        }

        async fn read_resource(&self, _uri: &str) -> Result<Vec<McpResourceContent>, McpError> {
            Ok(vec![])
        }

        async fn close(&self) -> Result<(), McpError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            if self.hang_close {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    struct FakeConnector {
        backend: Arc<FakeBackend>,
        refuse: AtomicBool,
        endpoints: Mutex<Vec<String>>,
        handler: Mutex<Option<Arc<dyn NotificationHandler>>>,
    }

    impl FakeConnector {
        fn new(backend: FakeBackend) -> Arc<Self> {
            Arc::new(Self {
                backend: Arc::new(backend),
                refuse: AtomicBool::new(false),
                endpoints: Mutex::new(Vec::new()),
                handler: Mutex::new(None),
            })
        }

        fn notify(&self, method: &str) {
            let handler = self.handler.lock().clone();
            if let Some(handler) = handler {
                handler.handle(method, None);
            }
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn open(
            &self,
            endpoint: &str,
            notifications: Arc<dyn NotificationHandler>,
        ) -> Result<BackendHandle, McpError> {
            self.endpoints.lock().push(endpoint.to_string());
            if self.refuse.load(Ordering::SeqCst) {
                return Err(McpError::connection("connection refused"));
            }
            *self.handler.lock() = Some(notifications);
            Ok(self.backend.clone())
        }
    }

    struct LocalClient {
        lines: tokio::io::Lines<BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>>,
        writer: tokio::io::WriteHalf<tokio::io::DuplexStream>,
    }

    impl LocalClient {
        async fn request(&mut self, id: i64, method: &str) -> Value {
            let line = json!({ "jsonrpc": "2.0", "id": id, "method": method }).to_string();
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
            let reply = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&reply).unwrap()
        }
    }

    fn local_pair() -> (Arc<dyn McpTransport>, LocalClient) {
        let (client_side, server_side) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_side);
        let (client_read, client_write) = tokio::io::split(client_side);
        let transport: Arc<dyn McpTransport> =
            Arc::new(StdioTransport::new(server_read, server_write));
        let client = LocalClient {
            lines: BufReader::new(client_read).lines(),
            writer: client_write,
        };
        (transport, client)
    }

    fn bridge(connector: Arc<FakeConnector>) -> Arc<Bridge> {
        let config = BridgeConfig::new().with_host("recaf.local").with_port(9000);
        Arc::new(Bridge::with_connector(config, connector))
    }

    #[tokio::test]
    async fn test_serves_then_releases_backend_on_eof() {
        let connector = FakeConnector::new(FakeBackend::default());
        let bridge = bridge(connector.clone());
        let session = bridge.session();
        let (local, mut client) = local_pair();

        let run = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.run(local, CancellationToken::new()).await })
        };

        let reply = client.request(1, "tools/list").await;
        assert_eq!(reply["result"]["tools"][0]["name"], "tool-a");
        assert!(session.is_connected());
        assert_eq!(bridge.state(), LifecycleState::Serving);

        client.writer.shutdown().await.unwrap();
        run.await.unwrap().unwrap();

        assert!(!session.is_connected());
        assert!(session.captured_at::<Tools>().is_none());
        assert_eq!(bridge.state(), LifecycleState::Idle);
        assert_eq!(connector.backend.closed.load(Ordering::SeqCst), 1);
        assert_eq!(
            connector.endpoints.lock().as_slice(),
            &["http://recaf.local:9000/mcp".to_string()]
        );
    }

    #[tokio::test]
    async fn test_open_failure_is_backend_unavailable() {
        let connector = FakeConnector::new(FakeBackend::default());
        connector.refuse.store(true, Ordering::SeqCst);
        let bridge = bridge(connector);
        let (local, _client) = local_pair();

        let err = bridge
            .run(local, CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            BridgeError::BackendUnavailable { endpoint, source } => {
                assert_eq!(endpoint, "http://recaf.local:9000/mcp");
                assert!(source.is_disconnect());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(bridge.state(), LifecycleState::Idle);
        assert!(!bridge.session().is_connected());
    }

    #[tokio::test]
    async fn test_initialize_failure_closes_backend() {
        let connector = FakeConnector::new(FakeBackend {
            fail_initialize: true,
            ..Default::default()
        });
        let bridge = bridge(connector.clone());
        let (local, _client) = local_pair();

        let err = bridge
            .run(local, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::BackendUnavailable { .. }));
        assert_eq!(connector.backend.closed.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.session().generation(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_phase_times_out() {
        let connector = FakeConnector::new(FakeBackend {
            hang_initialize: true,
            ..Default::default()
        });
        let bridge = bridge(connector);
        let (local, _client) = local_pair();

        let err = bridge
            .run(local, CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            BridgeError::BackendUnavailable { source, .. } => {
                assert!(matches!(source, McpError::Timeout { millis: 300_000, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!bridge.session().is_connected());
    }

    #[tokio::test]
    async fn test_cancel_while_connecting() {
        let connector = FakeConnector::new(FakeBackend {
            hang_initialize: true,
            ..Default::default()
        });
        let bridge = bridge(connector);
        let (local, _client) = local_pair();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = bridge.run(local, cancel).await.unwrap_err();
        assert!(matches!(err, BridgeError::Cancelled));
        assert_eq!(bridge.state(), LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_cancel_while_serving_releases_backend() {
        let connector = FakeConnector::new(FakeBackend::default());
        let bridge = bridge(connector.clone());
        let (local, mut client) = local_pair();
        let cancel = CancellationToken::new();

        let run = {
            let bridge = bridge.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { bridge.run(local, cancel).await })
        };
        client.request(1, "ping").await;
        assert!(bridge.session().is_connected());

        cancel.cancel();
        let outcome = run.await.unwrap();

        assert!(matches!(outcome, Err(BridgeError::Cancelled)));
        assert!(!bridge.session().is_connected());
        assert_eq!(connector.backend.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_close_does_not_block_release() {
        let connector = FakeConnector::new(FakeBackend {
            hang_close: true,
            ..Default::default()
        });
        let bridge = bridge(connector.clone());
        let (local, mut client) = local_pair();
        let mut states = bridge.subscribe();
        let cancel = CancellationToken::new();

        let run = {
            let bridge = bridge.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { bridge.run(local, cancel).await })
        };
        client.request(1, "ping").await;

        cancel.cancel();
        states.wait_for(|s| *s == LifecycleState::Idle).await.unwrap();
        assert!(!bridge.session().is_connected());

        let outcome = tokio::time::timeout(BACKEND_CLOSE_TIMEOUT * 2, run)
            .await
            .expect("run should finish once the close bound expires")
            .unwrap();
        assert!(matches!(outcome, Err(BridgeError::Cancelled)));
        assert_eq!(connector.backend.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropping_run_future_releases_backend() {
        let connector = FakeConnector::new(FakeBackend::default());
        let bridge = bridge(connector);
        let (local, mut client) = local_pair();
        let mut states = bridge.subscribe();

        let run = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.run(local, CancellationToken::new()).await })
        };
        client.request(1, "ping").await;
        assert!(bridge.session().is_connected());

        run.abort();
        assert!(run.await.unwrap_err().is_cancelled());

        assert!(!bridge.session().is_connected());
        states.wait_for(|s| *s == LifecycleState::Idle).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_changed_invalidates_active_slot() {
        let connector = FakeConnector::new(FakeBackend::default());
        let bridge = bridge(connector.clone());
        let session = bridge.session();
        let (local, mut client) = local_pair();

        let run = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.run(local, CancellationToken::new()).await })
        };

        client.request(1, "tools/list").await;
        assert!(session.captured_at::<Tools>().is_some());

        connector.notify(methods::RESOURCES_LIST_CHANGED);
        assert!(session.captured_at::<Tools>().is_some());

        connector.notify(methods::TOOLS_LIST_CHANGED);
        assert!(session.captured_at::<Tools>().is_none());

        client.request(2, "tools/list").await;
        assert_eq!(connector.backend.list_tools_calls.load(Ordering::SeqCst), 2);

        client.writer.shutdown().await.unwrap();
        run.await.unwrap().unwrap();

        // A late notification from the released backend is ignored
        let (_, _, evictions) = session.cache_counters();
        connector.notify(methods::TOOLS_LIST_CHANGED);
        assert_eq!(session.cache_counters().2, evictions);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_connecting() {
        let connector = FakeConnector::new(FakeBackend::default());
        let bridge = Bridge::with_connector(BridgeConfig::new().with_port(0), connector.clone());
        let (local, _client) = local_pair();

        let err = bridge.run(local, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
        assert!(connector.endpoints.lock().is_empty());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LifecycleState::Serving.to_string(), "serving");
        assert_eq!(LifecycleState::Idle.to_string(), "idle");
    }

    #[tokio::test]
    async fn test_connect_phase_bounded_by_config() {
        let connector = FakeConnector::new(FakeBackend {
            hang_initialize: true,
            ..Default::default()
        });
        let config = BridgeConfig::new().with_connect_timeout(Duration::from_millis(20));
        let bridge = Bridge::with_connector(config, connector);
        let (local, _client) = local_pair();

        let err = bridge.run(local, CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("Request timeout after 20 ms"));
    }
}
