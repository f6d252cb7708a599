//! Scripted collaborators shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

use substrate_context::accounts::{
    AccountDiscovery, AccountSink, DiscoveryError, InjectedAccount, SubscribeOptions, Unsubscribe,
};
use substrate_context::chain::{
    ApiHandle, ApiOptions, ChainApi, ChainConnection, ChainConnector, ChainEvent, ChainResult,
    ConnectionError, RuntimeInfo,
};
use substrate_context::{ProviderProps, Snapshot, SubstrateProvider};

pub const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
pub const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";
pub const CHARLIE: &str = "5FLSigC9HGRKVhB9FiEo4Y3koPsNmBmLJbpXg2mp1hXcS59Y";

pub fn account(address: &str) -> InjectedAccount {
    InjectedAccount::new(address, "polkadot-js")
}

pub fn props() -> ProviderProps {
    ProviderProps::new(ApiOptions::new("ws://scripted"))
}

/// Wait for the first snapshot matching `pred`.
pub async fn wait_until<F>(provider: &SubstrateProvider, pred: F) -> Arc<Snapshot>
where
    F: Fn(&Snapshot) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), provider.wait_for(pred))
        .await
        .expect("condition not reached")
        .expect("provider stopped")
}

/// Chain API whose readiness is flipped by the test.
pub struct ScriptedApi {
    ready: watch::Sender<bool>,
}

#[async_trait]
impl ChainApi for ScriptedApi {
    fn endpoint(&self) -> &str {
        "ws://scripted"
    }

    async fn is_ready(&self) {
        let mut rx = self.ready.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    fn runtime(&self) -> Option<RuntimeInfo> {
        None
    }

    async fn request(&self, _method: &str, _params: Value) -> ChainResult<Value> {
        Err(ConnectionError::NotConnected)
    }
}

/// Connector whose milestones are emitted by the test.
pub struct ScriptedConnector {
    api: Arc<ScriptedApi>,
    events: Mutex<Option<mpsc::UnboundedSender<ChainEvent>>>,
    opens: AtomicU32,
    failure: Option<ConnectionError>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        let (ready, _) = watch::channel(false);
        Arc::new(Self {
            api: Arc::new(ScriptedApi { ready }),
            events: Mutex::new(None),
            opens: AtomicU32::new(0),
            failure: None,
        })
    }

    pub fn failing(error: ConnectionError) -> Arc<Self> {
        let (ready, _) = watch::channel(false);
        Arc::new(Self {
            api: Arc::new(ScriptedApi { ready }),
            events: Mutex::new(None),
            opens: AtomicU32::new(0),
            failure: Some(error),
        })
    }

    /// Emit a milestone. Returns `false` once nobody listens.
    pub fn emit(&self, event: ChainEvent) -> bool {
        self.events
            .lock()
            .unwrap()
            .as_ref()
            .map_or(false, |tx| tx.send(event).is_ok())
    }

    /// Resolve the API's ready signal.
    pub fn set_ready(&self) {
        self.api.ready.send_replace(true);
    }

    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }
}

impl ChainConnector for ScriptedConnector {
    fn open(&self, _options: &ApiOptions) -> ChainResult<ChainConnection> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().unwrap() = Some(tx);
        Ok(ChainConnection {
            api: ApiHandle::new(self.api.clone()),
            events: rx,
        })
    }
}

/// Discovery whose authorization is resolved by the test.
pub struct GatedDiscovery {
    gate: Mutex<Option<oneshot::Receiver<Result<(), DiscoveryError>>>>,
    opener: Mutex<Option<oneshot::Sender<Result<(), DiscoveryError>>>>,
    sink: Mutex<Option<AccountSink>>,
    subscribe_failure: Mutex<Option<(DiscoveryError, Vec<InjectedAccount>)>>,
    authorize_calls: AtomicU32,
    unsubscribes: Arc<AtomicU32>,
}

impl GatedDiscovery {
    /// Authorization stays pending until [`GatedDiscovery::resolve`].
    pub fn new() -> Arc<Self> {
        let (opener, gate) = oneshot::channel();
        Arc::new(Self {
            gate: Mutex::new(Some(gate)),
            opener: Mutex::new(Some(opener)),
            sink: Mutex::new(None),
            subscribe_failure: Mutex::new(None),
            authorize_calls: AtomicU32::new(0),
            unsubscribes: Arc::new(AtomicU32::new(0)),
        })
    }

    /// Authorization succeeds right away.
    pub fn open() -> Arc<Self> {
        let discovery = Self::new();
        discovery.resolve(Ok(()));
        discovery
    }

    /// Authorization fails right away with `error`.
    pub fn rejecting(error: DiscoveryError) -> Arc<Self> {
        let discovery = Self::new();
        discovery.resolve(Err(error));
        discovery
    }

    /// Authorization succeeds; subscribe delivers `batch`, then fails with `error`.
    pub fn failing_subscribe(error: DiscoveryError, batch: Vec<InjectedAccount>) -> Arc<Self> {
        let discovery = Self::open();
        *discovery.subscribe_failure.lock().unwrap() = Some((error, batch));
        discovery
    }

    pub fn resolve(&self, result: Result<(), DiscoveryError>) {
        if let Some(opener) = self.opener.lock().unwrap().take() {
            let _ = opener.send(result);
        }
    }

    /// Push a full collection through the captured sink.
    pub fn deliver(&self, accounts: Vec<InjectedAccount>) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => {
                sink.deliver(accounts);
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    /// Wait until the tracker has subscribed.
    pub async fn subscribed(&self) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !self.is_subscribed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("tracker never subscribed");
    }

    pub fn authorize_calls(&self) -> u32 {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribes(&self) -> u32 {
        self.unsubscribes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountDiscovery for GatedDiscovery {
    async fn authorize(&self, _app_name: &str) -> Result<(), DiscoveryError> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        match gate {
            Some(gate) => gate
                .await
                .unwrap_or_else(|_| Err(DiscoveryError::Rejected("gate dropped".into()))),
            None => Err(DiscoveryError::Rejected("authorize called twice".into())),
        }
    }

    async fn subscribe(
        &self,
        _app_name: &str,
        _options: &SubscribeOptions,
        sink: AccountSink,
    ) -> Result<Unsubscribe, DiscoveryError> {
        if let Some((error, batch)) = self.subscribe_failure.lock().unwrap().take() {
            sink.deliver(batch);
            return Err(error);
        }
        *self.sink.lock().unwrap() = Some(sink);
        let unsubscribes = self.unsubscribes.clone();
        Ok(Unsubscribe::new(move || {
            unsubscribes.fetch_add(1, Ordering::SeqCst);
        }))
    }
}
