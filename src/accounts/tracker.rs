//! Account source tracker.
//!
//! # Data Flow
//! ```text
//! start() → Init → authorize(app_name)
//!   ├─ Err → Failed(e)
//!   └─ Ok  → subscribe(app_name, options, sink)
//!             ├─ Err → Failed(e)
//!             └─ Ok  → slot.fill(unsubscribe)
//! sink(accounts) → drop invalid records → Delivered(accounts)
//! ```
//!
//! # Design Decisions
//! - The handshake runs to completion even after teardown, so a late
//!   subscription handle is still released
//! - Deliveries after teardown are refused by the dispatcher

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Instrument;

use crate::accounts::discovery::AccountDiscovery;
use crate::accounts::subscription::SubscriptionSlot;
use crate::accounts::types::{AccountSink, DiscoveryRequest, InjectedAccount};
use crate::state::{AccountEvent, AccountSourceState, Dispatcher};

pub struct AccountSourceTracker {
    discovery: Arc<dyn AccountDiscovery>,
    dispatcher: Dispatcher,
    started: AtomicBool,
    slot: Arc<SubscriptionSlot>,
}

impl AccountSourceTracker {
    pub fn new(discovery: Arc<dyn AccountDiscovery>, dispatcher: Dispatcher) -> Self {
        Self {
            discovery,
            dispatcher,
            started: AtomicBool::new(false),
            slot: Arc::new(SubscriptionSlot::new()),
        }
    }

    /// Start the single discovery attempt.
    ///
    /// Returns `false` when an attempt was already issued.
    pub fn start(&self, request: &DiscoveryRequest) -> bool {
        if self.dispatcher.snapshot().accounts != AccountSourceState::Uninitialized {
            tracing::debug!("Account discovery already initialised, ignoring start");
            return false;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("Account discovery already issued, ignoring start");
            return false;
        }

        self.dispatcher.dispatch(AccountEvent::Init);
        tracing::info!(app_name = %request.app_name, "Discovering accounts");

        let span = tracing::info_span!("accounts", app_name = %request.app_name);
        tokio::spawn(
            handshake(
                self.discovery.clone(),
                request.clone(),
                self.dispatcher.clone(),
                self.slot.clone(),
            )
            .instrument(span),
        );
        true
    }

    /// Release the subscription, now or as soon as its handle arrives.
    pub fn teardown(&self) {
        if self.slot.release() {
            tracing::debug!("Account subscription released");
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl Drop for AccountSourceTracker {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for AccountSourceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSourceTracker")
            .field("started", &self.is_started())
            .field("subscription", &self.slot)
            .finish()
    }
}

fn valid_accounts(accounts: Vec<InjectedAccount>) -> Vec<InjectedAccount> {
    accounts
        .into_iter()
        .filter(|account| match account.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping invalid account record");
                false
            }
        })
        .collect()
}

async fn handshake(
    discovery: Arc<dyn AccountDiscovery>,
    request: DiscoveryRequest,
    dispatcher: Dispatcher,
    slot: Arc<SubscriptionSlot>,
) {
    if let Err(e) = discovery.authorize(&request.app_name).await {
        tracing::warn!(error = %e, "Account discovery authorization failed");
        dispatcher.dispatch(AccountEvent::Failed(e));
        return;
    }

    let sink_dispatcher = dispatcher.clone();
    let sink = AccountSink::new(move |accounts| {
        let accounts = valid_accounts(accounts);
        tracing::debug!(accounts = accounts.len(), "Accounts delivered");
        sink_dispatcher.dispatch(AccountEvent::Delivered(accounts));
    });

    match discovery.subscribe(&request.app_name, &request.options, sink).await {
        Ok(unsubscribe) => {
            if !slot.fill(unsubscribe) {
                tracing::debug!("Subscription arrived after teardown, released");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Account subscription failed");
            dispatcher.dispatch(AccountEvent::Failed(e));
        }
    }
}
