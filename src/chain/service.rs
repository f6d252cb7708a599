//! Chain connection service contract.
//!
//! The trackers only ever see these traits; the WebSocket client in `ws.rs`
//! is one implementation, test doubles are another.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::chain::types::{ApiOptions, ChainEvent, ChainResult, RuntimeInfo};
use crate::definitions::TypeDefinitions;

/// A live chain API.
#[async_trait]
pub trait ChainApi: Send + Sync {
    /// Endpoint this API talks to.
    fn endpoint(&self) -> &str;

    /// Resolve once the API has finished its handshake.
    ///
    /// Resolves immediately when the API is already ready; may be awaited any
    /// number of times.
    async fn is_ready(&self);

    /// Runtime facts from the latest handshake, if one completed.
    fn runtime(&self) -> Option<RuntimeInfo>;

    /// Issue a raw RPC call.
    async fn request(&self, method: &str, params: Value) -> ChainResult<Value>;

    /// Custom types registered with this API.
    fn types(&self) -> Option<&TypeDefinitions> {
        None
    }
}

/// Shared, cheaply clonable reference to a [`ChainApi`].
///
/// Two handles are equal when they point at the same API instance.
#[derive(Clone)]
pub struct ApiHandle(Arc<dyn ChainApi>);

impl ApiHandle {
    pub fn new(api: Arc<dyn ChainApi>) -> Self {
        Self(api)
    }

    pub fn api(&self) -> &dyn ChainApi {
        self.0.as_ref()
    }
}

impl std::ops::Deref for ApiHandle {
    type Target = dyn ChainApi;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for ApiHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ApiHandle {}

impl fmt::Debug for ApiHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiHandle")
            .field("endpoint", &self.0.endpoint())
            .finish()
    }
}

/// An opened connection: the API handle plus its milestone stream.
#[derive(Debug)]
pub struct ChainConnection {
    pub api: ApiHandle,
    pub events: mpsc::UnboundedReceiver<ChainEvent>,
}

/// Opens chain connections.
pub trait ChainConnector: Send + Sync {
    /// Create the connection resource and start connecting in the background.
    ///
    /// Milestones are delivered on the returned event stream.
    fn open(&self, options: &ApiOptions) -> ChainResult<ChainConnection>;
}
