//! Connection lifecycle state machine.
//!
//! # States
//! - Uninitialized: nothing requested yet
//! - Initialised: one connection attempt issued
//! - Connecting: transport up, API handle available
//! - Ready: API handshake finished
//! - Disconnected: transport dropped
//! - Error: the client reported an error (payload kept verbatim)
//!
//! # State Transitions
//! ```text
//! Uninitialized → Initialised → Connecting → Ready
//! any → Disconnected, any → Error
//! Disconnected / Error → Connecting / Ready on later milestones
//! ```
//!
//! # Design Decisions
//! - Transitions are a pure function of (state, event)
//! - No transition is refused; reconnection is the client's business
//! - An error never clears a previously stored handle

use crate::chain::{ApiHandle, ConnectionError};

/// Tag of the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ApiStatus {
    #[default]
    Uninitialized,
    Initialised,
    Connecting,
    Ready,
    Disconnected,
    Error(ConnectionError),
}

impl ApiStatus {
    /// Stable lowercase label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ApiStatus::Uninitialized => "uninitialized",
            ApiStatus::Initialised => "initialised",
            ApiStatus::Connecting => "connecting",
            ApiStatus::Ready => "ready",
            ApiStatus::Disconnected => "disconnected",
            ApiStatus::Error(_) => "error",
        }
    }
}

/// Milestones driving the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The single connection attempt was issued.
    Init,
    /// The transport came up.
    Connected(ApiHandle),
    /// The API became ready.
    Ready(ApiHandle),
    /// The transport dropped.
    Disconnected,
    /// The client reported an error.
    Failed(ConnectionError),
}

/// Connection state as seen by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub status: ApiStatus,
    /// Present once the transport came up.
    pub api: Option<ApiHandle>,
}

impl ConnectionState {
    /// Apply one milestone, producing the next state.
    pub fn apply(&self, event: ConnectionEvent) -> ConnectionState {
        match event {
            ConnectionEvent::Init => ConnectionState {
                status: ApiStatus::Initialised,
                api: self.api.clone(),
            },
            ConnectionEvent::Connected(api) => ConnectionState {
                status: ApiStatus::Connecting,
                api: Some(api),
            },
            ConnectionEvent::Ready(api) => ConnectionState {
                status: ApiStatus::Ready,
                api: Some(api),
            },
            ConnectionEvent::Disconnected => ConnectionState {
                status: ApiStatus::Disconnected,
                api: self.api.clone(),
            },
            ConnectionEvent::Failed(error) => ConnectionState {
                status: ApiStatus::Error(error),
                api: self.api.clone(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ApiStatus::Ready
    }

    /// Error payload, present only in the error state.
    pub fn error(&self) -> Option<&ConnectionError> {
        match &self.status {
            ApiStatus::Error(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainApi, ChainResult, RuntimeInfo};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;

    struct StubApi;

    #[async_trait]
    impl ChainApi for StubApi {
        fn endpoint(&self) -> &str {
            "ws://stub"
        }
        async fn is_ready(&self) {}
        fn runtime(&self) -> Option<RuntimeInfo> {
            None
        }
        async fn request(&self, _method: &str, _params: Value) -> ChainResult<Value> {
            Ok(Value::Null)
        }
    }

    fn handle() -> ApiHandle {
        ApiHandle::new(Arc::new(StubApi))
    }

    fn run(events: Vec<ConnectionEvent>) -> ConnectionState {
        events
            .into_iter()
            .fold(ConnectionState::default(), |state, event| state.apply(event))
    }

    #[test]
    fn test_happy_path() {
        let api = handle();
        let initialised = ConnectionState::default().apply(ConnectionEvent::Init);
        assert_eq!(initialised.status, ApiStatus::Initialised);
        assert!(initialised.api.is_none());

        let connecting = initialised.apply(ConnectionEvent::Connected(api.clone()));
        assert_eq!(connecting.status, ApiStatus::Connecting);
        assert_eq!(connecting.api.as_ref(), Some(&api));

        let ready = connecting.apply(ConnectionEvent::Ready(api.clone()));
        assert!(ready.is_ready());
        assert_eq!(ready.api, Some(api));
    }

    #[test]
    fn test_apply_does_not_mutate_input() {
        let before = ConnectionState::default();
        let after = before.apply(ConnectionEvent::Init);
        assert_eq!(before.status, ApiStatus::Uninitialized);
        assert_ne!(before, after);
    }

    #[test]
    fn test_error_keeps_handle() {
        let api = handle();
        let state = run(vec![
            ConnectionEvent::Init,
            ConnectionEvent::Connected(api.clone()),
            ConnectionEvent::Failed(ConnectionError::Other("boom".into())),
        ]);
        assert_eq!(state.error(), Some(&ConnectionError::Other("boom".into())));
        assert_eq!(state.api, Some(api));
    }

    #[test]
    fn test_recovers_after_disconnect() {
        let api = handle();
        let state = run(vec![
            ConnectionEvent::Init,
            ConnectionEvent::Connected(api.clone()),
            ConnectionEvent::Ready(api.clone()),
            ConnectionEvent::Disconnected,
        ]);
        assert_eq!(state.status, ApiStatus::Disconnected);
        assert_eq!(state.error(), None);

        let state = state
            .apply(ConnectionEvent::Connected(api.clone()))
            .apply(ConnectionEvent::Ready(api));
        assert!(state.is_ready());
    }

    #[test]
    fn test_deterministic() {
        let api = handle();
        let events = vec![
            ConnectionEvent::Init,
            ConnectionEvent::Connected(api.clone()),
            ConnectionEvent::Disconnected,
            ConnectionEvent::Failed(ConnectionError::Transport("reset".into())),
            ConnectionEvent::Ready(api),
        ];
        assert_eq!(run(events.clone()), run(events));
    }

    #[test]
    fn test_labels() {
        assert_eq!(ApiStatus::default().label(), "uninitialized");
        assert_eq!(ApiStatus::Error(ConnectionError::NotConnected).label(), "error");
    }
}
