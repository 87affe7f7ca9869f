/// Connectivity SDK contract
///
/// The relay-backed SDK (pairing, encryption, JSON-RPC transport) is opaque
/// to this crate. It is consumed through [`WalletConnectSdk`] for outbound
/// calls and talks back through an [`SdkDelegate`] on arbitrary threads.
///
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::bus::EventBus;
use crate::event::LifecycleEvent;
use crate::types::{JsonRpcResult, RequestParams, SdkConfig, Session, SessionParams};

/// Failure reported by the SDK through one of its error callbacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SdkError {
    pub message: String,
}

impl SdkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SdkError {}

pub trait WalletConnectSdk: Send + Sync + 'static {
    /// One-time setup. The delegate receives every callback from here on.
    fn initialize(
        &self,
        config: SdkConfig,
        delegate: Arc<dyn SdkDelegate>,
    ) -> Result<(), SdkError>;

    fn active_sessions(&self) -> impl Future<Output = Vec<Session>> + Send;

    fn active_session(
        &self,
        topic: &str,
    ) -> impl Future<Output = Option<Session>> + Send;

    fn disconnect(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<(), SdkError>> + Send;

    /// Dispatches a session request. Completion only means the request went
    /// out; the answer arrives later as a request-response callback.
    fn request(
        &self,
        params: RequestParams,
    ) -> impl Future<Output = Result<(), SdkError>> + Send;

    fn set_session_params(&self, params: SessionParams);
}

/// Callbacks the SDK delivers, one per delegate hook.
pub trait SdkDelegate: Send + Sync {
    fn on_connection_state_change(&self, is_available: bool);
    fn on_session_approved(&self, topic: &str);
    fn on_session_rejected(&self, reason: &str);
    fn on_session_update(&self, topic: &str);
    fn on_session_extend(&self, topic: &str);
    fn on_session_delete(&self, topic: &str);
    fn on_session_event(
        &self,
        topic: &str,
        name: &str,
        data: Value,
        chain_id: Option<&str>,
    );
    fn on_session_request_response(&self, topic: &str, result: JsonRpcResult);
    fn on_session_authenticate_response(
        &self,
        result: Result<Option<String>, SdkError>,
    );
    fn on_proposal_expired(&self);
    fn on_request_expired(&self);
    fn on_error(&self, error: SdkError);
    fn on_pairing_delete(&self, topic: &str);
    fn on_pairing_expired(&self, topic: &str);
    fn on_pairing_state(&self, pairing_in_progress: bool);
}

/// Delegate that republishes every callback on the event bus.
#[derive(Clone, Debug)]
pub struct BusDelegate {
    bus: EventBus,
}

impl BusDelegate {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    fn emit(&self, event: LifecycleEvent) {
        debug!("delegate: {event}");
        self.bus.publish(event);
    }
}

impl SdkDelegate for BusDelegate {
    fn on_connection_state_change(&self, is_available: bool) {
        self.emit(LifecycleEvent::ConnectionStateChanged {
            available: is_available,
        });
    }

    fn on_session_approved(&self, topic: &str) {
        self.emit(LifecycleEvent::SessionApproved {
            topic: topic.to_string(),
        });
    }

    fn on_session_rejected(&self, reason: &str) {
        self.emit(LifecycleEvent::SessionRejected {
            reason: reason.to_string(),
        });
    }

    fn on_session_update(&self, topic: &str) {
        self.emit(LifecycleEvent::SessionUpdated {
            topic: topic.to_string(),
        });
    }

    fn on_session_extend(&self, topic: &str) {
        self.emit(LifecycleEvent::SessionExtended {
            topic: topic.to_string(),
        });
    }

    fn on_session_delete(&self, topic: &str) {
        self.emit(LifecycleEvent::SessionDeleted {
            topic: topic.to_string(),
        });
    }

    fn on_session_event(
        &self,
        topic: &str,
        name: &str,
        data: Value,
        chain_id: Option<&str>,
    ) {
        self.emit(LifecycleEvent::SessionEvent {
            topic: topic.to_string(),
            name: name.to_string(),
            data,
            chain_id: chain_id.map(|c| c.to_string()),
        });
    }

    fn on_session_request_response(&self, topic: &str, result: JsonRpcResult) {
        let result = match result {
            JsonRpcResult::Result(payload) => Ok(payload),
            JsonRpcResult::Error { code, message } => {
                debug!("request on {topic} failed with code {code}");
                Err(message)
            }
        };
        self.emit(LifecycleEvent::RequestResponse {
            topic: topic.to_string(),
            result,
        });
    }

    fn on_session_authenticate_response(
        &self,
        result: Result<Option<String>, SdkError>,
    ) {
        self.emit(LifecycleEvent::SessionAuthenticateResponse {
            result: result.map_err(|e| e.message),
        });
    }

    fn on_proposal_expired(&self) {
        self.emit(LifecycleEvent::ProposalExpired);
    }

    fn on_request_expired(&self) {
        self.emit(LifecycleEvent::RequestExpired);
    }

    fn on_error(&self, error: SdkError) {
        self.emit(LifecycleEvent::GenericError {
            message: error.message,
        });
    }

    fn on_pairing_delete(&self, topic: &str) {
        self.emit(LifecycleEvent::PairingDeleted {
            topic: topic.to_string(),
        });
    }

    fn on_pairing_expired(&self, topic: &str) {
        self.emit(LifecycleEvent::PairingExpired {
            topic: topic.to_string(),
        });
    }

    fn on_pairing_state(&self, pairing_in_progress: bool) {
        self.emit(LifecycleEvent::PairingState {
            pairing_in_progress,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delegate_republishes_callbacks() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        let delegate = BusDelegate::new(bus.clone());

        delegate.on_session_approved("t1");
        delegate.on_session_request_response(
            "t1",
            JsonRpcResult::Error {
                code: 5000,
                message: "denied".to_string(),
            },
        );
        delegate.on_error(SdkError::new("socket closed"));
        delegate.on_session_authenticate_response(Ok(None));

        assert_eq!(
            sub.recv().await,
            Some(LifecycleEvent::SessionApproved {
                topic: "t1".to_string()
            })
        );
        assert_eq!(
            sub.recv().await,
            Some(LifecycleEvent::RequestResponse {
                topic: "t1".to_string(),
                result: Err("denied".to_string()),
            })
        );
        assert_eq!(
            sub.recv().await,
            Some(LifecycleEvent::GenericError {
                message: "socket closed".to_string()
            })
        );
        assert_eq!(
            sub.recv().await,
            Some(LifecycleEvent::SessionAuthenticateResponse { result: Ok(None) })
        );
    }

    #[tokio::test]
    async fn connection_callbacks_are_replayed() {
        let bus = EventBus::default();
        let delegate: Arc<dyn SdkDelegate> = Arc::new(BusDelegate::new(bus.clone()));

        delegate.on_connection_state_change(true);

        let mut sub = bus.subscribe_connection_state();
        assert_eq!(
            sub.recv().await,
            Some(LifecycleEvent::ConnectionStateChanged { available: true })
        );
    }
}
