/// Simulated SDK
///
/// In-process stand-in for the relay-backed connectivity SDK. It keeps an
/// active-session table, records outbound calls and lets the caller play the
/// remote wallet by firing delegate callbacks. Used by the demo and tests.
///
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::hex;
use log::debug;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::sdk::{SdkDelegate, SdkError, WalletConnectSdk};
use crate::types::{JsonRpcResult, RequestParams, SdkConfig, Session, SessionParams};

#[derive(Default)]
struct State {
    config: Option<SdkConfig>,
    delegate: Option<Arc<dyn SdkDelegate>>,
    sessions: Vec<Session>,
    session_params: Option<SessionParams>,
    requests: Vec<RequestParams>,
    disconnected: Vec<String>,
    fail_disconnect: Option<SdkError>,
    fail_request: Option<SdkError>,
}

#[derive(Default)]
pub struct SimulatedSdk {
    state: Mutex<State>,
}

impl SimulatedSdk {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Callbacks run outside the lock, a delegate may call back into the SDK.
    fn delegate(&self) -> Option<Arc<dyn SdkDelegate>> {
        self.state().delegate.clone()
    }

    pub fn config(&self) -> Option<SdkConfig> {
        self.state().config.clone()
    }

    pub fn session_params(&self) -> Option<SessionParams> {
        self.state().session_params.clone()
    }

    pub fn requests(&self) -> Vec<RequestParams> {
        self.state().requests.clone()
    }

    pub fn disconnected(&self) -> Vec<String> {
        self.state().disconnected.clone()
    }

    pub fn add_active_session(&self, session: Session) {
        let mut state = self.state();
        state.sessions.retain(|s| s.topic != session.topic);
        state.sessions.push(session);
    }

    /// Drops the session without telling the delegate, as when it is revoked
    /// while the app is not running.
    pub fn remove_active_session(&self, topic: &str) {
        self.state().sessions.retain(|s| s.topic != topic);
    }

    pub fn fail_next_disconnect(&self, message: &str) {
        self.state().fail_disconnect = Some(SdkError::new(message));
    }

    pub fn fail_next_request(&self, message: &str) {
        self.state().fail_request = Some(SdkError::new(message));
    }

    /// The wallet approves a proposal. Returns the new session topic.
    pub fn approve_session(&self, mut session: Session) -> String {
        if session.topic.is_empty() {
            session.topic = random_topic();
        }
        let topic = session.topic.clone();
        self.add_active_session(session);
        if let Some(delegate) = self.delegate() {
            delegate.on_session_approved(&topic);
        }
        topic
    }

    pub fn reject_session(&self, reason: &str) {
        if let Some(delegate) = self.delegate() {
            delegate.on_session_rejected(reason);
        }
    }

    /// The wallet deletes the session.
    pub fn delete_session(&self, topic: &str) {
        self.remove_active_session(topic);
        if let Some(delegate) = self.delegate() {
            delegate.on_session_delete(topic);
        }
    }

    /// The wallet answers a request on `topic`.
    pub fn respond(&self, topic: &str, result: JsonRpcResult) {
        if let Some(delegate) = self.delegate() {
            delegate.on_session_request_response(topic, result);
        }
    }

    pub fn set_connection_available(&self, available: bool) {
        if let Some(delegate) = self.delegate() {
            delegate.on_connection_state_change(available);
        }
    }

    pub fn expire_proposal(&self) {
        if let Some(delegate) = self.delegate() {
            delegate.on_proposal_expired();
        }
    }

    pub fn expire_request(&self) {
        if let Some(delegate) = self.delegate() {
            delegate.on_request_expired();
        }
    }

    pub fn raise_error(&self, message: &str) {
        if let Some(delegate) = self.delegate() {
            delegate.on_error(SdkError::new(message));
        }
    }
}

impl WalletConnectSdk for SimulatedSdk {
    fn initialize(
        &self,
        config: SdkConfig,
        delegate: Arc<dyn SdkDelegate>,
    ) -> Result<(), SdkError> {
        let mut state = self.state();
        if state.config.is_some() {
            return Err(SdkError::new("already initialized"));
        }
        debug!("simulated sdk initialized for {}", config.relay_server_url);
        state.config = Some(config);
        state.delegate = Some(delegate);
        Ok(())
    }

    async fn active_sessions(&self) -> Vec<Session> {
        self.state().sessions.clone()
    }

    async fn active_session(&self, topic: &str) -> Option<Session> {
        self.state().sessions.iter().find(|s| s.topic == topic).cloned()
    }

    async fn disconnect(&self, topic: &str) -> Result<(), SdkError> {
        let mut state = self.state();
        if let Some(e) = state.fail_disconnect.take() {
            return Err(e);
        }
        state.sessions.retain(|s| s.topic != topic);
        state.disconnected.push(topic.to_string());
        Ok(())
    }

    async fn request(&self, params: RequestParams) -> Result<(), SdkError> {
        let mut state = self.state();
        if let Some(e) = state.fail_request.take() {
            return Err(e);
        }
        if !state.sessions.iter().any(|s| s.topic == params.session_topic) {
            return Err(SdkError::new(format!(
                "no active session for topic {}",
                params.session_topic
            )));
        }
        state.requests.push(params);
        Ok(())
    }

    fn set_session_params(&self, params: SessionParams) {
        self.state().session_params = Some(params);
    }
}

pub fn random_topic() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::event::LifecycleEvent;
    use crate::sdk::BusDelegate;
    use crate::types::{ConnectionType, Metadata};

    fn config() -> SdkConfig {
        SdkConfig {
            relay_server_url: "wss://relay.walletconnect.com?projectId=test"
                .parse()
                .unwrap(),
            connection_type: ConnectionType::Automatic,
            metadata: Metadata {
                name: "test".to_string(),
                description: "test".to_string(),
                url: "test.example".to_string(),
                icons: vec![],
                redirect: None,
            },
        }
    }

    #[tokio::test]
    async fn callbacks_go_to_the_delegate() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        let sdk = SimulatedSdk::new();
        sdk.initialize(config(), Arc::new(BusDelegate::new(bus.clone())))
            .unwrap();

        let topic = sdk.approve_session(Session::new(""));
        assert_eq!(topic.len(), 64);
        assert_eq!(
            sub.recv().await,
            Some(LifecycleEvent::SessionApproved {
                topic: topic.clone()
            })
        );
        assert_eq!(sdk.active_sessions().await.len(), 1);

        sdk.delete_session(&topic);
        assert_eq!(
            sub.recv().await,
            Some(LifecycleEvent::SessionDeleted { topic })
        );
        assert!(sdk.active_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn initialize_only_once() {
        let bus = EventBus::default();
        let sdk = SimulatedSdk::new();
        let delegate = Arc::new(BusDelegate::new(bus));
        sdk.initialize(config(), delegate.clone()).unwrap();
        assert!(sdk.initialize(config(), delegate).is_err());
    }

    #[tokio::test]
    async fn request_needs_an_active_session() {
        let sdk = SimulatedSdk::new();
        let params = RequestParams {
            session_topic: "missing".to_string(),
            method: "personal_sign".to_string(),
            params: "[]".to_string(),
            chain_id: "eip155:1".to_string(),
        };
        assert!(sdk.request(params).await.is_err());
        assert!(sdk.requests().is_empty());
    }
}
