/// Session reconciler
///
/// Single owner of the selected session topic and of the persisted
/// `ETH_SIGNED` marker. Lifecycle events and user commands are processed one
/// at a time in [`SessionReconciler::run`], so both values only ever change
/// from that task. Every change is reported to the [`UiProjector`] as a
/// [`Transition`].
///
/// Session states:
///
/// 1. Unselected
/// 2. Selected, pending sign-in (after approval)
/// 3. Selected, signed in (after a successful `personal_sign` round trip,
///    marker persisted)
///
/// A deleted session or a confirmed disconnect returns to 1 from anywhere. A
/// failed sign-in forces a disconnect.
///
use std::sync::Arc;

use log::{debug, info, warn};
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};

use crate::bus::Subscription;
use crate::constants::{REQUEST_SEND_ERROR, UNKNOWN_DISCONNECT_ERROR};
use crate::event::LifecycleEvent;
use crate::projector::{Transition, UiProjector};
use crate::sdk::WalletConnectSdk;
use crate::store::PreferenceStore;
use crate::types::{Chain, RequestParams, Session};

/// Requests from the presentation layer, answered once fully processed.
#[derive(Debug)]
pub enum Command {
    CheckSessions(oneshot::Sender<()>),
    RequestSignIn(oneshot::Sender<()>),
    Disconnect(oneshot::Sender<()>),
    AwaitingProposalResponse(bool, oneshot::Sender<()>),
    SelectedTopic(oneshot::Sender<Option<String>>),
}

pub struct SessionReconciler<S, P> {
    sdk: Arc<S>,
    store: P,
    projector: UiProjector,
    chain: Chain,
    selected: Option<String>,
}

impl<S: WalletConnectSdk, P: PreferenceStore> SessionReconciler<S, P> {
    pub fn new(sdk: Arc<S>, store: P, projector: UiProjector, chain: Chain) -> Self {
        Self {
            sdk,
            store,
            projector,
            chain,
            selected: None,
        }
    }

    pub fn selected_topic(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn projector(&self) -> &UiProjector {
        &self.projector
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    /// Processes events and commands until either source closes.
    ///
    /// Bus events take priority, so a command observes every event that was
    /// published before it was sent. While events keep arriving, commands
    /// wait until the bus is drained.
    pub async fn run(
        mut self,
        mut events: Subscription,
        mut commands: mpsc::Receiver<Command>,
    ) {
        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
                command = commands.recv() => match command {
                    Some(command) => self.execute(command).await,
                    None => break,
                },
            }
        }
        info!("session reconciler stopped");
    }

    pub async fn execute(&mut self, command: Command) {
        match command {
            Command::CheckSessions(done) => {
                self.check_sessions().await;
                let _ = done.send(());
            }
            Command::RequestSignIn(done) => {
                self.request_sign_in().await;
                let _ = done.send(());
            }
            Command::Disconnect(done) => {
                self.disconnect().await;
                let _ = done.send(());
            }
            Command::AwaitingProposalResponse(waiting, done) => {
                self.awaiting_proposal_response(waiting);
                let _ = done.send(());
            }
            Command::SelectedTopic(reply) => {
                let _ = reply.send(self.selected.clone());
            }
        }
    }

    pub async fn handle(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::SessionApproved { topic } => {
                self.on_session_approved(topic).await
            }
            LifecycleEvent::SessionAuthenticateResponse { result } => {
                self.on_session_authenticated(result).await
            }
            LifecycleEvent::SessionDeleted { topic } => {
                self.on_session_deleted(topic).await
            }
            LifecycleEvent::RequestResponse { topic, result } => {
                self.on_request_response(topic, result).await
            }
            other => self.emit(Transition::Observed(other)),
        }
    }

    /// Startup reconciliation, also used on resume.
    ///
    /// The marker is trusted only if the SDK still lists its topic as active:
    /// a session revoked elsewhere must not come back as signed in.
    pub async fn on_startup(&mut self) {
        self.check_sessions().await
    }

    pub async fn check_sessions(&mut self) {
        let marker = self.read_marker().await;
        let active = self.sdk.active_sessions().await;
        let is_active = |topic: &str| active.iter().any(|s| s.topic == topic);

        if let Some(selected) = self.selected.clone() {
            if !is_active(&selected) {
                info!("selected session {selected} is no longer active");
                self.selected = None;
                self.emit(Transition::Deselected { topic: selected });
            }
        }

        match marker {
            Some(topic) if is_active(&topic) => {
                info!("restored signed session {topic}");
                self.selected = Some(topic.clone());
                self.emit(Transition::Restored { topic });
            }
            Some(topic) => {
                info!("clearing stale signed marker {topic}");
                self.write_marker(None).await;
                self.emit(Transition::MarkerCleared);
            }
            None => debug!("no signed session to restore"),
        }
    }

    /// Selects the session. Nothing is persisted until a sign-in succeeds.
    pub async fn on_session_approved(&mut self, topic: String) {
        self.select(topic.clone()).await;
        self.emit(Transition::Selected { topic });
    }

    pub async fn on_session_authenticated(&mut self, result: Result<Option<String>, String>) {
        match result {
            Ok(Some(topic)) => {
                self.select(topic.clone()).await;
                self.emit(Transition::Authenticated { topic: Some(topic) });
            }
            Ok(None) => self.emit(Transition::Authenticated { topic: None }),
            Err(message) => self.emit(Transition::AuthenticateRejected { message }),
        }
    }

    pub async fn on_session_deleted(&mut self, topic: String) {
        if self.selected.as_deref() == Some(topic.as_str()) {
            info!("selected session {topic} deleted");
            self.selected = None;
            self.write_marker(None).await;
            self.emit(Transition::Deselected { topic });
        } else {
            self.emit(Transition::Observed(LifecycleEvent::SessionDeleted { topic }));
        }
    }

    /// A successful response signs the selected session in. A failed one
    /// drops the session: there is no retry.
    pub async fn on_request_response(&mut self, topic: String, result: Result<String, String>) {
        match result {
            Ok(payload) if self.selected.as_deref() == Some(topic.as_str()) => {
                self.write_marker(Some(topic.clone())).await;
                self.emit(Transition::SignedIn {
                    topic,
                    result: payload,
                });
            }
            Ok(_) => {
                debug!("ignoring response for unselected session {topic}");
                self.emit(Transition::StaleResponse { topic });
            }
            Err(message) => {
                warn!("sign request on {topic} failed: {message}");
                self.emit(Transition::SignRejected { topic, message });
                self.disconnect().await;
            }
        }
    }

    /// Local state changes only after the SDK confirms the disconnect.
    pub async fn disconnect(&mut self) {
        let Some(topic) = self.selected.clone() else {
            debug!("disconnect without a selected session");
            return;
        };

        self.emit(Transition::DisconnectStarted {
            topic: topic.clone(),
        });

        match self.sdk.disconnect(&topic).await {
            Ok(()) => {
                info!("disconnected {topic}");
                self.selected = None;
                self.write_marker(None).await;
                self.emit(Transition::Disconnected { topic });
            }
            Err(e) => {
                warn!("disconnect of {topic} failed: {e}");
                let message = if e.message.is_empty() {
                    UNKNOWN_DISCONNECT_ERROR.to_string()
                } else {
                    e.message
                };
                self.emit(Transition::DisconnectFailed { message });
            }
        }
    }

    /// Sends a `personal_sign` request on the selected session. The answer
    /// comes back later as a `RequestResponse` event.
    pub async fn request_sign_in(&mut self) {
        let Some(topic) = self.selected.clone() else {
            debug!("sign-in requested without a selected session");
            return;
        };

        self.emit(Transition::SignRequested {
            topic: topic.clone(),
        });

        let session = self
            .sdk
            .active_session(&topic)
            .await
            .unwrap_or_else(|| Session::new(topic.clone()));

        let params = match RequestParams::personal_sign(
            &session,
            &self.chain,
            OffsetDateTime::now_utc(),
        ) {
            Ok(params) => params,
            Err(e) => {
                warn!("could not build sign request: {e}");
                self.emit(Transition::SignDispatchFailed {
                    message: REQUEST_SEND_ERROR.to_string(),
                });
                return;
            }
        };

        match self.sdk.request(params).await {
            Ok(()) => self.emit(Transition::SignDispatched {
                deep_link: session.redirect_uri(),
            }),
            Err(e) => {
                warn!("sign request on {topic} not sent: {e}");
                let message = if e.message.is_empty() {
                    REQUEST_SEND_ERROR.to_string()
                } else {
                    e.message
                };
                self.emit(Transition::SignDispatchFailed { message });
            }
        }
    }

    pub fn awaiting_proposal_response(&mut self, waiting: bool) {
        self.emit(Transition::AwaitingProposal(waiting));
    }

    async fn select(&mut self, topic: String) {
        // a marker for another topic no longer describes the selection
        if let Some(marker) = self.read_marker().await {
            if marker != topic {
                self.write_marker(None).await;
            }
        }
        self.selected = Some(topic);
    }

    fn emit(&self, transition: Transition) {
        self.projector.apply(&transition);
    }

    async fn read_marker(&self) -> Option<String> {
        match self.store.signed_eth().await {
            Ok(marker) => marker,
            Err(e) => {
                warn!("could not read signed marker: {e}");
                None
            }
        }
    }

    async fn write_marker(&self, topic: Option<String>) {
        if let Err(e) = self.store.set_signed_eth(topic).await {
            warn!("could not write signed marker: {e}");
        }
    }
}
