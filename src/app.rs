/// Application bootstrap
///
/// Wires the SDK delegate to the event bus, initialises the SDK with the
/// app's static metadata and runs the session reconciler as one task. The
/// returned [`AppHandle`] is the only way to talk to that task, so its
/// lifetime is the app's lifetime.
///
use std::sync::Arc;

use log::info;
use time::OffsetDateTime;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::bus::{EventBus, Subscription};
use crate::config::AppConfig;
use crate::constants::COMMAND_CAPACITY;
use crate::error::{Error, Result};
use crate::projector::{AppEvent, UiProjector, UiState};
use crate::reconciler::{Command, SessionReconciler};
use crate::sdk::{BusDelegate, WalletConnectSdk};
use crate::store::PreferenceStore;
use crate::types::SessionParams;

pub struct WalletApp;

impl WalletApp {
    /// Initialises `sdk`, reconciles the persisted marker against the SDK's
    /// active sessions and starts processing events.
    pub async fn start<S, P>(config: &AppConfig, sdk: Arc<S>, store: P) -> Result<AppHandle>
    where
        S: WalletConnectSdk,
        P: PreferenceStore,
    {
        let bus = EventBus::default();
        // subscribe before the SDK can call back
        let subscription = bus.subscribe();

        sdk.initialize(config.sdk_config()?, Arc::new(BusDelegate::new(bus.clone())))?;
        sdk.set_session_params(SessionParams::personal_sign(
            &config.chain,
            OffsetDateTime::now_utc(),
        ));

        let projector = UiProjector::default();
        let ui_state = projector.watch_state();
        let events = projector.subscribe_events();

        let mut reconciler =
            SessionReconciler::new(sdk, store, projector, config.chain.clone());
        reconciler.on_startup().await;

        let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let task = tokio::spawn(reconciler.run(subscription, receiver));
        info!("wallet app started for {}", config.metadata.name);

        Ok(AppHandle {
            bus,
            commands,
            ui_state,
            events,
            task,
        })
    }
}

pub struct AppHandle {
    bus: EventBus,
    commands: mpsc::Sender<Command>,
    ui_state: watch::Receiver<UiState>,
    events: broadcast::Receiver<AppEvent>,
    task: JoinHandle<()>,
}

impl AppHandle {
    /// Re-run startup reconciliation, e.g. when the app resumes.
    pub async fn check_sessions(&self) -> Result<()> {
        self.call(Command::CheckSessions).await
    }

    pub async fn request_sign_in(&self) -> Result<()> {
        self.call(Command::RequestSignIn).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.call(Command::Disconnect).await
    }

    pub async fn awaiting_proposal_response(&self, waiting: bool) -> Result<()> {
        self.call(|done| Command::AwaitingProposalResponse(waiting, done))
            .await
    }

    pub async fn selected_topic(&self) -> Result<Option<String>> {
        let (reply, selected) = oneshot::channel();
        self.commands.send(Command::SelectedTopic(reply)).await?;
        Ok(selected.await?)
    }

    pub fn ui_state(&self) -> watch::Receiver<UiState> {
        self.ui_state.clone()
    }

    /// UI events emitted from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<AppEvent> {
        self.events.resubscribe()
    }

    /// Raw lifecycle events, with the current connection state replayed.
    pub fn subscribe_lifecycle(&self) -> Subscription {
        self.bus.subscribe()
    }

    pub fn connection_state(&self) -> Option<bool> {
        self.bus.connection_state()
    }

    /// Stops the reconciler after it finishes queued work.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.commands);
        self.task
            .await
            .map_err(|e| Error::InternalError(format!("reconciler task failed: {e}")))?;
        info!("wallet app stopped");
        Ok(())
    }

    async fn call(&self, command: impl FnOnce(oneshot::Sender<()>) -> Command) -> Result<()> {
        let (done, finished) = oneshot::channel();
        self.commands.send(command(done)).await?;
        Ok(finished.await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ETH_SIGNED;
    use crate::event::LifecycleEvent;
    use crate::simulated::SimulatedSdk;
    use crate::store::{FilePreferences, MemoryPreferences};
    use crate::types::{JsonRpcResult, Session};

    fn drain(events: &mut broadcast::Receiver<AppEvent>) -> Vec<AppEvent> {
        let mut out = vec![];
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn start_configures_the_sdk() {
        let sdk = Arc::new(SimulatedSdk::new());
        let app = WalletApp::start(&AppConfig::default(), sdk.clone(), MemoryPreferences::default())
            .await
            .unwrap();

        let config = sdk.config().unwrap();
        assert_eq!(config.metadata.name, "Wallet Connect");
        assert_eq!(
            config.relay_server_url.query(),
            Some("projectId=fd2458a46d601ccf26ff85ba70eebd40")
        );
        let params = sdk.session_params().unwrap();
        assert_eq!(params.required_namespaces["eip155"].chains, vec!["eip155:1"]);

        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn startup_restores_signed_session() {
        let sdk = Arc::new(SimulatedSdk::new());
        sdk.add_active_session(Session::new("0xabc"));
        let prefs = MemoryPreferences::with_signed_eth("0xabc");

        let app = WalletApp::start(&AppConfig::default(), sdk, prefs.clone())
            .await
            .unwrap();

        assert_eq!(app.selected_topic().await.unwrap().as_deref(), Some("0xabc"));
        assert_eq!(
            app.ui_state().borrow().signed_address_label.as_deref(),
            Some("0xabc")
        );
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn sign_in_round_trip() {
        let sdk = Arc::new(SimulatedSdk::new());
        let prefs = MemoryPreferences::default();
        let app = WalletApp::start(&AppConfig::default(), sdk.clone(), prefs.clone())
            .await
            .unwrap();
        let mut events = app.subscribe_events();

        let topic = sdk.approve_session(Session {
            topic: "t1".to_string(),
            redirect: Some("wallet://wc".to_string()),
            accounts: vec![],
        });
        app.request_sign_in().await.unwrap();
        {
            let state = app.ui_state().borrow().clone();
            assert!(state.is_loading);
            assert_eq!(state.pending_deep_link.unwrap().as_str(), "wallet://wc");
        }
        assert_eq!(sdk.requests().len(), 1);

        sdk.respond(&topic, JsonRpcResult::Result("0xsig".to_string()));
        assert_eq!(app.selected_topic().await.unwrap().as_deref(), Some("t1"));
        assert_eq!(prefs.get(ETH_SIGNED).as_deref(), Some("t1"));
        assert!(!app.ui_state().borrow().is_loading);

        sdk.delete_session(&topic);
        assert_eq!(app.selected_topic().await.unwrap(), None);
        assert_eq!(prefs.get(ETH_SIGNED), None);

        assert_eq!(
            drain(&mut events),
            vec![
                AppEvent::SessionApproved,
                AppEvent::RequestSuccess {
                    result: "0xsig".to_string()
                },
                AppEvent::Disconnect,
            ]
        );
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn peer_error_disconnects() {
        let sdk = Arc::new(SimulatedSdk::new());
        let prefs = MemoryPreferences::default();
        let app = WalletApp::start(&AppConfig::default(), sdk.clone(), prefs.clone())
            .await
            .unwrap();

        let topic = sdk.approve_session(Session::new("t1"));
        sdk.respond(
            &topic,
            JsonRpcResult::Error {
                code: 5000,
                message: "denied".to_string(),
            },
        );

        assert_eq!(app.selected_topic().await.unwrap(), None);
        assert_eq!(sdk.disconnected(), vec!["t1".to_string()]);
        assert!(sdk.active_sessions().await.is_empty());
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn connection_state_reaches_late_subscribers() {
        let sdk = Arc::new(SimulatedSdk::new());
        let app = WalletApp::start(&AppConfig::default(), sdk.clone(), MemoryPreferences::default())
            .await
            .unwrap();
        let mut events = app.subscribe_events();

        sdk.set_connection_available(true);
        assert_eq!(app.connection_state(), Some(true));

        let mut lifecycle = app.subscribe_lifecycle();
        assert_eq!(
            lifecycle.recv().await,
            Some(LifecycleEvent::ConnectionStateChanged { available: true })
        );

        app.selected_topic().await.unwrap();
        assert_eq!(
            drain(&mut events),
            vec![AppEvent::ConnectionEvent { is_available: true }]
        );
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn sdk_errors_become_ui_events() {
        let sdk = Arc::new(SimulatedSdk::new());
        let app = WalletApp::start(&AppConfig::default(), sdk.clone(), MemoryPreferences::default())
            .await
            .unwrap();
        let mut events = app.subscribe_events();

        app.awaiting_proposal_response(true).await.unwrap();
        assert!(app.ui_state().borrow().is_loading);
        sdk.reject_session("user rejected");
        sdk.expire_proposal();
        sdk.raise_error("socket closed");
        app.selected_topic().await.unwrap();

        assert!(!app.ui_state().borrow().is_loading);
        assert_eq!(
            drain(&mut events),
            vec![
                AppEvent::SessionRejected,
                AppEvent::ProposalExpired,
                AppEvent::RequestError {
                    message: "socket closed".to_string()
                },
            ]
        );
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn expired_sign_request_stops_loading() {
        let sdk = Arc::new(SimulatedSdk::new());
        let prefs = MemoryPreferences::default();
        let app = WalletApp::start(&AppConfig::default(), sdk.clone(), prefs.clone())
            .await
            .unwrap();
        let mut events = app.subscribe_events();

        sdk.approve_session(Session::new("t1"));
        app.request_sign_in().await.unwrap();
        assert!(app.ui_state().borrow().is_loading);

        sdk.expire_request();
        assert_eq!(app.selected_topic().await.unwrap().as_deref(), Some("t1"));
        assert!(!app.ui_state().borrow().is_loading);
        assert_eq!(prefs.get(ETH_SIGNED), None);
        assert_eq!(
            drain(&mut events),
            vec![
                AppEvent::SessionApproved,
                AppEvent::RequestError {
                    message: "Request expired".to_string()
                },
            ]
        );
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn signed_session_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let sdk = Arc::new(SimulatedSdk::new());

        let app = WalletApp::start(&AppConfig::default(), sdk.clone(), FilePreferences::new(dir.path()))
            .await
            .unwrap();
        let topic = sdk.approve_session(Session::new(""));
        sdk.respond(&topic, JsonRpcResult::Result("0xsig".to_string()));
        assert_eq!(app.selected_topic().await.unwrap(), Some(topic.clone()));
        app.shutdown().await.unwrap();

        // same wallet-side sessions, fresh process
        let restarted = Arc::new(SimulatedSdk::new());
        restarted.add_active_session(Session::new(topic.clone()));
        let app = WalletApp::start(&AppConfig::default(), restarted, FilePreferences::new(dir.path()))
            .await
            .unwrap();
        assert_eq!(app.selected_topic().await.unwrap(), Some(topic));
        app.shutdown().await.unwrap();

        // session revoked while the app was down
        let revoked = Arc::new(SimulatedSdk::new());
        let app = WalletApp::start(&AppConfig::default(), revoked, FilePreferences::new(dir.path()))
            .await
            .unwrap();
        assert_eq!(app.selected_topic().await.unwrap(), None);
        app.shutdown().await.unwrap();

        let prefs = FilePreferences::new(dir.path());
        assert_eq!(prefs.signed_eth().await.unwrap(), None);
    }
}
