/// UI state projection
///
/// Turns reconciler [`Transition`]s into the closed set of [`AppEvent`]s the
/// presentation layer reacts to, and folds them into the [`UiState`] value it
/// renders. Both mappings are pure; [`UiProjector`] only publishes their
/// output.
///
use log::debug;
use tokio::sync::{broadcast, watch};
use url::Url;

use crate::constants::{
    APP_EVENT_CAPACITY, AUTHENTICATED_MESSAGE, REQUEST_EXPIRED_ERROR,
    SIGNING_ERROR,
};
use crate::event::LifecycleEvent;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UiState {
    pub is_loading: bool,
    pub pending_deep_link: Option<Url>,
    pub signed_address_label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppEvent {
    ConnectionEvent { is_available: bool },
    SessionApproved,
    SessionRejected,
    SessionAuthenticateApproved { message: Option<String> },
    SessionAuthenticateRejected,
    Disconnect,
    DisconnectError { message: String },
    DisconnectLoading,
    RequestPeerError { message: String },
    RequestError { message: String },
    RequestSuccess { result: String },
    SessionExtend,
    ProposalExpired,
    NoAction,
}

/// What the reconciler did with an input.
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    /// Event that changes no reconciled state.
    Observed(LifecycleEvent),
    /// Startup found the persisted marker among the active sessions.
    Restored { topic: String },
    /// Startup found no active session for the persisted marker.
    MarkerCleared,
    Selected { topic: String },
    Authenticated { topic: Option<String> },
    AuthenticateRejected { message: String },
    /// The selected session went away remotely.
    Deselected { topic: String },
    SignedIn { topic: String, result: String },
    /// Successful response for a session that is no longer selected.
    StaleResponse { topic: String },
    SignRejected { topic: String, message: String },
    SignRequested { topic: String },
    SignDispatched { deep_link: Option<Url> },
    SignDispatchFailed { message: String },
    DisconnectStarted { topic: String },
    Disconnected { topic: String },
    DisconnectFailed { message: String },
    AwaitingProposal(bool),
}

pub fn project(transition: &Transition) -> AppEvent {
    match transition {
        Transition::Observed(event) => project_observed(event),
        Transition::Restored { .. } | Transition::MarkerCleared => AppEvent::NoAction,
        Transition::Selected { .. } => AppEvent::SessionApproved,
        Transition::Authenticated { topic } => AppEvent::SessionAuthenticateApproved {
            message: match topic {
                Some(_) => None,
                None => Some(AUTHENTICATED_MESSAGE.to_string()),
            },
        },
        Transition::AuthenticateRejected { .. } => AppEvent::SessionAuthenticateRejected,
        Transition::Deselected { .. } | Transition::Disconnected { .. } => {
            AppEvent::Disconnect
        }
        Transition::SignedIn { result, .. } => AppEvent::RequestSuccess {
            result: result.clone(),
        },
        Transition::StaleResponse { .. } => AppEvent::NoAction,
        Transition::SignRejected { .. } => AppEvent::RequestPeerError {
            message: SIGNING_ERROR.to_string(),
        },
        Transition::SignRequested { .. } | Transition::SignDispatched { .. } => {
            AppEvent::NoAction
        }
        Transition::SignDispatchFailed { message } => AppEvent::RequestError {
            message: message.clone(),
        },
        Transition::DisconnectStarted { .. } => AppEvent::DisconnectLoading,
        Transition::DisconnectFailed { message } => AppEvent::DisconnectError {
            message: message.clone(),
        },
        Transition::AwaitingProposal(_) => AppEvent::NoAction,
    }
}

fn project_observed(event: &LifecycleEvent) -> AppEvent {
    match event {
        LifecycleEvent::ConnectionStateChanged { available } => AppEvent::ConnectionEvent {
            is_available: *available,
        },
        LifecycleEvent::SessionRejected { .. } => AppEvent::SessionRejected,
        LifecycleEvent::SessionExtended { .. } => AppEvent::SessionExtend,
        LifecycleEvent::ProposalExpired => AppEvent::ProposalExpired,
        LifecycleEvent::RequestExpired => AppEvent::RequestError {
            message: REQUEST_EXPIRED_ERROR.to_string(),
        },
        LifecycleEvent::GenericError { message } => AppEvent::RequestError {
            message: message.clone(),
        },
        _ => AppEvent::NoAction,
    }
}

/// Next UI state after `transition`.
pub fn reduce(state: &UiState, transition: &Transition) -> UiState {
    let mut next = state.clone();
    match transition {
        Transition::Restored { topic } => {
            next.signed_address_label = Some(topic.clone());
        }
        Transition::MarkerCleared => {
            next.signed_address_label = None;
        }
        Transition::SignedIn { topic, .. } => {
            next.is_loading = false;
            next.signed_address_label = Some(topic.clone());
        }
        Transition::SignRejected { .. } | Transition::SignDispatchFailed { .. } => {
            next.is_loading = false;
        }
        Transition::SignRequested { .. } => {
            next.is_loading = true;
            next.pending_deep_link = None;
        }
        Transition::SignDispatched { deep_link } => {
            next.pending_deep_link = deep_link.clone();
        }
        Transition::Deselected { .. } | Transition::Disconnected { .. } => {
            next.is_loading = false;
            next.pending_deep_link = None;
            next.signed_address_label = None;
        }
        Transition::AwaitingProposal(waiting) => {
            next.is_loading = *waiting;
        }
        Transition::Observed(
            LifecycleEvent::ProposalExpired | LifecycleEvent::RequestExpired,
        ) => {
            next.is_loading = false;
        }
        Transition::Observed(_)
        | Transition::StaleResponse { .. }
        | Transition::Selected { .. }
        | Transition::Authenticated { .. }
        | Transition::AuthenticateRejected { .. }
        | Transition::DisconnectStarted { .. }
        | Transition::DisconnectFailed { .. } => {}
    }
    next
}

/// Owner of [`UiState`]; publishes state on a watch channel and events on a
/// broadcast channel.
#[derive(Debug)]
pub struct UiProjector {
    state: watch::Sender<UiState>,
    events: broadcast::Sender<AppEvent>,
}

impl Default for UiProjector {
    fn default() -> Self {
        Self::new(UiState::default())
    }
}

impl UiProjector {
    pub fn new(initial: UiState) -> Self {
        let (state, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(APP_EVENT_CAPACITY);
        Self { state, events }
    }

    pub fn state(&self) -> UiState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<UiState> {
        self.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    /// Applies `transition` and returns the event it projected to.
    pub fn apply(&self, transition: &Transition) -> AppEvent {
        self.state.send_if_modified(|state| {
            let next = reduce(state, transition);
            if next == *state {
                false
            } else {
                *state = next;
                true
            }
        });

        let event = project(transition);
        if event != AppEvent::NoAction {
            debug!("ui event: {event:?}");
            // no subscriber yet is fine, the event is transient
            let _ = self.events.send(event.clone());
        }
        event
    }
}
