use std::fmt::{self, Display};

use serde_json::Value;

/// Lifecycle callbacks of the connectivity SDK, as published on the
/// [`EventBus`](crate::bus::EventBus).
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleEvent {
    ConnectionStateChanged {
        available: bool,
    },
    SessionApproved {
        topic: String,
    },
    SessionRejected {
        reason: String,
    },
    SessionUpdated {
        topic: String,
    },
    SessionExtended {
        topic: String,
    },
    SessionDeleted {
        topic: String,
    },
    SessionEvent {
        topic: String,
        name: String,
        data: Value,
        chain_id: Option<String>,
    },
    RequestResponse {
        topic: String,
        result: Result<String, String>,
    },
    /// `Ok(None)` is an authentication that did not open a session.
    SessionAuthenticateResponse {
        result: Result<Option<String>, String>,
    },
    ProposalExpired,
    RequestExpired,
    GenericError {
        message: String,
    },
    PairingDeleted {
        topic: String,
    },
    PairingExpired {
        topic: String,
    },
    PairingState {
        pairing_in_progress: bool,
    },
}

impl LifecycleEvent {
    pub fn is_connection_state(&self) -> bool {
        matches!(self, LifecycleEvent::ConnectionStateChanged { .. })
    }

    pub fn topic(&self) -> Option<&str> {
        match self {
            LifecycleEvent::SessionApproved { topic }
            | LifecycleEvent::SessionUpdated { topic }
            | LifecycleEvent::SessionExtended { topic }
            | LifecycleEvent::SessionDeleted { topic }
            | LifecycleEvent::SessionEvent { topic, .. }
            | LifecycleEvent::RequestResponse { topic, .. }
            | LifecycleEvent::PairingDeleted { topic }
            | LifecycleEvent::PairingExpired { topic } => Some(topic),
            LifecycleEvent::SessionAuthenticateResponse {
                result: Ok(Some(topic)),
            } => Some(topic),
            _ => None,
        }
    }
}

impl Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::ConnectionStateChanged { available } => {
                write!(f, "ConnectionStateChanged(available={available})")
            }
            LifecycleEvent::RequestResponse { topic, result } => {
                let outcome = if result.is_ok() { "ok" } else { "err" };
                write!(f, "RequestResponse({topic}, {outcome})")
            }
            other => match other.topic() {
                Some(topic) => write!(f, "{}({topic})", other.name()),
                None => write!(f, "{}", other.name()),
            },
        }
    }
}

impl LifecycleEvent {
    fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::ConnectionStateChanged { .. } => "ConnectionStateChanged",
            LifecycleEvent::SessionApproved { .. } => "SessionApproved",
            LifecycleEvent::SessionRejected { .. } => "SessionRejected",
            LifecycleEvent::SessionUpdated { .. } => "SessionUpdated",
            LifecycleEvent::SessionExtended { .. } => "SessionExtended",
            LifecycleEvent::SessionDeleted { .. } => "SessionDeleted",
            LifecycleEvent::SessionEvent { .. } => "SessionEvent",
            LifecycleEvent::RequestResponse { .. } => "RequestResponse",
            LifecycleEvent::SessionAuthenticateResponse { .. } => {
                "SessionAuthenticateResponse"
            }
            LifecycleEvent::ProposalExpired => "ProposalExpired",
            LifecycleEvent::RequestExpired => "RequestExpired",
            LifecycleEvent::GenericError { .. } => "GenericError",
            LifecycleEvent::PairingDeleted { .. } => "PairingDeleted",
            LifecycleEvent::PairingExpired { .. } => "PairingExpired",
            LifecycleEvent::PairingState { .. } => "PairingState",
        }
    }
}
