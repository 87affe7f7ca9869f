/// Types
///
/// Values exchanged with the connectivity SDK: init configuration, session
/// records, proposal namespaces and outbound sign requests.
///
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use alloy::hex;
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use url::Url;

use crate::constants::{
    DAYS, ETH_CHAIN_NAMESPACE, ETH_CHAIN_REFERENCE, ETH_EVENTS,
    PERSONAL_SIGN_METHOD, SESSION_EXPIRY_PROPERTY,
};
use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub description: String,
    pub url: String,
    pub icons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// The SDK reopens the relay socket on its own.
    #[default]
    Automatic,
    /// The host app decides when to connect and disconnect.
    Manual,
}

impl Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = serde_plain::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{name}")
    }
}

impl FromStr for ConnectionType {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_plain::from_str(s)
            .map_err(|_| format!("unknown connection type: {s}").into())
    }
}

/// Everything the SDK needs for its one-time initialisation.
#[derive(Clone, Debug, PartialEq)]
pub struct SdkConfig {
    pub relay_server_url: Url,
    pub connection_type: ConnectionType,
    pub metadata: Metadata,
}

/// A session the SDK reports as active.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub topic: String,
    /// Wallet deep link to bring the wallet forward after a request.
    pub redirect: Option<String>,
    /// CAIP-10 accounts, e.g. `eip155:1:0xabc...`
    pub accounts: Vec<String>,
}

impl Session {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            redirect: None,
            accounts: vec![],
        }
    }

    /// First account of the session on `chain`, if it parses as an address.
    pub fn address_on(&self, chain: &Chain) -> Option<Address> {
        let prefix = format!("{chain}:");
        self.accounts
            .iter()
            .filter_map(|a| a.strip_prefix(&prefix))
            .find_map(|a| a.parse().ok())
    }

    pub fn redirect_uri(&self) -> Option<Url> {
        self.redirect.as_deref().and_then(|r| Url::parse(r).ok())
    }
}

/// CAIP-2 chain id, `namespace:reference`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Chain {
    pub namespace: String,
    pub reference: String,
}

impl Chain {
    pub fn eth_mainnet() -> Self {
        Self {
            namespace: ETH_CHAIN_NAMESPACE.to_string(),
            reference: ETH_CHAIN_REFERENCE.to_string(),
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::eth_mainnet()
    }
}

impl Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl FromStr for Chain {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((namespace, reference))
                if !namespace.is_empty()
                    && !reference.is_empty()
                    && !reference.contains(':') =>
            {
                Ok(Self {
                    namespace: namespace.to_string(),
                    reference: reference.to_string(),
                })
            }
            _ => Err(format!("invalid chain id: {s}").into()),
        }
    }
}

impl TryFrom<String> for Chain {
    type Error = crate::Error;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Chain> for String {
    fn from(value: Chain) -> Self {
        value.to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposalNamespace {
    pub chains: Vec<String>,
    pub methods: Vec<String>,
    pub events: Vec<String>,
}

/// Namespaces and properties the connect modal proposes to the wallet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    #[serde(rename = "requiredNamespaces")]
    pub required_namespaces: HashMap<String, ProposalNamespace>,
    pub properties: HashMap<String, String>,
}

impl SessionParams {
    /// `personal_sign` on `chain`, with a session expiry property one week
    /// after `now`. The SDK ignores the property, wallets may show it.
    pub fn personal_sign(chain: &Chain, now: OffsetDateTime) -> Self {
        let expiry = now.unix_timestamp() as u64 + 7 * DAYS;
        Self {
            required_namespaces: HashMap::from([(
                chain.namespace.clone(),
                ProposalNamespace {
                    chains: vec![chain.to_string()],
                    methods: vec![PERSONAL_SIGN_METHOD.to_string()],
                    events: ETH_EVENTS.iter().map(|e| e.to_string()).collect(),
                },
            )]),
            properties: HashMap::from([(
                SESSION_EXPIRY_PROPERTY.to_string(),
                expiry.to_string(),
            )]),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParams {
    #[serde(rename = "sessionTopic")]
    pub session_topic: String,
    pub method: String,
    /// JSON-encoded parameter array
    pub params: String,
    #[serde(rename = "chainId")]
    pub chain_id: String,
}

impl RequestParams {
    /// Sign-in request for `session`. The signing account is the session's
    /// account on `chain`; sessions without one fall back to the topic.
    pub fn personal_sign(
        session: &Session,
        chain: &Chain,
        now: OffsetDateTime,
    ) -> Result<Self> {
        let account = session
            .address_on(chain)
            .map(|a| a.to_string())
            .unwrap_or_else(|| session.topic.clone());
        Ok(Self {
            session_topic: session.topic.clone(),
            method: PERSONAL_SIGN_METHOD.to_string(),
            params: personal_sign_body(&account, now)?,
            chain_id: chain.to_string(),
        })
    }
}

pub fn sign_in_message(account: &str, now: OffsetDateTime) -> Result<String> {
    Ok(format!(
        "Sign in with your Ethereum account:\n{account}\n\nIssued At: {}",
        now.format(&Rfc3339)?
    ))
}

/// `["0x<hex message>", "<account>"]`
pub fn personal_sign_body(account: &str, now: OffsetDateTime) -> Result<String> {
    let message = sign_in_message(account, now)?;
    Ok(serde_json::to_string(&[
        hex::encode_prefixed(message.as_bytes()),
        account.to_string(),
    ])?)
}

/// Result of a JSON-RPC round trip as the SDK reports it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JsonRpcResult {
    Result(String),
    Error { code: i64, message: String },
}
