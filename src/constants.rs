// Static metadata of the demo dApp
pub const DEFAULT_PROJECT_ID: &str = "fd2458a46d601ccf26ff85ba70eebd40";
pub const DEFAULT_RELAY_HOST: &str = "relay.walletconnect.com";

pub const APP_NAME: &str = "Wallet Connect";
pub const APP_DESCRIPTION: &str = "Connect Ethreum wallet";
pub const APP_URL: &str = "kotlin.app.walletconnect.com";
pub const APP_ICON: &str = "https://gblobscdn.gitbook.com/spaces%2F-LJJeCjcLrr53DcT1Ml7%2Favatar.png?alt=media";
pub const APP_REDIRECT: &str = "kotlin-dapp-wc://request";

pub const PREFERENCES_NAME: &str = "walletconnect";
pub const ETH_SIGNED: &str = "ETH_SIGNED";

pub const PERSONAL_SIGN_METHOD: &str = "personal_sign";
pub const ETH_CHAIN_NAMESPACE: &str = "eip155";
pub const ETH_CHAIN_REFERENCE: &str = "1";
pub const ETH_EVENTS: [&str; 2] = ["chainChanged", "accountsChanged"];

pub const DAYS: u64 = 86400;
pub const SESSION_EXPIRY_PROPERTY: &str = "sessionExpiry";

pub const EVENT_BUS_CAPACITY: usize = 256;
pub const APP_EVENT_CAPACITY: usize = 64;
pub const COMMAND_CAPACITY: usize = 32;

pub const UNKNOWN_DISCONNECT_ERROR: &str =
    "Unknown error, please try again or contact support";
pub const REQUEST_SEND_ERROR: &str = "Error trying to send request";
pub const SIGNING_ERROR: &str = "Error in signing";
pub const REQUEST_EXPIRED_ERROR: &str = "Request expired";
pub const AUTHENTICATED_MESSAGE: &str = "Authenticated successfully!";
