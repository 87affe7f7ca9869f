use std::sync::Arc;

use walletconnect_dapp::{
    AppConfig, FilePreferences, SimulatedSdk, WalletApp,
    types::{JsonRpcResult, Session},
};

/// Walks through a full session against the simulated SDK: approve, sign in,
/// restart with the persisted marker, then disconnect.
///
/// Run with `RUST_LOG=debug` to see every delegate callback. Set
/// `WC_PREFERENCES_DIR` to keep the marker somewhere other than a temp dir.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut config = AppConfig::load(None)?;
    let tmp = tempfile::tempdir()?;
    if std::env::var_os("WC_PREFERENCES_DIR").is_none() {
        config.preferences_dir = tmp.path().to_path_buf();
    }

    let sdk = Arc::new(SimulatedSdk::new());
    let app = WalletApp::start(
        &config,
        sdk.clone(),
        FilePreferences::new(&config.preferences_dir),
    )
    .await?;
    let mut events = app.subscribe_events();

    sdk.set_connection_available(true);

    // The wallet approves the proposal shown in the connect modal
    app.awaiting_proposal_response(true).await?;
    let topic = sdk.approve_session(Session {
        topic: String::new(),
        redirect: Some("wallet-demo://wc".to_string()),
        accounts: vec![
            "eip155:1:0x0000000000000000000000000000000000000123".to_string(),
        ],
    });
    app.awaiting_proposal_response(false).await?;

    app.request_sign_in().await?;
    println!("ui state after request: {:?}", *app.ui_state().borrow());

    sdk.respond(&topic, JsonRpcResult::Result("0xsignature".to_string()));
    println!("selected: {:?}", app.selected_topic().await?);

    while let Ok(event) = events.try_recv() {
        println!("event: {event:?}");
    }
    app.shutdown().await?;

    // Fresh process, the wallet still holds the session
    let restarted = Arc::new(SimulatedSdk::new());
    restarted.add_active_session(Session::new(topic.clone()));
    let app = WalletApp::start(
        &config,
        restarted,
        FilePreferences::new(&config.preferences_dir),
    )
    .await?;
    println!("restored: {:?}", app.ui_state().borrow().signed_address_label);

    let mut events = app.subscribe_events();
    app.disconnect().await?;
    while let Ok(event) = events.try_recv() {
        println!("event: {event:?}");
    }
    app.shutdown().await?;

    Ok(())
}
