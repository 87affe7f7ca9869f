//! # walletconnect-dapp
//!
//! dApp-side session bridge for a [WalletConnect](https://specs.walletconnect.com/2.0/)
//! connectivity SDK.
//!
//! ## Features
//! - Event bus the SDK delegate publishes its callbacks onto
//! - Session reconciliation: one selected session, persisted sign-in marker
//! - UI state projection
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn run() -> walletconnect_dapp::Result<()> {
//! use std::sync::Arc;
//! use walletconnect_dapp::{AppConfig, FilePreferences, SimulatedSdk, WalletApp};
//!
//! let config = AppConfig::load(None)?;
//! let sdk = Arc::new(SimulatedSdk::new());
//! let prefs = FilePreferences::new(&config.preferences_dir);
//!
//! let app = WalletApp::start(&config, sdk, prefs).await?;
//! let mut events = app.subscribe_events();
//!
//! app.request_sign_in().await?;
//! while let Ok(event) = events.recv().await {
//!     println!("event: {event:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//! MIT OR Apache-2.0

pub mod app;
pub mod bus;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod projector;
pub mod reconciler;
pub mod sdk;
pub mod simulated;
pub mod store;
pub mod types;

/// Exposed for easy access
pub use app::{AppHandle, WalletApp};
pub use bus::EventBus;
pub use config::AppConfig;
pub use error::{Error, Result};
pub use event::LifecycleEvent;
pub use projector::{AppEvent, UiState};
pub use sdk::{SdkDelegate, SdkError, WalletConnectSdk};
pub use simulated::SimulatedSdk;
pub use store::{FilePreferences, MemoryPreferences, PreferenceStore};
