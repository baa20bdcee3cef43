// The poll / diff / notify engine
pub mod config;
pub mod diff;
pub mod error;
pub mod notify;
pub mod providers;
pub mod rules;
pub mod scheduler;
pub mod settings;
pub mod source;
pub mod state;
pub mod watchlist;

pub use config::Config;
pub use diff::{diff, Reading, Resource, TransitionEvent, TransitionKind, CHAIN_WARNING_SECS};
pub use error::Error;
pub use notify::{Dispatcher, Notification, NotificationCategory, NotificationPresenter};
pub use providers::TornProvider;
pub use rules::{NotificationRule, NotificationSound};
pub use scheduler::{Poller, PollerHandle};
pub use settings::{AlertSettings, Settings, SettingsStore, DEFAULT_REFRESH_INTERVAL_SECS};
pub use source::{MarketSource, PlayerSource, PriceError};
pub use state::AppState;
pub use watchlist::{Watchlist, WatchlistItem};

pub use tornbar_api::snapshot::{BarKind, CooldownKind};
pub use tornbar_api::Snapshot;

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, Error>;
