use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use tornbar_store::KeyValueStore;

use crate::diff::TransitionKind;
use crate::rules::{NotificationRule, NotificationSound};
use crate::watchlist::WatchlistItem;
use crate::Result;

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

const API_KEY: &str = "apiKey";
const REFRESH_INTERVAL: &str = "refreshInterval";
const NOTIFICATION_RULES: &str = "notificationRules";
const ALERTS: &str = "alerts";
const WATCHLIST: &str = "watchlist";

/// User-editable settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub api_key: String,
    /// Poll interval in seconds
    pub refresh_interval: u64,
    pub rules: Vec<NotificationRule>,
    pub alerts: AlertSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL_SECS,
            rules: NotificationRule::defaults(),
            alerts: AlertSettings::default(),
        }
    }
}

impl Settings {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval.max(1))
    }
}

/// On/off switches for the alerts that are not bar rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSettings {
    #[serde(default = "enabled")]
    pub cooldown_ready: bool,
    #[serde(default = "enabled")]
    pub landed: bool,
    #[serde(default = "enabled")]
    pub chain_expiring: bool,
    #[serde(default = "enabled")]
    pub released: bool,
    #[serde(default)]
    pub sound: NotificationSound,
}

fn enabled() -> bool {
    true
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            cooldown_ready: true,
            landed: true,
            chain_expiring: true,
            released: true,
            sound: NotificationSound::Default,
        }
    }
}

impl AlertSettings {
    /// Whether a non-bar transition should be shown. Bar crossings are
    /// governed by their rules instead.
    pub fn allows(&self, kind: TransitionKind) -> bool {
        match kind {
            TransitionKind::ThresholdCrossed => true,
            TransitionKind::CooldownReady => self.cooldown_ready,
            TransitionKind::Landed => self.landed,
            TransitionKind::ChainExpiring => self.chain_expiring,
            TransitionKind::Released => self.released,
        }
    }
}

/// Settings and watchlist persistence over a key-value store
///
/// Each setting lives under its own key as JSON. A missing key reads as the
/// default; so does a value that no longer parses, with a warning.
pub struct SettingsStore {
    store: Box<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Result<Settings> {
        let defaults = Settings::default();

        Ok(Settings {
            api_key: self.read(API_KEY)?.unwrap_or(defaults.api_key),
            refresh_interval: self.read(REFRESH_INTERVAL)?.unwrap_or(defaults.refresh_interval),
            rules: self.read(NOTIFICATION_RULES)?.unwrap_or(defaults.rules),
            alerts: self.read(ALERTS)?.unwrap_or(defaults.alerts),
        })
    }

    /// Write every setting in one batch, so a failure leaves the stored
    /// settings as they were
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let entries = [
            (API_KEY, serde_json::to_vec(&settings.api_key)?),
            (REFRESH_INTERVAL, serde_json::to_vec(&settings.refresh_interval)?),
            (NOTIFICATION_RULES, serde_json::to_vec(&settings.rules)?),
            (ALERTS, serde_json::to_vec(&settings.alerts)?),
        ];
        self.store.set_many(&entries)?;
        debug!("Saved settings");
        Ok(())
    }

    /// Replace the stored rule with the same id
    ///
    /// Returns the updated rule set, or `None` if no rule has that id.
    pub fn update_rule(&self, rule: &NotificationRule) -> Result<Option<Vec<NotificationRule>>> {
        let mut rules: Vec<NotificationRule> = self
            .read(NOTIFICATION_RULES)?
            .unwrap_or_else(NotificationRule::defaults);

        match rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule.clone(),
            None => return Ok(None),
        }

        self.write(NOTIFICATION_RULES, &rules)?;
        Ok(Some(rules))
    }

    pub fn load_watchlist(&self) -> Result<Vec<WatchlistItem>> {
        Ok(self.read(WATCHLIST)?.unwrap_or_default())
    }

    pub fn save_watchlist(&self, items: &[WatchlistItem]) -> Result<()> {
        self.write(WATCHLIST, &items)
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let bytes = match self.store.get(key)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Ignoring unreadable setting '{}': {}", key, e);
                Ok(None)
            }
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.set(key, &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tornbar_api::snapshot::BarKind;
    use tornbar_store::{MemoryStore, SqliteStore, StoreError};

    fn memory() -> (SettingsStore, MemoryStore) {
        let backing = MemoryStore::new();
        (SettingsStore::new(Box::new(backing.clone())), backing)
    }

    #[test]
    fn test_empty_store_gives_defaults() {
        let (store, _) = memory();
        let settings = store.load().unwrap();

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.api_key, "");
        assert_eq!(settings.refresh_interval, 30);
        assert_eq!(settings.rules.len(), 4);
        assert!(!settings.has_api_key());
        assert!(store.load_watchlist().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let (store, backing) = memory();

        let mut settings = Settings::default();
        settings.api_key = "abcd1234".into();
        settings.refresh_interval = 60;
        settings.alerts.chain_expiring = false;
        settings.rules.push(NotificationRule::new(BarKind::Energy, 50));
        store.save(&settings).unwrap();

        assert_eq!(store.load().unwrap(), settings);
        assert_eq!(backing.get("apiKey").unwrap(), Some(b"\"abcd1234\"".to_vec()));
        assert_eq!(backing.get("refreshInterval").unwrap(), Some(b"60".to_vec()));
    }

    /// Reads pass through; batched writes always fail
    struct ReadOnly(MemoryStore);

    impl KeyValueStore for ReadOnly {
        fn get(&self, key: &str) -> tornbar_store::Result<Option<Vec<u8>>> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &[u8]) -> tornbar_store::Result<()> {
            self.0.set(key, value)
        }

        fn set_many(&self, _entries: &[(&str, Vec<u8>)]) -> tornbar_store::Result<()> {
            Err(StoreError::Poisoned)
        }

        fn remove(&self, key: &str) -> tornbar_store::Result<()> {
            self.0.remove(key)
        }
    }

    #[test]
    fn test_failed_save_leaves_settings_untouched() {
        let (store, backing) = memory();
        let mut original = Settings::default();
        original.api_key = "old".into();
        store.save(&original).unwrap();

        let failing = SettingsStore::new(Box::new(ReadOnly(backing)));
        let mut changed = original.clone();
        changed.api_key = "new".into();
        changed.refresh_interval = 90;

        assert!(failing.save(&changed).is_err());
        assert_eq!(failing.load().unwrap(), original);
    }

    #[test]
    fn test_corrupt_value_falls_back_to_default() {
        let (store, backing) = memory();
        backing.set("notificationRules", b"{not json").unwrap();
        backing.set("refreshInterval", b"120").unwrap();

        let settings = store.load().unwrap();
        assert_eq!(settings.rules, NotificationRule::defaults());
        assert_eq!(settings.refresh_interval, 120);
    }

    #[test]
    fn test_update_rule() {
        let (store, _) = memory();
        store.save(&Settings::default()).unwrap();

        let mut rule = NotificationRule::defaults().remove(2);
        assert_eq!(rule.id, "happy_full");
        rule.enabled = true;
        rule.sound = NotificationSound::Hero;

        let rules = store.update_rule(&rule).unwrap().unwrap();
        assert_eq!(rules[2], rule);
        assert_eq!(store.load().unwrap().rules[2], rule);

        let unknown = NotificationRule::new(BarKind::Life, 10);
        assert!(store.update_rule(&unknown).unwrap().is_none());
    }

    #[test]
    fn test_watchlist_persists() {
        let (store, _) = memory();

        let items = vec![WatchlistItem::new(206, "Xanax"), WatchlistItem::new(180, "Bottle of Beer")];
        store.save_watchlist(&items).unwrap();

        assert_eq!(store.load_watchlist().unwrap(), items);
    }

    #[test]
    fn test_sqlite_backed() {
        let store = SettingsStore::new(Box::new(SqliteStore::in_memory().unwrap()));

        let mut settings = store.load().unwrap();
        settings.api_key = "key".into();
        store.save(&settings).unwrap();

        assert_eq!(store.load().unwrap().api_key, "key");
    }

    #[test]
    fn test_alert_toggles() {
        let mut alerts = AlertSettings::default();
        assert!(alerts.allows(TransitionKind::Landed));

        alerts.landed = false;
        assert!(!alerts.allows(TransitionKind::Landed));
        assert!(alerts.allows(TransitionKind::Released));
    }

    #[test]
    fn test_interval_never_zero() {
        let settings = Settings {
            refresh_interval: 0,
            ..Default::default()
        };
        assert_eq!(settings.refresh_interval(), Duration::from_secs(1));
    }
}
