use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::de::{counter, is_zero, keyed, opt_counter};

/// Where players live when they are not abroad
pub const HOME_CITY: &str = "Torn";

/// One decoded read of the `user` endpoint
///
/// Every field is optional because the API only returns what the requested
/// selections cover, and an error response carries nothing but `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opt_counter", skip_serializing_if = "Option::is_none")]
    pub player_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<Bar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nerve: Option<Bar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub life: Option<Bar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub happy: Option<Bar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldowns: Option<Cooldowns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel: Option<Travel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<Chain>,

    #[serde(default, deserialize_with = "keyed", skip_serializing_if = "Option::is_none")]
    pub events: Option<BTreeMap<String, Event>>,
    #[serde(default, deserialize_with = "keyed", skip_serializing_if = "Option::is_none")]
    pub messages: Option<BTreeMap<String, Message>>,

    #[serde(flatten)]
    pub money: Money,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

/// Decode a `user` response body
///
/// A top-level `error` object wins over everything else in the payload:
/// the returned snapshot carries the error and nothing more.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let error: ApiErrorBody = serde_json::from_value(error.clone())?;
        return Ok(Snapshot {
            error: Some(error),
            ..Default::default()
        });
    }

    serde_json::from_value(value)
}

impl Snapshot {
    /// All four bars, or nothing if any of them is missing
    pub fn bars(&self) -> Option<Bars> {
        Some(Bars {
            energy: self.energy.clone()?,
            nerve: self.nerve.clone()?,
            life: self.life.clone()?,
            happy: self.happy.clone()?,
        })
    }

    pub fn bar(&self, kind: BarKind) -> Option<&Bar> {
        match kind {
            BarKind::Energy => self.energy.as_ref(),
            BarKind::Nerve => self.nerve.as_ref(),
            BarKind::Life => self.life.as_ref(),
            BarKind::Happy => self.happy.as_ref(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn unread_messages(&self) -> usize {
        self.messages
            .as_ref()
            .map(|m| m.values().filter(|msg| msg.read == 0).count())
            .unwrap_or(0)
    }

    /// Events newest first
    pub fn recent_events(&self) -> Vec<&Event> {
        let mut events: Vec<&Event> = self
            .events
            .as_ref()
            .map(|e| e.values().collect())
            .unwrap_or_default();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events
    }
}

/// The upstream error envelope: `{"error": {"code": 2, "error": "Incorrect Key"}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default, rename = "error")]
    pub message: String,
}

/// The four resource bars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarKind {
    Energy,
    Nerve,
    Life,
    Happy,
}

impl BarKind {
    pub const ALL: [BarKind; 4] = [BarKind::Energy, BarKind::Nerve, BarKind::Life, BarKind::Happy];
}

impl std::fmt::Display for BarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BarKind::Energy => write!(f, "Energy"),
            BarKind::Nerve => write!(f, "Nerve"),
            BarKind::Life => write!(f, "Life"),
            BarKind::Happy => write!(f, "Happy"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(default, deserialize_with = "counter")]
    pub current: u64,
    #[serde(default, deserialize_with = "counter")]
    pub maximum: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment: Option<f64>,
    #[serde(default, deserialize_with = "opt_counter", skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(default, deserialize_with = "opt_counter", skip_serializing_if = "Option::is_none")]
    pub ticktime: Option<u64>,
    #[serde(default, deserialize_with = "opt_counter", skip_serializing_if = "Option::is_none")]
    pub fulltime: Option<u64>,
}

impl Bar {
    pub fn new(current: u64, maximum: u64) -> Self {
        Self {
            current,
            maximum,
            ..Default::default()
        }
    }

    /// Fill level in percent. Zero when the maximum is zero, above 100 when overfull.
    pub fn percentage(&self) -> f64 {
        if self.maximum == 0 {
            return 0.0;
        }
        self.current as f64 / self.maximum as f64 * 100.0
    }

    pub fn is_full(&self) -> bool {
        self.maximum > 0 && self.current >= self.maximum
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bars {
    pub energy: Bar,
    pub nerve: Bar,
    pub life: Bar,
    pub happy: Bar,
}

/// Consumable cooldowns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CooldownKind {
    Drug,
    Medical,
    Booster,
}

impl CooldownKind {
    pub const ALL: [CooldownKind; 3] = [CooldownKind::Drug, CooldownKind::Medical, CooldownKind::Booster];
}

impl std::fmt::Display for CooldownKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CooldownKind::Drug => write!(f, "Drug"),
            CooldownKind::Medical => write!(f, "Medical"),
            CooldownKind::Booster => write!(f, "Booster"),
        }
    }
}

/// Seconds remaining on each cooldown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cooldowns {
    #[serde(default, deserialize_with = "counter")]
    pub drug: u64,
    #[serde(default, deserialize_with = "counter")]
    pub medical: u64,
    #[serde(default, deserialize_with = "counter")]
    pub booster: u64,
}

impl Cooldowns {
    pub fn get(&self, kind: CooldownKind) -> u64 {
        match kind {
            CooldownKind::Drug => self.drug,
            CooldownKind::Medical => self.medical,
            CooldownKind::Booster => self.booster,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Travel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Arrival time, epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Departure time, epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departed: Option<i64>,
    #[serde(default, deserialize_with = "opt_counter", skip_serializing_if = "Option::is_none")]
    pub time_left: Option<u64>,
}

impl Travel {
    pub fn is_traveling(&self) -> bool {
        self.time_left.unwrap_or(0) > 0
    }

    /// Landed somewhere other than home
    pub fn is_abroad(&self) -> bool {
        match &self.destination {
            Some(destination) => destination != HOME_CITY && self.time_left.unwrap_or(0) == 0,
            None => false,
        }
    }

    pub fn arrival(&self) -> Option<DateTime<Utc>> {
        if !self.is_traveling() {
            return None;
        }
        DateTime::from_timestamp(self.timestamp?, 0)
    }

    /// Seconds until landing
    ///
    /// Computed from the arrival timestamp so the answer does not drift with
    /// how old the snapshot is; `time_left` is only used when the timestamp
    /// is missing or zero.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        match self.timestamp {
            Some(ts) if ts > 0 => (ts - now.timestamp()).max(0) as u64,
            _ => self.time_left.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// "Okay", "Hospital", "Jail", "Traveling", ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<i64>,
}

impl Status {
    pub fn is_okay(&self) -> bool {
        matches!(self.state.as_deref(), None | Some("Okay"))
    }

    pub fn is_in_hospital(&self) -> bool {
        self.state.as_deref() == Some("Hospital")
    }

    pub fn is_in_jail(&self) -> bool {
        self.state.as_deref() == Some("Jail")
    }

    pub fn time_remaining(&self, now: DateTime<Utc>) -> u64 {
        match self.until {
            Some(until) => (until - now.timestamp()).max(0) as u64,
            None => 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    #[serde(default, deserialize_with = "opt_counter", skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    #[serde(default, deserialize_with = "opt_counter", skip_serializing_if = "Option::is_none")]
    pub maximum: Option<u64>,
    /// When the chain drops, epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
    #[serde(default, deserialize_with = "opt_counter", skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<u64>,
}

impl Chain {
    pub fn is_active(&self) -> bool {
        self.current.unwrap_or(0) > 0 && self.timeout.unwrap_or(0) > 0
    }

    pub fn is_on_cooldown(&self) -> bool {
        self.cooldown.unwrap_or(0) > 0
    }

    pub fn timeout_remaining(&self, now: DateTime<Utc>) -> u64 {
        match self.timeout {
            Some(timeout) if timeout > 0 => (timeout - now.timestamp()).max(0) as u64,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub event: String,
    #[serde(default, deserialize_with = "counter")]
    pub seen: u64,
}

impl Event {
    /// Event text with the embedded profile links stripped
    pub fn clean_text(&self) -> String {
        static TAGS: OnceLock<Regex> = OnceLock::new();
        let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"));
        tags.replace_all(&self.event, "").trim().to_string()
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, deserialize_with = "counter")]
    pub read: u64,
}

/// The `money` selection. Its keys sit at the top level of the response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Money {
    #[serde(rename = "money_onhand", deserialize_with = "counter", skip_serializing_if = "is_zero")]
    pub cash: u64,
    #[serde(rename = "vault_amount", deserialize_with = "counter", skip_serializing_if = "is_zero")]
    pub vault: u64,
    #[serde(deserialize_with = "counter", skip_serializing_if = "is_zero")]
    pub points: u64,
    #[serde(deserialize_with = "counter", skip_serializing_if = "is_zero")]
    pub company_funds: u64,
    #[serde(deserialize_with = "counter", skip_serializing_if = "is_zero")]
    pub cayman_bank: u64,
}
