// Snapshot differ - turns two reads of player state into alert-worthy transitions
use chrono::{DateTime, Utc};
use std::fmt;

use tornbar_api::snapshot::{Bar, BarKind, Chain, CooldownKind, Status, Travel};
use tornbar_api::Snapshot;

use crate::rules::NotificationRule;

/// Chain warnings fire when fewer than this many seconds are left
pub const CHAIN_WARNING_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    ThresholdCrossed,
    CooldownReady,
    Landed,
    ChainExpiring,
    Released,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionKind::ThresholdCrossed => "threshold crossed",
            TransitionKind::CooldownReady => "cooldown ready",
            TransitionKind::Landed => "landed",
            TransitionKind::ChainExpiring => "chain expiring",
            TransitionKind::Released => "released",
        };
        f.write_str(name)
    }
}

/// What a transition is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Bar { bar: BarKind, threshold: u8 },
    Cooldown(CooldownKind),
    Travel,
    Chain,
    Status,
}

/// The value of a resource on one side of a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Bar { current: u64, maximum: u64 },
    Seconds(u64),
    Travel { destination: Option<String>, time_left: u64 },
    Chain { hits: u64, timeout_remaining: u64 },
    Status { state: Option<String>, description: Option<String> },
    /// Not present in that snapshot
    Missing,
}

impl Reading {
    fn bar(bar: &Bar) -> Self {
        Reading::Bar {
            current: bar.current,
            maximum: bar.maximum,
        }
    }

    fn travel(travel: &Travel) -> Self {
        Reading::Travel {
            destination: travel.destination.clone(),
            time_left: travel.time_left.unwrap_or(0),
        }
    }

    fn chain(chain: &Chain, now: DateTime<Utc>) -> Self {
        Reading::Chain {
            hits: chain.current.unwrap_or(0),
            timeout_remaining: chain.timeout_remaining(now),
        }
    }

    fn status(status: &Status) -> Self {
        Reading::Status {
            state: status.state.clone(),
            description: status.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionEvent {
    pub kind: TransitionKind,
    pub resource: Resource,
    pub previous: Reading,
    pub current: Reading,
}

impl TransitionEvent {
    /// Key used to collapse duplicates within one dispatch
    pub fn key(&self) -> (TransitionKind, Resource) {
        (self.kind, self.resource)
    }
}

/// Compare two snapshots and list the transitions worth an alert
///
/// Pure: no I/O, no clock reads beyond `now`. Nothing is reported on the
/// first snapshot or when either side is an API error, and a resource is
/// only compared when both snapshots carry it. The chain check looks at
/// `current` alone.
///
/// Order is fixed: bars (energy, nerve, life, happy, rules in their given
/// order), cooldowns (drug, medical, booster), travel, chain, status.
pub fn diff(
    previous: Option<&Snapshot>,
    current: &Snapshot,
    rules: &[NotificationRule],
    now: DateTime<Utc>,
) -> Vec<TransitionEvent> {
    let previous = match previous {
        Some(previous) => previous,
        None => return Vec::new(),
    };

    if previous.is_error() || current.is_error() {
        return Vec::new();
    }

    let mut events = Vec::new();

    for kind in BarKind::ALL {
        if let (Some(prev), Some(cur)) = (previous.bar(kind), current.bar(kind)) {
            let (prev_pct, cur_pct) = (prev.percentage(), cur.percentage());

            for rule in rules.iter().filter(|r| r.bar == kind) {
                if rule.crossed(prev_pct, cur_pct) {
                    events.push(TransitionEvent {
                        kind: TransitionKind::ThresholdCrossed,
                        resource: Resource::Bar {
                            bar: kind,
                            threshold: rule.threshold,
                        },
                        previous: Reading::bar(prev),
                        current: Reading::bar(cur),
                    });
                }
            }
        }
    }

    if let (Some(prev), Some(cur)) = (&previous.cooldowns, &current.cooldowns) {
        for kind in CooldownKind::ALL {
            let (before, after) = (prev.get(kind), cur.get(kind));
            if before > 0 && after == 0 {
                events.push(TransitionEvent {
                    kind: TransitionKind::CooldownReady,
                    resource: Resource::Cooldown(kind),
                    previous: Reading::Seconds(before),
                    current: Reading::Seconds(after),
                });
            }
        }
    }

    if let (Some(prev), Some(cur)) = (&previous.travel, &current.travel) {
        if prev.is_traveling() && !cur.is_traveling() {
            events.push(TransitionEvent {
                kind: TransitionKind::Landed,
                resource: Resource::Travel,
                previous: Reading::travel(prev),
                current: Reading::travel(cur),
            });
        }
    }

    if let Some(chain) = &current.chain {
        let remaining = chain.timeout_remaining(now);
        if chain.is_active() && remaining > 0 && remaining < CHAIN_WARNING_SECS {
            events.push(TransitionEvent {
                kind: TransitionKind::ChainExpiring,
                resource: Resource::Chain,
                previous: previous
                    .chain
                    .as_ref()
                    .map(|c| Reading::chain(c, now))
                    .unwrap_or(Reading::Missing),
                current: Reading::chain(chain, now),
            });
        }
    }

    if let (Some(prev), Some(cur)) = (&previous.status, &current.status) {
        if !prev.is_okay() && cur.is_okay() {
            events.push(TransitionEvent {
                kind: TransitionKind::Released,
                resource: Resource::Status,
                previous: Reading::status(prev),
                current: Reading::status(cur),
            });
        }
    }

    events
}
