// Notification dispatcher - turns transitions into user-facing alerts
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use tornbar_api::snapshot::{BarKind, CooldownKind};

use crate::diff::{Reading, Resource, TransitionEvent, TransitionKind};
use crate::rules::{NotificationRule, NotificationSound};
use crate::settings::Settings;

/// Where a notification leads when acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationCategory {
    DrugReady,
    MedicalReady,
    BoosterReady,
    Landed,
    ChainExpiring,
    Released,
    Energy,
    Nerve,
    Happy,
    Life,
}

impl NotificationCategory {
    pub fn url(&self) -> &'static str {
        match self {
            NotificationCategory::DrugReady
            | NotificationCategory::MedicalReady
            | NotificationCategory::BoosterReady => "https://www.torn.com/item.php",
            NotificationCategory::Landed => "https://www.torn.com/page.php?sid=ItemMarket",
            NotificationCategory::ChainExpiring => "https://www.torn.com/factions.php?step=your#/tab=wars",
            NotificationCategory::Released => "https://www.torn.com/",
            NotificationCategory::Energy | NotificationCategory::Happy => "https://www.torn.com/gym.php",
            NotificationCategory::Nerve => "https://www.torn.com/crimes.php",
            NotificationCategory::Life => "https://www.torn.com/hospitalview.php",
        }
    }

    fn for_resource(resource: &Resource) -> Self {
        match resource {
            Resource::Bar { bar, .. } => match bar {
                BarKind::Energy => NotificationCategory::Energy,
                BarKind::Nerve => NotificationCategory::Nerve,
                BarKind::Happy => NotificationCategory::Happy,
                BarKind::Life => NotificationCategory::Life,
            },
            Resource::Cooldown(kind) => match kind {
                CooldownKind::Drug => NotificationCategory::DrugReady,
                CooldownKind::Medical => NotificationCategory::MedicalReady,
                CooldownKind::Booster => NotificationCategory::BoosterReady,
            },
            Resource::Travel => NotificationCategory::Landed,
            Resource::Chain => NotificationCategory::ChainExpiring,
            Resource::Status => NotificationCategory::Released,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
    pub sound: NotificationSound,
}

/// Shows notifications to the user
///
/// Fire-and-forget: delivery failures are the presenter's problem and never
/// reach the poll loop.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationPresenter: Send + Sync {
    fn present(&self, notification: &Notification);
}

pub struct Dispatcher {
    presenter: Arc<dyn NotificationPresenter>,
}

impl Dispatcher {
    pub fn new(presenter: Arc<dyn NotificationPresenter>) -> Self {
        Self { presenter }
    }

    /// Present one notification per distinct transition
    ///
    /// Bar crossings look up their rule again here, so a rule disabled or
    /// deleted since the diff ran suppresses the alert. Duplicates collapse
    /// within this call only.
    pub fn dispatch(
        &self,
        events: &[TransitionEvent],
        rules: &[NotificationRule],
        settings: &Settings,
    ) -> Vec<Notification> {
        let mut seen = HashSet::new();
        let mut sent = Vec::new();

        for event in events {
            if !seen.insert(event.key()) {
                continue;
            }

            let sound = match event.resource {
                Resource::Bar { bar, threshold } => {
                    match rules
                        .iter()
                        .find(|r| r.enabled && r.bar == bar && r.threshold == threshold)
                    {
                        Some(rule) => rule.sound,
                        None => {
                            debug!("No enabled rule for {} at {}%, dropping alert", bar, threshold);
                            continue;
                        }
                    }
                }
                _ => {
                    if !settings.alerts.allows(event.kind) {
                        debug!("{} alerts are off", event.kind);
                        continue;
                    }
                    settings.alerts.sound
                }
            };

            let notification = compose(event, sound);
            info!("Notify: {} - {}", notification.title, notification.body);
            self.presenter.present(&notification);
            sent.push(notification);
        }

        sent
    }
}

fn compose(event: &TransitionEvent, sound: NotificationSound) -> Notification {
    let (title, body) = match event.kind {
        TransitionKind::ThresholdCrossed => bar_text(&event.resource, &event.current),
        TransitionKind::CooldownReady => match &event.resource {
            Resource::Cooldown(kind) => (
                format!("{} Ready!", kind),
                format!("{} cooldown has ended", kind),
            ),
            _ => ("Cooldown Ready!".to_string(), "A cooldown has ended".to_string()),
        },
        TransitionKind::Landed => {
            let body = match &event.current {
                Reading::Travel { destination: Some(destination), .. } => {
                    format!("You have arrived in {}", destination)
                }
                _ => "You have arrived".to_string(),
            };
            ("Landed!".to_string(), body)
        }
        TransitionKind::ChainExpiring => {
            let body = match &event.current {
                Reading::Chain { hits, timeout_remaining } => {
                    format!("Your {} hit chain drops in {}s", hits, timeout_remaining)
                }
                _ => "Your chain is about to drop".to_string(),
            };
            ("Chain Expiring!".to_string(), body)
        }
        TransitionKind::Released => {
            let body = match &event.previous {
                Reading::Status { state: Some(state), .. } => {
                    format!("You are out of {}", state.to_lowercase())
                }
                _ => "You are free to act again".to_string(),
            };
            ("Released!".to_string(), body)
        }
    };

    Notification {
        title,
        body,
        category: NotificationCategory::for_resource(&event.resource),
        sound,
    }
}

fn bar_text(resource: &Resource, current: &Reading) -> (String, String) {
    let (bar, threshold) = match resource {
        Resource::Bar { bar, threshold } => (*bar, *threshold),
        _ => return ("Bar Alert".to_string(), "A bar reached its threshold".to_string()),
    };
    let name = bar.to_string().to_lowercase();
    let title = if threshold >= 100 {
        format!("{} Full!", bar)
    } else {
        format!("{} at {}%", bar, threshold)
    };

    let body = match current {
        Reading::Bar { current, maximum } if threshold >= 100 => {
            format!("Your {} bar is now full ({}/{})", name, current, maximum)
        }
        Reading::Bar { current, maximum } => format!("Your {} bar is at {}/{}", name, current, maximum),
        _ if threshold >= 100 => format!("Your {} bar is now full", name),
        _ => format!("Your {} bar reached {}%", name, threshold),
    };

    (title, body)
}
