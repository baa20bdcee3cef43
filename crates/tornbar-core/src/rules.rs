use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

use tornbar_api::snapshot::BarKind;

/// Alert when a bar reaches a percentage of its maximum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRule {
    #[serde(default = "new_rule_id")]
    pub id: String,
    #[serde(rename = "barType", default = "default_bar")]
    pub bar: BarKind,
    /// Percentage, 0-100
    #[serde(default = "default_threshold", deserialize_with = "percent")]
    pub threshold: u8,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(rename = "soundName", default)]
    pub sound: NotificationSound,
}

fn new_rule_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_bar() -> BarKind {
    BarKind::Energy
}

fn default_threshold() -> u8 {
    100
}

/// Stored thresholds outside 0-100 are clamped rather than rejected
fn percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value.clamp(0.0, 100.0) as u8)
}

fn default_enabled() -> bool {
    true
}

impl NotificationRule {
    pub fn new(bar: BarKind, threshold: u8) -> Self {
        Self {
            id: new_rule_id(),
            bar,
            threshold: threshold.min(100),
            enabled: true,
            sound: NotificationSound::Default,
        }
    }

    pub fn with_sound(mut self, sound: NotificationSound) -> Self {
        self.sound = sound;
        self
    }

    /// The rule set a fresh install starts with
    pub fn defaults() -> Vec<NotificationRule> {
        let rule = |id: &str, bar: BarKind, enabled: bool| NotificationRule {
            id: id.to_string(),
            bar,
            threshold: 100,
            enabled,
            sound: NotificationSound::Default,
        };

        vec![
            rule("energy_full", BarKind::Energy, true),
            rule("nerve_full", BarKind::Nerve, true),
            rule("happy_full", BarKind::Happy, false),
            rule("life_full", BarKind::Life, false),
        ]
    }

    /// Whether this rule fires for a bar going from `previous` to `current` percent
    pub fn crossed(&self, previous: f64, current: f64) -> bool {
        let threshold = f64::from(self.threshold);
        self.enabled && previous < threshold && current >= threshold
    }
}

/// Sound attached to an alert; playing it is up to the presenter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NotificationSound {
    #[default]
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "none")]
    None,
    Basso,
    Blow,
    Bottle,
    Frog,
    Funk,
    Glass,
    Hero,
    Morse,
    Ping,
    Pop,
    Purr,
    Sosumi,
    Submarine,
    Tink,
}

impl NotificationSound {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationSound::Default => "default",
            NotificationSound::None => "none",
            NotificationSound::Basso => "Basso",
            NotificationSound::Blow => "Blow",
            NotificationSound::Bottle => "Bottle",
            NotificationSound::Frog => "Frog",
            NotificationSound::Funk => "Funk",
            NotificationSound::Glass => "Glass",
            NotificationSound::Hero => "Hero",
            NotificationSound::Morse => "Morse",
            NotificationSound::Ping => "Ping",
            NotificationSound::Pop => "Pop",
            NotificationSound::Purr => "Purr",
            NotificationSound::Sosumi => "Sosumi",
            NotificationSound::Submarine => "Submarine",
            NotificationSound::Tink => "Tink",
        }
    }

    pub fn all() -> Vec<NotificationSound> {
        vec![
            NotificationSound::Default,
            NotificationSound::None,
            NotificationSound::Basso,
            NotificationSound::Blow,
            NotificationSound::Bottle,
            NotificationSound::Frog,
            NotificationSound::Funk,
            NotificationSound::Glass,
            NotificationSound::Hero,
            NotificationSound::Morse,
            NotificationSound::Ping,
            NotificationSound::Pop,
            NotificationSound::Purr,
            NotificationSound::Sosumi,
            NotificationSound::Submarine,
            NotificationSound::Tink,
        ]
    }

    pub fn is_silent(&self) -> bool {
        *self == NotificationSound::None
    }
}

impl fmt::Display for NotificationSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let rules = NotificationRule::defaults();
        let summary: Vec<_> = rules
            .iter()
            .map(|r| (r.id.as_str(), r.bar, r.threshold, r.enabled))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("energy_full", BarKind::Energy, 100, true),
                ("nerve_full", BarKind::Nerve, 100, true),
                ("happy_full", BarKind::Happy, 100, false),
                ("life_full", BarKind::Life, 100, false),
            ]
        );
        assert!(rules.iter().all(|r| r.sound == NotificationSound::Default));
    }

    #[test]
    fn test_new_rules_get_unique_ids() {
        let a = NotificationRule::new(BarKind::Energy, 50);
        let b = NotificationRule::new(BarKind::Energy, 50);
        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
    }

    #[test]
    fn test_threshold_is_capped() {
        assert_eq!(NotificationRule::new(BarKind::Nerve, 250).threshold, 100);
    }

    #[test]
    fn test_crossed() {
        let rule = NotificationRule::new(BarKind::Energy, 100);
        assert!(rule.crossed(98.0, 100.0));
        assert!(rule.crossed(50.0, 120.0));
        assert!(!rule.crossed(100.0, 100.0));
        assert!(!rule.crossed(50.0, 99.5));

        let mut disabled = rule.clone();
        disabled.enabled = false;
        assert!(!disabled.crossed(98.0, 100.0));
    }

    #[test]
    fn test_persisted_shape() {
        let rule = NotificationRule::defaults().remove(0).with_sound(NotificationSound::Glass);
        let json = serde_json::to_value(&rule).unwrap();

        assert_eq!(json["id"], "energy_full");
        assert_eq!(json["barType"], "energy");
        assert_eq!(json["threshold"], 100);
        assert_eq!(json["soundName"], "Glass");
    }

    #[test]
    fn test_old_rules_fill_defaults() {
        let rule: NotificationRule =
            serde_json::from_str(r#"{"id": "legacy", "barType": "nerve"}"#).unwrap();

        assert_eq!(rule.id, "legacy");
        assert_eq!(rule.bar, BarKind::Nerve);
        assert_eq!(rule.threshold, 100);
        assert!(rule.enabled);
        assert_eq!(rule.sound, NotificationSound::Default);
    }

    #[test]
    fn test_stored_threshold_is_clamped() {
        let parse = |json: &str| serde_json::from_str::<NotificationRule>(json).unwrap().threshold;

        assert_eq!(parse(r#"{"barType": "energy", "threshold": 150}"#), 100);
        assert_eq!(parse(r#"{"barType": "energy", "threshold": 1000}"#), 100);
        assert_eq!(parse(r#"{"barType": "energy", "threshold": -5}"#), 0);
        assert_eq!(parse(r#"{"barType": "energy", "threshold": 80}"#), 80);
    }

    #[test]
    fn test_sound_names() {
        assert_eq!(
            serde_json::to_string(&NotificationSound::None).unwrap(),
            "\"none\""
        );
        assert_eq!(NotificationSound::Submarine.to_string(), "Submarine");
        assert_eq!(NotificationSound::all().len(), 16);
        assert!(NotificationSound::None.is_silent());
    }
}
