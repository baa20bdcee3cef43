use chrono::{DateTime, Utc};

use tornbar_api::Snapshot;

use crate::watchlist::WatchlistItem;

/// What observers see, republished on every change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    /// Last good snapshot; survives failed cycles
    pub snapshot: Option<Snapshot>,
    pub last_updated: Option<DateTime<Utc>>,
    /// User-facing message for the most recent failure
    pub error: Option<String>,
    pub is_loading: bool,
    pub is_polling: bool,
    pub watchlist: Vec<WatchlistItem>,
}

impl AppState {
    /// One-line summary, e.g. for a menu-bar title or a log line
    pub fn summary(&self) -> String {
        let snapshot = match &self.snapshot {
            Some(snapshot) => snapshot,
            None => {
                return match &self.error {
                    Some(error) => error.clone(),
                    None if self.is_loading => "Loading...".to_string(),
                    None => "No data".to_string(),
                }
            }
        };

        let mut parts = Vec::new();
        if let Some(bars) = snapshot.bars() {
            parts.push(format!("E {}/{}", bars.energy.current, bars.energy.maximum));
            parts.push(format!("N {}/{}", bars.nerve.current, bars.nerve.maximum));
            parts.push(format!("H {}/{}", bars.happy.current, bars.happy.maximum));
            parts.push(format!("L {}/{}", bars.life.current, bars.life.maximum));
        }
        if let Some(status) = &snapshot.status {
            if !status.is_okay() {
                parts.push(status.state.clone().unwrap_or_default());
            }
        }
        if let Some(travel) = &snapshot.travel {
            if travel.is_traveling() {
                parts.push(format!(
                    "-> {}",
                    travel.destination.as_deref().unwrap_or("?")
                ));
            }
        }
        let unread = snapshot.unread_messages();
        if unread > 0 {
            parts.push(format!("{} unread", unread));
        }
        if let Some(error) = &self.error {
            parts.push(format!("({})", error));
        }

        if parts.is_empty() {
            snapshot.name.clone().unwrap_or_else(|| "No data".to_string())
        } else {
            parts.join(" | ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tornbar_api::snapshot::{Bar, Status};

    #[test]
    fn test_summary_without_snapshot() {
        let mut state = AppState::default();
        assert_eq!(state.summary(), "No data");

        state.is_loading = true;
        assert_eq!(state.summary(), "Loading...");

        state.error = Some("API Key required".into());
        assert_eq!(state.summary(), "API Key required");
    }

    #[test]
    fn test_summary_keeps_stale_data_visible() {
        let state = AppState {
            snapshot: Some(Snapshot {
                energy: Some(Bar::new(100, 150)),
                nerve: Some(Bar::new(20, 60)),
                life: Some(Bar::new(7500, 7500)),
                happy: Some(Bar::new(5000, 5000)),
                status: Some(Status {
                    state: Some("Hospital".into()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            error: Some("HTTP Error: 502".into()),
            ..Default::default()
        };

        assert_eq!(
            state.summary(),
            "E 100/150 | N 20/60 | H 5000/5000 | L 7500/7500 | Hospital | (HTTP Error: 502)"
        );
    }
}
