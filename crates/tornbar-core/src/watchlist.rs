use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tornbar_api::MarketQuote;

use crate::source::PriceError;

/// A market item being price-watched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistItem {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lowest_price: u64,
    #[serde(default)]
    pub lowest_price_quantity: u64,
    #[serde(default)]
    pub second_lowest_price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WatchlistItem {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            lowest_price: 0,
            lowest_price_quantity: 0,
            second_lowest_price: 0,
            last_updated: None,
            error: None,
        }
    }

    /// Gap between the two cheapest listings, zero unless both are known
    pub fn price_difference(&self) -> u64 {
        if self.lowest_price > 0 && self.second_lowest_price > 0 {
            self.second_lowest_price.saturating_sub(self.lowest_price)
        } else {
            0
        }
    }

    /// Never refreshed and never failed
    pub fn is_loading(&self) -> bool {
        self.last_updated.is_none() && self.error.is_none()
    }

    fn apply(&mut self, result: Result<MarketQuote, PriceError>, now: DateTime<Utc>) {
        match result {
            Ok(quote) => {
                self.lowest_price = quote.lowest_price;
                self.lowest_price_quantity = quote.lowest_quantity;
                self.second_lowest_price = quote.second_lowest_price;
                self.last_updated = Some(now);
                self.error = None;
            }
            Err(err) => {
                self.error = Some(err.to_string());
            }
        }
    }
}

/// Ordered set of watched items, unique by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchlist {
    items: Vec<WatchlistItem>,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted items, keeping the first of any duplicate id
    pub fn from_items(items: Vec<WatchlistItem>) -> Self {
        let mut watchlist = Self::new();
        for item in items {
            if !watchlist.contains(item.id) {
                watchlist.items.push(item);
            }
        }
        watchlist
    }

    /// Returns false if the id is already watched
    pub fn add(&mut self, id: u64, name: impl Into<String>) -> bool {
        if self.contains(id) {
            return false;
        }
        self.items.push(WatchlistItem::new(id, name));
        true
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    /// Record a refresh result; results for items no longer watched are dropped
    pub fn apply_quote(&mut self, id: u64, result: Result<MarketQuote, PriceError>, now: DateTime<Utc>) -> bool {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.apply(result, now);
                true
            }
            None => {
                debug!("Dropping price for item {} no longer on the watchlist", id);
                false
            }
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    pub fn get(&self, id: u64) -> Option<&WatchlistItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn items(&self) -> &[WatchlistItem] {
        &self.items
    }

    pub fn ids(&self) -> Vec<u64> {
        self.items.iter().map(|item| item.id).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(lowest: u64, quantity: u64, second: u64) -> MarketQuote {
        MarketQuote {
            lowest_price: lowest,
            lowest_quantity: quantity,
            second_lowest_price: second,
        }
    }

    #[test]
    fn test_add_and_duplicate() {
        let mut watchlist = Watchlist::new();

        assert!(watchlist.add(206, "Xanax"));
        assert!(!watchlist.add(206, "Xanax again"));
        assert_eq!(watchlist.len(), 1);

        let item = watchlist.get(206).unwrap();
        assert_eq!(item.name, "Xanax");
        assert!(item.is_loading());
        assert_eq!(item.lowest_price, 0);
    }

    #[test]
    fn test_remove() {
        let mut watchlist = Watchlist::new();
        watchlist.add(206, "Xanax");
        watchlist.add(367, "Feathery Hotel Coupon");

        assert!(watchlist.remove(206));
        assert!(!watchlist.remove(206));
        assert_eq!(watchlist.ids(), vec![367]);
    }

    #[test]
    fn test_apply_quote() {
        let mut watchlist = Watchlist::new();
        watchlist.add(206, "Xanax");

        assert!(watchlist.apply_quote(206, Ok(quote(830_000, 3, 845_000)), Utc::now()));

        let item = watchlist.get(206).unwrap();
        assert_eq!(item.lowest_price, 830_000);
        assert_eq!(item.lowest_price_quantity, 3);
        assert_eq!(item.price_difference(), 15_000);
        assert!(!item.is_loading());
        assert!(item.error.is_none());
    }

    #[test]
    fn test_error_keeps_last_prices() {
        let mut watchlist = Watchlist::new();
        watchlist.add(206, "Xanax");
        watchlist.apply_quote(206, Ok(quote(830_000, 3, 845_000)), Utc::now());
        watchlist.apply_quote(206, Err(PriceError::Http(502)), Utc::now());

        let item = watchlist.get(206).unwrap();
        assert_eq!(item.error.as_deref(), Some("HTTP 502"));
        assert_eq!(item.lowest_price, 830_000);

        watchlist.apply_quote(206, Ok(quote(800_000, 1, 0)), Utc::now());
        let item = watchlist.get(206).unwrap();
        assert!(item.error.is_none());
        assert_eq!(item.price_difference(), 0);
    }

    #[test]
    fn test_quote_for_removed_item_is_ignored() {
        let mut watchlist = Watchlist::new();
        watchlist.add(206, "Xanax");
        watchlist.remove(206);

        assert!(!watchlist.apply_quote(206, Ok(quote(1, 1, 2)), Utc::now()));
        assert!(watchlist.is_empty());
    }

    #[test]
    fn test_failed_first_fetch_is_not_loading() {
        let mut item = WatchlistItem::new(1, "Hammer");
        item.apply(Err(PriceError::NoListings), Utc::now());
        assert!(!item.is_loading());
        assert_eq!(item.error.as_deref(), Some("No listings"));
    }

    #[test]
    fn test_persisted_item_with_missing_fields() {
        let item: WatchlistItem = serde_json::from_str(r#"{"id": 206, "name": "Xanax"}"#).unwrap();
        assert_eq!(item, WatchlistItem::new(206, "Xanax"));

        let watchlist = Watchlist::from_items(vec![item.clone(), item]);
        assert_eq!(watchlist.len(), 1);
    }
}
