use serde::{Deserialize, Deserializer, Serialize};

use crate::snapshot::ApiErrorBody;

/// One sell listing, normalized across the item market and bazaars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarketListing {
    pub price: u64,
    pub quantity: u64,
}

/// Listing shapes seen on the wire. Current first, legacy second.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListingShape {
    Current { price: u64, amount: u64 },
    Legacy { cost: u64, quantity: u64 },
}

impl From<ListingShape> for MarketListing {
    fn from(shape: ListingShape) -> Self {
        match shape {
            ListingShape::Current { price, amount } => MarketListing {
                price,
                quantity: amount,
            },
            ListingShape::Legacy { cost, quantity } => MarketListing {
                price: cost,
                quantity,
            },
        }
    }
}

/// `itemmarket` is `{"listings": [...]}` on the current API and a bare
/// array on the legacy one
#[derive(Deserialize)]
#[serde(untagged)]
enum ItemMarketShape {
    Current { listings: Option<Vec<ListingShape>> },
    Legacy(Vec<ListingShape>),
}

fn item_market<'de, D>(deserializer: D) -> Result<Vec<MarketListing>, D::Error>
where
    D: Deserializer<'de>,
{
    let listings = match Option::<ItemMarketShape>::deserialize(deserializer)? {
        Some(ItemMarketShape::Current { listings }) => listings.unwrap_or_default(),
        Some(ItemMarketShape::Legacy(listings)) => listings,
        None => Vec::new(),
    };
    Ok(listings.into_iter().map(MarketListing::from).collect())
}

fn bazaar<'de, D>(deserializer: D) -> Result<Vec<MarketListing>, D::Error>
where
    D: Deserializer<'de>,
{
    let listings = Option::<Vec<ListingShape>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(listings.into_iter().map(MarketListing::from).collect())
}

/// Decoded `market/{id}` response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarketResponse {
    #[serde(default, deserialize_with = "item_market")]
    pub itemmarket: Vec<MarketListing>,
    #[serde(default, deserialize_with = "bazaar")]
    pub bazaar: Vec<MarketListing>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

/// Cheapest offers for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarketQuote {
    pub lowest_price: u64,
    pub lowest_quantity: u64,
    /// Price of the second listing in price order. Two listings at the same
    /// price give the same lowest and second-lowest price.
    pub second_lowest_price: u64,
}

impl MarketResponse {
    /// Cheapest listing across both markets, or `None` when nothing is listed
    pub fn quote(&self) -> Option<MarketQuote> {
        let mut listings: Vec<MarketListing> = self
            .itemmarket
            .iter()
            .chain(self.bazaar.iter())
            .copied()
            .collect();
        listings.sort_by_key(|l| l.price);

        let lowest = listings.first()?;
        Some(MarketQuote {
            lowest_price: lowest.price,
            lowest_quantity: lowest.quantity,
            second_lowest_price: listings.get(1).map(|l| l.price).unwrap_or(0),
        })
    }
}

/// Decode a `market` response body, honouring the error envelope the same
/// way [`crate::decode_snapshot`] does
pub fn decode_market(bytes: &[u8]) -> Result<MarketResponse, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let error: ApiErrorBody = serde_json::from_value(error.clone())?;
        return Ok(MarketResponse {
            error: Some(error),
            ..Default::default()
        });
    }

    serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> MarketResponse {
        decode_market(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_quote_merges_market_and_bazaar() {
        let market = decode(json!({
            "itemmarket": {
                "listings": [
                    {"price": 1000, "amount": 5},
                    {"price": 1100, "amount": 3},
                    {"price": 1200, "amount": 10}
                ]
            },
            "bazaar": [
                {"cost": 950, "quantity": 2},
                {"cost": 1050, "quantity": 7}
            ]
        }));

        let quote = market.quote().unwrap();
        assert_eq!(quote.lowest_price, 950);
        assert_eq!(quote.lowest_quantity, 2);
        assert_eq!(quote.second_lowest_price, 1000);
    }

    #[test]
    fn test_second_lowest_is_second_listing_not_second_price() {
        let market = decode(json!({
            "itemmarket": {
                "listings": [
                    {"price": 500, "amount": 1},
                    {"price": 500, "amount": 4},
                    {"price": 700, "amount": 1}
                ]
            }
        }));

        let quote = market.quote().unwrap();
        assert_eq!(quote.lowest_price, 500);
        assert_eq!(quote.second_lowest_price, 500);
    }

    #[test]
    fn test_legacy_itemmarket_array() {
        let market = decode(json!({
            "itemmarket": [
                {"cost": 2000, "quantity": 1},
                {"cost": 1800, "quantity": 6}
            ],
            "bazaar": null
        }));

        let quote = market.quote().unwrap();
        assert_eq!(quote.lowest_price, 1800);
        assert_eq!(quote.lowest_quantity, 6);
        assert_eq!(quote.second_lowest_price, 2000);
    }

    #[test]
    fn test_single_listing_has_no_second_price() {
        let market = decode(json!({"itemmarket": {"listings": [{"price": 42, "amount": 1}]}}));
        let quote = market.quote().unwrap();
        assert_eq!(quote.second_lowest_price, 0);
    }

    #[test]
    fn test_no_listings() {
        let market = decode(json!({"itemmarket": {"listings": []}, "bazaar": []}));
        assert!(market.quote().is_none());
        assert!(decode(json!({})).quote().is_none());
    }

    #[test]
    fn test_error_envelope() {
        let market = decode(json!({"error": {"code": 6, "error": "Incorrect ID"}}));
        assert_eq!(market.error.unwrap().code, 6);
        assert!(market.itemmarket.is_empty());
    }
}
