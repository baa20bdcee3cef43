use thiserror::Error;

use tornbar_api::{MarketQuote, Snapshot, TornError};

/// Where player snapshots come from
///
/// The poller only sees this trait, so tests can hand it canned snapshots
/// (or hold a fetch open) without any HTTP involved.
#[async_trait::async_trait]
pub trait PlayerSource: Send + Sync {
    async fn fetch_snapshot(&self, api_key: &str) -> Result<Snapshot, TornError>;
}

/// Where watchlist prices come from
#[async_trait::async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_quote(&self, api_key: &str, item_id: u64) -> Result<MarketQuote, PriceError>;
}

/// Why a watchlist price could not be refreshed
///
/// The display strings are what ends up on the item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("No listings")]
    NoListings,

    #[error("Network Error")]
    Network,

    #[error("HTTP {0}")]
    Http(u16),

    #[error("API Error: {0}")]
    Api(String),

    #[error("Parse Error")]
    Parse,
}

impl From<TornError> for PriceError {
    fn from(err: TornError) -> Self {
        match err {
            TornError::Network(_) => PriceError::Network,
            TornError::InvalidKey { status } => PriceError::Http(status),
            TornError::Http(status) => PriceError::Http(status),
            TornError::Api { message, .. } => PriceError::Api(message),
            TornError::MissingKey => PriceError::Api("API Key required".to_string()),
            TornError::Parse(_) => PriceError::Parse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tornbar_api::TransportError;

    #[test]
    fn test_item_error_strings() {
        assert_eq!(PriceError::NoListings.to_string(), "No listings");
        assert_eq!(
            PriceError::from(TornError::Network(TransportError::Timeout)).to_string(),
            "Network Error"
        );
        assert_eq!(PriceError::from(TornError::Http(503)).to_string(), "HTTP 503");
        assert_eq!(
            PriceError::from(TornError::InvalidKey { status: 403 }).to_string(),
            "HTTP 403"
        );
        assert_eq!(
            PriceError::from(TornError::Api {
                code: 6,
                message: "Incorrect ID".into()
            })
            .to_string(),
            "API Error: Incorrect ID"
        );

        let parse = serde_json::from_str::<u64>("nope").unwrap_err();
        assert_eq!(PriceError::from(TornError::Parse(parse)).to_string(), "Parse Error");
    }
}
