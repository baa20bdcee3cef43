// Torn provider - bridges the API client with the source traits
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use tornbar_api::{MarketQuote, Snapshot, TornClient, TornError};

use crate::{
    config::ApiConfig,
    source::{MarketSource, PlayerSource, PriceError},
    Result,
};

/// Wrapper around TornClient that implements both sources
#[derive(Clone)]
pub struct TornProvider {
    client: Arc<TornClient>,
}

impl TornProvider {
    pub fn new(client: TornClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Build the client from the `[api]` config section
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let transport = tornbar_api::ReqwestTransport::new(config.timeout()).map_err(TornError::from)?;
        let client = TornClient::with_transport(Arc::new(transport), config.base_url.clone())
            .with_retry_config(config.retry_config());

        Ok(Self::new(client))
    }
}

#[async_trait]
impl PlayerSource for TornProvider {
    async fn fetch_snapshot(&self, api_key: &str) -> std::result::Result<Snapshot, TornError> {
        self.client.fetch_user(api_key).await
    }
}

#[async_trait]
impl MarketSource for TornProvider {
    async fn fetch_quote(&self, api_key: &str, item_id: u64) -> std::result::Result<MarketQuote, PriceError> {
        let market = self.client.fetch_market(api_key, item_id).await?;

        match market.quote() {
            Some(quote) => {
                debug!("Item {} lowest price {}", item_id, quote.lowest_price);
                Ok(quote)
            }
            None => Err(PriceError::NoListings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_uses_base_url() {
        let config = ApiConfig {
            base_url: "https://proxy.example.test/".into(),
            ..Default::default()
        };

        let provider = TornProvider::from_config(&config).unwrap();
        assert_eq!(provider.client.base_url(), "https://proxy.example.test");
    }

    #[tokio::test]
    async fn test_empty_key_never_reaches_the_network() {
        let provider = TornProvider::from_config(&ApiConfig::default()).unwrap();

        let err = provider.fetch_snapshot("").await.unwrap_err();
        assert!(matches!(err, TornError::MissingKey));
    }
}
