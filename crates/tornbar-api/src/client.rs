use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::market::{decode_market, MarketResponse};
use crate::retry::{is_retryable_status, with_retry, RetryConfig};
use crate::snapshot::{decode_snapshot, Snapshot};
use crate::transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};

pub const TORN_API_BASE: &str = "https://api.torn.com";

/// Everything the player view needs, in one request
const USER_SELECTIONS: &str = "basic,profile,bars,cooldowns,travel,events,messages,money";
const MARKET_SELECTIONS: &str = "bazaar,itemmarket";

#[derive(Error, Debug)]
pub enum TornError {
    #[error("API key required")]
    MissingKey,

    #[error("Invalid API key (HTTP {status})")]
    InvalidKey { status: u16 },

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("Torn API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    #[error("JSON parsing failed: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TornError>;

impl TornError {
    /// The short message shown to the user for this failure
    pub fn user_message(&self) -> String {
        match self {
            TornError::MissingKey => "API Key required".to_string(),
            TornError::InvalidKey { .. } => "Invalid API Key".to_string(),
            TornError::Http(status) => format!("HTTP Error: {}", status),
            TornError::Api { message, .. } => format!("API Error: {}", message),
            TornError::Network(err) => format!("Network error: {}", err),
            TornError::Parse(_) => "Failed to parse response".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            TornError::Network(_) => true,
            TornError::Http(status) => reqwest::StatusCode::from_u16(*status)
                .map(is_retryable_status)
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// Thin client over the two Torn endpoints this app reads
pub struct TornClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    retry_config: RetryConfig,
}

impl TornClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let transport = ReqwestTransport::new(timeout)?;
        Ok(Self::with_transport(Arc::new(transport), TORN_API_BASE))
    }

    /// Custom transport and base URL, mostly for tests and proxies
    pub fn with_transport(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_config: RetryConfig::default(),
        }
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the player snapshot
    ///
    /// An error envelope in a 200 response comes back as [`TornError::Api`]
    /// rather than as a snapshot with `error` set.
    pub async fn fetch_user(&self, api_key: &str) -> Result<Snapshot> {
        if api_key.trim().is_empty() {
            return Err(TornError::MissingKey);
        }

        let url = format!("{}/user/", self.base_url);
        let query = vec![
            ("selections".to_string(), USER_SELECTIONS.to_string()),
            ("key".to_string(), api_key.to_string()),
        ];

        let response = self.get_checked(&url, &query).await?;
        let snapshot = decode_snapshot(&response.body)?;

        if let Some(error) = snapshot.error {
            warn!("Torn API returned error {}: {}", error.code, error.message);
            return Err(TornError::Api {
                code: error.code,
                message: error.message,
            });
        }

        debug!(
            "Fetched snapshot for {}",
            snapshot.name.as_deref().unwrap_or("unknown player")
        );
        Ok(snapshot)
    }

    /// Fetch item market and bazaar listings for one item
    pub async fn fetch_market(&self, api_key: &str, item_id: u64) -> Result<MarketResponse> {
        if api_key.trim().is_empty() {
            return Err(TornError::MissingKey);
        }

        let url = format!("{}/market/{}", self.base_url, item_id);
        let query = vec![
            ("selections".to_string(), MARKET_SELECTIONS.to_string()),
            ("key".to_string(), api_key.to_string()),
        ];

        let response = self.get_checked(&url, &query).await?;
        let market = decode_market(&response.body)?;

        if let Some(error) = market.error {
            warn!("Torn API returned error {} for item {}: {}", error.code, item_id, error.message);
            return Err(TornError::Api {
                code: error.code,
                message: error.message,
            });
        }

        Ok(market)
    }

    /// GET with retries and status mapping
    async fn get_checked(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse> {
        with_retry(&self.retry_config, TornError::is_retryable, || async {
            let response = self.transport.get(url, query).await?;

            match response.status {
                200..=299 => Ok(response),
                403 | 404 => Err(TornError::InvalidKey {
                    status: response.status,
                }),
                status => Err(TornError::Http(status)),
            }
        })
        .await
    }
}
