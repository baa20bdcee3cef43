// Torn API client, wire types and decoding
pub mod client;
mod de;
pub mod market;
pub mod retry;
pub mod snapshot;
pub mod transport;

// Re-export common types
pub use client::{TornClient, TornError, TORN_API_BASE};
pub use market::{decode_market, MarketListing, MarketQuote, MarketResponse};
pub use retry::RetryConfig;
pub use snapshot::{
    decode_snapshot, ApiErrorBody, Bar, Bars, Chain, Cooldowns, Event, Message, Money, Snapshot,
    Status, Travel, HOME_CITY,
};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
