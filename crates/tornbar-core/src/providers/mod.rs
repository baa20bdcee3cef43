// Source implementations backed by real clients
pub mod torn;

pub use torn::TornProvider;
