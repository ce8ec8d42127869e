// REST preload: market history, ticker and instrument metadata
pub mod bybit;

pub use bybit::BybitClient;
