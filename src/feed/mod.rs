// Market data boundary: payload normalization and the stream transport
pub mod normalizer;
pub mod stream;

pub use normalizer::{parse_kline, parse_orderbook, parse_ticker};
pub use stream::{MarketStream, StreamConfig};
