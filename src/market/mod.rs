// Market state: the kline window and orderbook depth telemetry
pub mod depth;
pub mod kline_window;

pub use depth::{market_depth, DepthReading};
pub use kline_window::KlineWindow;
