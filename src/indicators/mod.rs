// Technical indicators feeding the buy advice score
pub mod advice;
pub mod moving_average;
pub mod rsi;

pub use advice::{compute_advice, window_volatility, AdviceConfig};
pub use moving_average::{calculate_ema, calculate_sma};
pub use rsi::calculate_rsi;
