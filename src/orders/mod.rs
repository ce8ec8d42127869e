// Order-side collaborators: the buy ledger and the exchange gateway
pub mod gateway;
pub mod ledger;

pub use gateway::{GatewayCall, OrderAck, OrderGateway, PaperGateway};
pub use ledger::BuyLedger;
