use thiserror::Error;

/// Errors that can occur inside the event handlers.
///
/// Every variant is terminal for a single event only: the dispatcher
/// logs it and moves on to the next event. Nothing here escalates to
/// process termination.
#[derive(Debug, Error)]
pub enum BotError {
    /// A stream payload is missing required fields or carries
    /// non-numeric values. The event is dropped without touching state.
    #[error("malformed {kind} message: {reason}")]
    MalformedMessage { kind: &'static str, reason: String },

    /// Order placement or amendment failed. State is left unchanged and
    /// the action retries on the next eligible tick.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// An amend targeted an order id that is no longer resting. Treated
    /// as already filled or cancelled.
    #[error("order {0} is no longer resting")]
    StaleOrder(u64),
}

impl BotError {
    pub fn malformed(kind: &'static str, reason: impl Into<String>) -> Self {
        BotError::MalformedMessage {
            kind,
            reason: reason.into(),
        }
    }
}
