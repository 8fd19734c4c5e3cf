use thiserror::Error;

/// Why a frame could not be queued for a recipient.
///
/// Both variants are treated as an implicit disconnect of that recipient;
/// neither ever fails the broadcast as a whole.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The recipient's writer task has gone away (transport closed).
    #[error("recipient connection is closed")]
    Closed,
    /// The recipient's outbox is full; it is not draining fast enough.
    #[error("recipient outbox is full")]
    Backlogged,
}
