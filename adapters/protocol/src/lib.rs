#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Connection lifecycle and tick answering for the game server protocol.
//!
//! A [`Session`] authenticates, tracks the [`ClientState`], answers every
//! tick with exactly one command and keeps a slow or failing decider from
//! stalling the connection by bounding each decision with a deadline.

mod runner;
mod session;

use std::{error::Error as StdError, future::Future};

pub use session::{Session, SessionConfig};

/// Where the connection currently stands in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// Credentials sent, acknowledgement pending.
    Unauthorized,
    /// Authenticated and waiting for a match.
    Idle,
    /// Playing a match.
    InGame,
}

/// Failure reported by a [`Transport`] implementation.
#[derive(Debug, thiserror::Error)]
#[error("transport failure: {0}")]
pub struct TransportError(#[source] Box<dyn StdError + Send + Sync>);

impl TransportError {
    /// Wraps any error raised by the underlying connection.
    pub fn new(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self(source.into())
    }
}

/// Errors that end a session. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The transport failed while sending or receiving.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The server closed the connection.
    #[error("connection closed by the server")]
    ConnectionClosed,
    /// An outbound event could not be encoded.
    #[error("failed to encode outbound frame")]
    Encode(#[source] skirmish_wire::WireError),
}

/// Persistent text-frame connection to the game server.
pub trait Transport {
    /// Sends one text frame.
    fn send(&mut self, frame: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Waits for the next text frame; `None` once the connection is closed.
    fn receive(&mut self) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;
}
