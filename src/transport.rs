//! Contract with the game-server collaborator.
//!
//! The engine never touches sockets or wire formats; it talks to anything that
//! implements [`Transport`]. [`crate::arena::LocalArena`] is the in-process
//! implementation shipped here; a network client slots in behind the same
//! trait.

use crate::world::WorldSnapshot;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Player colors accepted by the server at registration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudColor {
    Blue,
    Gray,
    Orange,
    Purple,
    Red,
}

impl CloudColor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Gray => "gray",
            Self::Orange => "orange",
            Self::Purple => "purple",
            Self::Red => "red",
        }
    }
}

/// Transport failures are not recoverable by the engine; the caller owns
/// retry and reconnect policy.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection lost: {0}")]
    Disconnected(String),
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
    #[error("server rejected command: {0}")]
    Rejected(String),
}

/// Blocking request/response access to the game server.
///
/// `register` and `spawn` are called once before the decision loop starts,
/// `disconnect` once after it ends.
pub trait Transport {
    fn register(&mut self, name: &str, color: CloudColor) -> Result<(), TransportError>;
    fn spawn(&mut self) -> Result<(), TransportError>;
    fn fetch_world_snapshot(&mut self) -> Result<WorldSnapshot, TransportError>;
    fn submit_thrust(&mut self, x: f64, y: f64) -> Result<(), TransportError>;
    fn submit_self_destruct(&mut self) -> Result<(), TransportError>;
    fn disconnect(&mut self) -> Result<(), TransportError>;
}
