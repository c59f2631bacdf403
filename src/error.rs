//! Error types for the non-deterministic edges of the crate
//!
//! The simulation itself never fails; these cover the network link, the
//! match driver and settings persistence.

use std::path::PathBuf;

use crate::sim::ObjectId;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("message encoding failed: {0}")]
    Encode(serde_json::Error),
    #[error("message decoding failed: {0}")]
    Decode(serde_json::Error),
    #[error("protocol version mismatch: expected {expected}, got {got}")]
    Version { expected: u32, got: u32 },
    #[error("unexpected {message} message for a {role} peer")]
    Unexpected {
        message: &'static str,
        role: &'static str,
    },
    #[error("desync at tick {tick}: local hash {local:#010x}, remote hash {remote:#010x}")]
    Desync { tick: u64, local: u32, remote: u32 },
    #[error("no data from peer for {waited_ms} ms while waiting on tick {tick}")]
    ConnectionLost { tick: u64, waited_ms: u128 },
    #[error("peer disconnected")]
    Disconnected,
    #[error("invalid resync snapshot: {0}")]
    BadSnapshot(#[from] SnapshotError),
}

/// A decoded state that breaks the object/player links the tick relies on
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("object stored under id {key} claims id {id}")]
    IdMismatch { key: ObjectId, id: ObjectId },
    #[error("object {id} is not below the next free id {next_id}")]
    IdAhead { id: ObjectId, next_id: ObjectId },
    #[error("object {id} belongs to player {player}, which does not exist")]
    NoSuchPlayer { id: ObjectId, player: usize },
    #[error("player {player} har {id} is missing or not a har")]
    MissingHar { player: usize, id: ObjectId },
    #[error("player {player} har {id} is registered to player {owner}")]
    WrongSlot { player: usize, id: ObjectId, owner: usize },
    #[error("projectile {id} is owned by missing object {owner}")]
    MissingOwner { id: ObjectId, owner: ObjectId },
}

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("match halted: {0}")]
    Halted(String),
    #[error("{0} is not available in networked matches")]
    Refused(&'static str),
    #[error("player slot {0} has no controller")]
    NoController(usize),
    #[error(transparent)]
    Net(#[from] NetError),
    #[error("cannot resume from snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("no player slot {0}")]
    NoSuchPlayer(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}
