//! Async client core for the Music Player Daemon (MPD) protocol.
//!
//! - `protocol` - Wire-level commands, responses and connections
//! - `model` - Songs, statuses, directories and other server entities
//! - `client` - Command queue, idle monitor, worker pool and typed API
//! - `config` - Connection settings and per-network profiles

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod protocol;

pub use client::{ConnectionState, EventSink, Executor, LoggingSink, MpdClient, MpdEvent, Task};
pub use config::{MpdConfig, ProfileOverride};
pub use error::{AckCode, AckError, MpdError};
pub use model::{
  Directory, DirectoryTree, Output, PlayState, Playlist, PlaylistFile, Song, Statistics, Status,
  Sticker,
};
pub use protocol::{ChangeSet, Command, CommandList, Connection, ProtocolVersion, Response, Subsystem};
