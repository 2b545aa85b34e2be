//! MPD error types.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to an MPD server.
#[derive(Debug, Error)]
pub enum MpdError {
  /// Host unreachable, not connected, or currently reconnecting.
  #[error("Connection error: {0}")]
  Connection(String),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Connection closed by server")]
  ConnectionClosed,

  /// Malformed greeting or response framing.
  #[error("Protocol error: {0}")]
  Protocol(String),

  /// The server declined the command with an ACK.
  #[error("Server error: {0}")]
  Server(AckError),

  #[error("No response within {0:?}")]
  Timeout(Duration),

  /// Unexpected data shape inside a well-framed response.
  #[error("Parse error: {0}")]
  Parse(String),

  #[error("Invalid command: {0}")]
  InvalidCommand(String),

  /// Rejected client configuration.
  #[error("Invalid configuration: {0}")]
  Config(String),

  #[error("Command cancelled")]
  Cancelled,

  #[error("Executor shut down")]
  Shutdown,
}

impl MpdError {
  /// Whether this error leaves the connection in an unknown state.
  ///
  /// Transport errors force a reconnect; everything else is reported to the
  /// caller that issued the command and the connection stays usable.
  pub fn is_transport(&self) -> bool {
    matches!(
      self,
      Self::Io(_) | Self::ConnectionClosed | Self::Protocol(_) | Self::Timeout(_)
    )
  }

  /// The ACK payload, if the server declined the command.
  pub fn ack(&self) -> Option<&AckError> {
    match self {
      Self::Server(ack) => Some(ack),
      _ => None,
    }
  }
}

impl From<AckError> for MpdError {
  fn from(ack: AckError) -> Self {
    Self::Server(ack)
  }
}

/// Error codes carried by `ACK [code@index]` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckCode {
  NotList,
  Arg,
  Password,
  Permission,
  Unknown,
  NoExist,
  PlaylistMax,
  System,
  PlaylistLoad,
  UpdateAlready,
  PlayerSync,
  Exist,
  Other(u32),
}

impl AckCode {
  pub fn from_code(code: u32) -> Self {
    match code {
      1 => Self::NotList,
      2 => Self::Arg,
      3 => Self::Password,
      4 => Self::Permission,
      5 => Self::Unknown,
      50 => Self::NoExist,
      51 => Self::PlaylistMax,
      52 => Self::System,
      53 => Self::PlaylistLoad,
      54 => Self::UpdateAlready,
      55 => Self::PlayerSync,
      56 => Self::Exist,
      other => Self::Other(other),
    }
  }

  pub fn code(self) -> u32 {
    match self {
      Self::NotList => 1,
      Self::Arg => 2,
      Self::Password => 3,
      Self::Permission => 4,
      Self::Unknown => 5,
      Self::NoExist => 50,
      Self::PlaylistMax => 51,
      Self::System => 52,
      Self::PlaylistLoad => 53,
      Self::UpdateAlready => 54,
      Self::PlayerSync => 55,
      Self::Exist => 56,
      Self::Other(code) => code,
    }
  }
}

/// Payload of an `ACK [code@index] {command} message` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckError {
  pub code: AckCode,
  /// Index of the failing command inside a command list (0 otherwise).
  pub index: u32,
  /// Name of the command that failed, as echoed by the server.
  pub command: String,
  pub message: String,
}

impl fmt::Display for AckError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "[{}@{}] {{{}}} {}",
      self.code.code(),
      self.index,
      self.command,
      self.message
    )
  }
}
