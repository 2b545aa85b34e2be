//! Protocol state machine shared by the queue owner and the idle monitor.

use std::fmt;

use parking_lot::RwLock;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Where the client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ConnectionState {
  #[default]
  Disconnected,
  /// Both connections are up and `idle` is outstanding.
  ConnectedIdleWaiting,
  /// A command is in flight on the command connection.
  ConnectedCommandPending,
  /// A transport error dropped the connections; retrying with backoff.
  Reconnecting,
}

impl ConnectionState {
  pub fn is_connected(self) -> bool {
    matches!(
      self,
      Self::ConnectedIdleWaiting | Self::ConnectedCommandPending
    )
  }
}

impl fmt::Display for ConnectionState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Disconnected => "disconnected",
      Self::ConnectedIdleWaiting => "idle",
      Self::ConnectedCommandPending => "command pending",
      Self::Reconnecting => "reconnecting",
    })
  }
}

#[derive(Debug, Default)]
pub(crate) struct StateCell {
  inner: RwLock<ConnectionState>,
}

impl StateCell {
  pub fn get(&self) -> ConnectionState {
    *self.inner.read()
  }

  /// Store `next` and return the previous state.
  pub fn set(&self, next: ConnectionState) -> ConnectionState {
    let mut state = self.inner.write();
    let previous = std::mem::replace(&mut *state, next);
    if previous != next {
      log::debug!("MPD connection state: {} -> {}", previous, next);
    }
    previous
  }

  /// Replace `from` with `to` only if the state is currently `from`.
  pub fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
    let mut state = self.inner.write();
    if *state == from {
      *state = to;
      true
    } else {
      false
    }
  }

  pub fn begin_command(&self) {
    self.transition(
      ConnectionState::ConnectedIdleWaiting,
      ConnectionState::ConnectedCommandPending,
    );
  }

  pub fn end_command(&self) {
    self.transition(
      ConnectionState::ConnectedCommandPending,
      ConnectionState::ConnectedIdleWaiting,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_command_transitions() {
    let cell = StateCell::default();
    cell.begin_command();
    assert_eq!(cell.get(), ConnectionState::Disconnected);

    cell.set(ConnectionState::ConnectedIdleWaiting);
    cell.begin_command();
    assert_eq!(cell.get(), ConnectionState::ConnectedCommandPending);
    assert!(cell.get().is_connected());
    cell.end_command();
    assert_eq!(cell.get(), ConnectionState::ConnectedIdleWaiting);
  }

  #[test]
  fn test_reconnecting_is_not_overwritten_by_command_end() {
    let cell = StateCell::default();
    cell.set(ConnectionState::ConnectedCommandPending);
    assert_eq!(
      cell.set(ConnectionState::Reconnecting),
      ConnectionState::ConnectedCommandPending
    );
    cell.end_command();
    assert_eq!(cell.get(), ConnectionState::Reconnecting);
    assert!(!cell.get().is_connected());
  }
}
