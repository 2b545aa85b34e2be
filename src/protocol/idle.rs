//! Subsystems reported by the `idle` command.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::response::Response;

/// A server subsystem whose change `idle` can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subsystem {
  Database,
  Update,
  StoredPlaylist,
  Playlist,
  Player,
  Mixer,
  Output,
  Options,
  Sticker,
  Partition,
  Subscription,
  Message,
  Neighbor,
  Mount,
}

impl Subsystem {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Database => "database",
      Self::Update => "update",
      Self::StoredPlaylist => "stored_playlist",
      Self::Playlist => "playlist",
      Self::Player => "player",
      Self::Mixer => "mixer",
      Self::Output => "output",
      Self::Options => "options",
      Self::Sticker => "sticker",
      Self::Partition => "partition",
      Self::Subscription => "subscription",
      Self::Message => "message",
      Self::Neighbor => "neighbor",
      Self::Mount => "mount",
    }
  }
}

impl fmt::Display for Subsystem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Subsystem {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(match s {
      "database" => Self::Database,
      "update" => Self::Update,
      "stored_playlist" => Self::StoredPlaylist,
      "playlist" => Self::Playlist,
      "player" => Self::Player,
      "mixer" => Self::Mixer,
      "output" => Self::Output,
      "options" => Self::Options,
      "sticker" => Self::Sticker,
      "partition" => Self::Partition,
      "subscription" => Self::Subscription,
      "message" => Self::Message,
      "neighbor" => Self::Neighbor,
      "mount" => Self::Mount,
      other => return Err(format!("unknown subsystem: {other}")),
    })
  }
}

/// Set of subsystems changed since the last `idle`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet(BTreeSet<Subsystem>);

impl ChangeSet {
  /// Decode the `changed:` lines of an idle response.
  pub fn from_response(response: &Response) -> Self {
    let mut set = BTreeSet::new();
    for name in response.values("changed") {
      match name.parse::<Subsystem>() {
        Ok(subsystem) => {
          set.insert(subsystem);
        }
        Err(e) => log::debug!("Ignoring idle change: {}", e),
      }
    }
    Self(set)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn contains(&self, subsystem: Subsystem) -> bool {
    self.0.contains(&subsystem)
  }

  pub fn iter(&self) -> impl Iterator<Item = Subsystem> + '_ {
    self.0.iter().copied()
  }
}

impl FromIterator<Subsystem> for ChangeSet {
  fn from_iter<T: IntoIterator<Item = Subsystem>>(iter: T) -> Self {
    Self(iter.into_iter().collect())
  }
}
