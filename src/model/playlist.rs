//! Stored playlists.

use std::hash::{Hash, Hasher};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use super::{get_string, Song};
use crate::protocol::Record;

/// A stored playlist as listed by `listplaylists` or `lsinfo`.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct PlaylistFile {
  pub name: String,
  pub last_modified: Option<String>,
}

impl From<&Record> for PlaylistFile {
  fn from(record: &Record) -> Self {
    Self {
      name: record.get("playlist").unwrap_or_default().to_string(),
      last_modified: get_string(record, "last-modified"),
    }
  }
}

impl PartialEq for PlaylistFile {
  fn eq(&self, other: &Self) -> bool {
    self.name == other.name
  }
}

impl Eq for PlaylistFile {}

impl Hash for PlaylistFile {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.name.hash(state);
  }
}

/// A stored playlist with its ordered entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Playlist {
  pub name: String,
  pub entries: Vec<Song>,
}

impl Playlist {
  pub fn new(name: impl Into<String>, entries: Vec<Song>) -> Self {
    Self {
      name: name.into(),
      entries,
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Sum of the known entry durations.
  pub fn total_duration(&self) -> std::time::Duration {
    self.entries.iter().filter_map(|s| s.duration).sum()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[test]
  fn test_playlist_file() {
    let file = PlaylistFile::from(&Record::from_pairs([
      ("playlist", "Favourites"),
      ("Last-Modified", "2023-05-01T10:00:00Z"),
    ]));
    assert_eq!(file.name, "Favourites");
    assert_eq!(file.last_modified.as_deref(), Some("2023-05-01T10:00:00Z"));
  }

  #[test]
  fn test_total_duration_skips_unknown() {
    let mut a = Song::new("a.mp3");
    a.duration = Some(Duration::from_secs(100));
    let b = Song::new("b.mp3");
    let playlist = Playlist::new("mix", vec![a, b]);
    assert_eq!(playlist.len(), 2);
    assert_eq!(playlist.total_duration(), Duration::from_secs(100));
  }
}
