//! Song entries from `playlistinfo`, `find`, `lsinfo`, `currentsong`...

use std::hash::{Hash, Hasher};
use std::time::Duration;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use super::{get_string, parse_fraction, parse_num, parse_seconds};
use crate::protocol::Record;

/// A song, either in the database or in the play queue.
///
/// Two songs are equal when they refer to the same file.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Song {
  /// Path relative to the music directory, or a stream URL.
  pub file: String,
  pub title: Option<String>,
  pub artist: Option<String>,
  pub album: Option<String>,
  pub album_artist: Option<String>,
  pub composer: Option<String>,
  pub genre: Option<String>,
  /// Stream name for radio entries.
  pub name: Option<String>,
  /// Raw `Date` tag.
  pub date: Option<String>,
  /// `None` when the tag is missing or malformed; 0 is a valid track.
  pub track: Option<u32>,
  pub total_tracks: Option<u32>,
  pub disc: Option<u32>,
  pub total_discs: Option<u32>,
  /// `None` when unknown.
  pub duration: Option<Duration>,
  /// Position in the queue, for queue entries.
  pub pos: Option<u32>,
  /// Queue id, for queue entries.
  pub id: Option<u32>,
  pub last_modified: Option<String>,
}

impl Song {
  pub fn new(file: impl Into<String>) -> Self {
    Self {
      file: file.into(),
      ..Self::default()
    }
  }

  /// Year from the leading digits of `Date` (`2004`, `2004-03-01`).
  pub fn year(&self) -> Option<i32> {
    let date = self.date.as_deref()?;
    let digits: String = date.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() == 4 {
      digits.parse().ok()
    } else {
      None
    }
  }

  /// Whether this entry is a network stream rather than a library file.
  pub fn is_stream(&self) -> bool {
    self.file.contains("://")
  }

  /// Title, falling back to the stream name, then the file's basename.
  pub fn display_title(&self) -> &str {
    self
      .title
      .as_deref()
      .or(self.name.as_deref())
      .unwrap_or_else(|| self.file.rsplit('/').next().unwrap_or(self.file.as_str()))
  }

  /// Album artist when tagged, otherwise the track artist.
  pub fn effective_album_artist(&self) -> Option<&str> {
    self.album_artist.as_deref().or(self.artist.as_deref())
  }
}

impl From<&Record> for Song {
  fn from(record: &Record) -> Self {
    let (track, total_tracks) = parse_fraction(record, "track");
    let (disc, total_discs) = parse_fraction(record, "disc");

    // `duration` carries milliseconds since 0.20; `Time` is whole seconds.
    let duration = parse_seconds(record, "duration").or_else(|| {
      parse_num::<u64>(record, "time").map(Duration::from_secs)
    });

    Self {
      file: record.get("file").unwrap_or_default().to_string(),
      title: get_string(record, "title"),
      artist: get_string(record, "artist"),
      album: get_string(record, "album"),
      album_artist: get_string(record, "albumartist"),
      composer: get_string(record, "composer"),
      genre: get_string(record, "genre"),
      name: get_string(record, "name"),
      date: get_string(record, "date"),
      track,
      total_tracks,
      disc,
      total_discs,
      duration,
      pos: parse_num(record, "pos"),
      id: parse_num(record, "id"),
      last_modified: get_string(record, "last-modified"),
    }
  }
}

impl PartialEq for Song {
  fn eq(&self, other: &Self) -> bool {
    self.file == other.file
  }
}

impl Eq for Song {}

impl Hash for Song {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.file.hash(state);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record(pairs: &[(&str, &str)]) -> Record {
    Record::from_pairs(pairs.iter().copied())
  }

  #[test]
  fn test_full_song() {
    let song = Song::from(&record(&[
      ("file", "Pink Floyd/Animals/01 Pigs on the Wing.flac"),
      ("Title", "Pigs on the Wing (Part One)"),
      ("Artist", "Pink Floyd"),
      ("AlbumArtist", "Pink Floyd"),
      ("Album", "Animals"),
      ("Track", "1/5"),
      ("Disc", "1"),
      ("Date", "1977-01-23"),
      ("Genre", "Rock"),
      ("Time", "85"),
      ("duration", "85.320"),
      ("Pos", "4"),
      ("Id", "17"),
    ]));
    assert_eq!(song.title.as_deref(), Some("Pigs on the Wing (Part One)"));
    assert_eq!(song.track, Some(1));
    assert_eq!(song.total_tracks, Some(5));
    assert_eq!(song.disc, Some(1));
    assert_eq!(song.year(), Some(1977));
    assert_eq!(song.duration, Some(Duration::from_millis(85_320)));
    assert_eq!(song.pos, Some(4));
    assert_eq!(song.id, Some(17));
  }

  #[test]
  fn test_missing_time_is_unknown() {
    let song = Song::from(&record(&[("file", "a.mp3"), ("Title", "A")]));
    assert_eq!(song.duration, None);
    assert_eq!(song.track, None);
  }

  #[test]
  fn test_whole_second_time() {
    let song = Song::from(&record(&[("file", "a.mp3"), ("Time", "215")]));
    assert_eq!(song.duration, Some(Duration::from_secs(215)));
  }

  #[test]
  fn test_malformed_numbers_degrade() {
    let song = Song::from(&record(&[
      ("file", "corrupt.mp3"),
      ("Track", "A1"),
      ("Time", "-"),
      ("Pos", "??"),
    ]));
    assert_eq!(song.track, None);
    assert_eq!(song.duration, None);
    assert_eq!(song.pos, None);
  }

  #[test]
  fn test_track_zero_is_kept() {
    let song = Song::from(&record(&[("file", "hidden.flac"), ("Track", "0")]));
    assert_eq!(song.track, Some(0));
  }

  #[test]
  fn test_equality_on_file() {
    let mut a = Song::new("x.mp3");
    a.id = Some(1);
    let mut b = Song::new("x.mp3");
    b.title = Some("other".into());
    assert_eq!(a, b);
    assert_ne!(a, Song::new("y.mp3"));
  }

  #[test]
  fn test_display_title_fallbacks() {
    assert_eq!(Song::new("dir/track.ogg").display_title(), "track.ogg");
    let mut radio = Song::new("http://radio.example/stream");
    radio.name = Some("Radio X".into());
    assert!(radio.is_stream());
    assert_eq!(radio.display_title(), "Radio X");
  }
}
