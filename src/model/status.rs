//! Player status from the `status` command.

use std::fmt;
use std::time::Duration;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use super::{get_string, parse_flag, parse_num, parse_seconds};
use crate::protocol::Record;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum PlayState {
  #[default]
  Stopped,
  Playing,
  Paused,
}

impl PlayState {
  fn from_mpd(value: Option<&str>) -> Self {
    match value {
      Some("play") => Self::Playing,
      Some("pause") => Self::Paused,
      Some("stop") | None => Self::Stopped,
      Some(other) => {
        log::debug!("Unknown play state {:?}, assuming stopped", other);
        Self::Stopped
      }
    }
  }
}

impl fmt::Display for PlayState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Stopped => "stop",
      Self::Playing => "play",
      Self::Paused => "pause",
    })
  }
}

/// Snapshot of the player state.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Status {
  pub state: PlayState,
  /// `None` when the server has no mixer.
  pub volume: Option<u8>,
  pub repeat: bool,
  pub random: bool,
  pub single: bool,
  pub consume: bool,
  /// Queue version; bumps on every queue change.
  pub playlist_version: u32,
  pub playlist_length: u32,
  /// Queue position of the current song.
  pub song_pos: Option<u32>,
  pub song_id: Option<u32>,
  pub next_song_pos: Option<u32>,
  pub next_song_id: Option<u32>,
  pub elapsed: Option<Duration>,
  pub duration: Option<Duration>,
  /// kbit/s.
  pub bitrate: Option<u32>,
  pub crossfade: Option<u32>,
  /// `samplerate:bits:channels`.
  pub audio: Option<String>,
  /// Job id of a running database update.
  pub updating_db: Option<u32>,
  pub error: Option<String>,
}

impl Status {
  pub fn is_playing(&self) -> bool {
    self.state == PlayState::Playing
  }

  pub fn is_updating(&self) -> bool {
    self.updating_db.is_some()
  }
}

/// Split the legacy `time: elapsed:total` field.
fn parse_time_pair(record: &Record) -> (Option<Duration>, Option<Duration>) {
  let Some((elapsed, total)) = record.get("time").and_then(|t| t.split_once(':')) else {
    return (None, None);
  };
  (
    elapsed.trim().parse().ok().map(Duration::from_secs),
    total.trim().parse().ok().map(Duration::from_secs),
  )
}

impl From<&Record> for Status {
  fn from(record: &Record) -> Self {
    let (legacy_elapsed, legacy_total) = parse_time_pair(record);

    Self {
      state: PlayState::from_mpd(record.get("state")),
      volume: parse_num::<i32>(record, "volume")
        .filter(|v| (0..=100).contains(v))
        .map(|v| v as u8),
      repeat: parse_flag(record, "repeat"),
      random: parse_flag(record, "random"),
      single: matches!(record.get("single"), Some("1") | Some("oneshot")),
      consume: matches!(record.get("consume"), Some("1") | Some("oneshot")),
      playlist_version: parse_num(record, "playlist").unwrap_or(0),
      playlist_length: parse_num(record, "playlistlength").unwrap_or(0),
      song_pos: parse_num(record, "song"),
      song_id: parse_num(record, "songid"),
      next_song_pos: parse_num(record, "nextsong"),
      next_song_id: parse_num(record, "nextsongid"),
      elapsed: parse_seconds(record, "elapsed").or(legacy_elapsed),
      duration: parse_seconds(record, "duration").or(legacy_total),
      bitrate: parse_num(record, "bitrate"),
      crossfade: parse_num(record, "xfade"),
      audio: get_string(record, "audio"),
      updating_db: parse_num(record, "updating_db"),
      error: get_string(record, "error"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_playing_status() {
    let record = Record::from_pairs([
      ("volume", "65"),
      ("repeat", "1"),
      ("random", "0"),
      ("single", "oneshot"),
      ("consume", "0"),
      ("playlist", "42"),
      ("playlistlength", "12"),
      ("state", "play"),
      ("song", "3"),
      ("songid", "27"),
      ("time", "61:240"),
      ("elapsed", "61.337"),
      ("bitrate", "320"),
      ("audio", "44100:24:2"),
      ("updating_db", "7"),
    ]);
    let status = Status::from(&record);
    assert!(status.is_playing());
    assert_eq!(status.volume, Some(65));
    assert!(status.repeat);
    assert!(!status.random);
    assert!(status.single);
    assert_eq!(status.playlist_version, 42);
    assert_eq!(status.song_pos, Some(3));
    assert_eq!(status.song_id, Some(27));
    assert_eq!(status.elapsed, Some(Duration::from_millis(61_337)));
    assert_eq!(status.duration, Some(Duration::from_secs(240)));
    assert_eq!(status.updating_db, Some(7));
    assert!(status.is_updating());
  }

  #[test]
  fn test_no_mixer_and_stopped() {
    let status = Status::from(&Record::from_pairs([("volume", "-1"), ("state", "stop")]));
    assert_eq!(status.volume, None);
    assert_eq!(status.state, PlayState::Stopped);
    assert_eq!(status.song_pos, None);
    assert_eq!(status.elapsed, None);
  }

  #[test]
  fn test_garbage_fields_degrade() {
    let status = Status::from(&Record::from_pairs([
      ("state", "dancing"),
      ("playlist", "many"),
      ("elapsed", "NaN"),
    ]));
    assert_eq!(status.state, PlayState::Stopped);
    assert_eq!(status.playlist_version, 0);
    assert_eq!(status.elapsed, None);
  }
}
