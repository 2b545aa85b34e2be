//! Typed MPD entities built from response records.
//!
//! Builders never fail on bad metadata: a field that does not parse is
//! logged and left unset, so one corrupt tag cannot hide a whole listing.

mod directory;
mod output;
mod playlist;
mod song;
mod stats;
mod status;
mod sticker;

pub use directory::{Directory, DirectoryTree, ROOT};
pub use output::Output;
pub use playlist::{Playlist, PlaylistFile};
pub use song::Song;
pub use stats::Statistics;
pub use status::{PlayState, Status};
pub use sticker::Sticker;

use std::str::FromStr;
use std::time::Duration;

use crate::protocol::Record;

/// Parse a numeric field, degrading to `None` on garbage.
pub(crate) fn parse_num<T: FromStr>(record: &Record, key: &str) -> Option<T> {
  let raw = record.get(key)?;
  match raw.trim().parse() {
    Ok(value) => Some(value),
    Err(_) => {
      log::debug!("Ignoring malformed {} value {:?}", key, raw);
      None
    }
  }
}

/// Parse `n` or `n/total` as used by `Track` and `Disc`.
pub(crate) fn parse_fraction(record: &Record, key: &str) -> (Option<u32>, Option<u32>) {
  let Some(raw) = record.get(key) else {
    return (None, None);
  };
  let (number, total) = match raw.split_once('/') {
    Some((number, total)) => (number, Some(total)),
    None => (raw, None),
  };
  let number = number.trim().parse().ok();
  let total = total.and_then(|t| t.trim().parse().ok());
  if number.is_none() {
    log::debug!("Ignoring malformed {} value {:?}", key, raw);
  }
  (number, total)
}

/// Parse fractional seconds (`elapsed`, `duration`).
pub(crate) fn parse_seconds(record: &Record, key: &str) -> Option<Duration> {
  let seconds: f64 = parse_num(record, key)?;
  if seconds.is_finite() && seconds >= 0.0 {
    Some(Duration::from_secs_f64(seconds))
  } else {
    log::debug!("Ignoring out of range {} value {}", key, seconds);
    None
  }
}

pub(crate) fn parse_flag(record: &Record, key: &str) -> bool {
  matches!(record.get(key), Some("1"))
}

pub(crate) fn get_string(record: &Record, key: &str) -> Option<String> {
  record
    .get(key)
    .filter(|v| !v.is_empty())
    .map(str::to_string)
}
