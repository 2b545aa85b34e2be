//! Server statistics from the `stats` command.

use std::time::Duration;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use super::parse_num;
use crate::protocol::Record;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Statistics {
  pub artists: Option<u64>,
  pub albums: Option<u64>,
  pub songs: Option<u64>,
  pub uptime: Option<Duration>,
  pub playtime: Option<Duration>,
  /// Sum of all song durations in the database.
  pub db_playtime: Option<Duration>,
  /// Unix time of the last database update.
  pub db_update: Option<u64>,
}

impl From<&Record> for Statistics {
  fn from(record: &Record) -> Self {
    let secs = |key| parse_num::<u64>(record, key).map(Duration::from_secs);
    Self {
      artists: parse_num(record, "artists"),
      albums: parse_num(record, "albums"),
      songs: parse_num(record, "songs"),
      uptime: secs("uptime"),
      playtime: secs("playtime"),
      db_playtime: secs("db_playtime"),
      db_update: parse_num(record, "db_update"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_stats() {
    let stats = Statistics::from(&Record::from_pairs([
      ("artists", "120"),
      ("albums", "300"),
      ("songs", "4012"),
      ("uptime", "3600"),
      ("db_playtime", "oops"),
    ]));
    assert_eq!(stats.songs, Some(4012));
    assert_eq!(stats.uptime, Some(Duration::from_secs(3600)));
    assert_eq!(stats.db_playtime, None);
    assert_eq!(stats.db_update, None);
  }
}
