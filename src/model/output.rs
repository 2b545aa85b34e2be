//! Audio outputs from the `outputs` command.

use std::hash::{Hash, Hasher};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use super::{get_string, parse_flag, parse_num};
use crate::protocol::Record;

/// An audio output; equal when the ids match.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Output {
  pub id: u32,
  pub name: String,
  /// Output plugin, e.g. `alsa` or `httpd`.
  pub plugin: Option<String>,
  pub enabled: bool,
}

impl From<&Record> for Output {
  fn from(record: &Record) -> Self {
    Self {
      id: parse_num(record, "outputid").unwrap_or_default(),
      name: record.get("outputname").unwrap_or_default().to_string(),
      plugin: get_string(record, "plugin"),
      enabled: parse_flag(record, "outputenabled"),
    }
  }
}

impl PartialEq for Output {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for Output {}

impl Hash for Output {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}
