//! Sticker values attached to songs.

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::error::MpdError;

/// One `name=value` sticker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Sticker {
  pub name: String,
  pub value: String,
}

impl Sticker {
  /// Parse the value of a `sticker:` line.
  pub fn parse(raw: &str) -> Result<Self, MpdError> {
    let (name, value) = raw
      .split_once('=')
      .ok_or_else(|| MpdError::Parse(format!("sticker without '=': {raw:?}")))?;
    Ok(Self {
      name: name.to_string(),
      value: value.to_string(),
    })
  }
}
