//! MPD response framing and record segmentation.

use std::collections::HashMap;

use crate::error::{AckCode, AckError, MpdError};

/// How one response line ends a response, if it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
  /// `OK`: the command succeeded.
  Ok,
  /// `list_OK`: one command inside a `command_list_ok_begin` list finished.
  ListOk,
  /// `ACK [code@index] {command} message`: the command failed.
  Ack(AckError),
}

impl Terminator {
  /// Classify a line, returning `None` for ordinary `key: value` lines.
  pub fn parse(line: &str) -> Result<Option<Self>, MpdError> {
    if line == "OK" {
      Ok(Some(Self::Ok))
    } else if line == "list_OK" {
      Ok(Some(Self::ListOk))
    } else if line.starts_with("ACK") {
      parse_ack(line).map(|ack| Some(Self::Ack(ack)))
    } else {
      Ok(None)
    }
  }
}

/// Parse `ACK [code@index] {command} message`.
pub fn parse_ack(line: &str) -> Result<AckError, MpdError> {
  let malformed = || MpdError::Protocol(format!("malformed ACK line: {line}"));

  let rest = line.strip_prefix("ACK").ok_or_else(malformed)?.trim_start();
  let rest = rest.strip_prefix('[').ok_or_else(malformed)?;
  let (location, rest) = rest.split_once(']').ok_or_else(malformed)?;
  let (code, index) = location.split_once('@').ok_or_else(malformed)?;
  let code: u32 = code.trim().parse().map_err(|_| malformed())?;
  let index: u32 = index.trim().parse().map_err(|_| malformed())?;

  let rest = rest.trim_start();
  let (command, message) = match rest.strip_prefix('{') {
    Some(braced) => {
      let (command, message) = braced.split_once('}').ok_or_else(malformed)?;
      (command.to_string(), message.trim_start())
    }
    None => (String::new(), rest),
  };

  Ok(AckError {
    code: AckCode::from_code(code),
    index,
    command,
    message: message.to_string(),
  })
}

/// Split a `key: value` line on its first `": "`.
pub fn parse_pair(line: &str) -> Result<(&str, &str), MpdError> {
  line
    .split_once(": ")
    .ok_or_else(|| MpdError::Parse(format!("expected 'key: value', got {line:?}")))
}

/// Raw lines of one successful response, terminator excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
  lines: Vec<String>,
}

impl Response {
  /// Wrap lines that are known not to contain a terminator.
  pub fn new(lines: Vec<String>) -> Self {
    Self { lines }
  }

  /// Build a response from raw lines up to and including the terminator.
  ///
  /// `ACK` fails with [`MpdError::Server`]; a missing terminator is a
  /// protocol error. Lines after the terminator are rejected.
  pub fn from_raw<I, S>(raw: I) -> Result<Self, MpdError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut lines = Vec::new();
    let mut raw = raw.into_iter();
    while let Some(line) = raw.next() {
      let line = line.into();
      match Terminator::parse(&line)? {
        Some(Terminator::Ok) => {
          if raw.next().is_some() {
            return Err(MpdError::Protocol("data after OK".into()));
          }
          return Ok(Self { lines });
        }
        Some(Terminator::Ack(ack)) => return Err(MpdError::Server(ack)),
        Some(Terminator::ListOk) => {
          return Err(MpdError::Protocol("unexpected list_OK".into()));
        }
        None => {
          parse_pair(&line)?;
          lines.push(line);
        }
      }
    }
    Err(MpdError::Protocol("response ended without OK".into()))
  }

  pub fn lines(&self) -> &[String] {
    &self.lines
  }

  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }

  /// Iterate over `(key, value)` pairs.
  pub fn pairs(&self) -> impl Iterator<Item = Result<(&str, &str), MpdError>> {
    self.lines.iter().map(|line| parse_pair(line))
  }

  /// Values of every line whose key matches `key` (case-insensitive).
  pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    self
      .pairs()
      .filter_map(Result::ok)
      .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
      .map(|(_, v)| v)
  }

  /// Lazily split into records, starting a new one at every boundary key.
  pub fn records<'a>(&'a self, boundaries: &'a [&'a str]) -> Records<'a> {
    Records {
      lines: self.lines.iter(),
      boundaries,
      pending: None,
    }
  }

  /// The whole response as one record (`status`, `currentsong`, `stats`).
  pub fn record(&self) -> Result<Record, MpdError> {
    let mut record = Record::default();
    for pair in self.pairs() {
      let (key, value) = pair?;
      record.insert(key, value);
    }
    Ok(record)
  }
}

/// One entity's worth of `key: value` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
  kind: Option<String>,
  fields: HashMap<String, String>,
}

impl Record {
  /// Build a record from pairs; later duplicates overwrite earlier ones.
  pub fn from_pairs<'a, I>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (&'a str, &'a str)>,
  {
    let mut record = Self::default();
    for (key, value) in pairs {
      record.insert(key, value);
    }
    record
  }

  fn insert(&mut self, key: &str, value: &str) {
    let key = key.to_ascii_lowercase();
    if let Some(old) = self.fields.insert(key, value.to_string()) {
      log::debug!("Duplicate key in record, replaced {:?} with {:?}", old, value);
    }
  }

  /// The boundary key that opened this record, if any.
  pub fn kind(&self) -> Option<&str> {
    self.kind.as_deref()
  }

  /// Value for `key`, matched case-insensitively.
  pub fn get(&self, key: &str) -> Option<&str> {
    if key.bytes().any(|b| b.is_ascii_uppercase()) {
      self.fields.get(&key.to_ascii_lowercase()).map(String::as_str)
    } else {
      self.fields.get(key).map(String::as_str)
    }
  }

  pub fn contains(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  pub fn len(&self) -> usize {
    self.fields.len()
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }
}

/// Forward-only iterator over the records of a response.
pub struct Records<'a> {
  lines: std::slice::Iter<'a, String>,
  boundaries: &'a [&'a str],
  pending: Option<Record>,
}

impl Records<'_> {
  fn is_boundary(&self, key: &str) -> bool {
    self.boundaries.iter().any(|b| b.eq_ignore_ascii_case(key))
  }
}

impl Iterator for Records<'_> {
  type Item = Result<Record, MpdError>;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(line) = self.lines.next() {
      let (key, value) = match parse_pair(line) {
        Ok(pair) => pair,
        Err(e) => {
          self.pending = None;
          return Some(Err(e));
        }
      };

      if self.is_boundary(key) {
        let mut next = Record {
          kind: Some(key.to_ascii_lowercase()),
          fields: HashMap::new(),
        };
        next.insert(key, value);
        if let Some(done) = self.pending.replace(next) {
          return Some(Ok(done));
        }
      } else {
        self.pending.get_or_insert_with(Record::default).insert(key, value);
      }
    }
    self.pending.take().map(Ok)
  }
}
