//! MPD command lines and command lists.
//!
//! Reference: https://mpd.readthedocs.io/en/latest/protocol.html#requests

use std::borrow::Cow;
use std::fmt;

use crate::error::MpdError;

/// Command sent to MPD: a name plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
  name: String,
  args: Vec<String>,
}

impl Command {
  /// Create a command without arguments.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      args: Vec::new(),
    }
  }

  /// Append an argument.
  pub fn arg(mut self, arg: impl ToString) -> Self {
    self.args.push(arg.to_string());
    self
  }

  /// Append an argument only when present.
  pub fn opt_arg<T: ToString>(self, arg: Option<T>) -> Self {
    match arg {
      Some(arg) => self.arg(arg),
      None => self,
    }
  }

  /// Append several arguments.
  pub fn args<I, T>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: ToString,
  {
    self.args.extend(args.into_iter().map(|a| a.to_string()));
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn arguments(&self) -> &[String] {
    &self.args
  }

  /// Render the command as one wire line, without the trailing newline.
  pub fn to_line(&self) -> Result<String, MpdError> {
    if self.name.is_empty()
      || !self
        .name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c == '_')
    {
      return Err(MpdError::InvalidCommand(format!(
        "bad command name {:?}",
        self.name
      )));
    }

    let mut line = self.name.clone();
    for arg in &self.args {
      if let Some(c) = arg.chars().find(|c| c.is_control()) {
        return Err(MpdError::InvalidCommand(format!(
          "control character {:?} in argument of {}",
          c, self.name
        )));
      }
      line.push(' ');
      line.push_str(&escape_arg(arg));
    }
    Ok(line)
  }

  // Playback

  pub fn play() -> Self {
    Self::new("play")
  }

  pub fn play_pos(pos: u32) -> Self {
    Self::new("play").arg(pos)
  }

  pub fn play_id(id: u32) -> Self {
    Self::new("playid").arg(id)
  }

  pub fn pause(paused: bool) -> Self {
    Self::new("pause").arg(u8::from(paused))
  }

  pub fn toggle_pause() -> Self {
    Self::new("pause")
  }

  pub fn stop() -> Self {
    Self::new("stop")
  }

  pub fn next() -> Self {
    Self::new("next")
  }

  pub fn previous() -> Self {
    Self::new("previous")
  }

  pub fn seek(pos: u32, seconds: f64) -> Self {
    Self::new("seek").arg(pos).arg(format_seconds(seconds))
  }

  pub fn seek_id(id: u32, seconds: f64) -> Self {
    Self::new("seekid").arg(id).arg(format_seconds(seconds))
  }

  pub fn seek_current(seconds: f64) -> Self {
    Self::new("seekcur").arg(format_seconds(seconds))
  }

  // Mixer and options

  pub fn set_volume(volume: u8) -> Self {
    Self::new("setvol").arg(volume.min(100))
  }

  pub fn adjust_volume(delta: i8) -> Self {
    Self::new("volume").arg(delta)
  }

  pub fn random(enabled: bool) -> Self {
    Self::new("random").arg(u8::from(enabled))
  }

  pub fn repeat(enabled: bool) -> Self {
    Self::new("repeat").arg(u8::from(enabled))
  }

  pub fn single(enabled: bool) -> Self {
    Self::new("single").arg(u8::from(enabled))
  }

  pub fn consume(enabled: bool) -> Self {
    Self::new("consume").arg(u8::from(enabled))
  }

  pub fn crossfade(seconds: u32) -> Self {
    Self::new("crossfade").arg(seconds)
  }

  // Status

  pub fn status() -> Self {
    Self::new("status")
  }

  pub fn current_song() -> Self {
    Self::new("currentsong")
  }

  pub fn stats() -> Self {
    Self::new("stats")
  }

  pub fn ping() -> Self {
    Self::new("ping")
  }

  pub fn password(password: &str) -> Self {
    Self::new("password").arg(password)
  }

  /// Wait for changes in the given subsystems (all when empty).
  pub fn idle<I, T>(subsystems: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: ToString,
  {
    Self::new("idle").args(subsystems)
  }

  pub fn noidle() -> Self {
    Self::new("noidle")
  }

  pub fn close() -> Self {
    Self::new("close")
  }
}

impl fmt::Display for Command {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name)?;
    for arg in &self.args {
      write!(f, " {}", escape_arg(arg))?;
    }
    Ok(())
  }
}

/// Quote an argument when MPD's tokenizer would not read it back verbatim.
pub fn escape_arg(arg: &str) -> Cow<'_, str> {
  let safe = !arg.is_empty()
    && arg
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | ':' | ','));
  if safe {
    return Cow::Borrowed(arg);
  }

  let mut quoted = String::with_capacity(arg.len() + 2);
  quoted.push('"');
  for c in arg.chars() {
    if c == '"' || c == '\\' {
      quoted.push('\\');
    }
    quoted.push(c);
  }
  quoted.push('"');
  Cow::Owned(quoted)
}

fn format_seconds(seconds: f64) -> String {
  if seconds.fract() == 0.0 {
    format!("{}", seconds as i64)
  } else {
    format!("{:.3}", seconds)
  }
}

/// A batch of commands executed server-side as one unit.
///
/// A failing command aborts the rest of the list; the ACK carries its index.
#[derive(Debug, Clone, Default)]
pub struct CommandList {
  commands: Vec<Command>,
  ok_separated: bool,
}

impl CommandList {
  /// Start a list rendered with `command_list_begin`.
  pub fn begin() -> Self {
    Self::default()
  }

  /// Start a list rendered with `command_list_ok_begin`, so every command's
  /// output is terminated by `list_OK`.
  pub fn begin_ok() -> Self {
    Self {
      commands: Vec::new(),
      ok_separated: true,
    }
  }

  pub fn add(mut self, command: Command) -> Self {
    self.commands.push(command);
    self
  }

  pub fn push(&mut self, command: Command) {
    self.commands.push(command);
  }

  pub fn len(&self) -> usize {
    self.commands.len()
  }

  pub fn is_empty(&self) -> bool {
    self.commands.is_empty()
  }

  pub fn is_ok_separated(&self) -> bool {
    self.ok_separated
  }

  pub fn commands(&self) -> &[Command] {
    &self.commands
  }

  /// Render the whole list as one transmission, newline-terminated.
  pub fn to_wire(&self) -> Result<String, MpdError> {
    let mut wire = String::from(if self.ok_separated {
      "command_list_ok_begin\n"
    } else {
      "command_list_begin\n"
    });
    for command in &self.commands {
      wire.push_str(&command.to_line()?);
      wire.push('\n');
    }
    wire.push_str("command_list_end\n");
    Ok(wire)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Splits a request line the way MPD's tokenizer does.
  fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
      while chars.peek() == Some(&' ') {
        chars.next();
      }
      let Some(&first) = chars.peek() else {
        break;
      };
      let mut token = String::new();
      if first == '"' {
        chars.next();
        while let Some(c) = chars.next() {
          match c {
            '\\' => token.extend(chars.next()),
            '"' => break,
            _ => token.push(c),
          }
        }
      } else {
        while let Some(&c) = chars.peek() {
          if c == ' ' {
            break;
          }
          token.push(c);
          chars.next();
        }
      }
      tokens.push(token);
    }
    tokens
  }

  #[test]
  fn test_safe_arguments_pass_through() {
    let cmd = Command::new("add").arg("Artist/Album/01-track.flac");
    assert_eq!(cmd.to_line().unwrap(), "add Artist/Album/01-track.flac");
    assert_eq!(Command::play_pos(3).to_line().unwrap(), "play 3");
  }

  #[test]
  fn test_escaping_round_trip() {
    let args = [
      "Pink Floyd",
      "say \"hello\"",
      "C:\\music\\a b",
      "trailing\\",
      "",
      "it's",
      "\"",
      "ünïcödé name",
      "a  b",
    ];
    for arg in args {
      let line = Command::new("find").arg("artist").arg(arg).to_line().unwrap();
      let tokens = tokenize(&line);
      assert_eq!(tokens, vec!["find".to_string(), "artist".into(), arg.into()], "{line}");
    }
  }

  #[test]
  fn test_control_characters_rejected() {
    let err = Command::new("add").arg("bad\nplay").to_line().unwrap_err();
    assert!(matches!(err, MpdError::InvalidCommand(_)));
    assert!(Command::new("add").arg("tab\there").to_line().is_err());
  }

  #[test]
  fn test_bad_command_name_rejected() {
    assert!(Command::new("").to_line().is_err());
    assert!(Command::new("play now").to_line().is_err());
  }

  #[test]
  fn test_command_list_wire() {
    let list = CommandList::begin()
      .add(Command::new("add").arg("a.mp3"))
      .add(Command::new("add").arg("b c.mp3"))
      .add(Command::play());
    assert_eq!(
      list.to_wire().unwrap(),
      "command_list_begin\nadd a.mp3\nadd \"b c.mp3\"\nplay\ncommand_list_end\n"
    );

    let ok_list = CommandList::begin_ok().add(Command::status());
    assert!(ok_list.to_wire().unwrap().starts_with("command_list_ok_begin\n"));
  }

  #[test]
  fn test_seek_formatting() {
    assert_eq!(Command::seek(1, 30.0).to_line().unwrap(), "seek 1 30");
    assert_eq!(Command::seek_current(1.5).to_line().unwrap(), "seekcur 1.500");
  }
}
