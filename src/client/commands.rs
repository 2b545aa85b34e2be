//! Typed command methods.

use std::time::Duration;

use super::MpdClient;
use crate::error::{AckCode, MpdError};
use crate::model::{
  Directory, DirectoryTree, Output, Playlist, PlaylistFile, Song, Statistics, Status, Sticker,
};
use crate::protocol::{Command, CommandList, Record, Response};

/// Songs of a listing, one per `file:` record.
fn songs(response: &Response) -> Result<Vec<Song>, MpdError> {
  let mut songs = Vec::new();
  for record in response.records(&["file"]) {
    let record = record?;
    if record.kind().is_none() {
      log::debug!("Skipping {} fields before the first song", record.len());
      continue;
    }
    songs.push(Song::from(&record));
  }
  Ok(songs)
}

fn items<T>(response: &Response, boundary: &str) -> Result<Vec<T>, MpdError>
where
  T: for<'a> From<&'a Record>,
{
  response
    .records(&[boundary])
    .filter(|r| !matches!(r, Ok(record) if record.kind().is_none()))
    .map(|r| r.map(|record| T::from(&record)))
    .collect()
}

/// Append `tag value` filter pairs.
fn with_filters(command: Command, filters: &[(&str, &str)]) -> Command {
  filters
    .iter()
    .fold(command, |command, (tag, value)| command.arg(tag).arg(value))
}

fn parse_id(response: &Response, key: &str) -> Result<u32, MpdError> {
  let raw = response
    .values(key)
    .next()
    .ok_or_else(|| MpdError::Parse(format!("response has no {key}")))?;
  raw
    .parse()
    .map_err(|_| MpdError::Parse(format!("bad {key}: {raw:?}")))
}

impl MpdClient {
  async fn run(&self, command: Command) -> Result<(), MpdError> {
    self.execute(command).await.map(drop)
  }

  pub async fn ping(&self) -> Result<(), MpdError> {
    self.run(Command::ping()).await
  }

  // Playback

  pub async fn play(&self) -> Result<(), MpdError> {
    self.run(Command::play()).await
  }

  /// Start playing at a queue position.
  pub async fn play_pos(&self, pos: u32) -> Result<(), MpdError> {
    self.run(Command::play_pos(pos)).await
  }

  /// Start playing the queue entry with `id`.
  pub async fn play_id(&self, id: u32) -> Result<(), MpdError> {
    self.run(Command::play_id(id)).await
  }

  pub async fn pause(&self, paused: bool) -> Result<(), MpdError> {
    self.run(Command::pause(paused)).await
  }

  pub async fn toggle_pause(&self) -> Result<(), MpdError> {
    self.run(Command::toggle_pause()).await
  }

  pub async fn stop(&self) -> Result<(), MpdError> {
    self.run(Command::stop()).await
  }

  pub async fn next(&self) -> Result<(), MpdError> {
    self.run(Command::next()).await
  }

  pub async fn previous(&self) -> Result<(), MpdError> {
    self.run(Command::previous()).await
  }

  pub async fn seek(&self, pos: u32, position: Duration) -> Result<(), MpdError> {
    self.run(Command::seek(pos, position.as_secs_f64())).await
  }

  pub async fn seek_id(&self, id: u32, position: Duration) -> Result<(), MpdError> {
    self.run(Command::seek_id(id, position.as_secs_f64())).await
  }

  /// Seek within the current song.
  pub async fn seek_current(&self, position: Duration) -> Result<(), MpdError> {
    self.run(Command::seek_current(position.as_secs_f64())).await
  }

  // Mixer and options

  pub async fn set_volume(&self, volume: u8) -> Result<(), MpdError> {
    if volume > 100 {
      return Err(MpdError::InvalidCommand(format!(
        "volume {volume} out of range 0-100"
      )));
    }
    self.run(Command::set_volume(volume)).await
  }

  pub async fn adjust_volume(&self, delta: i8) -> Result<(), MpdError> {
    self.run(Command::adjust_volume(delta)).await
  }

  pub async fn set_random(&self, enabled: bool) -> Result<(), MpdError> {
    self.run(Command::random(enabled)).await
  }

  pub async fn set_repeat(&self, enabled: bool) -> Result<(), MpdError> {
    self.run(Command::repeat(enabled)).await
  }

  pub async fn set_single(&self, enabled: bool) -> Result<(), MpdError> {
    self.run(Command::single(enabled)).await
  }

  pub async fn set_consume(&self, enabled: bool) -> Result<(), MpdError> {
    self.run(Command::consume(enabled)).await
  }

  pub async fn set_crossfade(&self, crossfade: Duration) -> Result<(), MpdError> {
    let seconds = u32::try_from(crossfade.as_secs()).unwrap_or(u32::MAX);
    self.run(Command::crossfade(seconds)).await
  }

  // Queries

  /// Fresh status from the server; see also
  /// [`status_snapshot`](MpdClient::status_snapshot).
  pub async fn status(&self) -> Result<Status, MpdError> {
    let response = self.execute(Command::status()).await?;
    Ok(Status::from(&response.record()?))
  }

  pub async fn current_song(&self) -> Result<Option<Song>, MpdError> {
    let response = self.execute(Command::current_song()).await?;
    if response.is_empty() {
      return Ok(None);
    }
    Ok(Some(Song::from(&response.record()?)))
  }

  pub async fn stats(&self) -> Result<Statistics, MpdError> {
    let response = self.execute(Command::stats()).await?;
    Ok(Statistics::from(&response.record()?))
  }

  /// The whole play queue.
  pub async fn queue(&self) -> Result<Vec<Song>, MpdError> {
    songs(&self.execute(Command::new("playlistinfo")).await?)
  }

  /// Queue entries changed since queue version `version`.
  pub async fn queue_changes(&self, version: u32) -> Result<Vec<Song>, MpdError> {
    songs(&self.execute(Command::new("plchanges").arg(version)).await?)
  }

  // Queue editing

  pub async fn add(&self, uri: &str) -> Result<(), MpdError> {
    self.run(Command::new("add").arg(uri)).await
  }

  /// Add one song and return its queue id.
  pub async fn add_id(&self, uri: &str, pos: Option<u32>) -> Result<u32, MpdError> {
    let response = self
      .execute(Command::new("addid").arg(uri).opt_arg(pos))
      .await?;
    parse_id(&response, "Id")
  }

  /// Add several URIs atomically; nothing is added if one fails.
  pub async fn add_all<I, S>(&self, uris: I) -> Result<(), MpdError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let list = uris.into_iter().fold(CommandList::begin(), |list, uri| {
      list.add(Command::new("add").arg(uri.as_ref()))
    });
    self.execute_list(list).await.map(drop)
  }

  pub async fn delete(&self, pos: u32) -> Result<(), MpdError> {
    self.run(Command::new("delete").arg(pos)).await
  }

  pub async fn delete_id(&self, id: u32) -> Result<(), MpdError> {
    self.run(Command::new("deleteid").arg(id)).await
  }

  pub async fn clear(&self) -> Result<(), MpdError> {
    self.run(Command::new("clear")).await
  }

  pub async fn move_song(&self, from: u32, to: u32) -> Result<(), MpdError> {
    self.run(Command::new("move").arg(from).arg(to)).await
  }

  pub async fn swap(&self, pos1: u32, pos2: u32) -> Result<(), MpdError> {
    self.run(Command::new("swap").arg(pos1).arg(pos2)).await
  }

  pub async fn shuffle(&self) -> Result<(), MpdError> {
    self.run(Command::new("shuffle")).await
  }

  // Database

  /// Contents of one music directory.
  pub async fn lsinfo(&self, path: &str) -> Result<Directory, MpdError> {
    let mut tree = DirectoryTree::new();
    self.browse(&mut tree, path).await?;
    tree
      .get(path)
      .cloned()
      .ok_or_else(|| MpdError::Parse(format!("listing of {path:?} not stored")))
  }

  /// Fetch the listing of `path` into `tree`.
  pub async fn browse(&self, tree: &mut DirectoryTree, path: &str) -> Result<(), MpdError> {
    let command = Command::new("lsinfo").opt_arg((!path.is_empty()).then_some(path));
    let response = self.execute(command).await?;
    let records = response
      .records(&["directory", "file", "playlist"])
      .collect::<Result<Vec<_>, _>>()?;
    tree.insert_listing(path, records);
    Ok(())
  }

  /// Songs whose tags match every `(tag, value)` filter exactly.
  pub async fn find(&self, filters: &[(&str, &str)]) -> Result<Vec<Song>, MpdError> {
    songs(&self.execute(with_filters(Command::new("find"), filters)).await?)
  }

  /// Case-insensitive substring search.
  pub async fn search(&self, filters: &[(&str, &str)]) -> Result<Vec<Song>, MpdError> {
    songs(&self.execute(with_filters(Command::new("search"), filters)).await?)
  }

  /// Distinct values of `tag`, optionally narrowed by filters.
  pub async fn list_tag(&self, tag: &str, filters: &[(&str, &str)]) -> Result<Vec<String>, MpdError> {
    let response = self
      .execute(with_filters(Command::new("list").arg(tag), filters))
      .await?;
    Ok(
      response
        .values(tag)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect(),
    )
  }

  pub async fn artists(&self) -> Result<Vec<String>, MpdError> {
    self.list_tag("artist", &[]).await
  }

  /// Albums, optionally only those of `artist`.
  pub async fn albums(&self, artist: Option<&str>) -> Result<Vec<String>, MpdError> {
    match artist {
      Some(artist) => self.list_tag("album", &[("artist", artist)]).await,
      None => self.list_tag("album", &[]).await,
    }
  }

  pub async fn songs_by_album(&self, album: &str, artist: Option<&str>) -> Result<Vec<Song>, MpdError> {
    match artist {
      Some(artist) => self.find(&[("album", album), ("albumartist", artist)]).await,
      None => self.find(&[("album", album)]).await,
    }
  }

  /// Start a database update and return its job id.
  pub async fn update(&self, path: Option<&str>) -> Result<u32, MpdError> {
    let response = self.execute(Command::new("update").opt_arg(path)).await?;
    parse_id(&response, "updating_db")
  }

  // Stored playlists

  pub async fn playlists(&self) -> Result<Vec<PlaylistFile>, MpdError> {
    items(&self.execute(Command::new("listplaylists")).await?, "playlist")
  }

  pub async fn playlist(&self, name: &str) -> Result<Playlist, MpdError> {
    let response = self.execute(Command::new("listplaylistinfo").arg(name)).await?;
    Ok(Playlist::new(name, songs(&response)?))
  }

  pub async fn load_playlist(&self, name: &str) -> Result<(), MpdError> {
    self.run(Command::new("load").arg(name)).await
  }

  /// Save the queue as a stored playlist.
  pub async fn save_playlist(&self, name: &str) -> Result<(), MpdError> {
    self.run(Command::new("save").arg(name)).await
  }

  pub async fn remove_playlist(&self, name: &str) -> Result<(), MpdError> {
    self.run(Command::new("rm").arg(name)).await
  }

  pub async fn rename_playlist(&self, from: &str, to: &str) -> Result<(), MpdError> {
    self.run(Command::new("rename").arg(from).arg(to)).await
  }

  pub async fn playlist_add(&self, name: &str, uri: &str) -> Result<(), MpdError> {
    self.run(Command::new("playlistadd").arg(name).arg(uri)).await
  }

  pub async fn playlist_delete(&self, name: &str, pos: u32) -> Result<(), MpdError> {
    self.run(Command::new("playlistdelete").arg(name).arg(pos)).await
  }

  pub async fn playlist_clear(&self, name: &str) -> Result<(), MpdError> {
    self.run(Command::new("playlistclear").arg(name)).await
  }

  // Outputs

  pub async fn outputs(&self) -> Result<Vec<Output>, MpdError> {
    items(&self.execute(Command::new("outputs")).await?, "outputid")
  }

  pub async fn enable_output(&self, id: u32) -> Result<(), MpdError> {
    self.run(Command::new("enableoutput").arg(id)).await
  }

  pub async fn disable_output(&self, id: u32) -> Result<(), MpdError> {
    self.run(Command::new("disableoutput").arg(id)).await
  }

  pub async fn toggle_output(&self, id: u32) -> Result<(), MpdError> {
    self.run(Command::new("toggleoutput").arg(id)).await
  }

  // Stickers

  /// Sticker `name` on a song, `None` when it is not set.
  pub async fn sticker_get(&self, uri: &str, name: &str) -> Result<Option<String>, MpdError> {
    let command = Command::new("sticker").args(["get", "song", uri, name]);
    match self.execute(command).await {
      Ok(response) => match response.values("sticker").next() {
        Some(raw) => Ok(Some(Sticker::parse(raw)?.value)),
        None => Ok(None),
      },
      Err(MpdError::Server(ack)) if ack.code == AckCode::NoExist => Ok(None),
      Err(e) => Err(e),
    }
  }

  pub async fn sticker_set(&self, uri: &str, name: &str, value: &str) -> Result<(), MpdError> {
    self
      .run(Command::new("sticker").args(["set", "song", uri, name, value]))
      .await
  }

  /// Delete one sticker, or all stickers of the song when `name` is `None`.
  pub async fn sticker_delete(&self, uri: &str, name: Option<&str>) -> Result<(), MpdError> {
    self
      .run(
        Command::new("sticker")
          .args(["delete", "song", uri])
          .opt_arg(name),
      )
      .await
  }

  pub async fn sticker_list(&self, uri: &str) -> Result<Vec<Sticker>, MpdError> {
    let command = Command::new("sticker").args(["list", "song", uri]);
    let response = match self.execute(command).await {
      Ok(response) => response,
      Err(MpdError::Server(ack)) if ack.code == AckCode::NoExist => return Ok(Vec::new()),
      Err(e) => return Err(e),
    };
    response.values("sticker").map(Sticker::parse).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn response(lines: &[&str]) -> Response {
    Response::new(lines.iter().map(|l| l.to_string()).collect())
  }

  #[test]
  fn test_songs_from_listing() {
    let resp = response(&[
      "file: a.mp3",
      "Time: 10",
      "file: b.mp3",
      "file: c.mp3",
      "Title: C",
    ]);
    let list = songs(&resp).unwrap();
    assert_eq!(list.len(), 3);
    assert_eq!(list[2].title.as_deref(), Some("C"));
  }

  #[test]
  fn test_leading_fields_are_not_a_song() {
    let resp = response(&["updating_db: 1", "file: a.mp3"]);
    assert_eq!(songs(&resp).unwrap().len(), 1);
  }

  #[test]
  fn test_outputs_listing() {
    let resp = response(&[
      "outputid: 0",
      "outputname: Speakers",
      "plugin: alsa",
      "outputenabled: 1",
      "outputid: 1",
      "outputname: Stream",
      "outputenabled: 0",
    ]);
    let outputs: Vec<Output> = items(&resp, "outputid").unwrap();
    assert_eq!(outputs.len(), 2);
    assert!(outputs[0].enabled);
    assert_eq!(outputs[1].name, "Stream");
  }

  #[test]
  fn test_filter_arguments() {
    let command = with_filters(Command::new("find"), &[("album", "Animals"), ("artist", "Pink Floyd")]);
    assert_eq!(
      command.to_line().unwrap(),
      "find album Animals artist \"Pink Floyd\""
    );
  }

  #[test]
  fn test_parse_id() {
    assert_eq!(parse_id(&response(&["Id: 42"]), "Id").unwrap(), 42);
    assert!(matches!(parse_id(&response(&[]), "Id"), Err(MpdError::Parse(_))));
    assert!(matches!(
      parse_id(&response(&["Id: x"]), "Id"),
      Err(MpdError::Parse(_))
    ));
  }
}
