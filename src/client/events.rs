//! Typed change events and their delivery to listeners.
//!
//! The idle monitor turns server change notifications into [`MpdEvent`]s by
//! diffing consecutive status snapshots. Events are delivered by message
//! passing: channel subscribers receive clones, and [`EventSink`]s are
//! called inline and decide their own execution context.

use std::sync::Arc;

use async_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::model::{Song, Status};
use crate::protocol::{ChangeSet, Subsystem};

/// Change notification for listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum MpdEvent {
  /// Fired once per transition, never once per retry.
  ConnectionStateChanged {
    connected: bool,
    reason: Option<String>,
  },
  /// Play, pause or stop.
  StateChanged(Arc<Status>),
  TrackChanged {
    status: Arc<Status>,
    song: Option<Arc<Song>>,
  },
  /// Elapsed time moved within the same track (seek).
  TrackPositionChanged(Arc<Status>),
  /// The queue version changed.
  PlaylistChanged(Arc<Status>),
  VolumeChanged(Arc<Status>),
  RandomChanged(bool),
  RepeatChanged(bool),
  SingleChanged(bool),
  ConsumeChanged(bool),
  LibraryStateChanged {
    updating: bool,
    database_changed: bool,
  },
  StickerChanged,
  OutputsChanged,
  StoredPlaylistChanged,
}

impl MpdEvent {
  pub(crate) fn connected() -> Self {
    Self::ConnectionStateChanged {
      connected: true,
      reason: None,
    }
  }

  pub(crate) fn disconnected(reason: impl Into<String>) -> Self {
    Self::ConnectionStateChanged {
      connected: false,
      reason: Some(reason.into()),
    }
  }
}

/// Receives every event the client emits.
pub trait EventSink: Send + Sync {
  fn on_event(&self, event: &MpdEvent);
}

/// Sink that logs events at debug level.
pub struct LoggingSink;

impl EventSink for LoggingSink {
  fn on_event(&self, event: &MpdEvent) {
    log::debug!("MPD event: {:?}", event);
  }
}

/// Registered subscribers and sinks.
#[derive(Default)]
pub(crate) struct Listeners {
  subscribers: Mutex<Vec<Sender<MpdEvent>>>,
  sinks: Mutex<Vec<Arc<dyn EventSink>>>,
}

impl Listeners {
  pub fn subscribe(&self) -> Receiver<MpdEvent> {
    let (tx, rx) = async_channel::unbounded();
    self.subscribers.lock().push(tx);
    rx
  }

  pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
    self.sinks.lock().push(sink);
  }

  pub fn emit(&self, event: MpdEvent) {
    let sinks = self.sinks.lock().clone();
    for sink in sinks {
      sink.on_event(&event);
    }

    // Dropped receivers unregister themselves.
    self
      .subscribers
      .lock()
      .retain(|tx| tx.try_send(event.clone()).is_ok());
  }

  pub fn emit_all(&self, events: impl IntoIterator<Item = MpdEvent>) {
    for event in events {
      self.emit(event);
    }
  }
}

/// Events implied by moving from `old` to `new` after `changes`.
pub(crate) fn diff(
  old: &Status,
  new: &Arc<Status>,
  song: Option<&Arc<Song>>,
  changes: &ChangeSet,
) -> Vec<MpdEvent> {
  let mut events = Vec::new();

  if old.state != new.state {
    events.push(MpdEvent::StateChanged(new.clone()));
  }
  let track_changed = old.song_id != new.song_id || old.song_pos != new.song_pos;
  if track_changed {
    events.push(MpdEvent::TrackChanged {
      status: new.clone(),
      song: song.cloned(),
    });
  } else if old.elapsed != new.elapsed && changes.contains(Subsystem::Player) {
    events.push(MpdEvent::TrackPositionChanged(new.clone()));
  }
  if old.playlist_version != new.playlist_version {
    events.push(MpdEvent::PlaylistChanged(new.clone()));
  }
  if old.volume != new.volume {
    events.push(MpdEvent::VolumeChanged(new.clone()));
  }
  if old.random != new.random {
    events.push(MpdEvent::RandomChanged(new.random));
  }
  if old.repeat != new.repeat {
    events.push(MpdEvent::RepeatChanged(new.repeat));
  }
  if old.single != new.single {
    events.push(MpdEvent::SingleChanged(new.single));
  }
  if old.consume != new.consume {
    events.push(MpdEvent::ConsumeChanged(new.consume));
  }

  let database_changed = changes.contains(Subsystem::Database);
  if database_changed || old.is_updating() != new.is_updating() {
    events.push(MpdEvent::LibraryStateChanged {
      updating: new.is_updating(),
      database_changed,
    });
  }
  if changes.contains(Subsystem::Sticker) {
    events.push(MpdEvent::StickerChanged);
  }
  if changes.contains(Subsystem::Output) {
    events.push(MpdEvent::OutputsChanged);
  }
  if changes.contains(Subsystem::StoredPlaylist) {
    events.push(MpdEvent::StoredPlaylistChanged);
  }

  events
}
