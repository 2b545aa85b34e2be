//! Idle monitor: long-polls the idle connection, refreshes the status
//! snapshot on change and supervises reconnection of both connections.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::events::{diff, MpdEvent};
use super::state::ConnectionState;
use super::Shared;
use crate::config::MpdConfig;
use crate::error::MpdError;
use crate::model::{Song, Status};
use crate::protocol::{ChangeSet, Command, Connection, Subsystem};

/// Why the idle wait ended.
enum Wake {
  Changes(ChangeSet),
  Failed(MpdError),
  /// The command connection reported a transport error.
  LinkLost,
  Stop,
}

/// Subsystems whose state lives in the status snapshot.
pub(crate) fn status_subsystems() -> ChangeSet {
  [
    Subsystem::Player,
    Subsystem::Playlist,
    Subsystem::Mixer,
    Subsystem::Options,
  ]
  .into_iter()
  .collect()
}

/// Open the command and idle connections together.
pub(crate) async fn open_pair(config: &MpdConfig) -> Result<(Connection, Connection), MpdError> {
  tokio::try_join!(Connection::open(config), Connection::open(config))
}

async fn fetch_song(conn: &mut Connection) -> Result<Option<Arc<Song>>, MpdError> {
  let response = conn.execute(&Command::current_song()).await?;
  if response.is_empty() {
    return Ok(None);
  }
  Ok(Some(Arc::new(Song::from(&response.record()?))))
}

/// Re-query the status (and the current song when the player or queue
/// changed), replace the snapshot and return the resulting events.
pub(crate) async fn refresh(
  shared: &Shared,
  conn: &mut Connection,
  changes: &ChangeSet,
) -> Result<Vec<MpdEvent>, MpdError> {
  let record = conn.execute(&Command::status()).await?.record()?;
  let status = Arc::new(Status::from(&record));

  if changes.contains(Subsystem::Player) || changes.contains(Subsystem::Playlist) {
    let song = fetch_song(conn).await?;
    *shared.song.write() = song;
  }
  let song = shared.song.read().clone();

  let previous = std::mem::replace(&mut *shared.status.write(), status.clone());
  Ok(diff(&previous, &status, song.as_ref(), changes))
}

async fn wait(shared: &Shared, conn: &mut Connection, cancel: &CancellationToken) -> Wake {
  let generation = shared.link.generation();
  let idle = conn.idle(&[], shared.config.idle_timeout());
  tokio::pin!(idle);

  loop {
    tokio::select! {
      _ = cancel.cancelled() => return Wake::Stop,
      result = &mut idle => {
        return match result {
          Ok(changes) => Wake::Changes(changes),
          Err(e) => Wake::Failed(e),
        };
      }
      lost = shared.link.losses().recv() => match lost {
        Ok(lost) if lost == generation => return Wake::LinkLost,
        Ok(lost) => log::debug!("Ignoring loss of stale command connection #{}", lost),
        Err(_) => return Wake::Stop,
      }
    }
  }
}

/// Enter `Reconnecting`, dropping the command connection. Fires the lost
/// event only on the first failure.
async fn mark_lost(shared: &Shared, reason: String) {
  drop(shared.link.take().await);
  let previous = shared.state.set(ConnectionState::Reconnecting);
  if matches!(
    previous,
    ConnectionState::Reconnecting | ConnectionState::Disconnected
  ) {
    return;
  }
  log::warn!(
    "Lost connection to MPD at {}: {}",
    shared.config.address(),
    reason
  );
  shared.listeners.emit(MpdEvent::disconnected(reason));
}

fn mark_restored(shared: &Shared) {
  let previous = shared.state.set(ConnectionState::ConnectedIdleWaiting);
  if previous == ConnectionState::Reconnecting {
    log::info!("Reconnected to MPD at {}", shared.config.address());
    shared.listeners.emit(MpdEvent::connected());
  }
}

/// Retry with the configured backoff until both connections are back.
async fn reconnect(shared: &Shared, cancel: &CancellationToken) -> Option<Connection> {
  let mut attempt = 0usize;
  loop {
    let delay = shared.config.reconnect_delay(attempt);
    attempt += 1;
    log::info!(
      "Attempting MPD reconnection in {:?} (attempt {})",
      delay,
      attempt
    );

    tokio::select! {
      _ = cancel.cancelled() => return None,
      _ = tokio::time::sleep(delay) => {}
    }
    let opened = tokio::select! {
      _ = cancel.cancelled() => return None,
      opened = open_pair(&shared.config) => opened,
    };

    let (command, mut idle) = match opened {
      Ok(pair) => pair,
      Err(e) => {
        log::warn!("MPD reconnection attempt {} failed: {}", attempt, e);
        continue;
      }
    };
    let events = match refresh(shared, &mut idle, &status_subsystems()).await {
      Ok(events) => events,
      Err(e) if e.is_transport() => {
        log::warn!("MPD connection failed right after reconnecting: {}", e);
        continue;
      }
      Err(e) => {
        log::warn!("Failed to refresh status after reconnecting: {}", e);
        Vec::new()
      }
    };

    shared.link.install(command).await;
    mark_restored(shared);
    shared.listeners.emit_all(events);
    return Some(idle);
  }
}

/// Run until `cancel` fires. Owns the idle connection.
pub(crate) async fn run(shared: Arc<Shared>, conn: Connection, cancel: CancellationToken) {
  log::info!("MPD idle monitor started");
  let mut conn = conn;

  loop {
    let wake = wait(&shared, &mut conn, &cancel).await;
    let reason = match wake {
      Wake::Stop => {
        conn.close().await;
        break;
      }
      Wake::Changes(changes) if changes.is_empty() => {
        log::debug!("Idle returned without changes, re-arming");
        continue;
      }
      Wake::Changes(changes) => {
        log::debug!("MPD changed: {:?}", changes);
        match refresh(&shared, &mut conn, &changes).await {
          Ok(events) => {
            shared.listeners.emit_all(events);
            continue;
          }
          Err(e) if e.is_transport() => e.to_string(),
          Err(e) => {
            log::warn!("Failed to refresh MPD status: {}", e);
            continue;
          }
        }
      }
      Wake::Failed(e) if e.is_transport() => e.to_string(),
      Wake::Failed(e) => {
        log::warn!("MPD rejected idle: {}", e);
        tokio::select! {
          _ = cancel.cancelled() => {
            conn.close().await;
            break;
          }
          _ = tokio::time::sleep(shared.config.reconnect_delay(0)) => continue,
        }
      }
      Wake::LinkLost => "command connection lost".to_string(),
    };

    drop(conn);
    mark_lost(&shared, reason).await;
    conn = match reconnect(&shared, &cancel).await {
      Some(conn) => conn,
      None => break,
    };
  }

  log::info!("MPD idle monitor stopped");
}
