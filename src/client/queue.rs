//! FIFO command queue with a single owner of the command connection.
//!
//! Requests are enqueued when they are submitted, so wire order always
//! matches submission order no matter which worker awaits the reply. The
//! owner task sends one request at a time while holding the connection
//! slot lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::state::StateCell;
use crate::error::MpdError;
use crate::protocol::{Command, CommandList, Connection, Response};

/// What a request sends.
#[derive(Debug, Clone)]
pub(crate) enum Payload {
  Single(Command),
  List(CommandList),
}

pub(crate) type Reply = Result<Vec<Response>, MpdError>;

pub(crate) struct Request {
  pub payload: Payload,
  pub reply: oneshot::Sender<Reply>,
  pub cancel: CancellationToken,
}

/// Slot holding the command connection.
///
/// Every installed connection gets a new generation so a loss reported for
/// an old connection can be told apart from one for the current one.
pub(crate) struct CommandLink {
  slot: Mutex<Option<Connection>>,
  generation: AtomicU64,
  lost_tx: Sender<u64>,
  lost_rx: Receiver<u64>,
}

impl Default for CommandLink {
  fn default() -> Self {
    let (lost_tx, lost_rx) = async_channel::unbounded();
    Self {
      slot: Mutex::new(None),
      generation: AtomicU64::new(0),
      lost_tx,
      lost_rx,
    }
  }
}

impl CommandLink {
  pub fn generation(&self) -> u64 {
    self.generation.load(Ordering::SeqCst)
  }

  /// Generations of command connections that failed.
  pub fn losses(&self) -> &Receiver<u64> {
    &self.lost_rx
  }

  pub async fn install(&self, conn: Connection) {
    let mut slot = self.slot.lock().await;
    self.generation.fetch_add(1, Ordering::SeqCst);
    *slot = Some(conn);
  }

  pub async fn take(&self) -> Option<Connection> {
    self.slot.lock().await.take()
  }

  async fn run(&self, payload: &Payload, state: &StateCell) -> Reply {
    let mut slot = self.slot.lock().await;
    let generation = self.generation();
    let Some(conn) = slot.as_mut() else {
      return Err(MpdError::Connection("not connected to MPD".into()));
    };

    state.begin_command();
    let result = match payload {
      Payload::Single(command) => conn.execute(command).await.map(|r| vec![r]),
      Payload::List(list) => conn.execute_list(list).await,
    };

    if let Err(e) = &result {
      if e.is_transport() {
        log::warn!("Command connection lost: {}", e);
        *slot = None;
        let _ = self.lost_tx.try_send(generation);
      }
    }
    result
  }
}

/// Spawn the owner task draining `requests` in order.
pub(crate) fn spawn_owner(
  link: Arc<CommandLink>,
  state: Arc<StateCell>,
  requests: Receiver<Request>,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    log::debug!("MPD command queue started");
    while let Ok(request) = requests.recv().await {
      if request.cancel.is_cancelled() || request.reply.is_closed() {
        log::debug!("Skipping cancelled command");
      } else {
        let result = link.run(&request.payload, &state).await;
        if request.cancel.is_cancelled() {
          log::debug!("Discarding result of cancelled command");
        } else {
          let _ = request.reply.send(result);
        }
      }
      if requests.is_empty() {
        state.end_command();
      }
    }
    log::debug!("MPD command queue stopped");
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::client::ConnectionState;
  use std::time::Duration;
  use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

  async fn link_with_server() -> (Arc<CommandLink>, tokio::io::DuplexStream) {
    let (client, mut server) = tokio::io::duplex(4096);
    server.write_all(b"OK MPD 0.23.5\n").await.unwrap();
    let (r, w) = tokio::io::split(client);
    let conn = Connection::from_stream(r, w, Duration::from_millis(500))
      .await
      .unwrap();
    let link = Arc::new(CommandLink::default());
    link.install(conn).await;
    (link, server)
  }

  fn request(command: Command) -> (Request, oneshot::Receiver<Reply>, CancellationToken) {
    let (tx, rx) = oneshot::channel();
    let cancel = CancellationToken::new();
    (
      Request {
        payload: Payload::Single(command),
        reply: tx,
        cancel: cancel.clone(),
      },
      rx,
      cancel,
    )
  }

  #[tokio::test]
  async fn test_without_connection_fails_fast() {
    let link = Arc::new(CommandLink::default());
    let state = Arc::new(StateCell::default());
    let (tx, rx) = async_channel::unbounded();
    let _owner = spawn_owner(link, state, rx);

    let (req, reply, _) = request(Command::ping());
    tx.send(req).await.unwrap();
    assert!(matches!(reply.await.unwrap(), Err(MpdError::Connection(_))));
  }

  #[tokio::test]
  async fn test_cancelled_request_is_not_sent() {
    let (link, server) = link_with_server().await;
    let state = Arc::new(StateCell::default());
    state.set(ConnectionState::ConnectedIdleWaiting);
    let (tx, rx) = async_channel::unbounded();

    let (skipped, skipped_reply, cancel) = request(Command::stop());
    cancel.cancel();
    let (sent, sent_reply, _) = request(Command::ping());
    tx.send(skipped).await.unwrap();
    tx.send(sent).await.unwrap();
    let _owner = spawn_owner(link, state.clone(), rx);

    let mut server = BufReader::new(server);
    let mut line = String::new();
    server.read_line(&mut line).await.unwrap();
    assert_eq!(line, "ping\n");
    server.get_mut().write_all(b"OK\n").await.unwrap();

    assert!(sent_reply.await.unwrap().is_ok());
    assert!(skipped_reply.await.is_err());
    assert_eq!(state.get(), ConnectionState::ConnectedIdleWaiting);
  }

  #[tokio::test]
  async fn test_cancelled_tail_still_ends_command_state() {
    let (link, server) = link_with_server().await;
    let state = Arc::new(StateCell::default());
    state.set(ConnectionState::ConnectedIdleWaiting);
    let (tx, rx) = async_channel::unbounded();

    let (sent, sent_reply, _) = request(Command::ping());
    let (skipped, _skipped_reply, cancel) = request(Command::stop());
    cancel.cancel();
    tx.send(sent).await.unwrap();
    tx.send(skipped).await.unwrap();
    let _owner = spawn_owner(link, state.clone(), rx);

    let mut server = BufReader::new(server);
    let mut line = String::new();
    server.read_line(&mut line).await.unwrap();
    assert_eq!(line, "ping\n");
    assert_eq!(state.get(), ConnectionState::ConnectedCommandPending);
    server.get_mut().write_all(b"OK\n").await.unwrap();
    assert!(sent_reply.await.unwrap().is_ok());

    for _ in 0..100 {
      if state.get() == ConnectionState::ConnectedIdleWaiting {
        break;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(state.get(), ConnectionState::ConnectedIdleWaiting);
  }

  #[tokio::test]
  async fn test_transport_error_reports_generation() {
    let (link, server) = link_with_server().await;
    let state = Arc::new(StateCell::default());
    let (tx, rx) = async_channel::unbounded();
    let _owner = spawn_owner(link.clone(), state, rx);
    drop(server);

    let (req, reply, _) = request(Command::status());
    tx.send(req).await.unwrap();
    assert!(reply.await.unwrap().unwrap_err().is_transport());
    assert_eq!(link.losses().recv().await.unwrap(), link.generation());
    assert!(link.take().await.is_none());
  }
}
