//! Asynchronous MPD client.
//!
//! Architecture:
//! - `state.rs` - Connection state machine
//! - `events.rs` - Typed events, listeners and status diffing
//! - `queue.rs` - FIFO command queue owning the command connection
//! - `executor.rs` - Worker pool and cancellable tasks
//! - `idle.rs` - Idle monitor with reconnect supervision
//! - `commands.rs` - Typed command methods

mod commands;
mod events;
mod executor;
mod idle;
mod queue;
mod state;

pub use events::{EventSink, LoggingSink, MpdEvent};
pub use executor::{Executor, Task};
pub use state::ConnectionState;

use std::future::Future;
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use parking_lot::RwLock;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use self::events::Listeners;
use self::queue::{CommandLink, Payload, Request};
use self::state::StateCell;
use crate::config::MpdConfig;
use crate::error::MpdError;
use crate::model::{Song, Status};
use crate::protocol::{Command, CommandList, ProtocolVersion, Response};

/// State shared between the client handle and its background tasks.
pub(crate) struct Shared {
  config: MpdConfig,
  state: Arc<StateCell>,
  link: Arc<CommandLink>,
  listeners: Listeners,
  status: RwLock<Arc<Status>>,
  song: RwLock<Option<Arc<Song>>>,
}

/// Background tasks of one connected session.
struct Session {
  cancel: CancellationToken,
  monitor: JoinHandle<()>,
  version: ProtocolVersion,
}

/// Client for one MPD server.
///
/// Commands go over a dedicated command connection in submission order
/// while a second connection sits in `idle` and turns server-side changes
/// into [`MpdEvent`]s. Both are re-established automatically after
/// transport failures.
pub struct MpdClient {
  shared: Arc<Shared>,
  requests: Sender<Request>,
  executor: Executor,
  session: Mutex<Option<Session>>,
  queue: JoinHandle<()>,
}

impl MpdClient {
  /// Create a disconnected client. Must be called within a Tokio runtime.
  pub fn new(config: MpdConfig) -> Result<Self, MpdError> {
    config.validate().map_err(MpdError::Config)?;

    let executor = Executor::new(config.workers);
    let shared = Arc::new(Shared {
      config,
      state: Arc::new(StateCell::default()),
      link: Arc::new(CommandLink::default()),
      listeners: Listeners::default(),
      status: RwLock::new(Arc::new(Status::default())),
      song: RwLock::new(None),
    });

    let (requests, queue_rx) = async_channel::unbounded();
    let queue = queue::spawn_owner(shared.link.clone(), shared.state.clone(), queue_rx);

    Ok(Self {
      shared,
      requests,
      executor,
      session: Mutex::new(None),
      queue,
    })
  }

  pub fn config(&self) -> &MpdConfig {
    &self.shared.config
  }

  /// Open both connections and start the idle monitor.
  ///
  /// Does nothing when already connected.
  pub async fn connect(&self) -> Result<(), MpdError> {
    let mut session = self.session.lock().await;
    if session.is_some() {
      log::debug!("MPD client already connected");
      return Ok(());
    }

    let shared = &self.shared;
    let (command, mut idle_conn) = idle::open_pair(&shared.config).await?;
    let version = idle_conn.protocol_version();
    // Seed the snapshot; the initial state is not a change.
    idle::refresh(shared, &mut idle_conn, &idle::status_subsystems()).await?;
    shared.link.install(command).await;
    shared.state.set(ConnectionState::ConnectedIdleWaiting);

    let cancel = CancellationToken::new();
    let monitor = tokio::spawn(idle::run(shared.clone(), idle_conn, cancel.clone()));
    *session = Some(Session {
      cancel,
      monitor,
      version,
    });

    shared.listeners.emit(MpdEvent::connected());
    Ok(())
  }

  /// Stop the idle monitor and close both connections.
  pub async fn disconnect(&self) {
    let Some(session) = self.session.lock().await.take() else {
      return;
    };
    log::info!("Disconnecting from MPD at {}", self.shared.config.address());

    session.cancel.cancel();
    if let Err(e) = session.monitor.await {
      log::error!("MPD idle monitor panicked: {}", e);
    }
    if let Some(conn) = self.shared.link.take().await {
      conn.close().await;
    }

    // A session lost while reconnecting has already reported the loss.
    let previous = self.shared.state.set(ConnectionState::Disconnected);
    if previous.is_connected() {
      self.shared.listeners.emit(MpdEvent::disconnected("disconnected"));
    }
  }

  /// Disconnect and stop the worker pool. Later submissions fail with
  /// [`MpdError::Shutdown`].
  pub async fn shutdown(&self) {
    self.disconnect().await;
    self.requests.close();
    self.executor.shutdown().await;
  }

  pub fn state(&self) -> ConnectionState {
    self.shared.state.get()
  }

  pub fn is_connected(&self) -> bool {
    self.state().is_connected()
  }

  /// Protocol version announced by the server on the last `connect`.
  pub async fn protocol_version(&self) -> Option<ProtocolVersion> {
    self.session.lock().await.as_ref().map(|s| s.version)
  }

  /// Last status seen by the idle monitor.
  pub fn status_snapshot(&self) -> Arc<Status> {
    self.shared.status.read().clone()
  }

  /// Song that was current at the last status refresh.
  pub fn current_song_snapshot(&self) -> Option<Arc<Song>> {
    self.shared.song.read().clone()
  }

  /// Receive every future event on a channel.
  pub fn subscribe(&self) -> Receiver<MpdEvent> {
    self.shared.listeners.subscribe()
  }

  pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
    self.shared.listeners.add_sink(sink);
  }

  /// Put `payload` on the command queue now and return the cancel token
  /// and the future of its reply.
  fn enqueue(
    &self,
    payload: Payload,
  ) -> (
    CancellationToken,
    impl Future<Output = Result<Vec<Response>, MpdError>> + Send + 'static,
  ) {
    let cancel = CancellationToken::new();
    let (reply, rx) = oneshot::channel();
    let queued = !self.executor.is_shut_down()
      && self
        .requests
        .try_send(Request {
          payload,
          reply,
          cancel: cancel.clone(),
        })
        .is_ok();

    let reply = async move {
      if !queued {
        return Err(MpdError::Shutdown);
      }
      rx.await.unwrap_or(Err(MpdError::Cancelled))
    };
    (cancel, reply)
  }

  /// Queue `command` and return a task resolving to its response.
  ///
  /// The command's place on the wire is fixed when `submit` is called.
  pub fn submit(&self, command: Command) -> Task<Response> {
    let (cancel, reply) = self.enqueue(Payload::Single(command));
    self.executor.spawn(cancel, async move {
      reply
        .await?
        .pop()
        .ok_or_else(|| MpdError::Protocol("missing response".into()))
    })
  }

  /// Queue a command list; see [`Connection::execute_list`](crate::protocol::Connection::execute_list).
  pub fn submit_list(&self, list: CommandList) -> Task<Vec<Response>> {
    let (cancel, reply) = self.enqueue(Payload::List(list));
    self.executor.spawn(cancel, reply)
  }

  /// Run one command and wait for its response.
  pub async fn execute(&self, command: Command) -> Result<Response, MpdError> {
    self.submit(command).await
  }

  /// Run a command list and wait for its responses.
  pub async fn execute_list(&self, list: CommandList) -> Result<Vec<Response>, MpdError> {
    self.submit_list(list).await
  }
}

impl Drop for MpdClient {
  fn drop(&mut self) {
    if let Some(session) = self.session.get_mut().take() {
      session.cancel.cancel();
    }
    self.requests.close();
    self.queue.abort();
  }
}
