//! One TCP session to an MPD server.
//!
//! The connection owns both socket halves. It performs the greeting
//! handshake, writes command lines and reads responses up to their
//! terminator, always under a timeout. After any transport failure the
//! connection is marked broken and refuses further use.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::command::{Command, CommandList};
use super::idle::{ChangeSet, Subsystem};
use super::response::{parse_pair, Response, Terminator};
use crate::config::MpdConfig;
use crate::error::MpdError;

type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Protocol version announced in the `OK MPD x.y.z` greeting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
  pub major: u32,
  pub minor: u32,
  pub patch: u32,
}

impl ProtocolVersion {
  pub fn new(major: u32, minor: u32, patch: u32) -> Self {
    Self {
      major,
      minor,
      patch,
    }
  }

  /// Parse the greeting line.
  pub fn from_greeting(line: &str) -> Result<Self, MpdError> {
    let version = line
      .strip_prefix("OK MPD ")
      .ok_or_else(|| MpdError::Protocol(format!("unexpected greeting: {line:?}")))?;

    let mut parts = version.trim().split('.');
    let mut next = |required: bool| -> Result<u32, MpdError> {
      match parts.next() {
        Some(part) => part
          .parse()
          .map_err(|_| MpdError::Protocol(format!("bad protocol version: {version:?}"))),
        None if required => Err(MpdError::Protocol(format!(
          "bad protocol version: {version:?}"
        ))),
        None => Ok(0),
      }
    };

    Ok(Self {
      major: next(true)?,
      minor: next(true)?,
      patch: next(false)?,
    })
  }

  pub fn at_least(&self, major: u32, minor: u32, patch: u32) -> bool {
    *self >= Self::new(major, minor, patch)
  }
}

impl fmt::Display for ProtocolVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
  }
}

/// Live session to an MPD server.
pub struct Connection {
  reader: BufReader<BoxReader>,
  writer: BoxWriter,
  /// Bytes of a partially received line, kept across cancelled reads.
  line_buf: Vec<u8>,
  version: ProtocolVersion,
  read_timeout: Duration,
  peer: String,
  broken: bool,
}

impl Connection {
  /// Connect, read the greeting, and authenticate when a password is set.
  pub async fn open(config: &MpdConfig) -> Result<Self, MpdError> {
    let peer = config.address();
    log::debug!("Connecting to MPD at {}", peer);

    let stream = match timeout(
      config.connect_timeout(),
      TcpStream::connect((config.host.as_str(), config.port)),
    )
    .await
    {
      Ok(Ok(stream)) => stream,
      Ok(Err(e)) => return Err(MpdError::Connection(format!("{peer}: {e}"))),
      Err(_) => return Err(MpdError::Timeout(config.connect_timeout())),
    };
    if let Err(e) = stream.set_nodelay(true) {
      log::debug!("Failed to set TCP_NODELAY: {}", e);
    }

    let (reader, writer) = stream.into_split();
    let mut conn = Self::handshake(
      Box::new(reader),
      Box::new(writer),
      config.read_timeout(),
      peer,
    )
    .await?;

    if let Some(password) = &config.password {
      conn.execute(&Command::password(password)).await?;
    }

    log::info!("Connected to MPD {} at {}", conn.version, conn.peer);
    Ok(conn)
  }

  /// Run the handshake over an arbitrary stream pair.
  pub async fn from_stream<R, W>(reader: R, writer: W, read_timeout: Duration) -> Result<Self, MpdError>
  where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
  {
    Self::handshake(
      Box::new(reader),
      Box::new(writer),
      read_timeout,
      "stream".to_string(),
    )
    .await
  }

  async fn handshake(
    reader: BoxReader,
    writer: BoxWriter,
    read_timeout: Duration,
    peer: String,
  ) -> Result<Self, MpdError> {
    let mut conn = Self {
      reader: BufReader::new(reader),
      writer,
      line_buf: Vec::new(),
      version: ProtocolVersion::default(),
      read_timeout,
      peer,
      broken: false,
    };

    let greeting = conn.read_line(read_timeout).await?;
    match ProtocolVersion::from_greeting(&greeting) {
      Ok(version) => conn.version = version,
      Err(e) => return Err(conn.fail(e)),
    }
    Ok(conn)
  }

  pub fn protocol_version(&self) -> ProtocolVersion {
    self.version
  }

  pub fn read_timeout(&self) -> Duration {
    self.read_timeout
  }

  /// False once a transport error has been observed.
  pub fn is_connected(&self) -> bool {
    !self.broken
  }

  fn fail(&mut self, err: MpdError) -> MpdError {
    if err.is_transport() && !self.broken {
      log::warn!("MPD connection to {} broken: {}", self.peer, err);
      self.broken = true;
    }
    err
  }

  fn ensure_usable(&self) -> Result<(), MpdError> {
    if self.broken {
      Err(MpdError::Connection(format!(
        "connection to {} is no longer usable",
        self.peer
      )))
    } else {
      Ok(())
    }
  }

  /// Write one line (a newline is appended).
  pub async fn send_line(&mut self, line: &str) -> Result<(), MpdError> {
    self.ensure_usable()?;
    let mut data = Vec::with_capacity(line.len() + 1);
    data.extend_from_slice(line.as_bytes());
    data.push(b'\n');
    self.write_raw(&data).await
  }

  async fn write_raw(&mut self, data: &[u8]) -> Result<(), MpdError> {
    let limit = self.read_timeout;
    let writer = &mut self.writer;
    let write = async move {
      writer.write_all(data).await?;
      writer.flush().await
    };
    match timeout(limit, write).await {
      Ok(Ok(())) => Ok(()),
      Ok(Err(e)) => Err(self.fail(MpdError::Io(e))),
      Err(_) => Err(self.fail(MpdError::Timeout(limit))),
    }
  }

  async fn next_line(&mut self, limit: Duration) -> Result<String, MpdError> {
    match timeout(limit, self.reader.read_until(b'\n', &mut self.line_buf)).await {
      Err(_) => Err(MpdError::Timeout(limit)),
      Ok(Err(e)) => Err(MpdError::Io(e)),
      Ok(Ok(_)) => {
        if self.line_buf.last() != Some(&b'\n') {
          self.line_buf.clear();
          return Err(MpdError::ConnectionClosed);
        }
        let mut raw = std::mem::take(&mut self.line_buf);
        raw.pop();
        if raw.last() == Some(&b'\r') {
          raw.pop();
        }
        Ok(match String::from_utf8(raw) {
          Ok(line) => line,
          Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
      }
    }
  }

  /// Read one line, failing with `Timeout` or `ConnectionClosed`.
  pub async fn read_line(&mut self, limit: Duration) -> Result<String, MpdError> {
    self.ensure_usable()?;
    match self.next_line(limit).await {
      Ok(line) => Ok(line),
      Err(e) => Err(self.fail(e)),
    }
  }

  /// Read a full response; the first line may wait up to `first_line`.
  async fn read_response(&mut self, first_line: Duration) -> Result<Response, MpdError> {
    let first = self.read_line(first_line).await?;
    self.finish_response(first).await
  }

  /// Read the rest of a response whose first line is already in hand.
  ///
  /// Malformed lines are drained up to the terminator so the connection
  /// stays in sync, then reported as a parse error.
  async fn finish_response(&mut self, first: String) -> Result<Response, MpdError> {
    let mut lines = Vec::new();
    let mut bad_line = None;
    let mut line = first;

    loop {
      match Terminator::parse(&line).map_err(|e| self.fail(e))? {
        Some(Terminator::Ok) => {
          return match bad_line {
            Some(e) => Err(e),
            None => Ok(Response::new(lines)),
          };
        }
        Some(Terminator::Ack(ack)) => {
          log::debug!("MPD << ACK {}", ack);
          return Err(MpdError::Server(ack));
        }
        Some(Terminator::ListOk) => {
          return Err(self.fail(MpdError::Protocol("unexpected list_OK".into())));
        }
        None => match parse_pair(&line) {
          Ok(_) => lines.push(line),
          Err(e) => {
            log::warn!("Malformed response line from {}: {:?}", self.peer, line);
            bad_line.get_or_insert(e);
          }
        },
      }
      line = self.read_line(self.read_timeout).await?;
    }
  }

  /// Send a command and read its response.
  pub async fn execute(&mut self, command: &Command) -> Result<Response, MpdError> {
    self.ensure_usable()?;
    let line = command.to_line()?;
    if command.name() == "password" {
      log::debug!("MPD >> password ******");
    } else {
      log::debug!("MPD >> {}", line);
    }
    self.send_line(&line).await?;
    self.read_response(self.read_timeout).await
  }

  /// Send a command list as one transmission.
  ///
  /// Plain lists yield one response; `command_list_ok_begin` lists yield one
  /// response per command. An ACK aborts the list and carries the index of
  /// the failing command.
  pub async fn execute_list(&mut self, list: &CommandList) -> Result<Vec<Response>, MpdError> {
    self.ensure_usable()?;
    if list.is_empty() {
      return Ok(Vec::new());
    }
    let wire = list.to_wire()?;
    log::debug!("MPD >> command list of {} commands", list.len());
    self.write_raw(wire.as_bytes()).await?;

    if !list.is_ok_separated() {
      return self.read_response(self.read_timeout).await.map(|r| vec![r]);
    }

    let mut responses = Vec::with_capacity(list.len());
    let mut lines = Vec::new();
    loop {
      let line = self.read_line(self.read_timeout).await?;
      match Terminator::parse(&line).map_err(|e| self.fail(e))? {
        Some(Terminator::ListOk) => responses.push(Response::new(std::mem::take(&mut lines))),
        Some(Terminator::Ok) => return Ok(responses),
        Some(Terminator::Ack(ack)) => return Err(MpdError::Server(ack)),
        None => lines.push(line),
      }
    }
  }

  /// Block in `idle` until something changes.
  ///
  /// If nothing arrives within `idle_timeout`, `noidle` is sent and its
  /// reply, bounded by the read timeout, is returned instead. A server that
  /// answers neither is treated as hung.
  pub async fn idle(
    &mut self,
    subsystems: &[Subsystem],
    idle_timeout: Duration,
  ) -> Result<ChangeSet, MpdError> {
    self.ensure_usable()?;
    let line = Command::idle(subsystems.iter().map(|s| s.as_str())).to_line()?;
    log::debug!("MPD >> {}", line);
    self.send_line(&line).await?;

    let first = match self.next_line(idle_timeout).await {
      Ok(line) => line,
      Err(MpdError::Timeout(_)) => {
        log::debug!("Idle timed out on {}, probing with noidle", self.peer);
        self.send_line("noidle").await?;
        self.read_line(self.read_timeout).await?
      }
      Err(e) => return Err(self.fail(e)),
    };
    let response = self.finish_response(first).await?;
    Ok(ChangeSet::from_response(&response))
  }

  /// Politely end the session.
  pub async fn close(mut self) {
    if self.broken {
      return;
    }
    if let Err(e) = self.send_line("close").await {
      log::debug!("Failed to send close to {}: {}", self.peer, e);
    }
    let _ = self.writer.shutdown().await;
  }
}

impl fmt::Debug for Connection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Connection")
      .field("peer", &self.peer)
      .field("version", &self.version)
      .field("broken", &self.broken)
      .finish()
  }
}
