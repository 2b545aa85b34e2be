//! Scripted fake MPD server for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mpdcomm::MpdConfig;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// How the fake server answers one command.
#[derive(Debug, Clone)]
pub enum Reply {
  /// `key: value` lines followed by `OK`.
  Lines(Vec<String>),
  /// Same as `Lines`, sent after a delay.
  After(Duration, Vec<String>),
  Ack {
    code: u32,
    index: u32,
    command: String,
    message: String,
  },
  /// Block like `idle` until notified or `noidle` arrives.
  Pending,
  /// Drop the connection without answering.
  Close,
  /// Never answer, not even `noidle`.
  Hang,
}

impl Reply {
  pub fn ok() -> Self {
    Self::Lines(Vec::new())
  }

  pub fn lines(lines: &[&str]) -> Self {
    Self::Lines(lines.iter().map(|l| l.to_string()).collect())
  }
}

type Handler = dyn Fn(&str) -> Reply + Send + Sync;

struct Inner {
  handler: Box<Handler>,
  log: Mutex<Vec<String>>,
  refusing: AtomicBool,
  kill: broadcast::Sender<()>,
  notify: broadcast::Sender<Vec<String>>,
}

pub struct FakeMpd {
  addr: SocketAddr,
  inner: Arc<Inner>,
}

pub fn init_logging() {
  let _ = env_logger::builder().is_test(true).try_init();
}

/// Answers most commands with a fixed player state.
pub fn default_reply(line: &str) -> Reply {
  let name = line.split_whitespace().next().unwrap_or_default();
  match name {
    "idle" => Reply::Pending,
    "status" => Reply::lines(&[
      "volume: 50",
      "repeat: 0",
      "random: 0",
      "single: 0",
      "consume: 0",
      "playlist: 7",
      "playlistlength: 2",
      "state: play",
      "song: 0",
      "songid: 1",
      "elapsed: 12.000",
      "duration: 200.000",
    ]),
    "currentsong" => Reply::lines(&["file: a.mp3", "Title: A", "Pos: 0", "Id: 1"]),
    _ => Reply::ok(),
  }
}

impl FakeMpd {
  pub async fn start<F>(handler: F) -> Self
  where
    F: Fn(&str) -> Reply + Send + Sync + 'static,
  {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (kill, _) = broadcast::channel(4);
    let (notify, _) = broadcast::channel(16);
    let inner = Arc::new(Inner {
      handler: Box::new(handler),
      log: Mutex::new(Vec::new()),
      refusing: AtomicBool::new(false),
      kill,
      notify,
    });

    let accept = inner.clone();
    tokio::spawn(async move {
      while let Ok((stream, _)) = listener.accept().await {
        if accept.refusing.load(Ordering::SeqCst) {
          drop(stream);
          continue;
        }
        tokio::spawn(serve(stream, accept.clone()));
      }
    });

    Self { addr, inner }
  }

  pub async fn with_defaults() -> Self {
    Self::start(default_reply).await
  }

  pub fn config(&self) -> MpdConfig {
    let mut config = MpdConfig::new("127.0.0.1", self.addr.port());
    config.connect_timeout_ms = 1_000;
    config.read_timeout_ms = 1_000;
    config.idle_timeout_ms = 10_000;
    config.reconnect_delays_ms = vec![20, 50];
    config
  }

  /// Every command line received so far, in arrival order.
  pub fn log(&self) -> Vec<String> {
    self.inner.log.lock().clone()
  }

  pub fn count(&self, command: &str) -> usize {
    self
      .log()
      .iter()
      .filter(|line| line.split_whitespace().next() == Some(command))
      .count()
  }

  /// Close every open connection.
  pub fn drop_connections(&self) {
    let _ = self.inner.kill.send(());
  }

  /// Accept and immediately close new connections while set.
  pub fn set_refusing(&self, refusing: bool) {
    self.inner.refusing.store(refusing, Ordering::SeqCst);
  }

  /// Wake pending `idle` commands with the given subsystems.
  pub fn notify(&self, subsystems: &[&str]) {
    let lines = subsystems.iter().map(|s| format!("changed: {s}")).collect();
    let _ = self.inner.notify.send(lines);
  }
}

async fn write_ok(writer: &mut (impl AsyncWriteExt + Unpin), lines: &[String]) -> bool {
  let mut out = String::new();
  for line in lines {
    out.push_str(line);
    out.push('\n');
  }
  out.push_str("OK\n");
  writer.write_all(out.as_bytes()).await.is_ok()
}

async fn serve(stream: TcpStream, inner: Arc<Inner>) {
  let (reader, mut writer) = stream.into_split();
  let mut lines = BufReader::new(reader).lines();
  let mut kill = inner.kill.subscribe();
  let mut notify = inner.notify.subscribe();

  if writer.write_all(b"OK MPD 0.23.5\n").await.is_err() {
    return;
  }

  loop {
    let line = tokio::select! {
      _ = kill.recv() => return,
      line = lines.next_line() => match line {
        Ok(Some(line)) => line,
        _ => return,
      },
    };
    inner.log.lock().push(line.clone());

    if line == "command_list_begin" || line == "command_list_ok_begin" {
      let ok_separated = line == "command_list_ok_begin";
      let mut out = Vec::new();
      let mut failed = None;
      let mut index = 0;
      loop {
        let Ok(Some(cmd)) = lines.next_line().await else {
          return;
        };
        inner.log.lock().push(cmd.clone());
        if cmd == "command_list_end" {
          break;
        }
        if failed.is_none() {
          match (inner.handler)(&cmd) {
            Reply::Lines(reply) | Reply::After(_, reply) => {
              out.extend(reply);
              if ok_separated {
                out.push("list_OK".to_string());
              }
            }
            Reply::Ack { code, command, message, .. } => {
              failed = Some(format!("ACK [{code}@{index}] {{{command}}} {message}"));
            }
            Reply::Pending | Reply::Close | Reply::Hang => return,
          }
        }
        index += 1;
      }
      let ok = match failed {
        Some(ack) => writer.write_all(format!("{ack}\n").as_bytes()).await.is_ok(),
        None => write_ok(&mut writer, &out).await,
      };
      if !ok {
        return;
      }
      continue;
    }

    let ok = match (inner.handler)(&line) {
      Reply::Lines(reply) => write_ok(&mut writer, &reply).await,
      Reply::After(delay, reply) => {
        tokio::time::sleep(delay).await;
        write_ok(&mut writer, &reply).await
      }
      Reply::Ack {
        code,
        index,
        command,
        message,
      } => writer
        .write_all(format!("ACK [{code}@{index}] {{{command}}} {message}\n").as_bytes())
        .await
        .is_ok(),
      Reply::Close => return,
      Reply::Hang => loop {
        tokio::select! {
          _ = kill.recv() => return,
          next = lines.next_line() => match next {
            Ok(Some(next)) => inner.log.lock().push(next),
            _ => return,
          },
        }
      },
      Reply::Pending => tokio::select! {
        _ = kill.recv() => return,
        changed = notify.recv() => match changed {
          Ok(changed) => write_ok(&mut writer, &changed).await,
          Err(_) => return,
        },
        next = lines.next_line() => match next {
          Ok(Some(next)) if next == "noidle" => {
            inner.log.lock().push(next);
            write_ok(&mut writer, &[]).await
          }
          _ => return,
        },
      },
    };
    if !ok {
      return;
    }
  }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
  let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
  while tokio::time::Instant::now() < deadline {
    if condition() {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  condition()
}
