//! MPD line protocol.
//!
//! Architecture:
//! - `command.rs` - Command lines, argument escaping and command lists
//! - `response.rs` - Response framing, ACK decoding and record segmentation
//! - `idle.rs` - Subsystems and change sets reported by `idle`
//! - `connection.rs` - One TCP session with handshake and bounded reads

mod command;
mod connection;
mod idle;
mod response;

pub use command::{escape_arg, Command, CommandList};
pub use connection::{Connection, ProtocolVersion};
pub use idle::{ChangeSet, Subsystem};
pub use response::{parse_ack, parse_pair, Record, Records, Response, Terminator};
