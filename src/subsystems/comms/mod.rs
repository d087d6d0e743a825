//! Comms subsystem: the interactive console channel.
//!
//! [`command`] holds the line grammar, [`pty`] the session and the stdin
//! loop. The loop stops cooperatively on a shared [`CancellationToken`]
//! (`tokio_util::sync`) so `main` can wire Ctrl-C to it.

pub mod command;
pub mod pty;

pub use command::{Command, parse_command};
pub use pty::{Console, Step, run};
