//! Console host
//!
//! Drives a [`ConnectionManager`] from line-oriented input and prints inbound
//! events as JSON lines. Used by the `spark-realtime` binary.

mod command;

pub use command::Command;

use crate::connection::ConnectionManager;
use crate::listener::EventListener;
use crate::protocol::InboundEvent;
use parking_lot::Mutex;
use spark_common::AppResult;
use std::io::{self, BufRead, Write};
use std::thread;
use tokio::sync::mpsc;

/// Lines buffered between the stdin reader thread and the console loop
const STDIN_BUFFER: usize = 64;

/// Why the console loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    Quit,
    EndOfInput,
}

/// Listener that writes each inbound event as one line of JSON
pub struct JsonLinePrinter<W> {
    out: Mutex<W>,
}

impl<W: Write> JsonLinePrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> EventListener for JsonLinePrinter<W> {
    fn on_event(&self, event: &InboundEvent) -> anyhow::Result<()> {
        let mut out = self.out.lock();
        serde_json::to_writer(&mut *out, event.as_value())?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

/// Read stdin line by line on a dedicated thread
///
/// Blocking reads stay off the runtime, so dropping the receiver (or leaving
/// `main`) never waits on a pending read. The thread ends at end of input or
/// once the receiver is gone.
pub fn stdin_lines() -> AppResult<mpsc::Receiver<io::Result<String>>> {
    let (tx, rx) = mpsc::channel(STDIN_BUFFER);

    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;

    Ok(rx)
}

/// Run commands from `lines` until `quit` or end of input
///
/// Bad lines are reported and skipped. Sends while the socket is down are
/// dropped by the manager, same as for any other caller.
pub async fn run_console(
    manager: &ConnectionManager,
    mut lines: mpsc::Receiver<io::Result<String>>,
) -> AppResult<ConsoleExit> {
    while let Some(line) = lines.recv().await {
        let line = line?;
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match command {
            Command::Send(action) => {
                let name = action.name();
                if !manager.send(action) {
                    eprintln!("{name} not sent: connection is {}", manager.state());
                }
            }
            Command::Status => {
                println!(
                    "state={} subject={}",
                    manager.state(),
                    manager.subject_id().as_deref().unwrap_or("-")
                );
            }
            Command::Quit => return Ok(ConsoleExit::Quit),
            Command::Noop => {}
        }
    }

    Ok(ConsoleExit::EndOfInput)
}
