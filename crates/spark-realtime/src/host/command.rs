//! Console commands

use crate::protocol::OutboundAction;
use spark_common::{AppError, AppResult};

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send an action over the channel
    Send(OutboundAction),
    /// Print the connection state
    Status,
    /// Disconnect and exit
    Quit,
    /// Blank line
    Noop,
}

impl Command {
    /// Parse a console line
    ///
    /// ```text
    /// msg <chat_id> <text...>
    /// typing <chat_id> on|off
    /// sub <chat_id>
    /// unsub <chat_id>
    /// online | offline
    /// status
    /// quit
    /// ```
    pub fn parse(line: &str) -> AppResult<Self> {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(verb, rest)| (verb, rest.trim_start()));

        match verb {
            "" => Ok(Self::Noop),
            "msg" => {
                let (chat_id, text) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| AppError::invalid_input("usage: msg <chat_id> <text>"))?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(AppError::invalid_input("usage: msg <chat_id> <text>"));
                }
                Ok(Self::Send(OutboundAction::message(chat_id, text)))
            }
            "typing" => {
                let mut args = rest.split_whitespace();
                let chat_id = args
                    .next()
                    .ok_or_else(|| AppError::invalid_input("usage: typing <chat_id> on|off"))?;
                let is_typing = match args.next() {
                    Some("on") => true,
                    Some("off") => false,
                    _ => return Err(AppError::invalid_input("usage: typing <chat_id> on|off")),
                };
                Ok(Self::Send(OutboundAction::typing(chat_id, is_typing)))
            }
            "sub" => single_arg(rest, "usage: sub <chat_id>")
                .map(|chat_id| Self::Send(OutboundAction::subscribe(chat_id))),
            "unsub" => single_arg(rest, "usage: unsub <chat_id>")
                .map(|chat_id| Self::Send(OutboundAction::unsubscribe(chat_id))),
            "online" => Ok(Self::Send(OutboundAction::heartbeat(true))),
            "offline" => Ok(Self::Send(OutboundAction::heartbeat(false))),
            "status" => Ok(Self::Status),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(AppError::invalid_input(format!("unknown command '{other}'"))),
        }
    }
}

fn single_arg<'a>(rest: &'a str, usage: &str) -> AppResult<&'a str> {
    let mut args = rest.split_whitespace();
    match (args.next(), args.next()) {
        (Some(arg), None) => Ok(arg),
        _ => Err(AppError::invalid_input(usage)),
    }
}
