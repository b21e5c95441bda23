//! Input line parsing.
//!
//! Lines starting with `/` are commands; anything else is message text.

use thiserror::Error;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send the line as a chat message.
    Message {
        /// Raw text; the client trims and rejects empty input.
        text: String,
    },
    /// Request a share token and print the invite link.
    Share,
    /// Leave the room and exit.
    Leave,
    /// Print the command list.
    Help,
}

/// Unusable command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Slash command that does not exist.
    #[error("unknown command: /{0} (try /help)")]
    Unknown(String),
}

/// One-line summary of the available commands.
pub const HELP: &str = "/share prints an invite link, /leave exits, anything else is sent";

impl Command {
    /// Parse one input line.
    ///
    /// `//text` sends `/text` as a message.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim_end_matches(['\r', '\n']);

        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Self::Message { text: line.to_string() });
        };
        if rest.starts_with('/') {
            return Ok(Self::Message { text: rest.to_string() });
        }

        let name = rest.split_whitespace().next().unwrap_or("");
        match name {
            "share" | "invite" => Ok(Self::Share),
            "leave" | "quit" | "q" => Ok(Self::Leave),
            "help" | "?" => Ok(Self::Help),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
