//! Module `commands`
//!
//! Defines the command set of the storage protocol, the parser that turns
//! a received line into a [`Command`], and the result type handlers return.

use crate::error::ProtocolError;
use crate::gateway::ObjectBody;

/// A file announced by a `STOR` line. Its `size` raw bytes follow the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEntry {
    pub name: String,
    pub size: u64,
}

/// Arguments of a `STOR` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadManifest {
    pub directory: String,
    pub files: Vec<UploadEntry>,
}

impl UploadManifest {
    /// Bytes announced for the whole request
    pub fn total_size(&self) -> u64 {
        self.files
            .iter()
            .fold(0u64, |total, entry| total.saturating_add(entry.size))
    }
}

/// Represents a command parsed from the client input.
///
/// Commands that require arguments store them as `String` variants.
#[derive(Debug, PartialEq)]
pub enum Command {
    USER(String), // Username for login
    PASS(String), // Password for login
    LOGOUT,
    QUIT,
    NOOP,
    STAT(String), // Resource info
    LIST(String), // Directory contents, root when empty
    MKD(String),  // Create empty directory
    DELE(String), // Delete file or directory
    MOVE { from: String, to: String },
    FIND(String), // Search by name
    STOR(UploadManifest),
    RETR(String), // Download file or directory
}

/// Represents the outcome status of executing a command.
#[derive(Debug, PartialEq)]
pub enum CommandStatus {
    Success,
    Failure(String),
    CloseConnection,
}

/// Struct encapsulating the full result of a command execution.
#[derive(Debug)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub message: Option<String>,
    /// Body streamed after the reply line (downloads)
    pub payload: Option<ObjectBody>,
}

/// Parses a raw command line received from a client into a [`Command`].
///
/// The verb is case-insensitive. Arguments are split with
/// [`split_arguments`], so every command takes names containing spaces the
/// same way: quoted.
pub fn parse_command(raw: &str) -> Result<Command, ProtocolError> {
    let trimmed = raw.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("").to_ascii_uppercase();
    let args = split_arguments(parts.next().unwrap_or(""))?;

    let command = match cmd.as_str() {
        "USER" => Command::USER(single(&cmd, args)?),
        "PASS" => Command::PASS(single(&cmd, args)?),
        "LOGOUT" => Command::LOGOUT,
        "QUIT" | "Q" => Command::QUIT,
        "NOOP" => Command::NOOP,
        "STAT" => Command::STAT(single(&cmd, args)?),
        "LIST" => Command::LIST(optional(&cmd, args)?),
        "MKD" => Command::MKD(single(&cmd, args)?),
        "DELE" => Command::DELE(single(&cmd, args)?),
        "FIND" => Command::FIND(single(&cmd, args)?),
        "RETR" => Command::RETR(single(&cmd, args)?),
        "MOVE" => parse_move(args)?,
        "STOR" => Command::STOR(parse_upload(args)?),
        "" => return Err(ProtocolError::Malformed("empty command".into())),
        _ => return Err(ProtocolError::UnknownCommand(cmd)),
    };
    Ok(command)
}

/// Splits the argument part of a command line into tokens.
///
/// Tokens are separated by whitespace. A double-quoted section may contain
/// whitespace, and inside it a backslash escapes the next character (`\"`,
/// `\\`). Quoted and bare parts written next to each other form one token,
/// so `"my file.txt":12` is the single token `my file.txt:12`.
pub fn split_arguments(arg: &str) -> Result<Vec<String>, ProtocolError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = arg.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped) => current.push(escaped),
                            None => return Err(unterminated_quote()),
                        },
                        Some(other) => current.push(other),
                        None => return Err(unterminated_quote()),
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            other => {
                in_token = true;
                current.push(other);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn unterminated_quote() -> ProtocolError {
    ProtocolError::Malformed("unterminated quoted argument".into())
}

/// Exactly one non-empty argument
fn single(cmd: &str, args: Vec<String>) -> Result<String, ProtocolError> {
    match <[String; 1]>::try_from(args) {
        Ok([arg]) if !arg.is_empty() => Ok(arg),
        Ok(_) => Err(ProtocolError::Malformed(format!("{} requires an argument", cmd))),
        Err(args) if args.is_empty() => Err(ProtocolError::Malformed(format!(
            "{} requires an argument",
            cmd
        ))),
        Err(_) => Err(ProtocolError::Malformed(format!(
            "{} takes one argument; quote names containing spaces",
            cmd
        ))),
    }
}

/// At most one argument, empty when absent
fn optional(cmd: &str, mut args: Vec<String>) -> Result<String, ProtocolError> {
    match args.len() {
        0 => Ok(String::new()),
        1 => Ok(args.remove(0)),
        _ => Err(ProtocolError::Malformed(format!(
            "{} takes at most one argument; quote names containing spaces",
            cmd
        ))),
    }
}

fn parse_move(args: Vec<String>) -> Result<Command, ProtocolError> {
    match <[String; 2]>::try_from(args) {
        Ok([from, to]) => Ok(Command::MOVE { from, to }),
        Err(_) => Err(ProtocolError::Malformed("usage: MOVE <from> <to>".into())),
    }
}

/// Parses `<dir> <name>:<size> [<name>:<size> ...]`
fn parse_upload(args: Vec<String>) -> Result<UploadManifest, ProtocolError> {
    let mut tokens = args.into_iter();
    let directory = tokens
        .next()
        .ok_or_else(|| ProtocolError::Malformed("usage: STOR <dir> <name>:<size>...".into()))?;

    let files = tokens
        .map(|token| {
            let (name, size) = token
                .rsplit_once(':')
                .ok_or_else(|| ProtocolError::Malformed(format!("expected <name>:<size>, got {}", token)))?;
            let size = size
                .parse::<u64>()
                .map_err(|_| ProtocolError::Malformed(format!("invalid size for {}: {}", name, size)))?;
            Ok(UploadEntry {
                name: name.to_string(),
                size,
            })
        })
        .collect::<Result<Vec<_>, ProtocolError>>()?;

    if files.is_empty() {
        return Err(ProtocolError::Malformed("STOR requires at least one file".into()));
    }

    Ok(UploadManifest { directory, files })
}
