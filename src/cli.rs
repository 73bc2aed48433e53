//! CLI utilities for wiresql.
//!
//! The utilities present in this module back the interactive `wiresql` shell.
use std::io::{self, BufRead, Write};

use thiserror::Error;

/// Possible commands from a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Exit command `.exit`, also produced at end of input
    Exit,
    /// `.begin`
    Begin,
    /// `.commit`
    Commit,
    /// `.rollback`
    Rollback,
    /// SQL text
    Statement(String),
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("unrecognized command '{0}'")]
    Unrecognized(String),
    #[error("prompt IO error: {0}")]
    Io(#[from] io::Error),
}

/// Prompt user for a wiresql command.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Command, PromptError>
where
    R: BufRead,
    W: Write,
{
    let mut s = String::default();
    write!(&mut writer, "> ")?;
    writer.flush()?;

    if reader.read_line(&mut s)? == 0 {
        return Ok(Command::Exit);
    }

    match s.trim() {
        ".exit" => Ok(Command::Exit),
        ".begin" => Ok(Command::Begin),
        ".commit" => Ok(Command::Commit),
        ".rollback" => Ok(Command::Rollback),
        s if !s.starts_with('.') => Ok(Command::Statement(s.to_string())),
        s => Err(PromptError::Unrecognized(s.to_string())),
    }
}
