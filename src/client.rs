//! Client-side commands: upload and download a single file.

use crate::error::TransferError;
use crate::processor::{self, Handshake, TransferStats};
use crate::session::Session;
use crate::tftp::{FileMode, Packet};
use std::path::Path;
use tokio::fs::{File, OpenOptions};

pub const HELP: &str = "List of available commands

       put file - upload file
       get file - download file
       help     - print help
       exit     - quit session
";

/// One line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Put(String),
    Get(String),
    Help,
    Exit,
}

impl Command {
    /// The command name runs up to the first space, the rest of the line is its argument.
    /// Unknown commands, and put/get without a path, ask for help.
    pub fn parse(line: &str) -> Command {
        let line = line.trim_end_matches(['\r', '\n']);
        let (name, argument) = match line.split_once(' ') {
            Some((name, argument)) => (name, argument),
            None => (line, ""),
        };

        match (name, argument) {
            ("exit" | "q", _) => Command::Exit,
            ("put", path) if !path.is_empty() => Command::Put(path.to_string()),
            ("get", path) if !path.is_empty() => Command::Get(path.to_string()),
            _ => Command::Help,
        }
    }
}

/// Uploads `local` to the server under the name `remote`.
pub async fn put_file(
    session: &mut Session<'_>,
    local: &Path,
    remote: &str,
) -> Result<TransferStats, TransferError> {
    let mut file = File::open(local).await?;

    let request = Packet::WriteReq {
        filename: remote.to_string(),
        mode: Some(FileMode::Octet.to_string()),
    }
    .encode()?;
    session.send_with_retry(&request).await?;
    log::info!("[{}] Write request sent, awaiting response", session.tag());

    processor::send_file(session, &mut file, Handshake::AwaitAckZero).await
}

/// Downloads `remote` from the server into `local`, replacing any existing file.
///
/// The local file is created before the request goes out, so a failed download leaves an empty
/// or partial file behind.
pub async fn get_file(
    session: &mut Session<'_>,
    remote: &str,
    local: &Path,
) -> Result<TransferStats, TransferError> {
    let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(local).await?;

    let request = Packet::ReadReq {
        filename: remote.to_string(),
        mode: Some(FileMode::Octet.to_string()),
    }
    .encode()?;
    session.send_with_retry(&request).await?;
    log::info!("[{}] Read request sent, awaiting response", session.tag());

    processor::receive_file(session, &mut file).await
}
