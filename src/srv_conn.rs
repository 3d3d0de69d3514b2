// Server-side request handling.
//
// The server owns one socket and one session, so it serves exactly one transfer at a time. A
// transfer starts when a datagram arrives while the server is idle:
//
// 1. The opcode is decoded. Only RRQ and WRQ may start a transfer, anything else is answered
//    with an ILLEGAL_OPERATION error and no file is touched.
// 2. The filename and optional mode are split out of the request. Absolute paths and paths that
//    climb out of the root with `..` are refused with ACCESS_VIOLATION.
// 3. The rest of the exchange goes to whatever address sent that datagram, over the same
//    socket. No ephemeral transfer port is allocated, so a second client talking during a
//    transfer ends up inside the running transfer.
//
// A read request runs the sending role, a write request acknowledges block 0 and runs the
// receiving role. When a request fails, the error is mapped to a TFTP error code and sent back
// as a courtesy before the server returns to idle.

use crate::error::{CodecError, TransferError};
use crate::processor::{self, Handshake, TransferStats};
use crate::session::Session;
use crate::tftp::{self, FileMode, OpCode, Packet, MAX_DATAGRAM_SIZE};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};

/// Refuses absolute paths and any attempt to walk up the directory tree.
pub fn validate_path(filename: &str) -> Result<(), TransferError> {
    let escapes = filename.starts_with('/')
        || filename.contains("../")
        || filename == ".."
        || filename.ends_with("/..");
    if escapes {
        return Err(TransferError::AccessViolation(filename.to_string()));
    }
    Ok(())
}

fn resolve(root: &Path, filename: &str) -> Result<PathBuf, TransferError> {
    validate_path(filename)?;
    Ok(root.join(filename))
}

async fn handle_rrq(
    session: &mut Session<'_>,
    root: &Path,
    filename: &str,
    mode: Option<&str>,
) -> Result<TransferStats, TransferError> {
    log::info!("[{}] Path: {}", session.tag(), filename);

    match mode {
        None => log::info!("[{}] Assuming octet mode", session.tag()),
        Some(raw) => match raw.parse::<FileMode>() {
            Ok(FileMode::Octet) => log::info!("[{}] Mode: octet", session.tag()),
            // Served byte for byte, there is no netascii translation.
            Ok(FileMode::NetAscii) => log::warn!("[{}] Mode: netascii, sending raw octets", session.tag()),
            Err(()) => return Err(TransferError::InvalidMode(raw.to_string())),
        },
    }

    let path = resolve(root, filename)?;
    let mut file = File::open(&path).await?;
    processor::send_file(session, &mut file, Handshake::Immediate).await
}

async fn handle_wrq(
    session: &mut Session<'_>,
    root: &Path,
    filename: &str,
    mode: Option<&str>,
) -> Result<TransferStats, TransferError> {
    log::info!("[{}] Path: {}", session.tag(), filename);

    match mode {
        None => log::info!("[{}] Assuming octet mode", session.tag()),
        Some(raw) => match raw.parse::<FileMode>() {
            Ok(FileMode::Octet) => log::info!("[{}] Mode: octet", session.tag()),
            _ => return Err(TransferError::UnsupportedMode(raw.to_string())),
        },
    }

    let path = resolve(root, filename)?;
    let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(&path).await?;

    session.send(&Packet::Ack { block: 0 }).await?;
    log::info!("[{}] Transfer acknowledged", session.tag());
    processor::receive_file(session, &mut file).await
}

/// Receives the next request and runs the transfer it asks for.
pub async fn handle_operation(session: &mut Session<'_>, root: &Path) -> Result<TransferStats, TransferError> {
    let mut buf = vec![0_u8; MAX_DATAGRAM_SIZE];
    let len = session.recv(&mut buf).await?;
    log::info!("[{}] Accepted peer {}", session.tag(), session.peer());

    if !tftp::check_min_length(2, len) {
        return Err(CodecError::Truncated { expected: 2, actual: len }.into());
    }
    log::info!("[{}] Received packet: {}", session.tag(), tftp::describe(&buf[..len]));

    let raw = tftp::decode_u16(&buf, 0)?;
    let request = match OpCode::try_from(raw) {
        Ok(OpCode::Rrq | OpCode::Wrq) => Packet::decode(&buf[..len])?,
        _ => {
            log::warn!("[{}] Packet has been ignored", session.tag());
            return Err(TransferError::IllegalOperation(raw));
        }
    };

    match request {
        Packet::ReadReq { filename, mode } => {
            log::info!("[{}] Handling read request", session.tag());
            handle_rrq(session, root, &filename, mode.as_deref()).await
        }
        Packet::WriteReq { filename, mode } => {
            log::info!("[{}] Handling write request", session.tag());
            handle_wrq(session, root, &filename, mode.as_deref()).await
        }
        _ => Err(TransferError::IllegalOperation(raw)),
    }
}

/// Serves a single request, answering failures with an ERROR packet.
pub async fn serve_one(session: &mut Session<'_>, root: &Path) -> Result<TransferStats, TransferError> {
    let result = handle_operation(session, root).await;
    match &result {
        Ok(stats) => log::info!(
            "[{}] Status: success ({} blocks, {} bytes)",
            session.tag(),
            stats.blocks,
            stats.bytes
        ),
        Err(e) => {
            log::error!("[{}] Status: failure ({e})", session.tag());
            if session.is_alive() {
                session.send_error(e.error_code()).await;
            }
        }
    }
    result
}

/// Serves requests one after another until a socket failure ends the session.
pub async fn serve(session: &mut Session<'_>, root: &Path) {
    while session.is_alive() {
        let _ = serve_one(session, root).await;
    }
    log::info!("[{}] Server stopped", session.tag());
}
