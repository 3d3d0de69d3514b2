// Lock-step transfer roles shared by the client and the server.
//
// The sender reads a file in 512 byte blocks, sends each block as a DATA packet and waits for
// the matching ACK before reading the next one. The receiver waits for the expected DATA
// block, appends it to the destination and acknowledges it. Both sides finish on the first
// block shorter than 512 bytes, so a file whose size is a multiple of 512 ends with an empty
// block.
//
// Packets carrying the wrong block number are dropped without advancing. Dropping is bounded by
// the session's `max_stale_packets` so a peer that keeps echoing old blocks cannot hold a
// transfer forever.

use crate::error::{CodecError, TransferError};
use crate::session::Session;
use crate::tftp::{self, OpCode, Packet, BLOCK_SIZE, DATA_HEADER_SIZE, MAX_DATAGRAM_SIZE};
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Counters reported back to whoever started the transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub blocks: u64,
    pub bytes: u64,
}

/// What the sender waits for before the first DATA block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// A write request was sent; the peer must answer with ACK for block 0.
    AwaitAckZero,

    /// The peer asked to read; start sending straight away.
    Immediate,
}

/// Turns an ERROR packet into the matching error, anything else into an opcode mismatch.
fn unexpected(buf: &[u8], expected: OpCode) -> TransferError {
    match Packet::decode(buf) {
        Ok(Packet::Error { code, message }) => TransferError::Remote { code, message },
        _ => TransferError::UnexpectedOpCode {
            expected,
            got: tftp::decode_u16(buf, 0).unwrap_or_default(),
        },
    }
}

fn require_length(len: usize) -> Result<(), TransferError> {
    if !tftp::check_min_length(DATA_HEADER_SIZE, len) {
        return Err(CodecError::Truncated { expected: DATA_HEADER_SIZE, actual: len }.into());
    }
    Ok(())
}

/// Waits for the ACK of the write request.
async fn await_ack_zero(session: &mut Session<'_>, buf: &mut [u8]) -> Result<(), TransferError> {
    let len = session.recv(buf).await?;
    log::debug!("[{}] Received {}", session.tag(), tftp::describe(&buf[..len]));
    require_length(len)?;

    if tftp::decode_u16(buf, 0)? != OpCode::Ack.as_u16() {
        return Err(unexpected(&buf[..len], OpCode::Ack));
    }

    match tftp::decode_u16(buf, 2)? {
        0 => Ok(()),
        block => Err(TransferError::BadInitialAck(block)),
    }
}

/// Waits for the ACK of `block`, dropping acknowledgements of any other block.
async fn await_ack(session: &mut Session<'_>, buf: &mut [u8], block: u16) -> Result<(), TransferError> {
    let mut discarded = 0;
    loop {
        let len = session.recv(buf).await?;
        require_length(len)?;

        if tftp::decode_u16(buf, 0)? != OpCode::Ack.as_u16() {
            log::debug!("[{}] Received {}", session.tag(), tftp::describe(&buf[..len]));
            return Err(unexpected(&buf[..len], OpCode::Ack));
        }

        let acked = tftp::decode_u16(buf, 2)?;
        if acked == block {
            return Ok(());
        }

        log::warn!("[{}] ACK: expected block #{block}, got #{acked} - ignored", session.tag());
        discarded += 1;
        if discarded > session.config().max_stale_packets {
            return Err(TransferError::TooManyStalePackets(discarded));
        }
    }
}

/// Reads one block, filling it completely unless the source runs out.
async fn read_block<R: AsyncRead + Unpin>(source: &mut R) -> Result<Vec<u8>, io::Error> {
    let mut buf = vec![0_u8; BLOCK_SIZE];
    let mut cursor = 0;

    // A single read may return fewer bytes than requested without being at EOF, so keep going
    // until the block is full or the source is exhausted.
    while cursor < buf.len() {
        match source.read(&mut buf[cursor..]).await? {
            0 => break,
            n => cursor += n,
        }
    }

    buf.truncate(cursor);
    Ok(buf)
}

/// Runs the sending side of a transfer until the last block is acknowledged.
pub async fn send_file<R: AsyncRead + Unpin>(
    session: &mut Session<'_>,
    source: &mut R,
    handshake: Handshake,
) -> Result<TransferStats, TransferError> {
    let mut buf = vec![0_u8; MAX_DATAGRAM_SIZE];
    let mut stats = TransferStats::default();
    let mut block = 0_u16;

    if handshake == Handshake::AwaitAckZero {
        await_ack_zero(session, &mut buf).await?;
        log::info!("[{}] Transfer acknowledged", session.tag());
    }

    loop {
        let data = read_block(source).await?;
        let last = data.len() < BLOCK_SIZE;
        let size = data.len() as u64;

        // Block numbers wrap after 65535.
        block = block.wrapping_add(1);
        let packet = Packet::Data { block, data }.encode()?;
        session.send_with_retry(&packet).await?;
        await_ack(session, &mut buf, block).await?;

        stats.blocks += 1;
        stats.bytes += size;
        log::debug!("[{}] Progress: sent {} blocks", session.tag(), stats.blocks);

        if last {
            break;
        }
    }

    log::info!("[{}] Sent {} blocks ({} bytes) to {}", session.tag(), stats.blocks, stats.bytes, session.peer());
    Ok(stats)
}

/// Runs the receiving side of a transfer until a short block has been written and acknowledged.
pub async fn receive_file<W: AsyncWrite + Unpin>(
    session: &mut Session<'_>,
    sink: &mut W,
) -> Result<TransferStats, TransferError> {
    let mut buf = vec![0_u8; MAX_DATAGRAM_SIZE];
    let mut stats = TransferStats::default();
    let mut expected = 1_u16;
    let mut discarded = 0;

    loop {
        let len = session.recv(&mut buf).await?;
        require_length(len)?;

        let opcode = tftp::decode_u16(&buf, 0)?;
        let block = tftp::decode_u16(&buf, 2)?;
        if opcode == OpCode::Error.as_u16() {
            return Err(unexpected(&buf[..len], OpCode::Data));
        }

        let matched = opcode == OpCode::Data.as_u16() && block == expected;
        if !matched {
            if opcode != OpCode::Data.as_u16() {
                log::warn!(
                    "[{}] Expected a DATA packet, got {} - ignored",
                    session.tag(),
                    tftp::describe(&buf[..len])
                );
            } else {
                log::warn!("[{}] DATA: expected block #{expected}, got #{block} - ignored", session.tag());
            }
            discarded += 1;
            if discarded > session.config().max_stale_packets {
                return Err(TransferError::TooManyStalePackets(discarded));
            }
            continue;
        }

        let data = &buf[DATA_HEADER_SIZE..len];
        if data.len() > BLOCK_SIZE {
            return Err(CodecError::OversizedBlock(data.len()).into());
        }

        sink.write_all(data).await?;
        session.send(&Packet::Ack { block }).await?;

        discarded = 0;
        stats.blocks += 1;
        stats.bytes += data.len() as u64;
        log::debug!("[{}] Progress: received {} blocks", session.tag(), stats.blocks);

        if data.len() < BLOCK_SIZE {
            break;
        }
        expected = expected.wrapping_add(1);
    }

    sink.flush().await?;
    log::info!(
        "[{}] Received {} blocks ({} bytes) from {}",
        session.tag(),
        stats.blocks,
        stats.bytes,
        session.peer()
    );
    Ok(stats)
}
