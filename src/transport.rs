// Send-with-retransmit primitive.
//
// A datagram is sent, then we wait for the socket to become readable. Every time the wait
// times out the very same datagram is sent again. The reply itself is never read here: the
// caller receives and interprets it once the socket is readable.

use crate::config::TransferConfig;
use crate::error::TransferError;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Sends `payload` to `peer` until the socket has something to read.
///
/// Returns the number of bytes handed to the socket by the last send. Retransmission is
/// unbounded unless `config.max_retransmits` is set.
pub async fn send_with_retry(
    sock: &UdpSocket,
    payload: &[u8],
    peer: SocketAddr,
    config: &TransferConfig,
) -> Result<usize, TransferError> {
    let mut retransmits = 0_u32;
    loop {
        let sent = sock.send_to(payload, peer).await.map_err(TransferError::Transport)?;

        match timeout(config.timeout, sock.readable()).await {
            Ok(Ok(())) => return Ok(sent),
            Ok(Err(e)) => return Err(TransferError::Transport(e)),
            Err(_) => {
                if config.max_retransmits.is_some_and(|max| retransmits >= max) {
                    return Err(TransferError::RetriesExhausted(retransmits));
                }
                retransmits += 1;
                log::debug!("No reply from {peer} after {:?}, retransmitting", config.timeout);
            }
        }
    }
}
