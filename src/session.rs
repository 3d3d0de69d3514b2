use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::tftp::{ErrorCode, Packet};
use crate::transport;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Context threaded through every step of a transfer.
///
/// The socket is borrowed because it outlives any single session. The peer address follows
/// the source of the most recently received datagram, and the session stops being alive as
/// soon as a socket operation fails.
pub struct Session<'s> {
    sock: &'s UdpSocket,
    peer: SocketAddr,
    alive: bool,
    tag: &'static str,
    config: TransferConfig,
}

impl<'s> Session<'s> {
    pub fn new(sock: &'s UdpSocket, peer: SocketAddr, tag: &'static str, config: TransferConfig) -> Self {
        Session { sock, peer, alive: true, tag, config }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    fn fail(&mut self, e: TransferError) -> TransferError {
        if e.is_fatal() {
            self.alive = false;
        }
        e
    }

    /// Receives one datagram and rebinds the peer to its source.
    pub async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransferError> {
        match self.sock.recv_from(buf).await {
            Ok((len, src)) => {
                self.peer = src;
                Ok(len)
            }
            Err(e) => {
                log::error!("[{}] Failed to receive data: {e}", self.tag);
                Err(self.fail(TransferError::Transport(e)))
            }
        }
    }

    pub async fn send_with_retry(&mut self, payload: &[u8]) -> Result<usize, TransferError> {
        match transport::send_with_retry(self.sock, payload, self.peer, &self.config).await {
            Ok(sent) => Ok(sent),
            Err(e) => {
                log::error!("[{}] Failed to send data: {e}", self.tag);
                Err(self.fail(e))
            }
        }
    }

    /// Sends a packet once, without waiting for any reply.
    pub async fn send(&mut self, packet: &Packet) -> Result<(), TransferError> {
        let buf = packet.encode()?;
        if let Err(e) = self.sock.send_to(&buf, self.peer).await {
            log::error!("[{}] Failed to send data: {e}", self.tag);
            return Err(self.fail(TransferError::Transport(e)));
        }
        Ok(())
    }

    /// Error packets are a courtesy: a failure to deliver one is only logged.
    pub async fn send_error(&mut self, code: ErrorCode) {
        let packet = Packet::Error { code, message: code.message().to_string() };
        if self.send(&packet).await.is_err() {
            log::warn!("[{}] Could not deliver error {} to {}", self.tag, code.as_u16(), self.peer);
        }
    }
}
