use std::time::Duration;

/// How long to wait for a reply before retransmitting.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Consecutive stale or unexpected packets tolerated before a transfer is abandoned.
pub const DEFAULT_MAX_STALE_PACKETS: usize = 64;

/// Tunables shared by every transfer on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Readiness wait before the last datagram is sent again.
    pub timeout: Duration,

    /// Retransmission ceiling. `None` retransmits until the peer answers or the socket fails.
    pub max_retransmits: Option<u32>,

    /// Limit on packets discarded in a row while waiting for the expected block.
    pub max_stale_packets: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retransmits: None,
            max_stale_packets: DEFAULT_MAX_STALE_PACKETS,
        }
    }
}

impl TransferConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retransmits(mut self, max_retransmits: Option<u32>) -> Self {
        self.max_retransmits = max_retransmits;
        self
    }

    pub fn with_max_stale_packets(mut self, max_stale_packets: usize) -> Self {
        self.max_stale_packets = max_stale_packets;
        self
    }
}
