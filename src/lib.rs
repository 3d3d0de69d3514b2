// An implementation of a TFTP client and server compliant with RFC 1350, octet mode only.
//
// Transfer begins with a request to read or write a file. The file is then sent in blocks of
// 512 bytes, each carried by one DATA packet that must be acknowledged before the next one is
// sent. A DATA packet shorter than 512 bytes ends the transfer.
//
// On data loss the sender times out and retransmits its last packet. Most errors terminate the
// transfer and are signalled with an ERROR packet, which is never acknowledged or retransmitted.
//
// Opcodes:
// 1        Read req (RRQ)
// 2        Write req (WRQ)
// 3        Data (DATA)
// 4        ACK
// 5        ERROR
//
// Error codes:
// 0    Not defined, see msg
// 1    File not found
// 2    Access violation
// 3    Disk full / alloc exceeded
// 4    Illegal TFTP op
// 5    Unknown TID
// 6    File already exists
// 7    No such user

pub mod client;
pub mod config;
pub mod error;
pub mod processor;
pub mod session;
pub mod srv_conn;
pub mod tftp;
pub mod transport;

#[cfg(test)]
mod test_util;

pub use config::TransferConfig;
pub use error::{CodecError, TransferError};
pub use processor::TransferStats;
pub use session::Session;
