// Wire codec for the five TFTP packet kinds (RFC 1350).
//
// RRQ/WRQ packet:
// 0x01/0x02 | Filename | 0x00 | Mode | 0x00
//
// DATA packet:
// 0x03 | Block # (2 bytes) | Data (0-512 bytes)
//
// ACK packet:
// 0x04 | Block # (2 bytes)
//
// ERROR packet:
// 0x05 | ErrorCode (2 bytes) | ErrMsg | 0x00
//
// All multi-byte integers are in network byte order. A DATA packet carrying fewer than 512
// bytes ends the transfer. Block numbers are 16 bits and wrap after 65535, so transfers longer
// than 65536 blocks alias earlier block numbers.

use crate::error::CodecError;
use std::fmt;
use std::str::FromStr;

/// Size of a full DATA block.
pub const BLOCK_SIZE: usize = 512;

/// Opcode plus block number.
pub const DATA_HEADER_SIZE: usize = 4;

/// Upper bound on the size of an encoded RRQ/WRQ packet.
pub const MAX_REQUEST_SIZE: usize = 4096;

/// Largest datagram we will ever try to receive.
pub const MAX_DATAGRAM_SIZE: usize = 65536;

/// Maximum number of NUL-terminated fields accepted in a request.
pub const MAX_REQUEST_FIELDS: usize = 16;

/// A request field of this many bytes or more is rejected.
pub const MAX_FIELD_LEN: usize = 256;

type CodecResult<T> = Result<T, CodecError>;

/// TFTP packet opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Rrq = 1,
    Wrq = 2,
    Data = 3,
    Ack = 4,
    Error = 5,
}

impl OpCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::Rrq => "RRQ",
            OpCode::Wrq => "WRQ",
            OpCode::Data => "DATA",
            OpCode::Ack => "ACK",
            OpCode::Error => "ERROR",
        }
    }
}

impl TryFrom<u16> for OpCode {
    type Error = CodecError;

    fn try_from(raw: u16) -> CodecResult<OpCode> {
        match raw {
            1 => Ok(OpCode::Rrq),
            2 => Ok(OpCode::Wrq),
            3 => Ok(OpCode::Data),
            4 => Ok(OpCode::Ack),
            5 => Ok(OpCode::Error),
            _ => Err(CodecError::UnknownOpCode(raw)),
        }
    }
}

/// Represents a TFTP Error code surfaced by a TFTP Error packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotDefined = 0,
    FileNotFound = 1,
    AccessViolation = 2,
    DiskFull = 3,
    IllegalOperation = 4,
    UnknownTid = 5,
    FileAlreadyExists = 6,
    NoSuchUser = 7,
}

impl ErrorCode {
    /// Codes outside 0-7 are folded into `NotDefined`.
    pub fn from_u16(raw: u16) -> ErrorCode {
        match raw {
            1 => ErrorCode::FileNotFound,
            2 => ErrorCode::AccessViolation,
            3 => ErrorCode::DiskFull,
            4 => ErrorCode::IllegalOperation,
            5 => ErrorCode::UnknownTid,
            6 => ErrorCode::FileAlreadyExists,
            7 => ErrorCode::NoSuchUser,
            _ => ErrorCode::NotDefined,
        }
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// The standard human-readable description sent in ERROR packets.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::NotDefined => "Not defined, see error message (if any).",
            ErrorCode::FileNotFound => "File not found.",
            ErrorCode::AccessViolation => "Access violation.",
            ErrorCode::DiskFull => "Disk full or allocation exceeded.",
            ErrorCode::IllegalOperation => "Illegal TFTP operation.",
            ErrorCode::UnknownTid => "Unknown transfer ID.",
            ErrorCode::FileAlreadyExists => "File already exists.",
            ErrorCode::NoSuchUser => "No such user.",
        }
    }
}

/// Transfer modes recognised in requests. Only octet is transferred as such; netascii is
/// recognised by name but never translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    NetAscii,
    Octet,
}

impl FromStr for FileMode {
    type Err = ();

    fn from_str(raw: &str) -> Result<FileMode, ()> {
        match raw.to_ascii_lowercase().as_str() {
            "octet" => Ok(FileMode::Octet),
            "netascii" => Ok(FileMode::NetAscii),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FileMode::NetAscii => write!(f, "netascii"),
            FileMode::Octet => write!(f, "octet"),
        }
    }
}

/// An enum representing a TFTP packet and its associated data.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// A read request packet
    ReadReq {
        /// The file path the client wants to read.
        filename: String,

        /// The transfer mode, if the request carried one.
        mode: Option<String>,
    },

    /// A write request packet
    WriteReq {
        filename: String,
        mode: Option<String>,
    },

    /// A data packet
    Data {
        /// The block number for this data packet.
        block: u16,

        /// The contents of the data itself.
        data: Vec<u8>,
    },

    /// An acknowledgment packet
    Ack {
        /// The block being acknowledged.
        block: u16,
    },

    /// An error packet.
    Error {
        code: ErrorCode,
        message: String,
    },
}

pub fn encode_u16(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn decode_u16(buf: &[u8], offset: usize) -> CodecResult<u16> {
    match buf.get(offset..offset + 2) {
        Some(b) => Ok(u16::from_be_bytes([b[0], b[1]])),
        None => Err(CodecError::Truncated {
            expected: offset + 2,
            actual: buf.len(),
        }),
    }
}

/// Guards decodes against undersized datagrams. A `false` result is a protocol violation.
pub fn check_min_length(expected: usize, actual: usize) -> bool {
    if actual < expected {
        log::warn!("Received {actual} bytes, expected {expected} bytes at least");
        return false;
    }
    true
}

/// Writes the opcode followed by every parameter as a NUL-terminated string.
pub fn encode_header(opcode: OpCode, params: &[&str], limit: usize) -> CodecResult<Vec<u8>> {
    let needed = 2 + params.iter().map(|p| p.len() + 1).sum::<usize>();
    if needed > limit {
        return Err(CodecError::BufferTooSmall { needed, limit });
    }

    let mut buf = Vec::with_capacity(needed);
    buf.extend_from_slice(&encode_u16(opcode.as_u16()));
    for param in params {
        buf.extend_from_slice(param.as_bytes());
        buf.push(0x00);
    }
    Ok(buf)
}

/// Splits the post-opcode part of a request on NUL boundaries.
///
/// Bytes trailing the last NUL form a final field. At least one NUL must be present. Fields
/// must be valid UTF-8, so two distinct byte strings never name the same file.
pub fn split_request_params(raw: &[u8]) -> CodecResult<Vec<String>> {
    if !raw.contains(&0x00) {
        return Err(CodecError::MissingTerminator);
    }

    let mut fields = Vec::new();
    let mut rest = raw;
    while !rest.is_empty() {
        if fields.len() >= MAX_REQUEST_FIELDS {
            return Err(CodecError::TooManyFields(MAX_REQUEST_FIELDS));
        }

        let end = rest.iter().position(|&b| b == 0x00).unwrap_or(rest.len());
        if end >= MAX_FIELD_LEN {
            return Err(CodecError::FieldTooLong(MAX_FIELD_LEN));
        }

        let field = std::str::from_utf8(&rest[..end]).map_err(|_| CodecError::InvalidText)?;
        fields.push(field.to_string());
        rest = rest.get(end + 1..).unwrap_or(&[]);
    }

    Ok(fields)
}

fn parse_request(buf: &[u8]) -> CodecResult<(String, Option<String>)> {
    let mut fields = split_request_params(&buf[2..])?.into_iter();
    let filename = fields.next().unwrap_or_default();
    if filename.is_empty() {
        return Err(CodecError::MissingFilename);
    }
    Ok((filename, fields.next()))
}

impl Packet {
    pub fn opcode(&self) -> OpCode {
        match self {
            Packet::ReadReq { .. } => OpCode::Rrq,
            Packet::WriteReq { .. } => OpCode::Wrq,
            Packet::Data { .. } => OpCode::Data,
            Packet::Ack { .. } => OpCode::Ack,
            Packet::Error { .. } => OpCode::Error,
        }
    }

    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        match self {
            Packet::ReadReq { filename, mode } | Packet::WriteReq { filename, mode } => {
                let mut params = vec![filename.as_str()];
                if let Some(mode) = mode {
                    params.push(mode.as_str());
                }
                encode_header(self.opcode(), &params, MAX_REQUEST_SIZE)
            }
            Packet::Data { block, data } => {
                if data.len() > BLOCK_SIZE {
                    return Err(CodecError::OversizedBlock(data.len()));
                }
                let mut buf = Vec::with_capacity(DATA_HEADER_SIZE + data.len());
                buf.extend_from_slice(&encode_u16(OpCode::Data.as_u16()));
                buf.extend_from_slice(&encode_u16(*block));
                buf.extend_from_slice(data);
                Ok(buf)
            }
            Packet::Ack { block } => {
                let mut buf = Vec::with_capacity(4);
                buf.extend_from_slice(&encode_u16(OpCode::Ack.as_u16()));
                buf.extend_from_slice(&encode_u16(*block));
                Ok(buf)
            }
            Packet::Error { code, message } => {
                let mut buf = encode_header(OpCode::Error, &[], MAX_REQUEST_SIZE)?;
                buf.extend_from_slice(&encode_u16(code.as_u16()));
                buf.extend_from_slice(message.as_bytes());
                buf.push(0x00);
                Ok(buf)
            }
        }
    }

    pub fn decode(buf: &[u8]) -> CodecResult<Packet> {
        let opcode = OpCode::try_from(decode_u16(buf, 0)?)?;
        match opcode {
            OpCode::Rrq => {
                let (filename, mode) = parse_request(buf)?;
                Ok(Packet::ReadReq { filename, mode })
            }
            OpCode::Wrq => {
                let (filename, mode) = parse_request(buf)?;
                Ok(Packet::WriteReq { filename, mode })
            }
            OpCode::Data => {
                let block = decode_u16(buf, 2)?;
                let data = &buf[DATA_HEADER_SIZE..];
                if data.len() > BLOCK_SIZE {
                    return Err(CodecError::OversizedBlock(data.len()));
                }
                Ok(Packet::Data { block, data: data.to_vec() })
            }
            OpCode::Ack => Ok(Packet::Ack { block: decode_u16(buf, 2)? }),
            OpCode::Error => {
                let code = ErrorCode::from_u16(decode_u16(buf, 2)?);
                let raw = &buf[4..];
                let end = raw.iter().position(|&b| b == 0x00).unwrap_or(raw.len());
                let message = String::from_utf8_lossy(&raw[..end]).into_owned();
                Ok(Packet::Error { code, message })
            }
        }
    }
}

/// One-line summary of a raw datagram for diagnostics. Never fails.
pub fn describe(buf: &[u8]) -> String {
    let Ok(raw) = decode_u16(buf, 0) else {
        return format!("runt packet ({} bytes)", buf.len());
    };
    match Packet::decode(buf) {
        Ok(Packet::ReadReq { filename, mode }) => {
            format!("RRQ '{filename}' mode {}", mode.as_deref().unwrap_or("(none)"))
        }
        Ok(Packet::WriteReq { filename, mode }) => {
            format!("WRQ '{filename}' mode {}", mode.as_deref().unwrap_or("(none)"))
        }
        Ok(Packet::Data { block, data }) => format!("DATA block #{block} size {}", data.len()),
        Ok(Packet::Ack { block }) => format!("ACK block #{block}"),
        Ok(Packet::Error { code, message }) => format!(
            "ERROR code {} ({}) '{message}'",
            code.as_u16(),
            code.message()
        ),
        Err(e) => format!("UNKNOWN opcode {raw} size {} ({e})", buf.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_read_req() {
        let buf = vec![
            // opcode
            0x00, 0x01,
            // path: path/to/data.txt with terminating nullchar
            0x70, 0x61, 0x74, 0x68, 0x2F, 0x74, 0x6F, 0x2F, 0x64, 0x61, 0x74, 0x61, 0x2E, 0x74, 0x78, 0x74, 0x00,
            // mode: octet
            0x6F, 0x63, 0x74, 0x65, 0x74, 0x00];

        let packet = Packet::decode(&buf);
        assert!(packet.is_ok());
        assert_eq!(
            packet.unwrap(),
            Packet::ReadReq { filename: "path/to/data.txt".to_string(), mode: Some("octet".to_string()) }
        );
    }

    #[test]
    fn test_packet_write_req_without_mode() {
        let buf = vec![0x00, 0x02, 0x61, 0x2E, 0x62, 0x00];

        let packet = Packet::decode(&buf);
        assert!(packet.is_ok());
        assert_eq!(packet.unwrap(), Packet::WriteReq { filename: "a.b".to_string(), mode: None });
    }

    #[test]
    fn test_packet_parses_data() {
        let buf = vec![
            // opcode
            0x00, 0x03,
            // block number
            0x12, 0x34,
            // data
            0xDE, 0xAD, 0xBE, 0xEF];

        let packet = Packet::decode(&buf);
        assert!(packet.is_ok());
        assert_eq!(packet.unwrap(), Packet::Data { block: 0x1234, data: vec![0xDE, 0xAD, 0xBE, 0xEF] });
    }

    #[test]
    fn test_packet_parses_ack() {
        let buf = vec![0x00, 0x04, 0x10, 0x2f];
        let packet = Packet::decode(&buf);
        assert!(packet.is_ok());
        assert_eq!(packet.unwrap(), Packet::Ack { block: 0x102f });
    }

    #[test]
    fn test_packet_parses_error() {
        let buf = vec![
            // opcode
            0x00, 0x05,
            // Error code
            0x00, 0x04,
            // Error message: Illegal! with terminating nullchar
            0x49, 0x6C, 0x6C, 0x65, 0x67, 0x61, 0x6C, 0x21, 0x00];

        let packet = Packet::decode(&buf);
        assert!(packet.is_ok());
        assert_eq!(
            packet.unwrap(),
            Packet::Error { code: ErrorCode::IllegalOperation, message: "Illegal!".to_string() }
        );
    }

    #[test]
    fn test_packet_parse_failures() {
        // Too short for an opcode
        assert!(!Packet::decode(&[0x10]).is_ok());
        // Invalid opcodes
        assert_eq!(Packet::decode(&[0x10, 0x00]), Err(CodecError::UnknownOpCode(0x1000)));
        assert_eq!(Packet::decode(&[0x00, 0x09]), Err(CodecError::UnknownOpCode(9)));
        // Unterminated read path
        assert_eq!(Packet::decode(&[0x00, 0x01, 0x68, 0x69]), Err(CodecError::MissingTerminator));
        // Empty filename
        assert_eq!(Packet::decode(&[0x00, 0x01, 0x00]), Err(CodecError::MissingFilename));
        // Ack without block number
        assert!(!Packet::decode(&[0x00, 0x04, 0x01]).is_ok());
        // Data block larger than 512 bytes
        let mut oversized = vec![0x00, 0x03, 0x00, 0x01];
        oversized.extend(vec![0x78; BLOCK_SIZE + 1]);
        assert_eq!(Packet::decode(&oversized), Err(CodecError::OversizedBlock(BLOCK_SIZE + 1)));
    }

    #[test]
    fn test_request_round_trip() {
        let requests = vec![
            Packet::ReadReq { filename: "c.txt".to_string(), mode: Some("octet".to_string()) },
            Packet::WriteReq { filename: "a/b/c.txt".to_string(), mode: Some("OcTeT".to_string()) },
            Packet::ReadReq { filename: "boot.img".to_string(), mode: None },
        ];
        for request in requests {
            let encoded = request.encode().unwrap();
            assert_eq!(Packet::decode(&encoded).unwrap(), request);
        }
    }

    #[test]
    fn test_encode_data_and_ack() {
        let data = Packet::Data { block: 0x0102, data: vec![0xAA, 0xBB] }.encode().unwrap();
        assert_eq!(data, vec![0x00, 0x03, 0x01, 0x02, 0xAA, 0xBB]);

        let ack = Packet::Ack { block: 65535 }.encode().unwrap();
        assert_eq!(ack, vec![0x00, 0x04, 0xFF, 0xFF]);

        let too_big = Packet::Data { block: 1, data: vec![0; BLOCK_SIZE + 1] }.encode();
        assert_eq!(too_big, Err(CodecError::OversizedBlock(BLOCK_SIZE + 1)));
    }

    #[test]
    fn test_encode_error() {
        let packet = Packet::Error {
            code: ErrorCode::AccessViolation,
            message: ErrorCode::AccessViolation.message().to_string(),
        };
        let encoded = packet.encode().unwrap();
        assert_eq!(&encoded[..4], &[0x00, 0x05, 0x00, 0x02]);
        assert_eq!(*encoded.last().unwrap(), 0x00);
        assert_eq!(Packet::decode(&encoded).unwrap(), packet);
    }

    #[test]
    fn test_encode_header_limit() {
        // 2 bytes opcode + "ab\0" + "octet\0" = 11 bytes
        assert_eq!(encode_header(OpCode::Rrq, &["ab", "octet"], 11).unwrap().len(), 11);
        assert_eq!(
            encode_header(OpCode::Rrq, &["ab", "octet"], 10),
            Err(CodecError::BufferTooSmall { needed: 11, limit: 10 })
        );
        assert_eq!(encode_header(OpCode::Ack, &[], 2).unwrap(), vec![0x00, 0x04]);
        assert!(encode_header(OpCode::Ack, &[], 1).is_err());
    }

    #[test]
    fn test_u16_transcoding() {
        assert_eq!(encode_u16(0x1234), [0x12, 0x34]);
        assert_eq!(decode_u16(&[0xFF, 0x12, 0x34], 1).unwrap(), 0x1234);
        assert_eq!(
            decode_u16(&[0x00, 0x03, 0x01], 2),
            Err(CodecError::Truncated { expected: 4, actual: 3 })
        );
    }

    #[test]
    fn test_split_request_params() {
        assert_eq!(
            split_request_params(b"file.txt\0octet\0").unwrap(),
            vec!["file.txt".to_string(), "octet".to_string()]
        );
        assert_eq!(split_request_params(b"file.txt\0").unwrap(), vec!["file.txt".to_string()]);
        // Unterminated trailing bytes still form a field
        assert_eq!(
            split_request_params(b"file.txt\0oct").unwrap(),
            vec!["file.txt".to_string(), "oct".to_string()]
        );
        assert_eq!(split_request_params(b"file.txt"), Err(CodecError::MissingTerminator));
        assert_eq!(split_request_params(b""), Err(CodecError::MissingTerminator));
        // Names that are not UTF-8 are refused rather than mangled
        assert_eq!(split_request_params(b"a\xff.txt\0octet\0"), Err(CodecError::InvalidText));
        assert_eq!(split_request_params(b"a.txt\0oc\xfe\0"), Err(CodecError::InvalidText));
    }

    #[test]
    fn test_split_request_params_limits() {
        let sixteen = "x\0".repeat(MAX_REQUEST_FIELDS);
        assert_eq!(split_request_params(sixteen.as_bytes()).unwrap().len(), MAX_REQUEST_FIELDS);

        let seventeen = "x\0".repeat(MAX_REQUEST_FIELDS + 1);
        assert_eq!(
            split_request_params(seventeen.as_bytes()),
            Err(CodecError::TooManyFields(MAX_REQUEST_FIELDS))
        );

        let mut long = vec![b'a'; MAX_FIELD_LEN - 1];
        long.push(0x00);
        assert!(split_request_params(&long).is_ok());

        let mut too_long = vec![b'a'; MAX_FIELD_LEN];
        too_long.push(0x00);
        assert_eq!(split_request_params(&too_long), Err(CodecError::FieldTooLong(MAX_FIELD_LEN)));
    }

    #[test]
    fn test_check_min_length() {
        assert!(check_min_length(4, 4));
        assert!(check_min_length(2, 516));
        assert!(!check_min_length(4, 3));
    }

    #[test]
    fn test_file_mode_parsing() {
        assert_eq!("octet".parse::<FileMode>(), Ok(FileMode::Octet));
        assert_eq!("OCTET".parse::<FileMode>(), Ok(FileMode::Octet));
        assert_eq!("NetAscii".parse::<FileMode>(), Ok(FileMode::NetAscii));
        assert!("mail".parse::<FileMode>().is_err());
    }

    #[test]
    fn test_error_code_mapping() {
        for raw in 0..8 {
            assert_eq!(ErrorCode::from_u16(raw).as_u16(), raw);
        }
        assert_eq!(ErrorCode::from_u16(42), ErrorCode::NotDefined);
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&[0x00, 0x04, 0x00, 0x07]), "ACK block #7");
        assert_eq!(describe(&[0x00, 0x03, 0x00, 0x01, 0x41]), "DATA block #1 size 1");
        assert_eq!(describe(&[0x01]), "runt packet (1 bytes)");
        assert!(describe(&[0x00, 0x09]).starts_with("UNKNOWN opcode 9"));
    }
}
