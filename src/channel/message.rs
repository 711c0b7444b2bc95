//! Channel frame codec.
//!
//! # Frame layout (big endian)
//! ```text
//! ┌──────────┬──────────┬──────────────┬───────────┬─────────┐
//! │ length   │ type     │ seq          │ result    │ payload │
//! │ u32      │ u16      │ 32 bytes     │ i32       │ ...     │
//! └──────────┴──────────┴──────────────┴───────────┴─────────┘
//! ```
//! `length` covers the whole frame including the 42-byte header. `seq` is an
//! ASCII correlation id echoed back by the node in its response.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

/// Header size in bytes.
pub const HEADER_LEN: usize = 4 + 2 + SEQ_LEN + 4;

/// Correlation id size in bytes.
pub const SEQ_LEN: usize = 32;

/// Largest frame sent to or accepted from a node.
pub const MAX_FRAME_LEN: usize = 10 * 1024 * 1024;

/// Frame types understood by this client.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// JSON-RPC request from the client, and the node's response.
    RpcRequest = 0x12,
    /// Keep-alive probe.
    Heartbeat = 0x13,
}

impl MessageType {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// One channel frame.
///
/// `seq` is private so it is always exactly `SEQ_LEN` ASCII bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub kind: u16,
    seq: String,
    pub result: i32,
    pub payload: Vec<u8>,
}

impl ChannelMessage {
    /// New frame with a fresh correlation id.
    pub fn new(kind: MessageType, payload: Vec<u8>) -> Self {
        Self {
            kind: kind.code(),
            seq: new_seq(),
            result: 0,
            payload,
        }
    }

    pub fn rpc(payload: Vec<u8>) -> Self {
        Self::new(MessageType::RpcRequest, payload)
    }

    pub fn heartbeat() -> Self {
        Self::new(MessageType::Heartbeat, b"0".to_vec())
    }

    /// Response frame correlated with `self`.
    pub fn reply(&self, payload: Vec<u8>) -> Self {
        Self {
            kind: self.kind,
            seq: self.seq.clone(),
            result: 0,
            payload,
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.kind == MessageType::Heartbeat.code()
    }

    pub fn seq(&self) -> &str {
        &self.seq
    }

    /// Size of the frame on the wire, header included.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Encode the frame; fails when it would exceed `MAX_FRAME_LEN`.
    pub fn encode(&self) -> LedgerResult<Vec<u8>> {
        let total = self.encoded_len();
        if total > MAX_FRAME_LEN {
            return Err(LedgerError::Protocol(format!(
                "frame of {} bytes exceeds the {}-byte limit",
                total, MAX_FRAME_LEN
            )));
        }

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&(total as u32).to_be_bytes());
        out.extend_from_slice(&self.kind.to_be_bytes());
        out.extend_from_slice(self.seq.as_bytes());
        out.extend_from_slice(&self.result.to_be_bytes());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Decode a complete frame, length prefix included.
    pub fn decode(frame: &[u8]) -> LedgerResult<Self> {
        if frame.len() < HEADER_LEN {
            return Err(LedgerError::Protocol(format!(
                "frame of {} bytes is shorter than the {}-byte header",
                frame.len(),
                HEADER_LEN
            )));
        }
        let declared = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        if declared != frame.len() {
            return Err(LedgerError::Protocol(format!(
                "frame length {} does not match declared {}",
                frame.len(),
                declared
            )));
        }

        let kind = u16::from_be_bytes([frame[4], frame[5]]);
        let seq = &frame[6..6 + SEQ_LEN];
        if !seq.is_ascii() {
            return Err(LedgerError::Protocol("seq is not ASCII".to_string()));
        }
        let seq = String::from_utf8_lossy(seq).into_owned();
        let at = 6 + SEQ_LEN;
        let result = i32::from_be_bytes([frame[at], frame[at + 1], frame[at + 2], frame[at + 3]]);

        Ok(Self {
            kind,
            seq,
            result,
            payload: frame[HEADER_LEN..].to_vec(),
        })
    }

    /// Read one frame. Returns `None` on a clean EOF between frames.
    pub async fn read_from<R>(reader: &mut R) -> LedgerResult<Option<Self>>
    where
        R: AsyncRead + Unpin,
    {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(LedgerError::Connectivity(format!("read failed: {}", e))),
        }

        let total = u32::from_be_bytes(len_buf) as usize;
        if !(HEADER_LEN..=MAX_FRAME_LEN).contains(&total) {
            return Err(LedgerError::Protocol(format!("invalid frame length {}", total)));
        }

        let mut frame = vec![0u8; total];
        frame[..4].copy_from_slice(&len_buf);
        reader
            .read_exact(&mut frame[4..])
            .await
            .map_err(|e| LedgerError::Connectivity(format!("read failed: {}", e)))?;

        Self::decode(&frame).map(Some)
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> LedgerResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = self.encode()?;
        writer
            .write_all(&frame)
            .await
            .map_err(|e| LedgerError::Connectivity(format!("write failed: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| LedgerError::Connectivity(format!("flush failed: {}", e)))
    }
}

fn new_seq() -> String {
    Uuid::new_v4().simple().to_string()
}
