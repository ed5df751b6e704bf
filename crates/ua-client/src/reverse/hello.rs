// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! ReverseHello message codec.
//!
//! ```text
//! ┌─────┬───┬──────────┬────────────────────┬──────────────────────┐
//! │ RHE │ F │ size u32 │ ServerUri (String) │ EndpointUrl (String) │
//! └─────┴───┴──────────┴────────────────────┴──────────────────────┘
//! ```
//!
//! Strings are little-endian `i32` length prefixed UTF-8; `-1` is null.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Header length: message type, chunk type and size.
pub const HEADER_LEN: usize = 8;

/// Maximum encoded length of each string field.
pub const MAX_STRING_LEN: usize = 4096;

const MAX_MESSAGE_LEN: usize = HEADER_LEN + 2 * (4 + MAX_STRING_LEN);

/// ReverseHello decoding failures.
#[derive(Debug, Error)]
pub enum HelloError {
    /// The message type is not `RHEF`.
    #[error("Unexpected message type {0:?}")]
    UnexpectedMessageType([u8; 4]),

    /// The declared size is out of range.
    #[error("Invalid message size {0}")]
    InvalidSize(u32),

    /// A string field is malformed.
    #[error("Invalid {field}: {reason}")]
    InvalidString {
        /// Field name.
        field: &'static str,
        /// Reason.
        reason: String,
    },

    /// The message ended early.
    #[error("Message truncated")]
    Truncated,

    /// The socket failed while reading.
    #[error("Read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// First message a server sends after dialing a client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReverseHello {
    /// Application URI of the server.
    pub server_uri: Option<String>,
    /// Endpoint URL the client should use for this server.
    pub endpoint_url: Option<String>,
}

impl ReverseHello {
    /// Creates a hello.
    pub fn new(server_uri: impl Into<String>, endpoint_url: impl Into<String>) -> Self {
        Self {
            server_uri: Some(server_uri.into()),
            endpoint_url: Some(endpoint_url.into()),
        }
    }

    /// Encodes the message.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        encode_string(&mut body, self.server_uri.as_deref());
        encode_string(&mut body, self.endpoint_url.as_deref());

        let mut message = Vec::with_capacity(HEADER_LEN + body.len());
        message.extend_from_slice(b"RHEF");
        message.extend_from_slice(&((HEADER_LEN + body.len()) as u32).to_le_bytes());
        message.extend_from_slice(&body);
        message
    }

    /// Decodes a complete message.
    pub fn decode(message: &[u8]) -> Result<Self, HelloError> {
        if message.len() < HEADER_LEN {
            return Err(HelloError::Truncated);
        }
        let size = check_header(&message[..HEADER_LEN])?;
        if message.len() < size {
            return Err(HelloError::Truncated);
        }
        Self::decode_body(&message[HEADER_LEN..size])
    }

    /// Reads one message from a stream.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, HelloError>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header).await?;
        let size = check_header(&header)?;

        let mut body = vec![0u8; size - HEADER_LEN];
        reader.read_exact(&mut body).await?;
        Self::decode_body(&body)
    }

    fn decode_body(body: &[u8]) -> Result<Self, HelloError> {
        let mut cursor = body;
        let server_uri = decode_string(&mut cursor, "ServerUri")?;
        let endpoint_url = decode_string(&mut cursor, "EndpointUrl")?;
        Ok(Self {
            server_uri,
            endpoint_url,
        })
    }
}

fn check_header(header: &[u8]) -> Result<usize, HelloError> {
    let mut kind = [0u8; 4];
    kind.copy_from_slice(&header[..4]);
    if &kind != b"RHEF" {
        return Err(HelloError::UnexpectedMessageType(kind));
    }

    let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    let len = size as usize;
    if !(HEADER_LEN + 8..=MAX_MESSAGE_LEN).contains(&len) {
        return Err(HelloError::InvalidSize(size));
    }
    Ok(len)
}

fn encode_string(buf: &mut Vec<u8>, value: Option<&str>) {
    match value {
        Some(s) => {
            buf.extend_from_slice(&(s.len() as i32).to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
        None => buf.extend_from_slice(&(-1i32).to_le_bytes()),
    }
}

fn decode_string(cursor: &mut &[u8], field: &'static str) -> Result<Option<String>, HelloError> {
    if cursor.len() < 4 {
        return Err(HelloError::Truncated);
    }
    let len = i32::from_le_bytes([cursor[0], cursor[1], cursor[2], cursor[3]]);
    *cursor = &cursor[4..];

    if len == -1 {
        return Ok(None);
    }
    if len < 0 || len as usize > MAX_STRING_LEN {
        return Err(HelloError::InvalidString {
            field,
            reason: format!("length {} out of range", len),
        });
    }

    let len = len as usize;
    if cursor.len() < len {
        return Err(HelloError::Truncated);
    }
    let value = std::str::from_utf8(&cursor[..len])
        .map_err(|e| HelloError::InvalidString {
            field,
            reason: e.to_string(),
        })?
        .to_string();
    *cursor = &cursor[len..];
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_layout() {
        let hello = ReverseHello::new("urn:plc", "opc.tcp://plc:4840");
        let bytes = hello.encode();

        assert_eq!(&bytes[..4], b"RHEF");
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize, bytes.len());
        assert_eq!(&bytes[8..12], &7i32.to_le_bytes());
        assert_eq!(&bytes[12..19], b"urn:plc");
        assert_eq!(ReverseHello::decode(&bytes).unwrap(), hello);
    }

    #[test]
    fn test_null_server_uri() {
        let hello = ReverseHello {
            server_uri: None,
            endpoint_url: Some("opc.tcp://plc:4840".to_string()),
        };
        let bytes = hello.encode();
        assert_eq!(&bytes[8..12], &(-1i32).to_le_bytes());
        assert_eq!(ReverseHello::decode(&bytes).unwrap().server_uri, None);
    }

    #[test]
    fn test_rejects_other_messages() {
        let mut bytes = ReverseHello::new("urn:plc", "opc.tcp://plc:4840").encode();
        bytes[..4].copy_from_slice(b"HELF");
        assert!(matches!(
            ReverseHello::decode(&bytes),
            Err(HelloError::UnexpectedMessageType(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_strings() {
        let long = "x".repeat(MAX_STRING_LEN + 1);
        let mut body = Vec::new();
        encode_string(&mut body, Some(&long));
        encode_string(&mut body, None);
        assert!(matches!(
            ReverseHello::decode_body(&body),
            Err(HelloError::InvalidString { field: "ServerUri", .. })
        ));

        let mut header = b"RHEF".to_vec();
        header.extend_from_slice(&(u32::MAX).to_le_bytes());
        assert!(matches!(ReverseHello::decode(&header), Err(HelloError::InvalidSize(_))));
    }

    #[tokio::test]
    async fn test_read_from_stream() {
        let hello = ReverseHello::new("urn:plc", "opc.tcp://plc:4840");
        let bytes = hello.encode();
        let mut reader = &bytes[..];
        assert_eq!(ReverseHello::read_from(&mut reader).await.unwrap(), hello);

        let truncated = &bytes[..bytes.len() - 2];
        let mut reader = truncated;
        assert!(matches!(ReverseHello::read_from(&mut reader).await, Err(HelloError::Io(_))));
    }
}
