use bytes::{Buf, BytesMut};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("unknown RESP type")]
    UnknownRespType,
    #[error("failed to parse integer")]
    FailedToParseInteger,
    #[error("invalid bulk string")]
    InvalidBulkString,
    #[error("invalid array")]
    InvalidArray,
}

impl RespError {
    pub fn as_string(&self) -> String {
        RespValue::Error(format!("ERR Protocol error: {}", self)).encode()
    }
}

/// A single RESP value, either parsed from a client or about to be encoded
/// into a reply.
#[derive(Debug, PartialEq, Clone)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(String),
    NullBulkString,
    Array(Vec<RespValue>),
    NullArray,
}

impl RespValue {
    /// Encodes this value into its RESP wire representation.
    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("+{}\r\n", s),
            RespValue::Error(s) => format!("-{}\r\n", s),
            RespValue::Integer(i) => format!(":{}\r\n", i),
            RespValue::BulkString(s) => format!("${}\r\n{}\r\n", s.len(), s),
            RespValue::NullBulkString => "$-1\r\n".to_string(),
            RespValue::Array(elements) => {
                let mut encoded = format!("*{}\r\n", elements.len());
                for element in elements {
                    encoded.push_str(&element.encode());
                }
                encoded
            }
            RespValue::NullArray => "*-1\r\n".to_string(),
        }
    }

    /// Encodes a list of plain strings as a RESP array of bulk strings.
    pub fn encode_array_from_strings(strings: Vec<String>) -> String {
        RespValue::Array(strings.into_iter().map(RespValue::BulkString).collect()).encode()
    }

    /// Extracts at most one complete RESP value from the front of `bytes`.
    ///
    /// Returns `Ok(None)` when the buffer holds only an incomplete frame, in
    /// which case nothing is consumed and the caller should read more data.
    /// On success the consumed bytes are removed from the buffer.
    pub fn parse_frame(bytes: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        match Self::parse_at(&bytes[..], 0)? {
            Some((value, consumed)) => {
                bytes.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn parse_at(buffer: &[u8], position: usize) -> Result<Option<(RespValue, usize)>, RespError> {
        if position >= buffer.len() {
            return Ok(None);
        }

        let Some(line_end) = find_crlf(buffer, position) else {
            return Ok(None);
        };

        // A CRLF landing on the type marker itself means there is no line.
        if line_end < position + 1 {
            return Err(RespError::UnknownRespType);
        }

        let line = std::str::from_utf8(&buffer[position + 1..line_end])
            .map_err(|_| RespError::InvalidUtf8)?;

        match buffer[position] {
            b'+' => Ok(Some((
                RespValue::SimpleString(line.to_string()),
                line_end + 2,
            ))),
            b'-' => Ok(Some((RespValue::Error(line.to_string()), line_end + 2))),
            b':' => {
                let value = line
                    .parse::<i64>()
                    .map_err(|_| RespError::FailedToParseInteger)?;
                Ok(Some((RespValue::Integer(value), line_end + 2)))
            }
            b'$' => {
                let declared_length = line
                    .parse::<i64>()
                    .map_err(|_| RespError::InvalidBulkString)?;

                if declared_length < 0 {
                    return Ok(Some((RespValue::NullBulkString, line_end + 2)));
                }

                let length = declared_length as usize;
                let content_start = line_end + 2;

                if buffer.len() < content_start + length + 2 {
                    return Ok(None);
                }

                if &buffer[content_start + length..content_start + length + 2] != b"\r\n" {
                    return Err(RespError::InvalidBulkString);
                }

                let content = std::str::from_utf8(&buffer[content_start..content_start + length])
                    .map_err(|_| RespError::InvalidUtf8)?;

                Ok(Some((
                    RespValue::BulkString(content.to_string()),
                    content_start + length + 2,
                )))
            }
            b'*' => {
                let declared_length =
                    line.parse::<i64>().map_err(|_| RespError::InvalidArray)?;

                if declared_length < 0 {
                    return Ok(Some((RespValue::NullArray, line_end + 2)));
                }

                let mut elements = Vec::with_capacity(declared_length as usize);
                let mut cursor = line_end + 2;

                for _ in 0..declared_length {
                    match Self::parse_at(buffer, cursor)? {
                        Some((element, next_cursor)) => {
                            elements.push(element);
                            cursor = next_cursor;
                        }
                        None => return Ok(None),
                    }
                }

                Ok(Some((RespValue::Array(elements), cursor)))
            }
            _ => Err(RespError::UnknownRespType),
        }
    }
}

fn find_crlf(buffer: &[u8], from: usize) -> Option<usize> {
    buffer[from..]
        .windows(2)
        .position(|window| window == b"\r\n")
        .map(|offset| from + offset)
}
