use bytes::BytesMut;

use crate::resp::{RespError, RespValue};

/// One unit of client input extracted from the read buffer: either a parsed
/// RESP command array, or an already-encoded reply produced by the legacy
/// inline fast path.
#[derive(Debug, PartialEq)]
pub enum Frame {
    Command(RespValue),
    InlineReply(String),
}

/// Drains every complete frame from the front of the connection's read
/// buffer.
///
/// A buffer whose first byte is not `*` is handled by the legacy inline
/// fast path: the whole buffer is consumed and scanned for the literal
/// `PING`, answered with `+PONG\r\n`, or `-ERR unknown command\r\n` for
/// anything else. Otherwise complete RESP frames are extracted one by one;
/// a trailing incomplete frame stays in the buffer until more bytes arrive.
pub fn drain_frames(buffer: &mut BytesMut) -> Result<Vec<Frame>, RespError> {
    let mut frames = Vec::new();

    loop {
        if buffer.is_empty() {
            break;
        }

        if buffer[0] != b'*' {
            let inline = buffer.split();
            let reply = if inline.windows(4).any(|window| window == b"PING") {
                RespValue::SimpleString("PONG".to_string()).encode()
            } else {
                RespValue::Error("ERR unknown command".to_string()).encode()
            };

            frames.push(Frame::InlineReply(reply));
            break;
        }

        match RespValue::parse_frame(buffer)? {
            Some(value) => frames.push(Frame::Command(value)),
            None => break,
        }
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_frames_single_command() {
        let mut buffer = BytesMut::from(&b"*1\r\n$4\r\nPING\r\n"[..]);

        let frames = drain_frames(&mut buffer).unwrap();

        assert_eq!(
            frames,
            vec![Frame::Command(RespValue::Array(vec![
                RespValue::BulkString("PING".to_string())
            ]))]
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_frames_pipelined_commands() {
        let mut buffer =
            BytesMut::from(&b"*1\r\n$4\r\nPING\r\n*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n"[..]);

        let frames = drain_frames(&mut buffer).unwrap();

        assert_eq!(frames.len(), 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_frames_keeps_incomplete_tail() {
        let mut buffer = BytesMut::from(&b"*1\r\n$4\r\nPING\r\n*2\r\n$4\r\nEC"[..]);

        let frames = drain_frames(&mut buffer).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(&buffer[..], b"*2\r\n$4\r\nEC");
    }

    #[test]
    fn test_drain_frames_inline_fast_path() {
        let test_cases = vec![
            (&b"PING\r\n"[..], "+PONG\r\n"),
            (&b"hello PING there"[..], "+PONG\r\n"),
            (&b"SHUTDOWN\r\n"[..], "-ERR unknown command\r\n"),
            (&b"ping\r\n"[..], "-ERR unknown command\r\n"),
        ];

        for (input, expected_reply) in test_cases {
            let mut buffer = BytesMut::from(input);
            let frames = drain_frames(&mut buffer).unwrap();

            assert_eq!(
                frames,
                vec![Frame::InlineReply(expected_reply.to_string())],
                "input {:?}",
                String::from_utf8_lossy(input)
            );
            assert!(buffer.is_empty(), "inline path consumes the whole buffer");
        }
    }

    #[test]
    fn test_drain_frames_propagates_protocol_error() {
        let mut buffer = BytesMut::from(&b"*1\r\n$ab\r\n"[..]);

        assert_eq!(
            drain_frames(&mut buffer),
            Err(RespError::InvalidBulkString)
        );
    }
}
