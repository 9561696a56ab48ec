use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::DeakoError;
use crate::protocol::{Push, Request};

/// Upper bound on a single frame; controller lines are normally well under
/// 1 KiB, so anything near this is garbage or a desynced stream.
const MAX_FRAME_LEN: usize = 64 * 1024;

/// Newline-delimited JSON codec for the controller socket.
///
/// Outbound frames are terminated with `\r\n`; inbound frames are split on
/// `\n` with an optional trailing `\r`. Blank lines and frames that fail to
/// parse are skipped rather than surfaced as stream errors.
pub(crate) struct DeakoCodec {
    /// Set while skipping the remainder of an oversized frame
    discarding: bool,
}

impl DeakoCodec {
    pub(crate) fn new() -> Self {
        Self { discarding: false }
    }
}

/// Parse one complete frame (newline already stripped)
fn decode_frame(line: &[u8]) -> Result<Push, DeakoError> {
    Ok(serde_json::from_slice(line)?)
}

impl Decoder for DeakoCodec {
    type Item = Push;
    type Error = DeakoError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Push>, DeakoError> {
        loop {
            if self.discarding {
                match src.iter().position(|&b| b == b'\n') {
                    Some(pos) => {
                        src.advance(pos + 1);
                        self.discarding = false;
                    }
                    None => {
                        src.clear();
                        return Ok(None);
                    }
                }
                continue;
            }

            let Some(pos) = src.iter().position(|&b| b == b'\n') else {
                if src.len() > MAX_FRAME_LEN {
                    tracing::warn!("Frame over {} bytes, discarding", MAX_FRAME_LEN);
                    src.clear();
                    self.discarding = true;
                }
                return Ok(None);
            };

            let mut line = src.split_to(pos + 1);
            line.truncate(line.len() - 1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if line.is_empty() {
                continue;
            }
            if line.len() > MAX_FRAME_LEN {
                tracing::warn!("Frame over {} bytes, discarding", MAX_FRAME_LEN);
                continue;
            }

            tracing::debug!("Received: {}", String::from_utf8_lossy(&line));
            match decode_frame(&line) {
                Ok(push) => return Ok(Some(push)),
                // Returning Err here would terminate the Framed stream, so a
                // single garbled line is logged and skipped instead.
                Err(err) => tracing::warn!("Dropping malformed frame: {}", err),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Push>, DeakoError> {
        match self.decode(src)? {
            Some(push) => Ok(Some(push)),
            None => {
                // A partial trailing frame can never complete once the peer
                // hangs up, so drop it.
                if !src.is_empty() {
                    tracing::debug!("Discarding {} byte partial frame at EOF", src.len());
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Request> for DeakoCodec {
    type Error = DeakoError;

    fn encode(&mut self, request: Request, dst: &mut BytesMut) -> Result<(), DeakoError> {
        let json = serde_json::to_vec(&request)?;
        tracing::debug!("Sending: {}", String::from_utf8_lossy(&json));
        dst.reserve(json.len() + 2);
        dst.put_slice(&json);
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(codec: &mut DeakoCodec, buf: &mut BytesMut) -> Vec<Push> {
        let mut out = Vec::new();
        while let Some(push) = codec.decode(buf).unwrap() {
            out.push(push);
        }
        out
    }

    const EVENT_LINE: &[u8] =
        b"{\"type\":\"EVENT\",\"data\":{\"target\":\"d1\",\"state\":{\"power\":true}}}\n";

    #[test]
    fn decodes_a_complete_line() {
        let mut codec = DeakoCodec::new();
        let mut buf = BytesMut::from(EVENT_LINE);
        let pushes = drain(&mut codec, &mut buf);
        assert_eq!(pushes.len(), 1);
        assert!(matches!(pushes[0], Push::StateChanged { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn buffers_partial_frames_until_the_newline_arrives() {
        let mut codec = DeakoCodec::new();
        let mut buf = BytesMut::new();

        let (head, tail) = EVENT_LINE.split_at(20);
        buf.extend_from_slice(head);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(tail);
        assert!(codec.decode(&mut buf).unwrap().is_some());
    }

    #[test]
    fn decoding_is_independent_of_read_chunking() {
        let mut stream = Vec::new();
        stream.extend_from_slice(EVENT_LINE);
        stream.extend_from_slice(
            b"{\"type\":\"DEVICE_FOUND\",\"data\":{\"name\":\"a\",\"uuid\":\"d2\"}}\r\n",
        );
        stream.extend_from_slice(EVENT_LINE);

        let mut whole = BytesMut::from(stream.as_slice());
        let expected = drain(&mut DeakoCodec::new(), &mut whole);
        assert_eq!(expected.len(), 3);

        for split in 1..stream.len() {
            let mut codec = DeakoCodec::new();
            let mut buf = BytesMut::new();
            let mut got = Vec::new();

            buf.extend_from_slice(&stream[..split]);
            got.extend(drain(&mut codec, &mut buf));
            buf.extend_from_slice(&stream[split..]);
            got.extend(drain(&mut codec, &mut buf));

            assert_eq!(got, expected, "split at byte {split}");
        }
    }

    #[test]
    fn skips_blank_lines_and_bare_carriage_returns() {
        let mut codec = DeakoCodec::new();
        let mut buf = BytesMut::from(&b"\n\r\n"[..]);
        buf.extend_from_slice(EVENT_LINE);
        let pushes = drain(&mut codec, &mut buf);
        assert_eq!(pushes.len(), 1);
    }

    #[test]
    fn malformed_frame_is_dropped_and_the_stream_continues() {
        let mut codec = DeakoCodec::new();
        let mut buf = BytesMut::from(&b"{not json\n"[..]);
        buf.extend_from_slice(EVENT_LINE);
        let pushes = drain(&mut codec, &mut buf);
        assert_eq!(pushes.len(), 1);
        assert!(matches!(pushes[0], Push::StateChanged { .. }));
    }

    #[test]
    fn malformed_frame_decodes_to_an_error() {
        let err = decode_frame(b"{not json").unwrap_err();
        assert!(matches!(err, DeakoError::Decode(_)));
    }

    #[test]
    fn oversized_frame_is_discarded_without_wedging_the_decoder() {
        let mut codec = DeakoCodec::new();
        let mut buf = BytesMut::new();

        // Feed an over-limit frame in two chunks, newline last.
        buf.extend_from_slice(&vec![b'x'; MAX_FRAME_LEN + 1]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"xxxx\n");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(EVENT_LINE);
        let pushes = drain(&mut codec, &mut buf);
        assert_eq!(pushes.len(), 1);
    }

    #[test]
    fn partial_frame_at_eof_is_discarded() {
        let mut codec = DeakoCodec::new();
        let mut buf = BytesMut::from(&b"{\"type\":\"EV"[..]);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn encoded_request_round_trips_through_the_wire_format() {
        let request = Request::control("d1", true, Some(70), "test-client");

        let mut codec = DeakoCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(request.clone(), &mut buf).unwrap();

        assert!(buf.ends_with(b"\r\n"));
        let line = &buf[..buf.len() - 2];
        let decoded: Request = serde_json::from_slice(line).unwrap();
        assert_eq!(decoded, request);
    }
}
