//! Engine.IO polling payload framing (§4.1).
//!
//! Each frame is `0x00, d_1..d_k, 0xFF, TYPE, DATA...` where `d_i` are the
//! decimal digits of `len(TYPE) + len(DATA)` laid out as raw byte values
//! `0..9` (not ASCII digits), most significant first. A leading `0x01`
//! plays the same role for binary attachments, which this engine
//! recognizes but never reassembles.

use bytes::{Bytes, BytesMut};

use crate::packet::Packet;

const TEXT_SENTINEL: u8 = 0x00;
const BINARY_SENTINEL: u8 = 0x01;
const LENGTH_TERMINATOR: u8 = 0xFF;

/// Frame an ordered sequence of packets for a single POST body.
pub fn encode(packets: &[Packet]) -> Bytes {
    let mut out = BytesMut::new();
    for packet in packets {
        let text = packet.encode_text();
        out.extend_from_slice(&[TEXT_SENTINEL]);
        for digit in text.len().to_string().bytes() {
            out.extend_from_slice(&[digit - b'0']);
        }
        out.extend_from_slice(&[LENGTH_TERMINATOR]);
        out.extend_from_slice(&text);
    }
    out.freeze()
}

/// Decode a polling response body into zero or more packets.
///
/// Never returns an error: a truncated length header or a declared
/// length that overflows what's left in the buffer both stop decoding
/// and return whatever packets were already produced, with a warning
/// logged for the latter — there's no byte offset past an overflowing
/// length known to be the start of the next frame, so nothing to skip
/// to and resume from.
pub fn decode(content: &[u8]) -> Vec<Packet> {
    let mut packets = Vec::new();
    let mut index = 0usize;
    let len = content.len();

    while index < len {
        let sentinel = content[index];
        if sentinel != TEXT_SENTINEL && sentinel != BINARY_SENTINEL {
            // Not a recognizable frame start; nothing more to salvage.
            break;
        }
        index += 1;

        let mut digits = String::new();
        loop {
            match content.get(index) {
                Some(&LENGTH_TERMINATOR) => {
                    index += 1;
                    break;
                }
                Some(&digit) if digit <= 9 => {
                    digits.push((b'0' + digit) as char);
                    index += 1;
                }
                _ => {
                    // Truncated length header: stop cleanly, keep what we have.
                    return packets;
                }
            }
        }

        let frame_len: usize = match digits.parse() {
            Ok(n) => n,
            Err(_) => return packets,
        };

        if index + frame_len > len {
            // No offset past here is known to be a frame boundary, so this
            // isn't a skip-and-resume case like an unparseable frame body
            // below — stop decoding and keep what's already been produced.
            #[cfg(feature = "tracing")]
            tracing::warn!(
                declared = frame_len,
                available = len - index,
                "engine.io frame length mismatch, stopping decode"
            );
            break;
        }

        let frame = &content[index..index + frame_len];
        index += frame_len;

        if sentinel == BINARY_SENTINEL {
            #[cfg(feature = "tracing")]
            tracing::warn!("binary engine.io attachment received, attachments are not reassembled");
            continue;
        }

        if frame.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::warn!("empty engine.io frame, skipping");
            continue;
        }

        let type_digit = frame[0];
        let data = Bytes::copy_from_slice(&frame[1..]);
        match Packet::decode(type_digit, data) {
            Ok(packet) => packets.push(packet),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_err, "skipping unparseable engine.io frame");
            }
        }
    }

    packets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_an_ordered_sequence() {
        let packets = vec![
            Packet::Message(Bytes::from_static(b"hello")),
            Packet::Ping(Bytes::from_static(b"probe")),
            Packet::Noop,
        ];
        let encoded = encode(&packets);
        let decoded = decode(&encoded);
        assert_eq!(decoded, packets);
    }

    #[test]
    fn truncated_length_header_stops_cleanly() {
        let mut content = encode(&[Packet::Message(Bytes::from_static(b"ok"))]).to_vec();
        content.push(TEXT_SENTINEL);
        content.push(3); // digit, no terminating 0xFF
        let decoded = decode(&content);
        assert_eq!(decoded, vec![Packet::Message(Bytes::from_static(b"ok"))]);
    }

    #[test]
    fn declared_length_mismatch_drops_frame() {
        let mut content = vec![TEXT_SENTINEL, 9, LENGTH_TERMINATOR];
        content.extend_from_slice(b"short");
        let decoded = decode(&content);
        assert!(decoded.is_empty());
    }

    #[test]
    fn unicode_payload_survives_byte_for_byte() {
        let text = "인삼 뿌리".as_bytes().to_vec();
        let packets = vec![Packet::Message(Bytes::from(text))];
        let encoded = encode(&packets);
        assert_eq!(decode(&encoded), packets);
    }
}
