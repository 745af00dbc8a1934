//! Socket.IO inner packet grammar (§4.1): `TYPE [PATH,] [ACK_ID] [JSON_ARGS]`,
//! carried inside an Engine.IO `Message` packet.
//!
//! Ported from the Python original's `format_socketIO_packet_data` /
//! `parse_socketIO_packet_data`.

use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Connect,
    Disconnect,
    Event,
    Ack,
    Error,
    BinaryEvent,
    BinaryAck,
}

impl PacketType {
    fn digit(self) -> u8 {
        match self {
            PacketType::Connect => b'0',
            PacketType::Disconnect => b'1',
            PacketType::Event => b'2',
            PacketType::Ack => b'3',
            PacketType::Error => b'4',
            PacketType::BinaryEvent => b'5',
            PacketType::BinaryAck => b'6',
        }
    }

    fn from_digit(d: u8) -> Result<Self> {
        match d {
            b'0' => Ok(PacketType::Connect),
            b'1' => Ok(PacketType::Disconnect),
            b'2' => Ok(PacketType::Event),
            b'3' => Ok(PacketType::Ack),
            b'4' => Ok(PacketType::Error),
            b'5' => Ok(PacketType::BinaryEvent),
            b'6' => Ok(PacketType::BinaryAck),
            other => Err(Error::packet(format!(
                "unknown socket.io packet type '{}'",
                other as char
            ))),
        }
    }
}

/// A decoded Socket.IO inner packet. `args` is whatever JSON value followed
/// the ack id, defaulting to an empty array when absent or unparseable.
#[derive(Debug, Clone)]
pub struct SocketPacket {
    pub packet_type: PacketType,
    pub path: Option<String>,
    pub ack_id: Option<u64>,
    pub args: Value,
}

impl SocketPacket {
    pub fn new(
        packet_type: PacketType,
        path: Option<String>,
        ack_id: Option<u64>,
        args: Value,
    ) -> Self {
        SocketPacket {
            packet_type,
            path,
            ack_id,
            args,
        }
    }

    /// Convenience constructor for an outbound `Event` packet: `event` is
    /// prepended to `args` to form the JSON array.
    pub fn event(path: Option<String>, ack_id: Option<u64>, event: &str, mut args: Vec<Value>) -> Self {
        args.insert(0, Value::String(event.to_string()));
        SocketPacket::new(PacketType::Event, path, ack_id, Value::Array(args))
    }

    /// Convenience constructor for a server-ack reply.
    pub fn ack(path: Option<String>, ack_id: u64, args: Vec<Value>) -> Self {
        SocketPacket::new(PacketType::Ack, path, Some(ack_id), Value::Array(args))
    }

    pub fn connect(path: Option<String>) -> Self {
        SocketPacket::new(PacketType::Connect, path, None, Value::Null)
    }

    pub fn disconnect(path: Option<String>) -> Self {
        SocketPacket::new(PacketType::Disconnect, path, None, Value::Null)
    }

    /// Format as wire text: `TYPE [PATH,] [ACK_ID] [JSON]`.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.packet_type.digit() as char);
        if let Some(path) = &self.path {
            out.push_str(path);
            // A bare namespace packet (Connect/Disconnect with no ack id
            // or body) has no trailing comma; anything with a body does.
            if self.ack_id.is_some() || !self.args.is_null() {
                out.push(',');
            }
        }
        if let Some(ack_id) = self.ack_id {
            out.push_str(&ack_id.to_string());
        }
        if !self.args.is_null() {
            out.push_str(&self.args.to_string());
        }
        out
    }

    /// Parse wire text into a packet. Never fails on a malformed JSON body
    /// — that degrades to an empty argument array, matching the bare
    /// `except ValueError` in the Python original.
    pub fn decode(text: &str) -> Result<Self> {
        let bytes = text.as_bytes();
        if bytes.is_empty() {
            return Err(Error::packet("empty socket.io packet"));
        }
        let packet_type = PacketType::from_digit(bytes[0])?;
        let mut rest = &text[1..];

        let path = if rest.starts_with('/') {
            match rest.find(',') {
                Some(idx) => {
                    let path = rest[..idx].to_string();
                    rest = &rest[idx + 1..];
                    Some(path)
                }
                None => {
                    // A bare path with no trailing comma and no body at all.
                    let path = rest.to_string();
                    rest = "";
                    Some(path)
                }
            }
        } else {
            None
        };

        let ack_digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        let ack_id = if ack_digits.is_empty() {
            None
        } else {
            rest = &rest[ack_digits.len()..];
            ack_digits.parse::<u64>().ok()
        };

        let args = if rest.is_empty() {
            Value::Array(Vec::new())
        } else {
            match serde_json::from_str::<Value>(rest) {
                Ok(Value::String(s)) => Value::Array(vec![Value::String(s)]),
                Ok(v @ Value::Array(_)) => v,
                Ok(v) => Value::Array(vec![v]),
                Err(_) => Value::Array(Vec::new()),
            }
        };

        Ok(SocketPacket::new(packet_type, path, ack_id, args))
    }

    /// `args` as a slice when it is the expected JSON array; empty
    /// otherwise.
    pub fn args(&self) -> &[Value] {
        match &self.args {
            Value::Array(a) => a.as_slice(),
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emit_with_no_args() {
        let packet = SocketPacket::event(None, None, "x", vec![]);
        assert_eq!(packet.encode(), "2[\"x\"]");
    }

    #[test]
    fn emit_with_payload_ack_and_namespace() {
        let packet = SocketPacket::event(
            Some("/c".to_string()),
            Some(7),
            "x",
            vec![json!({"a": 1})],
        );
        assert_eq!(packet.encode(), "2/c,7[\"x\",{\"a\":1}]");
    }

    #[test]
    fn round_trips_event_with_ack_and_path() {
        let text = "2/c,7[\"x\",{\"a\":1}]";
        let parsed = SocketPacket::decode(text).unwrap();
        assert_eq!(parsed.path.as_deref(), Some("/c"));
        assert_eq!(parsed.ack_id, Some(7));
        assert_eq!(parsed.args()[0], json!("x"));
        assert_eq!(parsed.args()[1], json!({"a": 1}));
    }

    #[test]
    fn namespace_only_connect_packet() {
        let parsed = SocketPacket::decode("0/news").unwrap();
        assert_eq!(parsed.packet_type, PacketType::Connect);
        assert_eq!(parsed.path.as_deref(), Some("/news"));
        assert_eq!(parsed.ack_id, None);
    }

    #[test]
    fn malformed_json_body_yields_empty_args() {
        let parsed = SocketPacket::decode("2not-json").unwrap();
        assert_eq!(parsed.args(), &[] as &[Value]);
    }

    #[test]
    fn bare_string_json_is_wrapped_in_array() {
        let parsed = SocketPacket::decode("4\"invalid namespace\"").unwrap();
        assert_eq!(parsed.args(), &[json!("invalid namespace")]);
    }

    #[test]
    fn ack_round_trip_ack_packet() {
        let parsed = SocketPacket::decode("31[{\"xxx\":\"yyy\"}]").unwrap();
        assert_eq!(parsed.packet_type, PacketType::Ack);
        assert_eq!(parsed.ack_id, Some(1));
        assert_eq!(parsed.args()[0], json!({"xxx": "yyy"}));
    }
}
