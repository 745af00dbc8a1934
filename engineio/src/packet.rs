//! Engine.IO outer packet grammar.
//!
//! A packet is a single ASCII type digit (0..6) followed by opaque
//! UTF-8 data. Binary payloads (a leading `0x01` sentinel instead of
//! `0x00`) are recognized at the framing layer but never reassembled
//! into a packet here — see [`crate::payload::decode`].

use bytes::Bytes;

use crate::error::{Error, Result};

/// One Engine.IO packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Handshake packet. Payload is the JSON handshake document on the
    /// wire; only ever produced by the server.
    Open(Bytes),
    Close,
    Ping(Bytes),
    Pong(Bytes),
    Message(Bytes),
    Upgrade,
    Noop,
}

impl Packet {
    pub fn type_digit(&self) -> u8 {
        match self {
            Packet::Open(_) => b'0',
            Packet::Close => b'1',
            Packet::Ping(_) => b'2',
            Packet::Pong(_) => b'3',
            Packet::Message(_) => b'4',
            Packet::Upgrade => b'5',
            Packet::Noop => b'6',
        }
    }

    pub fn data(&self) -> Bytes {
        match self {
            Packet::Open(d) | Packet::Ping(d) | Packet::Pong(d) | Packet::Message(d) => d.clone(),
            Packet::Close | Packet::Upgrade | Packet::Noop => Bytes::new(),
        }
    }

    /// Encode the TYPE digit and DATA as they appear on the wire (no
    /// length prefix — that is the payload framer's job).
    pub fn encode_text(&self) -> Bytes {
        let data = self.data();
        let mut out = Vec::with_capacity(1 + data.len());
        out.push(self.type_digit());
        out.extend_from_slice(&data);
        Bytes::from(out)
    }

    /// Parse a single decoded `(type_digit, data)` pair as produced by the
    /// payload framer.
    pub fn decode(type_digit: u8, data: Bytes) -> Result<Packet> {
        match type_digit {
            b'0' => Ok(Packet::Open(data)),
            b'1' => Ok(Packet::Close),
            b'2' => Ok(Packet::Ping(data)),
            b'3' => Ok(Packet::Pong(data)),
            b'4' => Ok(Packet::Message(data)),
            b'5' => Ok(Packet::Upgrade),
            b'6' => Ok(Packet::Noop),
            other => Err(Error::packet(format!(
                "unknown engine.io packet type {other}"
            ))),
        }
    }
}
