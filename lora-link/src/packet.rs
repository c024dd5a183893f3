//! Packets are `[destination, source, sequence, length]` followed by the text payload.

use alloc::borrow::Cow;
use alloc::string::String;

/// Destination address every node accepts.
pub const BROADCAST: u8 = 0xFF;

/// Size of the on-air header.
pub const HEADER_LEN: usize = 4;

/// The four byte header in front of every payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WireHeader {
    /// Address of the receiver, [`BROADCAST`] for everyone.
    pub destination: u8,
    /// Address of the sender.
    pub source: u8,
    /// Sender's packet counter, wraps at 256.
    pub sequence: u8,
    /// Payload length as declared by the sender, truncated to one byte.
    pub length: u8,
}

impl WireHeader {
    /// Builds a header for a payload of `payload_len` bytes.
    pub fn new(destination: u8, source: u8, sequence: u8, payload_len: usize) -> Self {
        Self {
            destination,
            source,
            sequence,
            length: payload_len as u8,
        }
    }

    /// The header as sent on air.
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        [self.destination, self.source, self.sequence, self.length]
    }

    /// Splits a received payload into header and body.
    ///
    /// Returns `None` unless at least one body byte follows the header.
    pub fn parse(bytes: &[u8]) -> Option<(Self, &[u8])> {
        if bytes.len() <= HEADER_LEN {
            return None;
        }
        let (header, body) = bytes.split_at(HEADER_LEN);
        let header = Self {
            destination: header[0],
            source: header[1],
            sequence: header[2],
            length: header[3],
        };
        Some((header, body))
    }
}

/// A received packet with its signal quality.
#[derive(Clone, Debug, PartialEq)]
pub struct LoraPacket {
    /// Address of the receiver.
    pub destination: u8,
    /// Address of the sender.
    pub source: u8,
    /// Sender's packet counter.
    pub sequence: u8,
    /// Declared payload length. Not checked against the bytes received.
    pub length: u8,
    /// The payload as text, invalid UTF-8 replaced with U+FFFD.
    pub text: String,
    /// Packet RSSI in dBm.
    pub rssi: i16,
    /// Packet SNR in dB.
    pub snr: f32,
}

impl LoraPacket {
    /// Decodes a raw payload, `None` for a payload too short to hold a header and text.
    pub fn decode(payload: &[u8], rssi: i16, snr: f32) -> Option<Self> {
        let (header, body) = WireHeader::parse(payload)?;
        let text = match String::from_utf8_lossy(body) {
            Cow::Borrowed(text) => String::from(text),
            Cow::Owned(text) => {
                log::debug!(
                    "lora::packet invalid UTF-8 from {:#04x}, seq {}",
                    header.source,
                    header.sequence
                );
                text
            }
        };
        Some(Self {
            destination: header.destination,
            source: header.source,
            sequence: header.sequence,
            length: header.length,
            text,
            rssi,
            snr,
        })
    }

    /// Whether the packet was addressed to everyone.
    pub fn is_broadcast(&self) -> bool {
        self.destination == BROADCAST
    }
}
