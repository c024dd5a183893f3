//! Addressed, sequenced LoRa packets on top of the `sx127x` driver.
//!
//! [`lora::LoraLink`] owns one [`sx127x::Sx127x`] and turns it into a tiny link layer:
//! every packet carries a four byte header (destination, source, sequence number and
//! payload length) in front of a text payload. Sending is fire-and-forget and
//! completion is polled with [`lora::LoraLink::is_packet_sent`]; received packets land
//! in a single-slot inbox read with [`lora::LoraLink::read_packet`].
//!
//! # Usage
//!
//! ```ignore
//! use lora_link::lora::LoraLink;
//! use lora_link::packet::BROADCAST;
//! use sx127x::Sx127x;
//!
//! static LINK: StaticCell<LoraLink<Spi, Input>> = StaticCell::new();
//!
//! let radio = Sx127x::new(lora_spi, lora_dio0, LoraLink::<Spi, Input>::default_config());
//! let link = LINK.init(LoraLink::new(radio).unwrap());
//!
//! // From the GPIO interrupt handler:
//! link.handle_interrupt();
//!
//! link.send_packet(BROADCAST, 0x41, b"hello").unwrap();
//! while !link.is_packet_sent() {}
//! if let Some(packet) = link.read_packet() {
//!     log::info!("{} says {} ({} dBm)", packet.source, packet.text, packet.rssi);
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

extern crate alloc;

/// The link driver.
pub mod lora;
/// The on-air packet format.
pub mod packet;
