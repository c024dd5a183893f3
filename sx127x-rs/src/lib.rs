//! An interrupt-driven, `no_std` driver for the Semtech SX127x family of LoRa transceivers.
//!
//! This crate drives the SX1276/77/78/79 (and the RFM95/96/97/98 modules built on them)
//! through single register exchanges over an `embedded-hal` SPI device. Transmit and
//! receive are non-blocking: the radio raises DIO0 when a packet has left or arrived,
//! the application's interrupt handler calls [`Sx127x::handle_interrupt`], and the
//! driver dispatches to the callbacks registered with [`Sx127x::on_transmit`] and
//! [`Sx127x::on_receive`].
//!
//! All driver methods take `&self`. The chip state sits behind a critical-section
//! mutex so a single driver instance can be shared by the interrupt handler and
//! foreground code.
//!
//! # Usage
//!
//! See the `lora-link` crate for an addressed packet layer built on this driver.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod conf;
pub mod hal;
pub mod op;
pub mod reg;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

mod sx;
pub use sx::*;
