//! A register-level stand-in for the chip, for host-side tests of the driver and
//! of code built on it.
//!
//! [`FakeChip`] answers SPI exchanges from a register file and a 256 byte FIFO the
//! way the silicon does where the driver depends on it: `RegFifo` accesses go
//! through `RegFifoAddrPtr` and advance it, writes to `RegIrqFlags` clear the bits
//! written, and entering TX mode captures the packet. Clones share state, so a test
//! keeps one handle while the driver owns another.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::spi::{ErrorKind, ErrorType, Operation, SpiDevice};

use crate::hal::IrqPin;
use crate::op::*;
use crate::reg::*;
use crate::SX127X_VERSION;

const FIFO_SIZE: usize = 256;

struct ChipState {
    registers: [u8; REGISTER_COUNT as usize],
    fifo: [u8; FIFO_SIZE],
    transmitted: Vec<Vec<u8>>,
    failing: bool,
}

impl ChipState {
    fn new() -> Self {
        let mut registers = [0u8; REGISTER_COUNT as usize];
        registers[Register::Version as usize] = SX127X_VERSION;
        Self {
            registers,
            fifo: [0; FIFO_SIZE],
            transmitted: Vec::new(),
            failing: false,
        }
    }

    fn fifo_access(&mut self) -> usize {
        let ptr = self.registers[Register::FifoAddrPtr as usize];
        self.registers[Register::FifoAddrPtr as usize] = ptr.wrapping_add(1);
        ptr as usize
    }

    fn read(&mut self, addr: u8) -> u8 {
        if addr == Register::Fifo.addr() {
            let ptr = self.fifo_access();
            return self.fifo[ptr];
        }
        self.registers[addr as usize]
    }

    fn write(&mut self, addr: u8, value: u8) -> u8 {
        let previous = self.registers[addr as usize];
        if addr == Register::Fifo.addr() {
            let ptr = self.fifo_access();
            self.fifo[ptr] = value;
        } else if addr == Register::IrqFlags.addr() {
            self.registers[addr as usize] &= !value;
        } else {
            self.registers[addr as usize] = value;
            if addr == Register::OpMode.addr() && value == Mode::Tx.op_mode() {
                self.capture_transmit();
            }
        }
        previous
    }

    fn capture_transmit(&mut self) {
        let start = self.registers[Register::FifoTxBaseAddr as usize] as usize;
        let length = self.registers[Register::PayloadLength as usize] as usize;
        let packet = (0..length)
            .map(|offset| self.fifo[(start + offset) % FIFO_SIZE])
            .collect();
        self.transmitted.push(packet);
    }

    /// One chip-select frame: an address byte followed by burst data.
    fn exchange(&mut self, frame: &mut [u8]) {
        let Some((&mut header, data)) = frame.split_first_mut() else {
            return;
        };
        let write = header & WRITE_BIT != 0;
        let mut addr = header & !WRITE_BIT;
        for byte in data.iter_mut() {
            *byte = if write {
                self.write(addr, *byte)
            } else {
                self.read(addr)
            };
            if addr != Register::Fifo.addr() {
                addr = (addr + 1) % REGISTER_COUNT;
            }
        }
    }
}

/// A simulated SX127x behind an SPI device.
#[derive(Clone)]
pub struct FakeChip {
    state: Arc<Mutex<CriticalSectionRawMutex, RefCell<ChipState>>>,
}

impl Default for FakeChip {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeChip {
    /// A chip fresh out of reset with a valid version register.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RefCell::new(ChipState::new()))),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ChipState) -> R) -> R {
        self.state.lock(|state| f(&mut state.borrow_mut()))
    }

    /// Current value of a register.
    pub fn register(&self, register: Register) -> u8 {
        self.with_state(|state| state.registers[register as usize])
    }

    /// Overwrites a register without any side effect.
    pub fn set_register(&self, register: Register, value: u8) {
        self.with_state(|state| state.registers[register as usize] = value);
    }

    /// The mode currently selected in `RegOpMode`.
    pub fn mode(&self) -> Option<Mode> {
        Mode::from_op_mode(self.register(Register::OpMode))
    }

    /// The carrier frequency programmed in `RegFrf`.
    pub fn frequency_hz(&self) -> u32 {
        self.with_state(|state| {
            let frf = ((state.registers[Register::FrfMsb as usize] as u32) << 16)
                | ((state.registers[Register::FrfMid as usize] as u32) << 8)
                | state.registers[Register::FrfLsb as usize] as u32;
            hz_from_frf(frf)
        })
    }

    /// Sets interrupt flags as if the modem had raised them.
    pub fn raise_irq(&self, flags: IrqFlags) {
        self.with_state(|state| state.registers[Register::IrqFlags as usize] |= flags.bits());
    }

    /// Places `payload` in the FIFO and flags a valid explicit-header reception.
    pub fn receive_packet(&self, payload: &[u8]) {
        self.with_state(|state| {
            let start = state.registers[Register::FifoRxBaseAddr as usize];
            for (offset, &byte) in payload.iter().enumerate() {
                state.fifo[(start as usize + offset) % FIFO_SIZE] = byte;
            }
            state.registers[Register::FifoRxCurrentAddr as usize] = start;
            state.registers[Register::RxNbBytes as usize] = payload.len() as u8;
        });
        self.raise_irq(
            IrqFlags::empty()
                .combine(IrqFlagBit::RxDone)
                .combine(IrqFlagBit::ValidHeader),
        );
    }

    /// Finishes the transmission in progress: `TxDone` is raised and the modem
    /// falls back to standby.
    pub fn complete_transmit(&self) {
        self.set_register(Register::OpMode, Mode::Standby.op_mode());
        self.raise_irq(IrqFlags::empty().combine(IrqFlagBit::TxDone));
    }

    /// Every packet sent so far, oldest first.
    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        self.with_state(|state| state.transmitted.clone())
    }

    /// Makes every following SPI transaction fail, or succeed again.
    pub fn set_failing(&self, failing: bool) {
        self.with_state(|state| state.failing = failing);
    }
}

impl ErrorType for FakeChip {
    type Error = ErrorKind;
}

impl SpiDevice for FakeChip {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.with_state(|state| {
            if state.failing {
                return Err(ErrorKind::Other);
            }
            for operation in operations.iter_mut() {
                match operation {
                    Operation::TransferInPlace(buf) => state.exchange(buf),
                    Operation::Write(data) => {
                        let mut frame = data.to_vec();
                        state.exchange(&mut frame);
                    }
                    Operation::Transfer(read, write) => {
                        let mut frame = write.to_vec();
                        frame.resize(read.len().max(write.len()), 0);
                        state.exchange(&mut frame);
                        read.copy_from_slice(&frame[..read.len()]);
                    }
                    Operation::Read(_) => return Err(ErrorKind::Other),
                    Operation::DelayNs(_) => {}
                }
            }
            Ok(())
        })
    }
}

/// A DIO0 pin that records whether the driver armed it.
#[derive(Clone, Default)]
pub struct FakeIrq {
    armed: Arc<AtomicBool>,
    acknowledged: Arc<AtomicUsize>,
}

impl FakeIrq {
    /// A disarmed pin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the rising-edge interrupt is enabled.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// How many interrupts the driver acknowledged.
    pub fn acknowledged(&self) -> usize {
        self.acknowledged.load(Ordering::SeqCst)
    }
}

impl IrqPin for FakeIrq {
    fn arm(&mut self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    fn disarm(&mut self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    fn acknowledge(&mut self) {
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
    }
}
