//! Parameter types and register encodings for driver operations.

mod irq;
mod mode;
mod modulation;
mod packet;
mod rxtx;

pub use irq::*;
pub use mode::*;
pub use modulation::*;
pub use packet::*;
pub use rxtx::*;
