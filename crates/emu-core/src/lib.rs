//! Core capability and wiring primitives for cycle-accurate emulation.
//!
//! Every addressable device — fixed storage, switchable cartridge banks,
//! memory-mapped chip registers — speaks the same [`Memory`] contract.
//! Components never depend on concrete storage, only on the capability.

mod bank;
mod dma;
mod interrupt;
mod memory;

pub use bank::{Ram, Rom};
pub use dma::Dma;
pub use interrupt::{Interrupt, InterruptLines};
pub use memory::{Memory, Mirroring};
