//! Ricoh 2C02 picture processing unit.
//!
//! Cycle-accurate, dot-based rendering core. The PPU borrows its video
//! memory, both object-attribute memories, and the DMA/interrupt
//! collaborators from an orchestrator that owns them; it exposes the
//! CPU-visible register window as a [`Memory`](emu_core::Memory)
//! implementation and advances one dot per `tick()`.

pub mod bus;
pub mod capture;
mod palette;
pub mod ppu;

pub use bus::{VideoBus, mirror_nametable, mirror_palette};
pub use palette::PALETTE;
pub use ppu::{FB_HEIGHT, FB_WIDTH, OAM_DMA_CYCLES, OAM_DMA_PORT, Ppu};
