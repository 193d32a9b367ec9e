//! The uniform addressable-memory capability.

/// Nametable mirroring topology reported by a cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    FourScreen,
    SingleScreenLower,
    SingleScreenUpper,
}

/// An addressable storage medium on a 16-bit bus.
///
/// Implemented by fixed banks, switchable cartridge hardware, and
/// memory-mapped register windows alike. `read` is the bus access the
/// hardware sees and may have side effects (latch clears, bank-switch
/// triggers, auto-increments); `peek` is the introspection channel and
/// must never mutate state.
pub trait Memory {
    /// Bus read. May mutate internal state.
    fn read(&mut self, addr: u16) -> u8;

    /// Side-effect-free read, for debuggers and tests.
    fn peek(&self, addr: u16) -> u8;

    /// Bus write. Silently ignored by read-only hardware.
    fn write(&mut self, addr: u16, val: u8);

    /// Nametable mirroring driven by this device, if it drives any.
    fn mirroring(&self) -> Option<Mirroring> {
        None
    }

    /// Advance internally-clocked logic by one step.
    ///
    /// Passive storage does nothing; clocked hardware (scanline-counting
    /// mappers, the PPU itself) overrides this.
    fn tick(&mut self) {}
}
