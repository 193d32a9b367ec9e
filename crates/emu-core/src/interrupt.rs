//! Interrupt line wiring shared between chips and the CPU.

/// The two interrupt lines on the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Non-maskable interrupt (vertical blank).
    Nmi,
    /// Maskable interrupt request.
    Irq,
}

/// Latched interrupt lines.
///
/// Owned by the orchestrator; chips hold a borrowed reference and
/// assert/deassert lines, the CPU polls and acknowledges them.
#[derive(Debug, Default)]
pub struct InterruptLines {
    nmi: bool,
    irq: bool,
}

impl InterruptLines {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert a line.
    pub fn request(&mut self, interrupt: Interrupt) {
        match interrupt {
            Interrupt::Nmi => self.nmi = true,
            Interrupt::Irq => self.irq = true,
        }
    }

    /// Deassert a line (CPU has serviced it, or the source dropped it).
    pub fn acknowledge(&mut self, interrupt: Interrupt) {
        match interrupt {
            Interrupt::Nmi => self.nmi = false,
            Interrupt::Irq => self.irq = false,
        }
    }

    /// Whether a line is currently asserted.
    #[must_use]
    pub fn pending(&self, interrupt: Interrupt) -> bool {
        match interrupt {
            Interrupt::Nmi => self.nmi,
            Interrupt::Irq => self.irq,
        }
    }
}
