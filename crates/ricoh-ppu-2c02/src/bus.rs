//! The PPU's 14-bit address space.
//!
//! - $0000-$1FFF: pattern tables (cartridge CHR)
//! - $2000-$3EFF: nametables (2K CIRAM, aliased per cartridge mirroring)
//! - $3F00-$3FFF: palette RAM (32 bytes, with its own mirroring)

use emu_core::{Memory, Mirroring, Ram};

/// Collapse a nametable address ($2000-$3EFF) into a CIRAM offset.
#[must_use]
pub fn mirror_nametable(addr: u16, mirroring: Mirroring) -> u16 {
    let nt_addr = (addr - 0x2000) & 0x0FFF;
    match mirroring {
        Mirroring::Horizontal => {
            // Nametables 0,1 -> page 0; 2,3 -> page 1
            let page = (nt_addr / 0x0800) * 0x0400;
            page + (nt_addr & 0x03FF)
        }
        // Nametables 0,2 -> page 0; 1,3 -> page 1
        Mirroring::Vertical => nt_addr & 0x07FF,
        // Four-screen keeps the full 4K offset; a board without extra
        // VRAM backs it with 2K CIRAM, which aliases the upper two
        // nametables modulo its length.
        Mirroring::FourScreen => nt_addr & 0x0FFF,
        Mirroring::SingleScreenLower => nt_addr & 0x03FF,
        Mirroring::SingleScreenUpper => 0x0400 + (nt_addr & 0x03FF),
    }
}

/// Collapse a palette address ($3F00-$3FFF) into a 32-byte offset.
///
/// $3F10/$3F14/$3F18/$3F1C alias $3F00/$3F04/$3F08/$3F0C: sprite
/// backdrop entries share storage with the background ones.
#[must_use]
pub fn mirror_palette(addr: u16) -> u16 {
    let mut a = (addr - 0x3F00) & 0x1F;
    if a == 0x10 || a == 0x14 || a == 0x18 || a == 0x1C {
        a -= 0x10;
    }
    a
}

/// The video-side bus: routes PPU addresses to the cartridge, CIRAM,
/// or palette RAM. All three are borrowed from the orchestrator.
pub struct VideoBus<'a> {
    cart: &'a mut dyn Memory,
    ciram: &'a mut Ram,
    palette_ram: &'a mut Ram,
}

impl<'a> VideoBus<'a> {
    #[must_use]
    pub fn new(cart: &'a mut dyn Memory, ciram: &'a mut Ram, palette_ram: &'a mut Ram) -> Self {
        Self {
            cart,
            ciram,
            palette_ram,
        }
    }

    /// The cartridge decides the aliasing; headerless test memories
    /// that report nothing fall back to horizontal.
    fn nametable_mirroring(&self) -> Mirroring {
        self.cart.mirroring().unwrap_or(Mirroring::Horizontal)
    }
}

impl Memory for VideoBus<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => self.cart.read(addr),
            0x2000..=0x3EFF => {
                let mirroring = self.nametable_mirroring();
                self.ciram.read(mirror_nametable(addr, mirroring))
            }
            _ => self.palette_ram.read(mirror_palette(addr)),
        }
    }

    fn peek(&self, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => self.cart.peek(addr),
            0x2000..=0x3EFF => {
                let mirroring = self.nametable_mirroring();
                self.ciram.peek(mirror_nametable(addr, mirroring))
            }
            _ => self.palette_ram.peek(mirror_palette(addr)),
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => self.cart.write(addr, val),
            0x2000..=0x3EFF => {
                let mirroring = self.nametable_mirroring();
                self.ciram.write(mirror_nametable(addr, mirroring), val);
            }
            _ => self.palette_ram.write(mirror_palette(addr), val),
        }
    }

    fn mirroring(&self) -> Option<Mirroring> {
        self.cart.mirroring()
    }
}
