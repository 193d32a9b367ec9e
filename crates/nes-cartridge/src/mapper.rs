//! Mapper implementations: cartridge address decode and bank selection.
//!
//! A mapper sees two disjoint address ranges through one [`Memory`]
//! capability: PPU-bus pattern fetches at $0000-$1FFF and CPU-bus
//! cartridge accesses at $4020-$FFFF. Bank-select registers latch the
//! full written byte; out-of-range selections reduce modulo the bank
//! count at access time, never erroring — real boards ignore unused
//! register bits rather than rejecting them.

use emu_core::{Memory, Mirroring, Ram, Rom};

use crate::rom_file::{CartridgeError, RomFile};

/// Arena of equal-sized pattern (CHR) banks.
///
/// A cartridge that ships no CHR ROM carries 8K of CHR RAM instead; the
/// arena hides the difference. Banks are addressed by index plus
/// in-bank offset only.
enum PatternBanks {
    Rom(Vec<Rom>),
    Ram(Vec<Ram>),
}

impl PatternBanks {
    /// Split CHR data into `bank_size` pages, or allocate 8K of CHR RAM
    /// when the cartridge ships none.
    fn from_chr(chr: &[u8], bank_size: usize) -> Self {
        if chr.is_empty() {
            let pages = 8192 / bank_size;
            Self::Ram((0..pages).map(|_| Ram::new(bank_size)).collect())
        } else {
            Self::Rom(
                chr.chunks(bank_size)
                    .map(|chunk| Rom::new(chunk.to_vec()))
                    .collect(),
            )
        }
    }

    fn peek(&self, bank: usize, offset: u16) -> u8 {
        match self {
            Self::Rom(banks) => banks[bank % banks.len()].peek(offset),
            Self::Ram(banks) => banks[bank % banks.len()].peek(offset),
        }
    }

    fn write(&mut self, bank: usize, offset: u16, val: u8) {
        match self {
            // ROM: defined no-op
            Self::Rom(_) => {}
            Self::Ram(banks) => {
                let idx = bank % banks.len();
                banks[idx].write(offset, val);
            }
        }
    }
}

/// PRG ROM as an arena of 16K banks. An empty image degenerates to one
/// zero-filled bank so reads stay total.
fn prg_16k_banks(prg: &[u8]) -> Vec<Rom> {
    if prg.is_empty() {
        vec![Rom::new(vec![0; 16384])]
    } else {
        prg.chunks(16384)
            .map(|chunk| Rom::new(chunk.to_vec()))
            .collect()
    }
}

/// NROM (mapper 0): no bank switching.
///
/// - PRG: 16K mirrored into both windows, or 32K straight
/// - CHR: one 8K bank (ROM, or RAM if the cartridge ships none)
pub struct Nrom {
    prg_lo: Rom,
    prg_hi: Rom,
    chr: PatternBanks,
    mirror_mode: Mirroring,
}

impl Nrom {
    fn new(rom: &RomFile) -> Self {
        let mut banks = prg_16k_banks(&rom.prg);
        let (prg_lo, prg_hi) = if banks.len() == 1 {
            // 16K cart: the high window mirrors the low one
            let only = banks.remove(0);
            let copy = Rom::new((0..16384).map(|i| only.peek(i as u16)).collect());
            (only, copy)
        } else {
            let hi = banks.remove(1);
            let lo = banks.remove(0);
            (lo, hi)
        };
        Self {
            prg_lo,
            prg_hi,
            chr: PatternBanks::from_chr(&rom.chr, 8192),
            mirror_mode: rom.mirroring,
        }
    }
}

impl Memory for Nrom {
    fn read(&mut self, addr: u16) -> u8 {
        self.peek(addr)
    }

    fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.chr.peek(0, addr),
            0x8000..=0xBFFF => self.prg_lo.peek(addr - 0x8000),
            0xC000..=0xFFFF => self.prg_hi.peek(addr - 0xC000),
            _ => 0x00,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        if let 0x0000..=0x1FFF = addr {
            self.chr.write(0, addr, val);
        }
        // PRG is fixed ROM: writes are no-ops
    }

    fn mirroring(&self) -> Option<Mirroring> {
        Some(self.mirror_mode)
    }
}

/// MMC1 (mapper 1, SxROM): serial shift-register bank switching.
///
/// Five one-bit writes to $8000-$FFFF fill a shift register; the fifth
/// dispatches to control/CHR0/CHR1/PRG based on address bits 14:13.
/// A write with bit 7 set resets the register and forces PRG mode 3.
pub struct Mmc1 {
    prg_banks: Vec<Rom>,
    chr: PatternBanks,
    prg_ram: Ram,
    shift_register: u8,
    shift_count: u8,
    control: u8,
    chr_bank_0: u8,
    chr_bank_1: u8,
    prg_bank: u8,
}

impl Mmc1 {
    fn new(rom: &RomFile) -> Self {
        Self {
            prg_banks: prg_16k_banks(&rom.prg),
            chr: PatternBanks::from_chr(&rom.chr, 4096),
            prg_ram: Ram::new(8192),
            shift_register: 0,
            shift_count: 0,
            control: 0x0C, // PRG mode 3 (fix last bank) on power-up
            chr_bank_0: 0,
            chr_bank_1: 0,
            prg_bank: 0,
        }
    }

    /// Resolve a pattern address to (4K page, in-page offset).
    fn chr_page(&self, addr: u16) -> (usize, u16) {
        let offset = addr & 0x0FFF;
        let page = if self.control & 0x10 == 0 {
            // 8K mode: bit 0 of the select ignored, pages paired
            (usize::from(self.chr_bank_0) & 0x1E) + usize::from(addr >= 0x1000)
        } else if addr < 0x1000 {
            usize::from(self.chr_bank_0)
        } else {
            usize::from(self.chr_bank_1)
        };
        (page, offset)
    }

    /// 16K bank mapped at $8000-$BFFF.
    fn prg_lo_bank(&self) -> usize {
        match (self.control >> 2) & 0x03 {
            // 32K mode: bit 0 of the select ignored
            0 | 1 => usize::from(self.prg_bank) & 0x0E,
            2 => 0, // fix first
            _ => usize::from(self.prg_bank) & 0x0F,
        }
    }

    /// 16K bank mapped at $C000-$FFFF.
    fn prg_hi_bank(&self) -> usize {
        match (self.control >> 2) & 0x03 {
            0 | 1 => (usize::from(self.prg_bank) & 0x0E) + 1,
            2 => usize::from(self.prg_bank) & 0x0F,
            _ => self.prg_banks.len() - 1, // fix last
        }
    }

    fn write_register(&mut self, addr: u16, val: u8) {
        if val & 0x80 != 0 {
            // Reset: clear the shift register, force PRG mode 3
            self.shift_register = 0;
            self.shift_count = 0;
            self.control |= 0x0C;
            return;
        }

        // LSB-first serial load
        self.shift_register |= (val & 1) << self.shift_count;
        self.shift_count += 1;

        if self.shift_count == 5 {
            let data = self.shift_register;
            match (addr >> 13) & 0x03 {
                0 => self.control = data,    // $8000-$9FFF
                1 => self.chr_bank_0 = data, // $A000-$BFFF
                2 => self.chr_bank_1 = data, // $C000-$DFFF
                _ => self.prg_bank = data,   // $E000-$FFFF
            }
            self.shift_register = 0;
            self.shift_count = 0;
        }
    }
}

impl Memory for Mmc1 {
    fn read(&mut self, addr: u16) -> u8 {
        self.peek(addr)
    }

    fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => {
                let (page, offset) = self.chr_page(addr);
                self.chr.peek(page, offset)
            }
            0x6000..=0x7FFF => self.prg_ram.peek(addr - 0x6000),
            0x8000..=0xBFFF => {
                let bank = self.prg_lo_bank() % self.prg_banks.len();
                self.prg_banks[bank].peek(addr - 0x8000)
            }
            0xC000..=0xFFFF => {
                let bank = self.prg_hi_bank() % self.prg_banks.len();
                self.prg_banks[bank].peek(addr - 0xC000)
            }
            _ => 0x00,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => {
                let (page, offset) = self.chr_page(addr);
                self.chr.write(page, offset, val);
            }
            0x6000..=0x7FFF => self.prg_ram.write(addr - 0x6000, val),
            0x8000..=0xFFFF => self.write_register(addr, val),
            _ => {}
        }
    }

    fn mirroring(&self) -> Option<Mirroring> {
        Some(match self.control & 0x03 {
            0 => Mirroring::SingleScreenLower,
            1 => Mirroring::SingleScreenUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        })
    }
}

/// UxROM (mapper 2): 16K PRG bank switching.
///
/// - PRG: switchable 16K at $8000-$BFFF, last bank fixed at $C000-$FFFF
/// - CHR: one 8K bank (usually RAM)
pub struct UxRom {
    prg_banks: Vec<Rom>,
    chr: PatternBanks,
    mirror_mode: Mirroring,
    prg_bank: u8,
}

impl UxRom {
    fn new(rom: &RomFile) -> Self {
        Self {
            prg_banks: prg_16k_banks(&rom.prg),
            chr: PatternBanks::from_chr(&rom.chr, 8192),
            mirror_mode: rom.mirroring,
            prg_bank: 0,
        }
    }
}

impl Memory for UxRom {
    fn read(&mut self, addr: u16) -> u8 {
        self.peek(addr)
    }

    fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.chr.peek(0, addr),
            0x8000..=0xBFFF => {
                let bank = usize::from(self.prg_bank) % self.prg_banks.len();
                self.prg_banks[bank].peek(addr - 0x8000)
            }
            0xC000..=0xFFFF => {
                let last = self.prg_banks.len() - 1;
                self.prg_banks[last].peek(addr - 0xC000)
            }
            _ => 0x00,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.chr.write(0, addr, val),
            0x8000..=0xFFFF => self.prg_bank = val,
            _ => {}
        }
    }

    fn mirroring(&self) -> Option<Mirroring> {
        Some(self.mirror_mode)
    }
}

/// CNROM (mapper 3): 8K CHR bank switching, fixed PRG.
///
/// A write anywhere in $8000-$FFFF latches the full byte as the CHR
/// bank select — there is no single register address, the whole range
/// decodes to the latch. PRG is unbanked (16K mirrored or 32K).
pub struct CnRom {
    prg_lo: Rom,
    prg_hi: Rom,
    chr_banks: PatternBanks,
    bank_select: u8,
    mirror_mode: Mirroring,
}

impl CnRom {
    fn new(rom: &RomFile) -> Self {
        let mut banks = prg_16k_banks(&rom.prg);
        let (prg_lo, prg_hi) = if banks.len() == 1 {
            let only = banks.remove(0);
            let copy = Rom::new((0..16384).map(|i| only.peek(i as u16)).collect());
            (only, copy)
        } else {
            let hi = banks.remove(1);
            let lo = banks.remove(0);
            (lo, hi)
        };
        Self {
            prg_lo,
            prg_hi,
            chr_banks: PatternBanks::from_chr(&rom.chr, 8192),
            bank_select: 0,
            mirror_mode: rom.mirroring,
        }
    }
}

impl Memory for CnRom {
    fn read(&mut self, addr: u16) -> u8 {
        self.peek(addr)
    }

    fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.chr_banks.peek(usize::from(self.bank_select), addr),
            0x8000..=0xBFFF => self.prg_lo.peek(addr - 0x8000),
            0xC000..=0xFFFF => self.prg_hi.peek(addr - 0xC000),
            _ => 0x00,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => {
                self.chr_banks
                    .write(usize::from(self.bank_select), addr, val);
            }
            // The whole range is the register; the full byte is kept
            0x8000..=0xFFFF => self.bank_select = val,
            _ => {}
        }
    }

    fn mirroring(&self) -> Option<Mirroring> {
        Some(self.mirror_mode)
    }
}

/// The closed set of supported boards, selected once at load time.
pub enum Mapper {
    Nrom(Nrom),
    Mmc1(Mmc1),
    UxRom(UxRom),
    CnRom(CnRom),
}

impl Mapper {
    /// Build the board named by the cartridge metadata.
    ///
    /// # Errors
    ///
    /// Returns [`CartridgeError::UnsupportedMapper`] for any id outside
    /// the implemented set. MMC3 (4) is in the recognised variant set
    /// but not implemented, so it rejects like any other id — the
    /// loader treats this as "reject this cartridge", never a crash.
    pub fn new(rom: &RomFile) -> Result<Self, CartridgeError> {
        match rom.mapper {
            0 => Ok(Self::Nrom(Nrom::new(rom))),
            1 => Ok(Self::Mmc1(Mmc1::new(rom))),
            2 => Ok(Self::UxRom(UxRom::new(rom))),
            3 => Ok(Self::CnRom(CnRom::new(rom))),
            n => Err(CartridgeError::UnsupportedMapper(n)),
        }
    }

    /// The iNES mapper number of the selected board.
    #[must_use]
    pub fn number(&self) -> u8 {
        match self {
            Self::Nrom(_) => 0,
            Self::Mmc1(_) => 1,
            Self::UxRom(_) => 2,
            Self::CnRom(_) => 3,
        }
    }
}

impl Memory for Mapper {
    fn read(&mut self, addr: u16) -> u8 {
        match self {
            Self::Nrom(m) => m.read(addr),
            Self::Mmc1(m) => m.read(addr),
            Self::UxRom(m) => m.read(addr),
            Self::CnRom(m) => m.read(addr),
        }
    }

    fn peek(&self, addr: u16) -> u8 {
        match self {
            Self::Nrom(m) => m.peek(addr),
            Self::Mmc1(m) => m.peek(addr),
            Self::UxRom(m) => m.peek(addr),
            Self::CnRom(m) => m.peek(addr),
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match self {
            Self::Nrom(m) => m.write(addr, val),
            Self::Mmc1(m) => m.write(addr, val),
            Self::UxRom(m) => m.write(addr, val),
            Self::CnRom(m) => m.write(addr, val),
        }
    }

    fn mirroring(&self) -> Option<Mirroring> {
        match self {
            Self::Nrom(m) => m.mirroring(),
            Self::Mmc1(m) => m.mirroring(),
            Self::UxRom(m) => m.mirroring(),
            Self::CnRom(m) => m.mirroring(),
        }
    }

    // None of the supported boards carry clocked logic; the default
    // no-op tick() stands.
}
