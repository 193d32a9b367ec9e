//! iNES file parsing.

use std::error::Error;
use std::fmt;

use emu_core::Mirroring;

/// Reasons a cartridge image is rejected at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartridgeError {
    /// File shorter than the header plus the data the header promises.
    TooShort { expected: usize, got: usize },
    /// Missing the `NES\x1A` magic.
    BadMagic,
    /// Header names a mapper outside the supported variant set.
    UnsupportedMapper(u8),
}

impl fmt::Display for CartridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { expected, got } => {
                write!(f, "iNES file too short: expected {expected} bytes, got {got}")
            }
            Self::BadMagic => write!(f, "invalid iNES magic (expected NES\\x1A)"),
            Self::UnsupportedMapper(n) => write!(f, "unsupported mapper: {n}"),
        }
    }
}

impl Error for CartridgeError {}

/// Parsed iNES image: mapper id, mirroring hint, and the raw PRG/CHR
/// bytes. Immutable once parsed; the mapper factory borrows it and
/// copies what it banks.
pub struct RomFile {
    /// Mapper number from header flags 6/7.
    pub mapper: u8,
    /// Mirroring hint (hard-wired boards use this; MMC1 overrides it).
    pub mirroring: Mirroring,
    /// Battery-backed PRG RAM present.
    pub has_battery: bool,
    /// PRG ROM, a multiple of 16K.
    pub prg: Vec<u8>,
    /// CHR ROM, a multiple of 8K. Empty means the board carries CHR RAM.
    pub chr: Vec<u8>,
}

impl RomFile {
    /// Parse an iNES image.
    ///
    /// # Errors
    ///
    /// Returns [`CartridgeError`] if the file is truncated or the magic
    /// is wrong. Mapper support is *not* checked here — that is the
    /// factory's job, so a loader can still inspect the metadata of a
    /// cartridge it cannot run.
    pub fn parse(data: &[u8]) -> Result<Self, CartridgeError> {
        if data.len() < 16 {
            return Err(CartridgeError::TooShort {
                expected: 16,
                got: data.len(),
            });
        }
        if &data[0..4] != b"NES\x1a" {
            return Err(CartridgeError::BadMagic);
        }

        let prg_banks = data[4];
        let chr_banks = data[5];
        let flags6 = data[6];
        let flags7 = data[7];

        let mapper = (flags7 & 0xF0) | ((flags6 >> 4) & 0x0F);

        let mirroring = if flags6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if flags6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let has_battery = flags6 & 0x02 != 0;
        let has_trainer = flags6 & 0x04 != 0;

        let prg_size = usize::from(prg_banks) * 16384;
        let chr_size = usize::from(chr_banks) * 8192;

        let prg_start = if has_trainer { 16 + 512 } else { 16 };
        let chr_start = prg_start + prg_size;

        if data.len() < chr_start + chr_size {
            return Err(CartridgeError::TooShort {
                expected: chr_start + chr_size,
                got: data.len(),
            });
        }

        Ok(Self {
            mapper,
            mirroring,
            has_battery,
            prg: data[prg_start..prg_start + prg_size].to_vec(),
            chr: data[chr_start..chr_start + chr_size].to_vec(),
        })
    }
}
