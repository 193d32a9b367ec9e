//! iNES cartridge parser and mapper implementations.
//!
//! [`RomFile`] parses the iNES file format (header + PRG ROM + CHR ROM).
//! [`Mapper`] is the closed set of supported bank-switching boards:
//! NROM (0), MMC1 (1), UxROM (2), CNROM (3). MMC3 (4) is recognised but
//! not implemented. An invalid image or an unsupported board rejects the
//! cartridge through [`CartridgeError`] — there is no panic path.

mod mapper;
mod rom_file;

pub use mapper::{CnRom, Mapper, Mmc1, Nrom, UxRom};
pub use rom_file::{CartridgeError, RomFile};
