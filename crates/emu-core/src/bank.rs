//! Fixed-size bank storage primitives.
//!
//! A bank is a plain byte array behind the [`Memory`] capability.
//! Out-of-range addresses reduce modulo the bank length — unused address
//! bits are ignored rather than rejected, matching permissive hardware
//! decoding.

use crate::memory::Memory;

/// Read-write bank (work RAM, CHR RAM, OAM, palette RAM).
pub struct Ram {
    bytes: Vec<u8>,
}

impl Ram {
    /// A zero-filled bank of `len` bytes.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0; len],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Fill the whole bank with one value.
    pub fn fill(&mut self, val: u8) {
        self.bytes.fill(val);
    }
}

impl Memory for Ram {
    fn read(&mut self, addr: u16) -> u8 {
        self.bytes[addr as usize % self.bytes.len()]
    }

    fn peek(&self, addr: u16) -> u8 {
        self.bytes[addr as usize % self.bytes.len()]
    }

    fn write(&mut self, addr: u16, val: u8) {
        let len = self.bytes.len();
        self.bytes[addr as usize % len] = val;
    }
}

/// Read-only bank (PRG ROM, CHR ROM).
pub struct Rom {
    bytes: Vec<u8>,
}

impl Rom {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Memory for Rom {
    fn read(&mut self, addr: u16) -> u8 {
        self.bytes[addr as usize % self.bytes.len()]
    }

    fn peek(&self, addr: u16) -> u8 {
        self.bytes[addr as usize % self.bytes.len()]
    }

    fn write(&mut self, _addr: u16, _val: u8) {
        // ROM: writes are a defined no-op, not an error
    }
}
