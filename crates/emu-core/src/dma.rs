//! OAM DMA collaborator contract.

/// A direct-memory-access unit that streams bytes out of CPU-visible
/// memory.
///
/// The consumer (the PPU's $4014 port) latches a source page with
/// [`start`](Dma::start) and then pulls 256 consecutive bytes with
/// [`transfer`](Dma::transfer). The implementation lives with whoever
/// owns the CPU bus; this core only drives the handshake.
pub trait Dma {
    /// Latch the source page. The transfer reads `page << 8 .. page << 8 + 255`.
    fn start(&mut self, page: u8);

    /// Read the next source byte, advancing the internal cursor.
    fn transfer(&mut self) -> u8;
}
