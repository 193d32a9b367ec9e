//! Ricoh 2C02 PPU emulation.
//!
//! Dot-based rendering. One `tick()` = one PPU dot. The PPU runs at
//! 5,369,318 Hz (21,477,272 / 4). Each frame is 341 dots x 262 scanlines;
//! the orchestrator supplies three PPU ticks per CPU tick.
//!
//! ## Scanline layout
//! - 0-239: visible scanlines (render pixels)
//! - 240: post-render (idle)
//! - 241-260: `VBlank`
//! - 261: pre-render

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::unused_self
)]
#![allow(clippy::manual_range_contains)]

use emu_core::{Dma, Interrupt, InterruptLines, Memory, Ram};

use crate::palette::PALETTE;

/// Framebuffer dimensions.
pub const FB_WIDTH: u32 = 256;
pub const FB_HEIGHT: u32 = 240;

/// The OAM DMA trigger port on the CPU bus.
pub const OAM_DMA_PORT: u16 = 0x4014;

/// CPU cycles consumed by one OAM DMA transfer. The transfer itself is
/// modelled atomically inside the $4014 write; the orchestrator stalls
/// the CPU for this long to keep timing honest.
pub const OAM_DMA_CYCLES: u32 = 513;

// PPUSTATUS bits 7:5
const STATUS_VBLANK: u8 = 0x80;
const STATUS_SPRITE_ZERO_HIT: u8 = 0x40;
const STATUS_OVERFLOW: u8 = 0x20;

/// PPU 2C02.
///
/// Video memory, both object-attribute memories, and the DMA/interrupt
/// collaborators are borrowed from the orchestrator; the PPU owns only
/// its registers, pipeline state, and the framebuffer.
pub struct Ppu<'a> {
    // Collaborators
    mem: &'a mut dyn Memory,
    oam: &'a mut Ram,
    secondary_oam: &'a mut Ram,
    dma: &'a mut dyn Dma,
    interrupts: &'a mut InterruptLines,

    // Registers
    ctrl: u8,
    mask: u8,
    status: u8,
    oam_addr: u8,

    // Loopy scroll/address registers
    v: u16,
    t: u16,
    fine_x: u8,
    w: bool,

    // Last value driven onto the CPU-PPU data bus. Reads of write-only
    // registers, and the low 5 status bits, return this.
    cpu_data_bus: u8,

    // Rendering position
    scanline: u16,
    dot: u16,
    frame_odd: bool,
    frames: u64,

    // Background shift registers
    bg_shift_pattern_lo: u16,
    bg_shift_pattern_hi: u16,
    bg_shift_attrib_lo: u16,
    bg_shift_attrib_hi: u16,
    bg_next_tile_id: u8,
    bg_next_tile_attrib: u8,
    bg_next_tile_lo: u8,
    bg_next_tile_hi: u8,

    // Sprite pipeline for the line in flight
    sprite_count: u8,
    sprite_patterns_lo: [u8; 8],
    sprite_patterns_hi: [u8; 8],
    sprite_attribs: [u8; 8],
    sprite_x_counters: [u8; 8],
    sprite_zero_on_line: bool,

    // Output
    framebuffer: Vec<u32>,
    nmi_occurred: bool,
    nmi_output: bool,
    nmi_edge: bool,
}

impl<'a> Ppu<'a> {
    #[must_use]
    pub fn new(
        mem: &'a mut dyn Memory,
        oam: &'a mut Ram,
        secondary_oam: &'a mut Ram,
        dma: &'a mut dyn Dma,
        interrupts: &'a mut InterruptLines,
    ) -> Self {
        let mut ppu = Self {
            mem,
            oam,
            secondary_oam,
            dma,
            interrupts,

            ctrl: 0,
            mask: 0,
            status: 0,
            oam_addr: 0,

            v: 0,
            t: 0,
            fine_x: 0,
            w: false,

            cpu_data_bus: 0,

            scanline: 261,
            dot: 0,
            frame_odd: false,
            frames: 0,

            bg_shift_pattern_lo: 0,
            bg_shift_pattern_hi: 0,
            bg_shift_attrib_lo: 0,
            bg_shift_attrib_hi: 0,
            bg_next_tile_id: 0,
            bg_next_tile_attrib: 0,
            bg_next_tile_lo: 0,
            bg_next_tile_hi: 0,

            sprite_count: 0,
            sprite_patterns_lo: [0; 8],
            sprite_patterns_hi: [0; 8],
            sprite_attribs: [0; 8],
            sprite_x_counters: [0; 8],
            sprite_zero_on_line: false,

            framebuffer: vec![0; (FB_WIDTH * FB_HEIGHT) as usize],
            nmi_occurred: false,
            nmi_output: false,
            nmi_edge: false,
        };
        ppu.power_cycle();
        ppu
    }

    /// Cold boot: every register, latch, and counter to its documented
    /// post-power-on value; framebuffer cleared. Idempotent.
    pub fn power_cycle(&mut self) {
        self.ctrl = 0;
        self.mask = 0;
        self.status = 0;
        self.oam_addr = 0;

        self.v = 0;
        self.t = 0;
        self.fine_x = 0;
        self.w = false;

        self.cpu_data_bus = 0;

        self.scanline = 261; // Start at pre-render
        self.dot = 0;
        self.frame_odd = false;
        self.frames = 0;

        self.clear_pipeline();
        self.framebuffer.fill(0);

        self.nmi_occurred = false;
        self.nmi_output = false;
        self.nmi_edge = false;
    }

    /// Warm reset: clears control, mask, the scroll/address latch, and
    /// the timing counters. Status, the OAM address, and the current
    /// VRAM address survive a reset on real hardware.
    pub fn reset(&mut self) {
        self.ctrl = 0;
        self.mask = 0;
        self.t = 0;
        self.fine_x = 0;
        self.w = false;

        self.scanline = 261;
        self.dot = 0;
        self.frame_odd = false;

        self.clear_pipeline();

        self.nmi_output = false;
        self.check_nmi();
    }

    fn clear_pipeline(&mut self) {
        self.bg_shift_pattern_lo = 0;
        self.bg_shift_pattern_hi = 0;
        self.bg_shift_attrib_lo = 0;
        self.bg_shift_attrib_hi = 0;
        self.bg_next_tile_id = 0;
        self.bg_next_tile_attrib = 0;
        self.bg_next_tile_lo = 0;
        self.bg_next_tile_hi = 0;

        self.sprite_count = 0;
        self.sprite_patterns_lo = [0; 8];
        self.sprite_patterns_hi = [0; 8];
        self.sprite_attribs = [0; 8];
        self.sprite_x_counters = [0; 8];
        self.sprite_zero_on_line = false;
    }

    // === Register bit fields (PPUCTRL bits 7:0 = VPHB SINN) ===

    /// $2007 auto-increment: PPUCTRL bit 2 selects +1 or +32.
    fn vram_increment(&self) -> u16 {
        if self.ctrl & 0x04 != 0 { 32 } else { 1 }
    }

    /// Sprite pattern table for 8x8 sprites: PPUCTRL bit 3.
    fn sprite_table(&self) -> u16 {
        u16::from((self.ctrl >> 3) & 1) * 0x1000
    }

    /// Background pattern table: PPUCTRL bit 4.
    fn bg_table(&self) -> u16 {
        u16::from((self.ctrl >> 4) & 1) * 0x1000
    }

    /// Sprite height in lines: PPUCTRL bit 5 selects 8x8 or 8x16.
    fn sprite_height(&self) -> u16 {
        if self.ctrl & 0x20 != 0 { 16 } else { 8 }
    }

    // === Register bit fields (PPUMASK bits 7:0 = BGRs bMmG) ===

    fn greyscale(&self) -> bool {
        self.mask & 0x01 != 0
    }

    fn show_bg_left(&self) -> bool {
        self.mask & 0x02 != 0
    }

    fn show_sprites_left(&self) -> bool {
        self.mask & 0x04 != 0
    }

    fn show_bg(&self) -> bool {
        self.mask & 0x08 != 0
    }

    fn show_sprites(&self) -> bool {
        self.mask & 0x10 != 0
    }

    /// Colour emphasis bits: PPUMASK bits 7:5 (blue, green, red).
    fn emphasis(&self) -> u8 {
        self.mask >> 5
    }

    fn rendering_enabled(&self) -> bool {
        self.show_bg() || self.show_sprites()
    }

    // === Dot pipeline ===

    fn tick_dot(&mut self) {
        // Pre-render line (261)
        if self.scanline == 261 {
            self.tick_prerender();
        }
        // Visible scanlines (0-239)
        else if self.scanline <= 239 {
            self.tick_visible();
        }
        // Post-render (240): idle
        // VBlank start (241)
        else if self.scanline == 241 && self.dot == 1 {
            self.status |= STATUS_VBLANK;
            self.nmi_occurred = true;
            self.check_nmi();
        }

        // Advance dot/scanline
        self.dot += 1;
        if self.dot > 340 {
            self.dot = 0;
            self.scanline += 1;
            if self.scanline > 261 {
                self.scanline = 0;
                self.frame_odd = !self.frame_odd;
                self.frames += 1;
            }
        }
    }

    fn tick_prerender(&mut self) {
        if self.dot == 1 {
            // Clear VBlank, sprite 0 hit, sprite overflow
            self.status &= !(STATUS_VBLANK | STATUS_SPRITE_ZERO_HIT | STATUS_OVERFLOW);
            self.nmi_occurred = false;
            self.check_nmi();
            // Clear sprite shift registers
            self.sprite_patterns_lo = [0; 8];
            self.sprite_patterns_hi = [0; 8];
        }

        if self.rendering_enabled() {
            // Background fetches (same timing as visible lines)
            if (self.dot >= 1 && self.dot <= 256) || (self.dot >= 321 && self.dot <= 336) {
                self.bg_fetch_cycle();
                self.shift_registers();
            }

            if self.dot == 256 {
                self.increment_y();
            }
            if self.dot == 257 {
                self.copy_horizontal();
            }

            // Copy vertical bits from t to v during dots 280-304
            if self.dot >= 280 && self.dot <= 304 {
                self.copy_vertical();
            }

            // Odd frame skip: skip last dot on odd frames
            if self.dot == 339 && self.frame_odd {
                self.dot = 340; // Will wrap to 0 on next advance
            }
        }
    }

    fn tick_visible(&mut self) {
        if self.rendering_enabled() {
            // Pixel output (dots 1-256)
            if self.dot >= 1 && self.dot <= 256 {
                self.render_pixel();
                self.bg_fetch_cycle();
                self.shift_registers();
            }

            // Sprite evaluation for the next line at dot 257
            if self.dot == 257 {
                self.evaluate_sprites();
            }

            // Prefetch next scanline tiles (dots 321-336)
            if self.dot >= 321 && self.dot <= 336 {
                self.bg_fetch_cycle();
                self.shift_registers();
            }

            if self.dot == 256 {
                self.increment_y();
            }
            if self.dot == 257 {
                self.copy_horizontal();
            }
        } else if self.dot >= 1 && self.dot <= 256 {
            // Rendering disabled: output the backdrop colour
            let bg_colour = self.mem.peek(0x3F00) & 0x3F;
            let x = (self.dot - 1) as usize;
            let y = self.scanline as usize;
            if y < FB_HEIGHT as usize && x < FB_WIDTH as usize {
                self.framebuffer[y * FB_WIDTH as usize + x] = self.apply_mask_effects(bg_colour);
            }
        }
    }

    fn bg_fetch_cycle(&mut self) {
        let cycle = if self.dot >= 321 {
            self.dot - 321
        } else {
            self.dot - 1
        };

        match cycle & 0x07 {
            0 => {
                // Load shift registers with previously fetched tile data
                // (every 8 dots except the very first fetch at dot 321)
                if self.dot != 321 {
                    self.load_bg_shift_registers();
                }
                // Fetch nametable byte
                let nt_addr = 0x2000 | (self.v & 0x0FFF);
                self.bg_next_tile_id = self.mem.read(nt_addr);
            }
            2 => {
                // Fetch attribute byte
                let attr_addr =
                    0x23C0 | (self.v & 0x0C00) | ((self.v >> 4) & 0x38) | ((self.v >> 2) & 0x07);
                let attr_byte = self.mem.read(attr_addr);
                // Select the 2-bit palette for this quadrant
                let shift = ((self.v >> 4) & 0x04) | (self.v & 0x02);
                self.bg_next_tile_attrib = (attr_byte >> shift) & 0x03;
            }
            4 => {
                // Fetch pattern table low byte
                let fine_y = (self.v >> 12) & 0x07;
                let addr = self.bg_table() + u16::from(self.bg_next_tile_id) * 16 + fine_y;
                self.bg_next_tile_lo = self.mem.read(addr);
            }
            6 => {
                // Fetch pattern table high byte
                let fine_y = (self.v >> 12) & 0x07;
                let addr = self.bg_table() + u16::from(self.bg_next_tile_id) * 16 + fine_y + 8;
                self.bg_next_tile_hi = self.mem.read(addr);
            }
            7 => {
                // Increment coarse X
                self.increment_x();
            }
            _ => {}
        }
    }

    fn load_bg_shift_registers(&mut self) {
        self.bg_shift_pattern_lo =
            (self.bg_shift_pattern_lo & 0xFF00) | u16::from(self.bg_next_tile_lo);
        self.bg_shift_pattern_hi =
            (self.bg_shift_pattern_hi & 0xFF00) | u16::from(self.bg_next_tile_hi);

        let attrib_lo = if self.bg_next_tile_attrib & 0x01 != 0 {
            0xFF
        } else {
            0x00
        };
        let attrib_hi = if self.bg_next_tile_attrib & 0x02 != 0 {
            0xFF
        } else {
            0x00
        };
        self.bg_shift_attrib_lo = (self.bg_shift_attrib_lo & 0xFF00) | attrib_lo;
        self.bg_shift_attrib_hi = (self.bg_shift_attrib_hi & 0xFF00) | attrib_hi;
    }

    fn shift_registers(&mut self) {
        self.bg_shift_pattern_lo <<= 1;
        self.bg_shift_pattern_hi <<= 1;
        self.bg_shift_attrib_lo <<= 1;
        self.bg_shift_attrib_hi <<= 1;
    }

    fn render_pixel(&mut self) {
        let x = (self.dot - 1) as usize;
        let y = self.scanline as usize;

        if y >= FB_HEIGHT as usize || x >= FB_WIDTH as usize {
            return;
        }

        // Background pixel
        let (bg_pixel, bg_palette) = self.get_bg_pixel();

        // Sprite pixel
        let (sp_pixel, sp_palette, sp_priority, sp_is_zero) = self.get_sprite_pixel(x);

        // Compose final pixel
        let (pixel, palette) = match (bg_pixel, sp_pixel) {
            (0, 0) => (0, 0),
            (0, _) => (sp_pixel, sp_palette),
            (_, 0) => (bg_pixel, bg_palette),
            (_, _) => {
                // Sprite 0 hit detection
                if sp_is_zero && x != 255 && self.show_bg() && self.show_sprites() {
                    self.status |= STATUS_SPRITE_ZERO_HIT;
                }
                if sp_priority {
                    (bg_pixel, bg_palette)
                } else {
                    (sp_pixel, sp_palette)
                }
            }
        };

        let colour_addr = if pixel == 0 {
            0
        } else {
            (u16::from(palette) << 2) | u16::from(pixel)
        };
        let palette_index = self.mem.peek(0x3F00 | colour_addr) & 0x3F;
        self.framebuffer[y * FB_WIDTH as usize + x] = self.apply_mask_effects(palette_index);
    }

    fn get_bg_pixel(&self) -> (u8, u8) {
        if !self.show_bg() {
            return (0, 0);
        }
        // Left 8 pixels clipping
        if self.dot <= 8 && !self.show_bg_left() {
            return (0, 0);
        }

        let bit_select = 0x8000 >> self.fine_x;
        let pixel_lo = u8::from(self.bg_shift_pattern_lo & bit_select != 0);
        let pixel_hi = u8::from(self.bg_shift_pattern_hi & bit_select != 0);
        let pixel = (pixel_hi << 1) | pixel_lo;

        let palette_lo = u8::from(self.bg_shift_attrib_lo & bit_select != 0);
        let palette_hi = u8::from(self.bg_shift_attrib_hi & bit_select != 0);
        let palette = (palette_hi << 1) | palette_lo;

        (pixel, palette)
    }

    fn get_sprite_pixel(&self, x: usize) -> (u8, u8, bool, bool) {
        if !self.show_sprites() {
            return (0, 0, false, false);
        }
        // Left 8 pixels clipping
        if x < 8 && !self.show_sprites_left() {
            return (0, 0, false, false);
        }

        for i in 0..self.sprite_count as usize {
            let offset = x as i16 - i16::from(self.sprite_x_counters[i]);
            if offset < 0 || offset > 7 {
                continue;
            }
            let offset = offset as u8;

            let lo = (self.sprite_patterns_lo[i] >> (7 - offset)) & 1;
            let hi = (self.sprite_patterns_hi[i] >> (7 - offset)) & 1;
            let pixel = (hi << 1) | lo;

            if pixel == 0 {
                continue;
            }

            let palette = (self.sprite_attribs[i] & 0x03) + 4; // Sprite palettes 4-7
            let behind_bg = self.sprite_attribs[i] & 0x20 != 0;
            let is_sprite_zero = self.sprite_zero_on_line && i == 0;

            return (pixel, palette, behind_bg, is_sprite_zero);
        }

        (0, 0, false, false)
    }

    /// Scan primary OAM for sprites intersecting the next scanline, copy
    /// up to 8 into secondary OAM, and fetch their pattern rows. A ninth
    /// in-range sprite sets the overflow flag.
    fn evaluate_sprites(&mut self) {
        let sprite_height = self.sprite_height();
        let line = self.scanline;

        self.secondary_oam.fill(0xFF);
        self.sprite_count = 0;
        self.sprite_zero_on_line = false;

        for i in 0..64u16 {
            let y = u16::from(self.oam.peek(i * 4));
            let diff = line.wrapping_sub(y);

            if diff < sprite_height {
                if self.sprite_count < 8 {
                    let slot = u16::from(self.sprite_count) * 4;
                    for byte in 0..4 {
                        self.secondary_oam
                            .write(slot + byte, self.oam.peek(i * 4 + byte));
                    }

                    if i == 0 {
                        self.sprite_zero_on_line = true;
                    }

                    self.sprite_count += 1;
                } else {
                    self.status |= STATUS_OVERFLOW;
                    break;
                }
            }
        }

        // Fetch sprite patterns
        for i in 0..8usize {
            if i < self.sprite_count as usize {
                let slot = i as u16 * 4;
                let sprite_y = u16::from(self.secondary_oam.peek(slot));
                let tile_index = self.secondary_oam.peek(slot + 1);
                let attribs = self.secondary_oam.peek(slot + 2);
                let sprite_x = self.secondary_oam.peek(slot + 3);

                let flip_v = attribs & 0x80 != 0;
                let mut row = line.wrapping_sub(sprite_y);

                let (table, tile, sprite_row) = if sprite_height == 16 {
                    // 8x16 sprites: bit 0 of tile = pattern table, bits 1-7 = tile
                    let table = u16::from(tile_index & 1) * 0x1000;
                    let tile = tile_index & 0xFE;
                    if flip_v {
                        row = 15 - row;
                    }
                    if row >= 8 {
                        (table, tile + 1, row - 8)
                    } else {
                        (table, tile, row)
                    }
                } else {
                    // 8x8 sprites
                    if flip_v {
                        row = 7 - row;
                    }
                    (self.sprite_table(), tile_index, row)
                };

                let addr = table + u16::from(tile) * 16 + sprite_row;
                let mut lo = self.mem.read(addr);
                let mut hi = self.mem.read(addr + 8);

                // Horizontal flip
                if attribs & 0x40 != 0 {
                    lo = flip_byte(lo);
                    hi = flip_byte(hi);
                }

                self.sprite_patterns_lo[i] = lo;
                self.sprite_patterns_hi[i] = hi;
                self.sprite_attribs[i] = attribs;
                self.sprite_x_counters[i] = sprite_x;
            } else {
                self.sprite_patterns_lo[i] = 0;
                self.sprite_patterns_hi[i] = 0;
            }
        }
    }

    // === Scrolling ===

    fn increment_x(&mut self) {
        if !self.rendering_enabled() {
            return;
        }
        if self.v & 0x001F == 31 {
            self.v &= !0x001F;
            self.v ^= 0x0400; // Switch horizontal nametable
        } else {
            self.v += 1;
        }
    }

    fn increment_y(&mut self) {
        if !self.rendering_enabled() {
            return;
        }
        if (self.v & 0x7000) != 0x7000 {
            self.v += 0x1000; // Increment fine Y
        } else {
            self.v &= !0x7000; // Fine Y = 0
            let mut coarse_y = (self.v & 0x03E0) >> 5;
            if coarse_y == 29 {
                coarse_y = 0;
                self.v ^= 0x0800; // Switch vertical nametable
            } else if coarse_y == 31 {
                coarse_y = 0; // No nametable switch
            } else {
                coarse_y += 1;
            }
            self.v = (self.v & !0x03E0) | (coarse_y << 5);
        }
    }

    fn copy_horizontal(&mut self) {
        if !self.rendering_enabled() {
            return;
        }
        // v: ....A .....EDCBA = t: ....A .....EDCBA
        self.v = (self.v & !0x041F) | (self.t & 0x041F);
    }

    fn copy_vertical(&mut self) {
        if !self.rendering_enabled() {
            return;
        }
        // v: GHIA.BC DEF..... = t: GHIA.BC DEF.....
        self.v = (self.v & !0x7BE0) | (self.t & 0x7BE0);
    }

    // === OAM DMA ===

    /// One logical 256-byte transfer into primary OAM, delivered in
    /// source order starting at the current OAM address. Externally
    /// indistinguishable from an atomic copy; the cycle cost is
    /// [`OAM_DMA_CYCLES`], charged by the orchestrator.
    fn oam_dma(&mut self, page: u8) {
        self.dma.start(page);
        for i in 0..=255u8 {
            let byte = self.dma.transfer();
            self.oam
                .write(u16::from(self.oam_addr.wrapping_add(i)), byte);
        }
    }

    // === Helpers ===

    /// Apply PPUMASK greyscale (bit 0) and emphasis (bits 5-7) to a
    /// palette index, producing an ARGB colour.
    ///
    /// Greyscale forces the palette index to column 0 (AND with $30)
    /// before lookup. Emphasis attenuates the *other* channels:
    /// emphasise-red dims green and blue, etc. The attenuation factor is
    /// ~0.816 per NES Dev wiki.
    fn apply_mask_effects(&self, palette_index: u8) -> u32 {
        let idx = if self.greyscale() {
            (palette_index & 0x30) as usize
        } else {
            palette_index as usize
        };

        let argb = PALETTE[idx];
        let emphasis = self.emphasis();
        if emphasis == 0 {
            return argb;
        }

        // NTSC emphasis bits: bit 0 = red, bit 1 = green, bit 2 = blue.
        // Each set bit attenuates the OTHER two channels.
        let mut r = (argb >> 16) & 0xFF;
        let mut g = (argb >> 8) & 0xFF;
        let mut b = argb & 0xFF;

        // Emphasise red → dim green and blue
        if emphasis & 0x01 != 0 {
            g = g * 13 / 16;
            b = b * 13 / 16;
        }
        // Emphasise green → dim red and blue
        if emphasis & 0x02 != 0 {
            r = r * 13 / 16;
            b = b * 13 / 16;
        }
        // Emphasise blue → dim red and green
        if emphasis & 0x04 != 0 {
            r = r * 13 / 16;
            g = g * 13 / 16;
        }

        0xFF00_0000 | (r << 16) | (g << 8) | b
    }

    /// Drive the NMI line on the rising edge of (vblank AND enable).
    fn check_nmi(&mut self) {
        let nmi_active = self.nmi_occurred && self.nmi_output;
        if nmi_active && !self.nmi_edge {
            self.nmi_edge = true;
            self.interrupts.request(Interrupt::Nmi);
        } else if !nmi_active {
            self.nmi_edge = false;
        }
    }

    /// Reference to the framebuffer (ARGB32, 256x240).
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }

    /// Completed frames since power-on.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Current scanline.
    #[must_use]
    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    /// Current dot.
    #[must_use]
    pub fn dot(&self) -> u16 {
        self.dot
    }
}

/// The CPU-visible register window: $2000-$2007 (mirrored through
/// $3FFF) plus the $4014 DMA trigger. One `tick()` advances the dot
/// pipeline by one step.
impl Memory for Ppu<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        if addr == OAM_DMA_PORT {
            // $4014 is write-only
            return self.cpu_data_bus;
        }
        let value = match addr & 0x07 {
            // $2002 - PPUSTATUS. Low 5 bits float at the data-bus value.
            2 => {
                let result = (self.status & 0xE0) | (self.cpu_data_bus & 0x1F);
                self.status &= !STATUS_VBLANK;
                self.nmi_occurred = false;
                self.check_nmi();
                self.w = false; // Reset write toggle
                result
            }
            // $2004 - OAMDATA. Reads do not increment the address.
            4 => self.oam.peek(u16::from(self.oam_addr)),
            // $2007 - PPUDATA
            7 => {
                let result = self.mem.read(self.v & 0x3FFF);
                self.v = self.v.wrapping_add(self.vram_increment()) & 0x7FFF;
                result
            }
            // Write-only registers read back the data-bus latch
            _ => self.cpu_data_bus,
        };
        self.cpu_data_bus = value;
        value
    }

    fn peek(&self, addr: u16) -> u8 {
        if addr == OAM_DMA_PORT {
            return self.cpu_data_bus;
        }
        match addr & 0x07 {
            2 => (self.status & 0xE0) | (self.cpu_data_bus & 0x1F),
            4 => self.oam.peek(u16::from(self.oam_addr)),
            7 => self.mem.peek(self.v & 0x3FFF),
            _ => self.cpu_data_bus,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.cpu_data_bus = val;
        if addr == OAM_DMA_PORT {
            self.oam_dma(val);
            return;
        }
        match addr & 0x07 {
            // $2000 - PPUCTRL
            0 => {
                self.ctrl = val;
                // Nametable select bits go to t bits 10-11
                self.t = (self.t & !0x0C00) | (u16::from(val & 0x03) << 10);
                self.nmi_output = val & 0x80 != 0;
                self.check_nmi();
            }
            // $2001 - PPUMASK
            1 => self.mask = val,
            // $2003 - OAMADDR
            3 => self.oam_addr = val,
            // $2004 - OAMDATA
            4 => {
                self.oam.write(u16::from(self.oam_addr), val);
                self.oam_addr = self.oam_addr.wrapping_add(1);
            }
            // $2005 - PPUSCROLL
            5 => {
                if self.w {
                    // Second write: Y scroll
                    self.t = (self.t & !0x73E0)
                        | (u16::from(val & 0x07) << 12)
                        | (u16::from(val >> 3) << 5);
                } else {
                    // First write: X scroll
                    self.t = (self.t & !0x001F) | (u16::from(val) >> 3);
                    self.fine_x = val & 0x07;
                }
                self.w = !self.w;
            }
            // $2006 - PPUADDR
            6 => {
                if self.w {
                    // Second write: low byte, copy t to v
                    self.t = (self.t & 0xFF00) | u16::from(val);
                    self.v = self.t;
                } else {
                    // First write: high byte
                    self.t = (self.t & 0x00FF) | (u16::from(val & 0x3F) << 8);
                }
                self.w = !self.w;
            }
            // $2007 - PPUDATA
            7 => {
                self.mem.write(self.v & 0x3FFF, val);
                self.v = self.v.wrapping_add(self.vram_increment()) & 0x7FFF;
            }
            _ => {}
        }
    }

    fn tick(&mut self) {
        self.tick_dot();
    }
}

/// Reverse the bits in a byte (for horizontal sprite flip).
fn flip_byte(mut b: u8) -> u8 {
    b = (b & 0xF0) >> 4 | (b & 0x0F) << 4;
    b = (b & 0xCC) >> 2 | (b & 0x33) << 2;
    (b & 0xAA) >> 1 | (b & 0x55) << 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::VideoBus;

    /// DMA source backed by a fixed 256-byte page.
    struct FixedDma {
        page: u8,
        pos: u8,
        data: [u8; 256],
    }

    impl FixedDma {
        fn new(data: [u8; 256]) -> Self {
            Self {
                page: 0,
                pos: 0,
                data,
            }
        }
    }

    impl Dma for FixedDma {
        fn start(&mut self, page: u8) {
            self.page = page;
            self.pos = 0;
        }

        fn transfer(&mut self) -> u8 {
            let byte = self.data[usize::from(self.pos)];
            self.pos = self.pos.wrapping_add(1);
            byte
        }
    }

    /// Everything the orchestrator would own; tests borrow pieces out.
    struct Fixture {
        chr: Ram,
        ciram: Ram,
        palette_ram: Ram,
        oam: Ram,
        secondary_oam: Ram,
        dma: FixedDma,
        interrupts: InterruptLines,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                chr: Ram::new(8192),
                ciram: Ram::new(2048),
                palette_ram: Ram::new(32),
                oam: Ram::new(256),
                secondary_oam: Ram::new(32),
                dma: FixedDma::new([0; 256]),
                interrupts: InterruptLines::new(),
            }
        }
    }

    macro_rules! ppu {
        ($f:ident, $bus:ident, $ppu:ident) => {
            let mut $bus = VideoBus::new(&mut $f.chr, &mut $f.ciram, &mut $f.palette_ram);
            let mut $ppu = Ppu::new(
                &mut $bus,
                &mut $f.oam,
                &mut $f.secondary_oam,
                &mut $f.dma,
                &mut $f.interrupts,
            );
        };
    }

    #[test]
    fn power_cycle_state() {
        let mut f = Fixture::new();
        ppu!(f, bus, ppu);

        assert_eq!(ppu.status & STATUS_VBLANK, 0);
        assert!(!ppu.w);
        assert_eq!(ppu.scanline(), 261);
        assert_eq!(ppu.dot(), 0);
        assert_eq!(ppu.frame_count(), 0);

        // Two scroll writes return the latch to its initial state
        ppu.write(0x2005, 0x12);
        assert!(ppu.w);
        ppu.write(0x2005, 0x34);
        assert!(!ppu.w);

        // power_cycle is idempotent and callable at any time
        ppu.write(0x2005, 0x12);
        ppu.power_cycle();
        assert!(!ppu.w);
        assert_eq!(ppu.v, 0);
        assert!(ppu.framebuffer().iter().all(|&p| p == 0));
    }

    #[test]
    fn status_read_clears_vblank_and_latch() {
        let mut f = Fixture::new();
        ppu!(f, bus, ppu);

        ppu.status |= STATUS_VBLANK;
        ppu.write(0x2005, 0x12); // w now set

        let status = ppu.read(0x2002);
        assert_ne!(status & STATUS_VBLANK, 0);
        assert_eq!(ppu.status & STATUS_VBLANK, 0);
        assert!(!ppu.w);

        // Second read: flag already clear
        assert_eq!(ppu.read(0x2002) & STATUS_VBLANK, 0);
    }

    #[test]
    fn status_peek_has_no_side_effects() {
        let mut f = Fixture::new();
        ppu!(f, bus, ppu);

        ppu.status |= STATUS_VBLANK;
        ppu.write(0x2005, 0x12);

        assert_ne!(ppu.peek(0x2002) & STATUS_VBLANK, 0);
        assert_ne!(ppu.status & STATUS_VBLANK, 0);
        assert!(ppu.w);
    }

    #[test]
    fn write_only_registers_read_as_data_bus() {
        let mut f = Fixture::new();
        ppu!(f, bus, ppu);

        ppu.write(0x2001, 0x5A);
        assert_eq!(ppu.read(0x2000), 0x5A);
        assert_eq!(ppu.peek(0x2001), 0x5A);
        assert_eq!(ppu.peek(0x4014), 0x5A);

        // Status low 5 bits also come from the bus latch
        ppu.write(0x2001, 0x1F);
        assert_eq!(ppu.read(0x2002) & 0x1F, 0x1F);
    }

    #[test]
    fn register_window_mirrors_every_8_bytes() {
        let mut f = Fixture::new();
        ppu!(f, bus, ppu);

        ppu.status |= STATUS_VBLANK;
        // $3FFA & 7 == 2 -> PPUSTATUS
        let status = ppu.read(0x3FFA);
        assert_ne!(status & STATUS_VBLANK, 0);
        assert_eq!(ppu.status & STATUS_VBLANK, 0);
    }

    #[test]
    fn address_port_then_data_port_round_trip() {
        let mut f = Fixture::new();
        ppu!(f, bus, ppu);

        // Write a byte at $2345 through the data port
        ppu.write(0x2006, 0x23);
        ppu.write(0x2006, 0x45);
        ppu.write(0x2007, 0x99);

        // Re-point and read it back directly
        ppu.write(0x2006, 0x23);
        ppu.write(0x2006, 0x45);
        assert_eq!(ppu.read(0x2007), 0x99);
        // Increment step +1
        assert_eq!(ppu.v, 0x2346);
    }

    #[test]
    fn data_port_increments_by_32() {
        let mut f = Fixture::new();
        ppu!(f, bus, ppu);

        ppu.write(0x2000, 0x04); // Increment = 32
        ppu.write(0x2006, 0x20);
        ppu.write(0x2006, 0x00);
        ppu.read(0x2007);
        assert_eq!(ppu.v, 0x2020);
    }

    #[test]
    fn oam_data_port_increments_on_write_only() {
        let mut f = Fixture::new();
        ppu!(f, bus, ppu);

        ppu.write(0x2003, 0x10);
        ppu.write(0x2004, 0xAA);
        ppu.write(0x2004, 0xBB);
        assert_eq!(ppu.oam_addr, 0x12);

        ppu.write(0x2003, 0x10);
        assert_eq!(ppu.read(0x2004), 0xAA);
        // Read did not advance the address
        assert_eq!(ppu.read(0x2004), 0xAA);
    }

    #[test]
    fn oam_dma_copies_a_full_page() {
        let mut f = Fixture::new();
        let mut data = [0u8; 256];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = i as u8;
        }
        f.dma = FixedDma::new(data);
        ppu!(f, bus, ppu);

        ppu.write(0x2003, 0x04); // DMA lands starting at OAMADDR
        ppu.write(OAM_DMA_PORT, 0x02);

        ppu.write(0x2003, 0x04);
        assert_eq!(ppu.read(0x2004), 0x00);
        ppu.write(0x2003, 0x05);
        assert_eq!(ppu.read(0x2004), 0x01);
        // Wraps around the 256-byte OAM
        ppu.write(0x2003, 0x03);
        assert_eq!(ppu.read(0x2004), 0xFF);

        drop(ppu);
        drop(bus);
        assert_eq!(f.dma.page, 0x02);
    }

    #[test]
    fn vblank_transitions_once_per_frame() {
        let mut f = Fixture::new();
        ppu!(f, bus, ppu);

        // Consume the initial pre-render line so the observed window is
        // exactly scanlines 0-261 of one frame.
        for _ in 0..341 {
            ppu.tick();
        }

        let mut rises = Vec::new();
        let mut falls = Vec::new();
        for _ in 0..341 * 262 {
            let before = ppu.status & STATUS_VBLANK != 0;
            let at = (ppu.scanline(), ppu.dot());
            ppu.tick();
            let after = ppu.status & STATUS_VBLANK != 0;
            if !before && after {
                rises.push(at);
            }
            if before && !after {
                falls.push(at);
            }
        }

        assert_eq!(rises, vec![(241, 1)]);
        assert_eq!(falls, vec![(261, 1)]);
        assert_eq!(ppu.frame_count(), 2);
    }

    #[test]
    fn nmi_signalled_when_enabled() {
        let mut f = Fixture::new();
        {
            ppu!(f, bus, ppu);
            ppu.write(0x2000, 0x80); // NMI enable
            // From power-on at (261,0), 342 lines of ticks end at
            // (241,0) — two dots short of the vblank-set point.
            for _ in 0..341 * 242 {
                ppu.tick();
            }
            assert_eq!((ppu.scanline(), ppu.dot()), (241, 0));
            assert_eq!(ppu.status & STATUS_VBLANK, 0);

            ppu.tick();
            ppu.tick();
            assert_ne!(ppu.status & STATUS_VBLANK, 0);
        }
        assert!(f.interrupts.pending(Interrupt::Nmi));
    }

    #[test]
    fn no_nmi_when_disabled() {
        let mut f = Fixture::new();
        {
            ppu!(f, bus, ppu);
            for _ in 0..341 * 242 + 2 {
                ppu.tick();
            }
            assert_ne!(ppu.status & STATUS_VBLANK, 0);
        }
        assert!(!f.interrupts.pending(Interrupt::Nmi));
    }

    #[test]
    fn enabling_nmi_during_vblank_signals_immediately() {
        let mut f = Fixture::new();
        {
            ppu!(f, bus, ppu);
            for _ in 0..341 * 242 + 2 {
                ppu.tick();
            }
            assert_ne!(ppu.status & STATUS_VBLANK, 0);
            ppu.write(0x2000, 0x80);
        }
        assert!(f.interrupts.pending(Interrupt::Nmi));
    }

    #[test]
    fn odd_frame_skips_one_dot() {
        let mut f = Fixture::new();
        ppu!(f, bus, ppu);
        ppu.write(0x2001, 0x08); // Background on

        ppu.scanline = 261;
        ppu.dot = 339;
        ppu.frame_odd = true;
        ppu.tick();
        assert_eq!((ppu.scanline(), ppu.dot()), (0, 0));

        // Even frames keep dot 340
        ppu.scanline = 261;
        ppu.dot = 339;
        ppu.frame_odd = false;
        ppu.tick();
        assert_eq!((ppu.scanline(), ppu.dot()), (261, 340));
    }

    #[test]
    fn ninth_sprite_sets_overflow() {
        let mut f = Fixture::new();
        for i in 0..9u16 {
            f.oam.write(i * 4, 50); // Nine sprites on scanline 50
        }
        for i in 9..64u16 {
            f.oam.write(i * 4, 200);
        }
        ppu!(f, bus, ppu);

        ppu.scanline = 50;
        ppu.evaluate_sprites();
        assert_eq!(ppu.sprite_count, 8);
        assert_ne!(ppu.status & STATUS_OVERFLOW, 0);
    }

    #[test]
    fn eight_sprites_do_not_overflow() {
        let mut f = Fixture::new();
        for i in 0..8u16 {
            f.oam.write(i * 4, 50);
        }
        for i in 8..64u16 {
            f.oam.write(i * 4, 200);
        }
        ppu!(f, bus, ppu);

        ppu.scanline = 50;
        ppu.evaluate_sprites();
        assert_eq!(ppu.sprite_count, 8);
        assert_eq!(ppu.status & STATUS_OVERFLOW, 0);
    }

    #[test]
    fn sprite_zero_hit_on_opaque_overlap() {
        let mut f = Fixture::new();
        // Tile 0 fully opaque: low plane all ones
        for row in 0..8u16 {
            f.chr.write(row, 0xFF);
        }
        // Sprite 0 at (20, 10), tile 0
        f.oam.write(0, 10); // Y (appears from line 11)
        f.oam.write(1, 0); // tile
        f.oam.write(2, 0); // attributes
        f.oam.write(3, 20); // X
        for i in 1..64u16 {
            f.oam.write(i * 4, 200);
        }
        ppu!(f, bus, ppu);

        // Background and sprites on; nametable all zero -> tile 0 everywhere
        ppu.write(0x2001, 0x18);
        for _ in 0..341 * 20 {
            ppu.tick();
        }
        assert_ne!(ppu.status & STATUS_SPRITE_ZERO_HIT, 0);
    }

    #[test]
    fn no_sprite_zero_hit_on_transparent_background() {
        let mut f = Fixture::new();
        // Sprite tile 1 opaque, background tile 0 left transparent
        for row in 0..8u16 {
            f.chr.write(16 + row, 0xFF);
        }
        f.oam.write(0, 10);
        f.oam.write(1, 1);
        f.oam.write(2, 0);
        f.oam.write(3, 20);
        for i in 1..64u16 {
            f.oam.write(i * 4, 200);
        }
        ppu!(f, bus, ppu);

        ppu.write(0x2001, 0x18);
        for _ in 0..341 * 20 {
            ppu.tick();
        }
        assert_eq!(ppu.status & STATUS_SPRITE_ZERO_HIT, 0);
    }

    #[test]
    fn reset_preserves_status_and_vram_address() {
        let mut f = Fixture::new();
        ppu!(f, bus, ppu);

        ppu.status |= STATUS_VBLANK;
        ppu.write(0x2006, 0x21);
        ppu.write(0x2006, 0x08);
        ppu.write(0x2000, 0x84);
        ppu.write(0x2001, 0x1E);

        ppu.reset();
        assert_eq!(ppu.ctrl, 0);
        assert_eq!(ppu.mask, 0);
        assert!(!ppu.w);
        assert_eq!(ppu.t, 0);
        // Survivors
        assert_ne!(ppu.status & STATUS_VBLANK, 0);
        assert_eq!(ppu.v, 0x2108);
    }

    #[test]
    fn flip_byte_works() {
        assert_eq!(flip_byte(0b1000_0000), 0b0000_0001);
        assert_eq!(flip_byte(0b1010_0101), 0b1010_0101);
        assert_eq!(flip_byte(0xFF), 0xFF);
        assert_eq!(flip_byte(0x00), 0x00);
    }

    #[test]
    fn greyscale_masks_palette_column() {
        let mut f = Fixture::new();
        ppu!(f, bus, ppu);

        // Greyscale off: palette index 0x15 maps to PALETTE[0x15]
        ppu.mask = 0x00;
        assert_eq!(ppu.apply_mask_effects(0x15), PALETTE[0x15]);

        // Greyscale on: palette index 0x15 -> 0x15 & 0x30 = 0x10
        ppu.mask = 0x01;
        assert_eq!(ppu.apply_mask_effects(0x15), PALETTE[0x10]);
    }

    #[test]
    fn emphasis_red_dims_green_and_blue() {
        let mut f = Fixture::new();
        ppu!(f, bus, ppu);

        // Emphasis red = PPUMASK bit 5
        ppu.mask = 0x20;
        let argb = ppu.apply_mask_effects(0x20);

        let base = PALETTE[0x20];
        let base_r = (base >> 16) & 0xFF;
        let base_g = (base >> 8) & 0xFF;
        let base_b = base & 0xFF;

        // Red unchanged, green and blue attenuated
        assert_eq!((argb >> 16) & 0xFF, base_r);
        assert_eq!((argb >> 8) & 0xFF, base_g * 13 / 16);
        assert_eq!(argb & 0xFF, base_b * 13 / 16);
    }

    #[test]
    fn no_emphasis_returns_raw_palette() {
        let mut f = Fixture::new();
        ppu!(f, bus, ppu);

        ppu.mask = 0x00;
        for idx in 0..64u8 {
            assert_eq!(ppu.apply_mask_effects(idx), PALETTE[idx as usize]);
        }
    }
}
