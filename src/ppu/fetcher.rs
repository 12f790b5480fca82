use crate::ppu::fifo::{FifoPixel, PixelFifo};
use crate::ppu::regs::PpuRegisters;
use crate::ppu::vram::Vram;

/// Dots a state occupies beyond its execute dot.
const WARM_UP_WAIT: u8 = 5;
const FETCH_TILE_MAP_WAIT: u8 = 1;
const FETCH_TILE_DATA_WAIT: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherState {
    FetchTileMap,
    FetchTileData,
    PushFifo,
}

/// The background tile fetcher: a three-state machine that reads a tile
/// number, then the tile's two bitplanes for the current row, then
/// unloads eight pixels into the FIFO once it drains empty.
///
/// Each scanline starts with a throwaway warm-up before the first
/// [`FetcherState::FetchTileMap`]. The fetcher can be paused (the
/// attachment point for sprite fetches); a paused fetcher ticks without
/// advancing.
pub struct BackgroundFetcher {
    state: FetcherState,
    paused: bool,
    dots_to_wait: u8,
    /// Coarse x position of the next tile to fetch, in tiles.
    fetcher_x: u8,
    scanline_begin_skip: bool,
    tile_number: u8,
    tile_low: u8,
    tile_high: u8,
}

impl BackgroundFetcher {
    pub fn new() -> Self {
        Self {
            state: FetcherState::FetchTileMap,
            paused: false,
            dots_to_wait: 0,
            fetcher_x: 0,
            scanline_begin_skip: true,
            tile_number: 0,
            tile_low: 0,
            tile_high: 0,
        }
    }

    pub fn state(&self) -> FetcherState {
        self.state
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn begin_scanline(&mut self) {
        self.state = FetcherState::FetchTileMap;
        self.dots_to_wait = 0;
        self.fetcher_x = 0;
        self.scanline_begin_skip = true;
    }

    pub fn tick(&mut self, regs: &PpuRegisters, vram: &Vram, fifo: &mut PixelFifo) {
        if self.paused {
            return;
        }
        if self.dots_to_wait > 0 {
            self.dots_to_wait -= 1;
            return;
        }
        self.execute_state(regs, vram, fifo);
    }

    fn execute_state(&mut self, regs: &PpuRegisters, vram: &Vram, fifo: &mut PixelFifo) {
        // The first fetch of a scanline is always wasted.
        if self.scanline_begin_skip {
            self.scanline_begin_skip = false;
            self.dots_to_wait = WARM_UP_WAIT;
            return;
        }

        match self.state {
            FetcherState::FetchTileMap => {
                let x = (regs.scx / 8).wrapping_add(self.fetcher_x) & 0x1F;
                let y = regs.scy.wrapping_add(regs.ly);
                let offset = (32 * (y as usize / 8) + x as usize) & 0x3FF;
                self.tile_number = vram.tile_maps().tile_number(offset, regs.bg_tile_map_area());

                self.state = FetcherState::FetchTileData;
                self.dots_to_wait = FETCH_TILE_MAP_WAIT;
            }

            FetcherState::FetchTileData => {
                // Both bitplane bytes are fetched in this one state.
                let row = regs.scy.wrapping_add(regs.ly) % 8;
                let (low, high) = if regs.bg_and_window_tile_data_area() {
                    vram.tile_data().tile_row_unsigned(self.tile_number, row)
                } else {
                    vram.tile_data().tile_row_signed(self.tile_number as i8, row)
                };
                self.tile_low = low;
                self.tile_high = high;

                self.state = FetcherState::PushFifo;
                self.dots_to_wait = FETCH_TILE_DATA_WAIT;
            }

            FetcherState::PushFifo => {
                if fifo.is_empty() {
                    // Interleave the bitplanes, leftmost pixel first.
                    for i in (0..8).rev() {
                        let low_bit = (self.tile_low >> i) & 0x01;
                        let high_bit = (self.tile_high >> i) & 0x01;
                        fifo.push(FifoPixel::background((high_bit << 1) | low_bit));
                    }

                    self.fetcher_x = self.fetcher_x.wrapping_add(1);
                    self.state = FetcherState::FetchTileMap;
                }
            }
        }
    }
}

impl Default for BackgroundFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusProvider, BusSource};

    fn fetch_one_tile(regs: &PpuRegisters, vram: &Vram) -> Vec<u8> {
        let mut fetcher = BackgroundFetcher::new();
        let mut fifo = PixelFifo::new();
        fetcher.begin_scanline();
        // Warm-up (6) + tile map (2) + tile data (4) + push.
        for _ in 0..13 {
            fetcher.tick(regs, vram, &mut fifo);
        }
        let mut out = Vec::new();
        while let Some(px) = fifo.pop() {
            out.push(px.color_index);
        }
        out
    }

    #[test]
    fn decodes_bitplanes_msb_first() {
        let regs = PpuRegisters::new();
        let mut vram = Vram::new();
        // Tile 0, row 0: low plane 0b1100_0110, high plane 0b0110_0011.
        vram.bus_write(0x8000, 0xC6, BusSource::Cpu);
        vram.bus_write(0x8001, 0x63, BusSource::Cpu);

        assert_eq!(fetch_one_tile(&regs, &vram), vec![1, 3, 2, 0, 0, 1, 3, 2]);
    }

    #[test]
    fn paused_fetcher_makes_no_progress() {
        let regs = PpuRegisters::new();
        let vram = Vram::new();
        let mut fetcher = BackgroundFetcher::new();
        let mut fifo = PixelFifo::new();
        fetcher.begin_scanline();
        fetcher.set_paused(true);
        for _ in 0..64 {
            fetcher.tick(&regs, &vram, &mut fifo);
        }
        assert!(fifo.is_empty());
    }

    #[test]
    fn push_waits_for_empty_fifo() {
        let regs = PpuRegisters::new();
        let vram = Vram::new();
        let mut fetcher = BackgroundFetcher::new();
        let mut fifo = PixelFifo::new();
        fifo.push(FifoPixel::background(2));
        fetcher.begin_scanline();
        for _ in 0..32 {
            fetcher.tick(&regs, &vram, &mut fifo);
        }
        // The stale pixel is still at the head; nothing was pushed.
        assert_eq!(fifo.len(), 1);
        fifo.pop();
        fetcher.tick(&regs, &vram, &mut fifo);
        assert_eq!(fifo.len(), 8);
    }
}
