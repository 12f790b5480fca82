use crate::bus::{BusProvider, BusSource};

pub const TILE_DATA_START: u16 = 0x8000;
pub const TILE_DATA_END: u16 = 0x97FF;
pub const TILE_MAPS_START: u16 = 0x9800;
pub const TILE_MAPS_END: u16 = 0x9FFF;

/// Signed tile indexing is based at 0x9000.
const SIGNED_TILE_BASE: usize = 0x1000;

const TILE_BYTES: usize = 16;
const TILE_ROW_BYTES: usize = 2;

/// Tile data: three 2-KiB banks of 128 tiles, 16 bytes per 8x8 tile,
/// two bitplanes per row.
pub struct TileData {
    bytes: [u8; 0x1800],
}

impl TileData {
    fn new() -> Self {
        Self { bytes: [0; 0x1800] }
    }

    /// Addressing method 1: unsigned tile number from 0x8000.
    pub fn tile_row_unsigned(&self, tile: u8, row: u8) -> (u8, u8) {
        let base = tile as usize * TILE_BYTES + (row as usize & 7) * TILE_ROW_BYTES;
        (self.bytes[base], self.bytes[base + 1])
    }

    /// Addressing method 2: signed tile number from 0x9000.
    pub fn tile_row_signed(&self, tile: i8, row: u8) -> (u8, u8) {
        let base = (SIGNED_TILE_BASE as isize + tile as isize * TILE_BYTES as isize) as usize
            + (row as usize & 7) * TILE_ROW_BYTES;
        (self.bytes[base], self.bytes[base + 1])
    }
}

/// Tile maps: two 32x32 byte maps of tile numbers.
pub struct TileMaps {
    bytes: [u8; 0x800],
}

impl TileMaps {
    fn new() -> Self {
        Self { bytes: [0; 0x800] }
    }

    /// Tile number at a map-relative offset (0..1024); `high_map`
    /// selects the map at 0x9C00 over the one at 0x9800.
    pub fn tile_number(&self, offset: usize, high_map: bool) -> u8 {
        let base = if high_map { 0x400 } else { 0 };
        self.bytes[base + (offset & 0x3FF)]
    }
}

/// Video RAM: tile data plus tile maps, with the CPU-side access block
/// the PPU asserts while it is drawing.
///
/// While blocked, CPU-sourced reads return 0xFF and CPU-sourced writes
/// are dropped. PPU-sourced access (the fetcher) is never blocked.
pub struct Vram {
    tile_data: TileData,
    tile_maps: TileMaps,
    cpu_blocked: bool,
}

impl Vram {
    pub fn new() -> Self {
        Self {
            tile_data: TileData::new(),
            tile_maps: TileMaps::new(),
            cpu_blocked: false,
        }
    }

    pub fn tile_data(&self) -> &TileData {
        &self.tile_data
    }

    pub fn tile_maps(&self) -> &TileMaps {
        &self.tile_maps
    }

    pub fn set_cpu_blocked(&mut self, blocked: bool) {
        self.cpu_blocked = blocked;
    }

    pub fn cpu_blocked(&self) -> bool {
        self.cpu_blocked
    }
}

impl Default for Vram {
    fn default() -> Self {
        Self::new()
    }
}

impl BusProvider for Vram {
    fn bus_read(&self, addr: u16, source: BusSource) -> Option<u8> {
        match addr {
            TILE_DATA_START..=TILE_DATA_END => {
                if self.cpu_blocked && source == BusSource::Cpu {
                    return Some(0xFF);
                }
                Some(self.tile_data.bytes[(addr - TILE_DATA_START) as usize])
            }
            TILE_MAPS_START..=TILE_MAPS_END => {
                if self.cpu_blocked && source == BusSource::Cpu {
                    return Some(0xFF);
                }
                Some(self.tile_maps.bytes[(addr - TILE_MAPS_START) as usize])
            }
            _ => None,
        }
    }

    fn bus_write(&mut self, addr: u16, val: u8, source: BusSource) -> bool {
        match addr {
            TILE_DATA_START..=TILE_DATA_END => {
                if !(self.cpu_blocked && source == BusSource::Cpu) {
                    self.tile_data.bytes[(addr - TILE_DATA_START) as usize] = val;
                }
                true
            }
            TILE_MAPS_START..=TILE_MAPS_END => {
                if !(self.cpu_blocked && source == BusSource::Cpu) {
                    self.tile_maps.bytes[(addr - TILE_MAPS_START) as usize] = val;
                }
                true
            }
            _ => false,
        }
    }
}
