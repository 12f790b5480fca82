use std::cell::RefCell;
use std::rc::Rc;

use crate::bus::{Bus, InterruptLine};
use crate::ppu::fetcher::BackgroundFetcher;
use crate::ppu::fifo::PixelFifo;
use crate::ppu::framebuffer::{Framebuffer, ScreenPixel, SCREEN_WIDTH};
use crate::ppu::regs::PpuRegisters;
use crate::ppu::vram::Vram;

pub const DOTS_PER_SCANLINE: u16 = 456;
pub const OAM_SEARCH_DOTS: u16 = 80;
pub const VISIBLE_SCANLINES: u8 = 144;
pub const SCANLINES_PER_FRAME: u8 = 154;

/// Drawing and HBlank together always span 376 dots; the longer the
/// drawing phase ran, the shorter the blanking interval.
const DRAWING_PLUS_HBLANK_DOTS: u16 = 376;

const LAST_SCANLINE: u8 = SCANLINES_PER_FRAME - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpuModeKind {
    OamSearch,
    Drawing,
    HBlank,
    VBlank,
}

impl PpuModeKind {
    /// Mode number as mirrored in STAT bits 0-1.
    pub fn stat_bits(self) -> u8 {
        match self {
            PpuModeKind::HBlank => 0,
            PpuModeKind::VBlank => 1,
            PpuModeKind::OamSearch => 2,
            PpuModeKind::Drawing => 3,
        }
    }
}

/// One phase of the per-scanline schedule.
pub trait PpuMode {
    /// Re-arm the mode for a fresh run.
    fn restart(&mut self);

    /// Advance by one dot.
    fn tick(&mut self);

    /// Whether the mode has consumed its dot budget.
    fn fully_finished(&self) -> bool;
}

/// Mode 2: sprite visibility evaluation. OAM itself is outside the
/// core, so this is purely the 80-dot timing phase.
pub struct OamSearchMode {
    dots: u16,
}

impl OamSearchMode {
    fn new() -> Self {
        Self { dots: 0 }
    }
}

impl PpuMode for OamSearchMode {
    fn restart(&mut self) {
        self.dots = 0;
    }

    fn tick(&mut self) {
        self.dots += 1;
    }

    fn fully_finished(&self) -> bool {
        self.dots >= OAM_SEARCH_DOTS
    }
}

/// Mode 3: pixel transfer. Ticks the fetcher and clocks one pixel per
/// dot out of the FIFO into the framebuffer; finishes when the scanline's
/// 160 pixels have been emitted (172 dots at minimum).
pub struct DrawingMode {
    dots: u16,
    x: u8,
    fetcher: BackgroundFetcher,
    fifo: PixelFifo,
    regs: Rc<RefCell<PpuRegisters>>,
    vram: Rc<RefCell<Vram>>,
    framebuffer: Rc<RefCell<Framebuffer>>,
}

impl DrawingMode {
    fn new(
        regs: Rc<RefCell<PpuRegisters>>,
        vram: Rc<RefCell<Vram>>,
        framebuffer: Rc<RefCell<Framebuffer>>,
    ) -> Self {
        Self {
            dots: 0,
            x: 0,
            fetcher: BackgroundFetcher::new(),
            fifo: PixelFifo::new(),
            regs,
            vram,
            framebuffer,
        }
    }

    /// Dots consumed by the current run.
    pub fn ticks(&self) -> u16 {
        self.dots
    }
}

impl PpuMode for DrawingMode {
    fn restart(&mut self) {
        self.dots = 0;
        self.x = 0;
        self.fifo.clear();
        self.fetcher.begin_scanline();
    }

    fn tick(&mut self) {
        self.dots += 1;

        let regs = self.regs.borrow();
        let vram = self.vram.borrow();
        self.fetcher.tick(&regs, &vram, &mut self.fifo);

        if let Some(pixel) = self.fifo.pop() {
            self.framebuffer.borrow_mut().set_pixel(
                self.x as usize,
                regs.ly as usize,
                ScreenPixel {
                    color_index: pixel.color_index,
                    palette: pixel.palette,
                },
            );
            self.x += 1;
        }
    }

    fn fully_finished(&self) -> bool {
        self.x as usize >= SCREEN_WIDTH
    }
}

/// Mode 0: horizontal blank, padding the scanline out to 456 dots.
pub struct HBlankMode {
    dots: u16,
    budget: u16,
}

impl HBlankMode {
    fn new() -> Self {
        Self {
            dots: 0,
            budget: DRAWING_PLUS_HBLANK_DOTS,
        }
    }

    fn set_blanking_budget(&mut self, budget: u16) {
        self.budget = budget;
    }
}

impl PpuMode for HBlankMode {
    fn restart(&mut self) {
        self.dots = 0;
    }

    fn tick(&mut self) {
        self.dots += 1;
    }

    fn fully_finished(&self) -> bool {
        self.dots >= self.budget
    }
}

/// Mode 1: vertical blank; one full scanline's worth of dots per run,
/// restarted for each of the ten blanked lines.
pub struct VBlankMode {
    dots: u16,
}

impl VBlankMode {
    fn new() -> Self {
        Self { dots: 0 }
    }
}

impl PpuMode for VBlankMode {
    fn restart(&mut self) {
        self.dots = 0;
    }

    fn tick(&mut self) {
        self.dots += 1;
    }

    fn fully_finished(&self) -> bool {
        self.dots >= DOTS_PER_SCANLINE
    }
}

/// The four-phase scheduler driving the screen: OAM search, drawing,
/// horizontal blank per visible line, then ten lines of vertical blank.
///
/// Owns the mode instances and performs the transitions, LY bookkeeping,
/// STAT mirroring and interrupt-line updates.
pub struct ModeManager {
    current: PpuModeKind,
    oam_search: OamSearchMode,
    drawing: DrawingMode,
    hblank: HBlankMode,
    vblank: VBlankMode,
    regs: Rc<RefCell<PpuRegisters>>,
    vram: Rc<RefCell<Vram>>,
    framebuffer: Rc<RefCell<Framebuffer>>,
}

impl ModeManager {
    pub fn new(
        regs: Rc<RefCell<PpuRegisters>>,
        vram: Rc<RefCell<Vram>>,
        framebuffer: Rc<RefCell<Framebuffer>>,
    ) -> Self {
        let mut manager = Self {
            current: PpuModeKind::OamSearch,
            oam_search: OamSearchMode::new(),
            drawing: DrawingMode::new(regs.clone(), vram.clone(), framebuffer.clone()),
            hblank: HBlankMode::new(),
            vblank: VBlankMode::new(),
            regs,
            vram,
            framebuffer,
        };
        manager.current_mode_mut().restart();
        manager.update_stat_mode();
        manager
    }

    pub fn current_mode(&self) -> PpuModeKind {
        self.current
    }

    /// Return to the top of the frame: OAM search at LY 0, VBlank line
    /// low, VRAM unblocked.
    pub fn reset(&mut self, bus: &mut Bus) {
        {
            let mut regs = self.regs.borrow_mut();
            regs.ly = 0;
            regs.update_coincidence_flag();
        }
        bus.set_interrupt_line(InterruptLine::VBlank, false);
        self.vram.borrow_mut().set_cpu_blocked(false);

        self.current = PpuModeKind::OamSearch;
        self.current_mode_mut().restart();
        self.update_stat_mode();
        self.update_stat_interrupt(bus);
    }

    pub fn tick(&mut self, bus: &mut Bus) {
        self.current_mode_mut().tick();

        if self.current_mode_ref().fully_finished() {
            match self.current {
                PpuModeKind::OamSearch => {
                    // The CPU loses VRAM before drawing consumes its
                    // first dot.
                    self.vram.borrow_mut().set_cpu_blocked(true);
                    self.current = PpuModeKind::Drawing;
                }

                PpuModeKind::Drawing => {
                    self.vram.borrow_mut().set_cpu_blocked(false);
                    self.hblank
                        .set_blanking_budget(DRAWING_PLUS_HBLANK_DOTS - self.drawing.ticks());
                    self.current = PpuModeKind::HBlank;
                }

                PpuModeKind::HBlank => {
                    let next_line = {
                        let mut regs = self.regs.borrow_mut();
                        regs.ly += 1;
                        regs.update_coincidence_flag();
                        regs.ly
                    };

                    if next_line < VISIBLE_SCANLINES {
                        self.current = PpuModeKind::OamSearch;
                    } else {
                        // Lines 144 to 153 are the vertical blanking
                        // interval.
                        bus.set_interrupt_line(InterruptLine::VBlank, true);
                        self.framebuffer.borrow_mut().notify_ready();
                        self.current = PpuModeKind::VBlank;
                    }
                }

                PpuModeKind::VBlank => {
                    let mut regs = self.regs.borrow_mut();
                    if regs.ly < LAST_SCANLINE {
                        regs.ly += 1;
                        regs.update_coincidence_flag();
                    } else {
                        // Restart a frame.
                        regs.ly = 0;
                        regs.update_coincidence_flag();
                        drop(regs);
                        bus.set_interrupt_line(InterruptLine::VBlank, false);
                        self.current = PpuModeKind::OamSearch;
                    }
                }
            }

            self.current_mode_mut().restart();
            self.update_stat_mode();
        }

        self.update_stat_interrupt(bus);
    }

    fn current_mode_ref(&self) -> &dyn PpuMode {
        match self.current {
            PpuModeKind::OamSearch => &self.oam_search,
            PpuModeKind::Drawing => &self.drawing,
            PpuModeKind::HBlank => &self.hblank,
            PpuModeKind::VBlank => &self.vblank,
        }
    }

    fn current_mode_mut(&mut self) -> &mut dyn PpuMode {
        match self.current {
            PpuModeKind::OamSearch => &mut self.oam_search,
            PpuModeKind::Drawing => &mut self.drawing,
            PpuModeKind::HBlank => &mut self.hblank,
            PpuModeKind::VBlank => &mut self.vblank,
        }
    }

    fn update_stat_mode(&mut self) {
        self.regs
            .borrow_mut()
            .set_stat_mode(self.current.stat_bits());
    }

    /// The STAT line is the OR of the enabled mode conditions and the
    /// LYC==LY coincidence; recomputed every dot so mode transitions and
    /// LY changes propagate immediately.
    fn update_stat_interrupt(&self, bus: &mut Bus) {
        let regs = self.regs.borrow();
        let high = (regs.mode0_interrupt_source() && self.current == PpuModeKind::HBlank)
            || (regs.mode1_interrupt_source() && self.current == PpuModeKind::VBlank)
            || (regs.mode2_interrupt_source() && self.current == PpuModeKind::OamSearch)
            || regs.lyc_equals_ly();
        drop(regs);
        bus.set_interrupt_line(InterruptLine::LcdStat, high);
    }
}
