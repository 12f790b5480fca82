use crate::bus::{Bus, BusError};
use crate::cpu::Cpu;
use crate::ppu::Ppu;

/// The assembled machine: bus, CPU and PPU wired together.
///
/// Construction registers the core's own bus providers (IF/IE latches,
/// PPU registers, VRAM). Everything else on the memory map (cartridge,
/// work RAM, high RAM) is the front-end's to register.
pub struct GameBoy {
    pub bus: Bus,
    pub cpu: Cpu,
    pub ppu: Ppu,
}

impl GameBoy {
    pub fn new() -> Self {
        let mut bus = Bus::new();
        let cpu = Cpu::new();
        let ppu = Ppu::new();

        bus.register_provider(cpu.interrupts());
        bus.register_provider(ppu.registers());
        bus.register_provider(ppu.vram());

        Self { bus, cpu, ppu }
    }

    /// Advance the whole machine by one dot, in the normative order:
    /// interrupt controller (inside the CPU tick), CPU, then PPU. The
    /// CPU therefore sees bus state from previous dots, never the PPU's
    /// current-dot work.
    pub fn tick(&mut self) -> Result<(), BusError> {
        self.cpu.tick(&mut self.bus)?;
        self.ppu.tick(&mut self.bus);
        Ok(())
    }

    /// Run the machine for `dots` dots.
    pub fn run_dots(&mut self, dots: u64) -> Result<(), BusError> {
        for _ in 0..dots {
            self.tick()?;
        }
        Ok(())
    }

    /// Advance to the end of the current CPU instruction, keeping the
    /// PPU in lockstep.
    pub fn step(&mut self) -> Result<(), BusError> {
        loop {
            self.tick()?;
            if self.cpu.cycles_remaining() == 0 {
                return Ok(());
            }
        }
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}
