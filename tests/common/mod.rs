#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use dot_emu_core::bus::{Bus, BusSource};
use dot_emu_core::cpu::Cpu;
use dot_emu_core::gameboy::GameBoy;
use dot_emu_core::memory::FlatRam;

/// A CPU over a bus with its interrupt controller and a full 64 KiB of
/// flat RAM. The RAM is registered last, so the IF/IE provider keeps
/// precedence at its own addresses.
pub fn cpu_rig() -> (Cpu, Bus) {
    let mut bus = Bus::new();
    let cpu = Cpu::new();
    bus.register_provider(cpu.interrupts());
    bus.register_provider(Rc::new(RefCell::new(FlatRam::new(0x0000, 0x10000))));
    (cpu, bus)
}

/// A whole machine with flat RAM filling the gaps between the core's
/// own providers.
pub fn machine() -> GameBoy {
    let mut gb = GameBoy::new();
    gb.bus
        .register_provider(Rc::new(RefCell::new(FlatRam::new(0x0000, 0x10000))));
    gb
}

/// Place a program (or any bytes) into the memory map.
pub fn load(bus: &mut Bus, addr: u16, bytes: &[u8]) {
    for (i, &byte) in bytes.iter().enumerate() {
        bus.write(addr.wrapping_add(i as u16), byte, BusSource::Dma)
            .expect("fixture write failed");
    }
}

/// Execute exactly one instruction (the CPU must be at an instruction
/// boundary or mid-instruction; either way one more instruction retires).
pub fn step_instruction(cpu: &mut Cpu, bus: &mut Bus) {
    cpu.step(bus).expect("cpu step failed");
}

/// Advance the CPU by a fixed number of dots.
pub fn run_dots(cpu: &mut Cpu, bus: &mut Bus, dots: u32) {
    for _ in 0..dots {
        cpu.tick(bus).expect("cpu tick failed");
    }
}

/// Place one instruction at PC and retire it.
pub fn exec(cpu: &mut Cpu, bus: &mut Bus, bytes: &[u8]) {
    load(bus, cpu.pc, bytes);
    step_instruction(cpu, bus);
}

/// Place one instruction at PC, execute it, and report its full dot
/// cost. The CPU must be at an instruction boundary; the cost is left
/// uncharged, so follow with `run_dots(cpu, bus, cost - 1)` if the rig
/// keeps ticking afterwards.
pub fn instruction_cost(cpu: &mut Cpu, bus: &mut Bus, bytes: &[u8]) -> u32 {
    assert_eq!(cpu.cycles_remaining(), 0, "not at an instruction boundary");
    load(bus, cpu.pc, bytes);
    cpu.tick(bus).expect("cpu tick failed");
    1 + cpu.cycles_remaining()
}
