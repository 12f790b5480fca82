use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

/// Originator of a bus access. Providers may treat the same address
/// differently depending on who is asking (e.g. VRAM blocks the CPU
/// during pixel transfer but never the PPU).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusSource {
    Cpu,
    Ppu,
    Dma,
}

/// The five interrupt request lines, in priority order. Each corresponds
/// 1:1 with a bit of the IF register (gbdev.io/pandocs/Interrupts.html).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptLine {
    VBlank = 0,
    LcdStat = 1,
    Timer = 2,
    Serial = 3,
    Joypad = 4,
}

impl InterruptLine {
    #[inline]
    pub fn mask(self) -> u8 {
        1 << self as u8
    }
}

/// Outcome of a read-override pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOverride {
    /// Not intercepted; continue dispatch.
    Pass,
    /// Intercepted with this value.
    Value(u8),
    /// The provider refuses the access outright.
    Locked,
}

/// Outcome of a write-override pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOverride {
    /// Not intercepted; continue dispatch.
    Pass,
    /// Intercepted; the write is considered done.
    Accept,
    /// The provider refuses the access outright.
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    /// No registered provider accepted the access. Fatal at the core
    /// level; the front-end decides whether to abort or log.
    #[error("no provider handles address {addr:#06X} (write: {write})")]
    NoHandler { addr: u16, write: bool },

    /// An override provider vetoed the access.
    #[error("address {addr:#06X} is locked")]
    LockedAddress { addr: u16 },
}

/// An address-space provider attached to the bus.
///
/// `bus_read`/`bus_write` return whether the provider handled the
/// address; a reading provider that does not handle an address returns
/// `None` and thus cannot clobber the value another provider supplies.
/// The override hooks run before normal dispatch on every access and let
/// a provider intercept or veto addresses it does not normally serve
/// (e.g. OAM while a DMA transfer is in flight).
pub trait BusProvider {
    fn bus_read(&self, addr: u16, source: BusSource) -> Option<u8>;

    fn bus_write(&mut self, addr: u16, val: u8, source: BusSource) -> bool;

    fn bus_read_override(&self, _addr: u16, _source: BusSource) -> ReadOverride {
        ReadOverride::Pass
    }

    fn bus_write_override(&mut self, _addr: u16, _val: u8, _source: BusSource) -> WriteOverride {
        WriteOverride::Pass
    }
}

/// Shared handle to a bus provider. The bus stores one of these per
/// registration; components keep their own clone for direct access.
pub type SharedProvider = Rc<RefCell<dyn BusProvider>>;

/// The memory bus. Dispatches reads and writes to an ordered list of
/// providers (override pass first, then normal pass, first match wins)
/// and carries the five interrupt request lines as level signals.
///
/// The bus performs no caching: every access reaches a provider.
#[derive(Default)]
pub struct Bus {
    providers: Vec<SharedProvider>,
    interrupt_lines: u8,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider to the dispatch list. Dispatch is first-match in
    /// registration order.
    pub fn register_provider(&mut self, provider: SharedProvider) {
        self.providers.push(provider);
    }

    /// Remove a previously registered provider. Identity is by handle,
    /// so the same `Rc` that was registered must be passed back.
    pub fn unregister_provider(&mut self, provider: &SharedProvider) {
        self.providers.retain(|p| !Rc::ptr_eq(p, provider));
    }

    pub fn read(&self, addr: u16, source: BusSource) -> Result<u8, BusError> {
        // Override pass: the first provider that intercepts wins.
        for provider in &self.providers {
            match provider.borrow().bus_read_override(addr, source) {
                ReadOverride::Pass => {}
                ReadOverride::Value(val) => return Ok(val),
                ReadOverride::Locked => return Err(BusError::LockedAddress { addr }),
            }
        }

        for provider in &self.providers {
            if let Some(val) = provider.borrow().bus_read(addr, source) {
                return Ok(val);
            }
        }

        Err(BusError::NoHandler { addr, write: false })
    }

    pub fn write(&mut self, addr: u16, val: u8, source: BusSource) -> Result<(), BusError> {
        for provider in &self.providers {
            match provider.borrow_mut().bus_write_override(addr, val, source) {
                WriteOverride::Pass => {}
                WriteOverride::Accept => return Ok(()),
                WriteOverride::Locked => return Err(BusError::LockedAddress { addr }),
            }
        }

        for provider in &self.providers {
            if provider.borrow_mut().bus_write(addr, val, source) {
                return Ok(());
            }
        }

        Err(BusError::NoHandler { addr, write: true })
    }

    /// Drive an interrupt line. Lines are level signals; setting a line
    /// to the state it already has is a no-op.
    pub fn set_interrupt_line(&mut self, line: InterruptLine, high: bool) {
        if high {
            self.interrupt_lines |= line.mask();
        } else {
            self.interrupt_lines &= !line.mask();
        }
    }

    pub fn interrupt_line(&self, line: InterruptLine) -> bool {
        self.interrupt_lines & line.mask() != 0
    }

    /// All five lines as a bit vector (bit 0 = VBlank .. bit 4 = Joypad).
    pub fn interrupt_lines(&self) -> u8 {
        self.interrupt_lines
    }
}
