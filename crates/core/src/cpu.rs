//! CPU-facing contracts for 6502-family systems.
//!
//! The instruction executor lives outside this workspace. Systems expose their
//! address space through [`Memory6502`], and drive whatever executor they are
//! given through [`Executor6502`].

/// Memory interface seen by a 6502 executor.
///
/// Reads take `&mut self` because memory-mapped device registers are allowed
/// to change state when read (status flags clear, FIFOs pop).
pub trait Memory6502 {
    /// Read a byte from the given CPU address
    fn read(&mut self, addr: u16) -> u8;

    /// Write a byte to the given CPU address
    fn write(&mut self, addr: u16, val: u8);

    /// Read a little-endian 16-bit value
    fn read_u16(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }
}

/// The contract a system needs from an instruction executor.
pub trait Executor6502 {
    /// Reset the executor (typically loads PC from the reset vector)
    fn reset(&mut self, bus: &mut dyn Memory6502);

    /// Current program counter
    fn pc(&self) -> u16;

    /// Execute one instruction, returning the cycles it consumed
    fn step(&mut self, bus: &mut dyn Memory6502) -> u32;

    /// Raise the maskable interrupt line
    fn irq(&mut self, bus: &mut dyn Memory6502);
}

/// Reset vector location
pub const RESET_VECTOR: u16 = 0xFFFC;

/// Executor stand-in that never decodes anything.
///
/// Loads PC from the reset vector and then burns a fixed number of cycles per
/// step, the way a CPU parked in a wait loop would. Used to drive device
/// timing headlessly.
#[derive(Debug, Clone)]
pub struct IdleExecutor {
    pc: u16,
    cycles_per_step: u32,
    irq_count: u64,
}

impl IdleExecutor {
    pub fn new(cycles_per_step: u32) -> Self {
        Self {
            pc: 0,
            cycles_per_step: cycles_per_step.max(1),
            irq_count: 0,
        }
    }

    /// Number of interrupts raised since the last reset
    pub fn irq_count(&self) -> u64 {
        self.irq_count
    }
}

impl Default for IdleExecutor {
    fn default() -> Self {
        // Average 6502 instruction length
        Self::new(4)
    }
}

impl Executor6502 for IdleExecutor {
    fn reset(&mut self, bus: &mut dyn Memory6502) {
        self.pc = bus.read_u16(RESET_VECTOR);
        self.irq_count = 0;
    }

    fn pc(&self) -> u16 {
        self.pc
    }

    fn step(&mut self, _bus: &mut dyn Memory6502) -> u32 {
        self.cycles_per_step
    }

    fn irq(&mut self, _bus: &mut dyn Memory6502) {
        self.irq_count += 1;
    }
}
