//! Interrupt and frame-timer controller
//!
//! Runs once per frame. Sources set bits in the pending register unless the
//! matching mask bit is set; the CPU's IRQ line follows "any bit pending".
//! Clearing pending bits is left to the interrupt handler running on the CPU.

use crate::io::IoRegisters;
use crate::keyboard::{KeyboardController, KeyboardDevice};
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

pub const TIMER_CTRL: u16 = 0xD658;
pub const TIMER_COUNTER: u16 = 0xD659;
pub const TIMER_BYTES: u16 = 3;
pub const INT_PENDING: u16 = 0xD660;
pub const INT_MASK: u16 = 0xD66C;

pub const TIMER_ENABLE: u8 = 0x01;
pub const IRQ_START_OF_FRAME: u8 = 0x01;
pub const IRQ_KEYBOARD: u8 = 0x04;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptController {
    irq_line: bool,
    frames: u64,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// End-of-frame processing. Returns the state of the IRQ line.
    pub fn synchronize(&mut self, io: &mut IoRegisters, keyboard: &mut KeyboardDevice) -> bool {
        self.frames += 1;

        if let Some(code) = keyboard.dequeue() {
            let raised = keyboard.interrupt_enabled(io);
            log(LogCategory::Keyboard, LogLevel::Debug, || {
                format!("Keyboard: delivered {:02X} irq={}", code, raised)
            });
        }

        if io.reg(TIMER_CTRL) & TIMER_ENABLE != 0 {
            Self::tick_timer(io);
        }

        if io.reg(INT_MASK) & IRQ_START_OF_FRAME == 0 {
            io.set_reg(INT_PENDING, io.reg(INT_PENDING) | IRQ_START_OF_FRAME);
        }

        self.irq_line = io.reg(INT_PENDING) != 0;
        if self.irq_line {
            log(LogCategory::Interrupts, LogLevel::Trace, || {
                format!("IRQ: pending={:02X}", io.reg(INT_PENDING))
            });
        }
        self.irq_line
    }

    /// Increment the little-endian counter, carrying upward and wrapping at
    /// its width
    fn tick_timer(io: &mut IoRegisters) {
        for addr in TIMER_COUNTER..TIMER_COUNTER + TIMER_BYTES {
            let value = io.reg(addr).wrapping_add(1);
            io.set_reg(addr, value);
            if value != 0 {
                break;
            }
        }
    }

    /// Current counter value
    pub fn timer(io: &IoRegisters) -> u32 {
        io.reg_le(TIMER_COUNTER, TIMER_BYTES)
    }

    pub fn irq_line(&self) -> bool {
        self.irq_line
    }

    /// Frames synchronized since reset
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyboardKind;

    fn setup() -> (InterruptController, IoRegisters, KeyboardDevice) {
        (
            InterruptController::new(),
            IoRegisters::new(),
            KeyboardDevice::new(KeyboardKind::I8042),
        )
    }

    #[test]
    fn test_start_of_frame_pending_when_unmasked() {
        let (mut irq, mut io, mut kbd) = setup();
        assert!(irq.synchronize(&mut io, &mut kbd));
        assert_eq!(io.reg(INT_PENDING), IRQ_START_OF_FRAME);
        assert_eq!(irq.frames(), 1);
    }

    #[test]
    fn test_all_masked_keeps_line_low() {
        let (mut irq, mut io, mut kbd) = setup();
        io.set_reg(INT_MASK, 0xFF);
        kbd.queue_event(0x1C);
        assert!(!irq.synchronize(&mut io, &mut kbd));
        assert_eq!(io.reg(INT_PENDING), 0);
        assert!(!irq.irq_line());
        // The event was still delivered
        assert_eq!(kbd.queued(), 0);
    }

    #[test]
    fn test_keyboard_event_sets_pending() {
        let (mut irq, mut io, mut kbd) = setup();
        io.set_reg(INT_MASK, IRQ_START_OF_FRAME);
        kbd.queue_event(0x1C);
        assert!(irq.synchronize(&mut io, &mut kbd));
        assert_eq!(io.reg(INT_PENDING), IRQ_KEYBOARD);

        // Nothing queued: pending stays as the handler left it
        io.set_reg(INT_PENDING, 0);
        assert!(!irq.synchronize(&mut io, &mut kbd));
    }

    #[test]
    fn test_pending_bits_accumulate() {
        let (mut irq, mut io, mut kbd) = setup();
        io.set_reg(INT_PENDING, 0x10);
        kbd.queue_event(0x1C);
        irq.synchronize(&mut io, &mut kbd);
        assert_eq!(io.reg(INT_PENDING), 0x10 | IRQ_KEYBOARD | IRQ_START_OF_FRAME);
    }

    #[test]
    fn test_timer_only_runs_when_enabled() {
        let (mut irq, mut io, mut kbd) = setup();
        irq.synchronize(&mut io, &mut kbd);
        assert_eq!(InterruptController::timer(&io), 0);

        io.set_reg(TIMER_CTRL, TIMER_ENABLE);
        irq.synchronize(&mut io, &mut kbd);
        irq.synchronize(&mut io, &mut kbd);
        assert_eq!(InterruptController::timer(&io), 2);
    }

    #[test]
    fn test_timer_carries_and_wraps() {
        let (mut irq, mut io, mut kbd) = setup();
        io.set_reg(TIMER_CTRL, TIMER_ENABLE);
        io.set_reg(TIMER_COUNTER, 0xFF);
        irq.synchronize(&mut io, &mut kbd);
        assert_eq!(InterruptController::timer(&io), 0x100);

        for i in 0..TIMER_BYTES {
            io.set_reg(TIMER_COUNTER + i, 0xFF);
        }
        // Byte above the counter must not be touched by the carry
        io.set_reg(TIMER_COUNTER + TIMER_BYTES, 0x42);
        irq.synchronize(&mut io, &mut kbd);
        assert_eq!(InterruptController::timer(&io), 0);
        assert_eq!(io.reg(TIMER_COUNTER + TIMER_BYTES), 0x42);
    }
}
