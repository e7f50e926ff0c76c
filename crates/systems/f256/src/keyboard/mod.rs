//! PS/2 keyboard controller
//!
//! Key events arrive from the frontend as raw PS/2 codes and wait in a small
//! event queue. Once per frame one event is handed to the controller, which
//! presents it to the CPU through its registers at $D640-$D64F.
//!
//! Two controller personalities exist and are chosen when the machine is
//! built:
//! - [`I8042`]: command/status handshake with input/output buffer flags
//! - [`FifoKeyboard`]: a status bit and a data register popping a small FIFO

mod fifo;
mod i8042;

pub use fifo::{FifoKeyboard, FIFO_CAPACITY};
pub use i8042::I8042;

use crate::config::KeyboardKind;
use crate::interrupts::{INT_MASK, INT_PENDING, IRQ_KEYBOARD};
use crate::io::IoRegisters;
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Pending key events held before delivery
pub const EVENT_QUEUE_CAPACITY: usize = 10;

/// Bounded FIFO of key events. Inserts past capacity are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQueue {
    events: VecDeque<u8>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(EVENT_QUEUE_CAPACITY),
        }
    }

    /// Returns false when the event was dropped
    pub fn push(&mut self, code: u8) -> bool {
        if self.events.len() >= EVENT_QUEUE_CAPACITY {
            log(LogCategory::Keyboard, LogLevel::Debug, || {
                format!("Keyboard: queue full, dropped {:02X}", code)
            });
            return false;
        }
        self.events.push_back(code);
        true
    }

    pub fn pop(&mut self) -> Option<u8> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// The register-level contract every keyboard personality provides
pub trait KeyboardController {
    /// Empty the event queue and the controller's own buffers
    fn reset(&mut self);

    /// Accept a key event from outside (dropped when the queue is full)
    fn queue_event(&mut self, code: u8);

    /// Move the oldest queued event into the controller.
    /// Called once per frame.
    fn dequeue(&mut self) -> Option<u8>;

    /// Register read; may change controller state
    fn read(&mut self, addr: u16) -> u8;

    /// Register write
    fn write(&mut self, addr: u16, data: u8);

    /// Events still waiting in the queue
    fn queued(&self) -> usize;

    /// Whether a keyboard interrupt may be raised. When the keyboard source
    /// is unmasked this also marks it pending.
    fn interrupt_enabled(&self, io: &mut IoRegisters) -> bool {
        if io.reg(INT_MASK) & IRQ_KEYBOARD != 0 {
            return false;
        }
        io.set_reg(INT_PENDING, io.reg(INT_PENDING) | IRQ_KEYBOARD);
        true
    }
}

/// The controller fitted to a machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyboardDevice {
    I8042(I8042),
    Fifo(FifoKeyboard),
}

impl KeyboardDevice {
    pub fn new(kind: KeyboardKind) -> Self {
        match kind {
            KeyboardKind::I8042 => KeyboardDevice::I8042(I8042::new()),
            KeyboardKind::Fifo => KeyboardDevice::Fifo(FifoKeyboard::new()),
        }
    }

    pub fn kind(&self) -> KeyboardKind {
        match self {
            KeyboardDevice::I8042(_) => KeyboardKind::I8042,
            KeyboardDevice::Fifo(_) => KeyboardKind::Fifo,
        }
    }

    fn controller(&self) -> &dyn KeyboardController {
        match self {
            KeyboardDevice::I8042(kbd) => kbd,
            KeyboardDevice::Fifo(kbd) => kbd,
        }
    }

    fn controller_mut(&mut self) -> &mut dyn KeyboardController {
        match self {
            KeyboardDevice::I8042(kbd) => kbd,
            KeyboardDevice::Fifo(kbd) => kbd,
        }
    }
}

impl KeyboardController for KeyboardDevice {
    fn reset(&mut self) {
        self.controller_mut().reset();
    }

    fn queue_event(&mut self, code: u8) {
        self.controller_mut().queue_event(code);
    }

    fn dequeue(&mut self) -> Option<u8> {
        self.controller_mut().dequeue()
    }

    fn read(&mut self, addr: u16) -> u8 {
        self.controller_mut().read(addr)
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.controller_mut().write(addr, data);
    }

    fn queued(&self) -> usize {
        self.controller().queued()
    }

    fn interrupt_enabled(&self, io: &mut IoRegisters) -> bool {
        self.controller().interrupt_enabled(io)
    }
}
