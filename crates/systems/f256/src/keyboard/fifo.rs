//! FIFO keyboard interface
//!
//! Later boards drop the 8042 handshake. Delivered codes collect in a small
//! FIFO; `$D644` reads 1 while it is empty and `$D642` pops the oldest code.

use super::{EventQueue, KeyboardController};
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DATA: u16 = 0xD642;
pub const STATUS: u16 = 0xD644;

/// Codes the FIFO holds before further deliveries are lost
pub const FIFO_CAPACITY: usize = 8;

const STATUS_EMPTY: u8 = 0x01;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FifoKeyboard {
    queue: EventQueue,
    fifo: VecDeque<u8>,
}

impl FifoKeyboard {
    pub fn new() -> Self {
        Self {
            queue: EventQueue::new(),
            fifo: VecDeque::with_capacity(FIFO_CAPACITY),
        }
    }

    /// Codes delivered but not yet read
    pub fn pending(&self) -> usize {
        self.fifo.len()
    }
}

impl KeyboardController for FifoKeyboard {
    fn reset(&mut self) {
        self.queue.clear();
        self.fifo.clear();
    }

    fn queue_event(&mut self, code: u8) {
        self.queue.push(code);
    }

    fn dequeue(&mut self) -> Option<u8> {
        let code = self.queue.pop()?;
        if self.fifo.len() < FIFO_CAPACITY {
            self.fifo.push_back(code);
        } else {
            log(LogCategory::Keyboard, LogLevel::Debug, || {
                format!("FIFO keyboard: full, lost {:02X}", code)
            });
        }
        Some(code)
    }

    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            STATUS => {
                if self.fifo.is_empty() {
                    STATUS_EMPTY
                } else {
                    0
                }
            }
            DATA => self.fifo.pop_front().unwrap_or(0),
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        log(LogCategory::Keyboard, LogLevel::Trace, || {
            format!("FIFO keyboard: write {:04X}={:02X} ignored", addr, data)
        });
    }

    fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tracks_empty() {
        let mut kbd = FifoKeyboard::new();
        assert_eq!(kbd.read(STATUS), 1);
        kbd.queue_event(0x1C);
        // Queued but not delivered
        assert_eq!(kbd.read(STATUS), 1);
        kbd.dequeue();
        assert_eq!(kbd.read(STATUS), 0);
        assert_eq!(kbd.read(DATA), 0x1C);
        assert_eq!(kbd.read(STATUS), 1);
    }

    #[test]
    fn test_data_pops_in_order() {
        let mut kbd = FifoKeyboard::new();
        for code in [0x1C, 0x32, 0x21] {
            kbd.queue_event(code);
            kbd.dequeue();
        }
        assert_eq!(kbd.read(DATA), 0x1C);
        assert_eq!(kbd.read(DATA), 0x32);
        assert_eq!(kbd.read(DATA), 0x21);
        assert_eq!(kbd.read(DATA), 0);
    }

    #[test]
    fn test_fifo_capacity() {
        let mut kbd = FifoKeyboard::new();
        for code in 1..=10u8 {
            kbd.queue_event(code);
        }
        while kbd.dequeue().is_some() {}
        assert_eq!(kbd.pending(), FIFO_CAPACITY);
        let popped: Vec<u8> = (0..FIFO_CAPACITY).map(|_| kbd.read(DATA)).collect();
        assert_eq!(popped, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_writes_have_no_effect() {
        let mut kbd = FifoKeyboard::new();
        kbd.write(STATUS, 0xAA);
        kbd.write(DATA, 0xFF);
        assert_eq!(kbd.queued(), 0);
        assert_eq!(kbd, FifoKeyboard::new());
    }
}
