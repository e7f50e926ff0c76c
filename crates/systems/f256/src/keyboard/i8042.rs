//! 8042-style keyboard controller
//!
//! Registers:
//! - `$D640` data: reads return the last delivered code and clear OBF;
//!   writes go to the keyboard itself
//! - `$D644` status on read (bit 1 IBF, bit 0 OBF), command on write
//!
//! The keyboard and controller replies to the handful of commands kernels
//! send during initialization are synthesized and queued like key events.

use super::{EventQueue, KeyboardController};
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

pub const DATA: u16 = 0xD640;
pub const STATUS: u16 = 0xD644;

const STATUS_IBF: u8 = 0x02;
const STATUS_OBF: u8 = 0x01;

// Keyboard commands (written to the data port)
const KBD_RESET: u8 = 0xFF;
const KBD_ENABLE: u8 = 0xF4;
const KBD_ACK: u8 = 0xFA;
const KBD_RESET_OK: u8 = 0x00;

// Controller commands (written to the command port)
const CMD_SELF_TEST: u8 = 0xAA;
const CMD_PORT_TEST: u8 = 0xAB;
const CMD_WRITE_CONFIG: u8 = 0x60;
const CMD_ENABLE: u8 = 0xF4;
const SELF_TEST_OK: u8 = 0x55;
const PORT_TEST_OK: u8 = 0x00;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct I8042 {
    queue: EventQueue,
    /// Last byte written by the CPU to the data port
    input_buffer: u8,
    /// Code waiting for the CPU at the data port
    output_buffer: u8,
    /// Never set: writes complete instantly
    ibf: bool,
    obf: bool,
    last_command: u8,
}

impl I8042 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output buffer full: a delivered code has not been read yet
    pub fn output_full(&self) -> bool {
        self.obf
    }

    pub fn last_command(&self) -> u8 {
        self.last_command
    }

    fn reply(&mut self, code: u8) {
        log(LogCategory::Keyboard, LogLevel::Debug, || {
            format!("8042: reply {:02X}", code)
        });
        self.queue_event(code);
    }
}

impl KeyboardController for I8042 {
    fn reset(&mut self) {
        *self = Self::new();
    }

    fn queue_event(&mut self, code: u8) {
        self.queue.push(code);
    }

    fn dequeue(&mut self) -> Option<u8> {
        let code = self.queue.pop()?;
        self.output_buffer = code;
        self.obf = true;
        Some(code)
    }

    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            DATA => {
                self.obf = false;
                self.output_buffer
            }
            STATUS => {
                let mut status = 0;
                if self.ibf {
                    status |= STATUS_IBF;
                }
                if self.obf {
                    status |= STATUS_OBF;
                }
                status
            }
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            DATA => {
                self.input_buffer = data;
                match data {
                    KBD_RESET => self.reply(KBD_RESET_OK),
                    KBD_ENABLE => self.reply(KBD_ACK),
                    _ => {}
                }
            }
            STATUS => {
                self.last_command = data;
                match data {
                    CMD_SELF_TEST => self.reply(SELF_TEST_OK),
                    CMD_PORT_TEST => self.reply(PORT_TEST_OK),
                    CMD_ENABLE => self.reply(PORT_TEST_OK),
                    CMD_WRITE_CONFIG => {}
                    _ => {
                        log(LogCategory::Keyboard, LogLevel::Trace, || {
                            format!("8042: ignored command {:02X}", data)
                        });
                    }
                }
            }
            _ => {}
        }
    }

    fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_sets_and_read_clears_obf() {
        let mut kbd = I8042::new();
        kbd.queue_event(0x1C);
        assert_eq!(kbd.read(STATUS), 0);

        assert_eq!(kbd.dequeue(), Some(0x1C));
        assert_eq!(kbd.read(STATUS), STATUS_OBF);
        assert_eq!(kbd.read(DATA), 0x1C);
        assert_eq!(kbd.read(STATUS), 0);
        // The code stays readable
        assert_eq!(kbd.read(DATA), 0x1C);
    }

    #[test]
    fn test_dequeue_empty() {
        let mut kbd = I8042::new();
        assert_eq!(kbd.dequeue(), None);
        assert!(!kbd.output_full());
    }

    #[test]
    fn test_keyboard_command_replies() {
        let mut kbd = I8042::new();
        kbd.write(DATA, KBD_RESET);
        kbd.write(DATA, KBD_ENABLE);
        kbd.write(DATA, 0x12);
        assert_eq!(kbd.queued(), 2);
        assert_eq!(kbd.dequeue(), Some(0x00));
        assert_eq!(kbd.dequeue(), Some(0xFA));
    }

    #[test]
    fn test_controller_command_replies() {
        let mut kbd = I8042::new();
        kbd.write(STATUS, CMD_SELF_TEST);
        kbd.write(STATUS, CMD_PORT_TEST);
        kbd.write(STATUS, CMD_WRITE_CONFIG);
        kbd.write(STATUS, CMD_ENABLE);
        assert_eq!(kbd.queued(), 3);
        assert_eq!(kbd.dequeue(), Some(0x55));
        assert_eq!(kbd.dequeue(), Some(0x00));
        assert_eq!(kbd.dequeue(), Some(0x00));
        assert_eq!(kbd.last_command(), CMD_ENABLE);
    }

    #[test]
    fn test_unmodelled_addresses_read_zero() {
        let mut kbd = I8042::new();
        kbd.queue_event(0x55);
        kbd.dequeue();
        assert_eq!(kbd.read(0xD641), 0);
        assert_eq!(kbd.read(0xD64F), 0);
        assert!(kbd.output_full());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut kbd = I8042::new();
        kbd.queue_event(1);
        kbd.queue_event(2);
        kbd.dequeue();
        kbd.reset();
        assert_eq!(kbd, I8042::new());
    }
}
