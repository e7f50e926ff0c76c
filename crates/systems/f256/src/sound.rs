//! SN76489 register model
//!
//! Only the register file is modelled. Each of the four channel pairs (tone,
//! attenuation) is reduced to one target frequency, which is reported to the
//! audio backend whenever a write changes it.
//!
//! Register writes follow the chip's latch/data protocol:
//! - `1rrr dddd` selects register `rrr` and sets its low nibble
//! - `0-dd dddd` sets bits 4-9 of the selected register
//!
//! The channel number reported is `(register >> 1) ^ 3`, which lines the
//! chip's channel order up with the backend's.

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

/// Clock divided by the tone register gives the frequency in Hz
pub const FREQUENCY_CONSTANT: u32 = 111_563;

pub const CHANNELS: usize = 4;
pub const REGISTERS: usize = CHANNELS * 2;

const ATTENUATION_OFF: u16 = 0x0F;

/// A channel's frequency changed as the result of a register write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneChange {
    pub channel: usize,
    pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sn76489 {
    /// Even entries are tone periods, odd entries attenuations
    registers: [u16; REGISTERS],
    current: usize,
}

impl Default for Sn76489 {
    fn default() -> Self {
        Self::new()
    }
}

impl Sn76489 {
    /// Every channel silent
    pub fn new() -> Self {
        let mut registers = [0; REGISTERS];
        for pair in registers.chunks_mut(2) {
            pair[1] = ATTENUATION_OFF;
        }
        Self {
            registers,
            current: 0,
        }
    }

    /// Silence everything. Returns the zero-frequency notification for each
    /// channel.
    pub fn reset(&mut self) -> [ToneChange; CHANNELS] {
        *self = Self::new();
        std::array::from_fn(|channel| ToneChange {
            channel,
            frequency: 0,
        })
    }

    /// Write one byte to the chip. Returns the change to report, if the write
    /// altered the frequency of the selected channel pair.
    pub fn write(&mut self, data: u8) -> Option<ToneChange> {
        if data & 0x80 != 0 {
            self.current = ((data >> 4) & 0x07) as usize;
        }
        let before = self.pair_frequency(self.current);

        let reg = &mut self.registers[self.current];
        if data & 0x80 != 0 {
            *reg = (*reg & 0xFFF0) | (data & 0x0F) as u16;
        } else {
            *reg = (*reg & 0x000F) | (((data & 0x3F) as u16) << 4);
        }

        let after = self.pair_frequency(self.current);
        if before == after {
            return None;
        }

        let change = ToneChange {
            channel: Self::channel_of(self.current),
            frequency: after,
        };
        log(LogCategory::Sound, LogLevel::Debug, || {
            format!(
                "SN76489: channel {} -> {} Hz",
                change.channel, change.frequency
            )
        });
        Some(change)
    }

    /// Backend channel for a register index
    pub fn channel_of(register: usize) -> usize {
        (register >> 1) ^ 3
    }

    /// Frequency of the pair containing `register`: zero unless the
    /// attenuation is zero and the tone period is set
    fn pair_frequency(&self, register: usize) -> u32 {
        let pair = register & !1;
        let tone = self.registers[pair];
        let attenuation = self.registers[pair + 1];
        if attenuation != 0 || tone == 0 {
            0
        } else {
            FREQUENCY_CONSTANT / tone as u32
        }
    }

    /// Current frequency per backend channel
    pub fn frequencies(&self) -> [u32; CHANNELS] {
        let mut out = [0; CHANNELS];
        for pair in (0..REGISTERS).step_by(2) {
            out[Self::channel_of(pair)] = self.pair_frequency(pair);
        }
        out
    }

    pub fn register(&self, index: usize) -> u16 {
        self.registers[index % REGISTERS]
    }

    pub fn selected(&self) -> usize {
        self.current
    }
}
