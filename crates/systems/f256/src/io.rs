//! I/O register space
//!
//! Four pages of device registers sit behind the $C000-$DFFF window. Most
//! addresses are plain storage; the live ones are routed to device models by
//! the bus before (or instead of) touching storage.
//!
//! Live addresses, all on page 0:
//!
//! ```text
//! $D600, $D610   sound chip register write
//! $D640-$D64F    keyboard controller
//! $D658          timer enable (bit 0)
//! $D659-$D65B    timer counter, little-endian
//! $D660          interrupt pending
//! $D66C          interrupt mask
//! $D6A4, $D6A5   pseudo-random source
//! $DC00          joystick input
//! $DF00-$DF13    DMA control block
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

pub const IO_PAGES: usize = 4;
pub const IO_PAGE_SIZE: usize = 0x4000;
const IO_OFFSET_MASK: u16 = 0x3FFF;

pub const SOUND_LEFT: u16 = 0xD600;
pub const SOUND_RIGHT: u16 = 0xD610;
pub const KEYBOARD_RANGE: RangeInclusive<u16> = 0xD640..=0xD64F;
pub const RANDOM_LO: u16 = 0xD6A4;
pub const RANDOM_HI: u16 = 0xD6A5;
pub const JOYSTICK: u16 = 0xDC00;

/// Page holding the character font
pub const FONT_PAGE: u8 = 1;
pub const FONT_BASE: u16 = 0xC000;

/// Raw storage behind the I/O window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoRegisters {
    bytes: Vec<u8>,
}

impl Default for IoRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl IoRegisters {
    pub fn new() -> Self {
        Self {
            bytes: vec![0; IO_PAGES * IO_PAGE_SIZE],
        }
    }

    #[inline]
    fn index(page: u8, addr: u16) -> usize {
        ((page as usize % IO_PAGES) << 14) | (addr & IO_OFFSET_MASK) as usize
    }

    #[inline]
    pub fn read(&self, page: u8, addr: u16) -> u8 {
        self.bytes[Self::index(page, addr)]
    }

    #[inline]
    pub fn write(&mut self, page: u8, addr: u16, val: u8) {
        self.bytes[Self::index(page, addr)] = val;
    }

    /// Page 0 read, where every live register lives
    #[inline]
    pub fn reg(&self, addr: u16) -> u8 {
        self.read(0, addr)
    }

    #[inline]
    pub fn set_reg(&mut self, addr: u16, val: u8) {
        self.write(0, addr, val);
    }

    /// Little-endian value spanning `width` registers on page 0
    pub fn reg_le(&self, addr: u16, width: u16) -> u32 {
        (0..width).rev().fold(0u32, |acc, i| {
            (acc << 8) | self.reg(addr.wrapping_add(i)) as u32
        })
    }

    /// Copy a block into one page, wrapping within the page
    pub fn load(&mut self, page: u8, addr: u16, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            self.write(page, addr.wrapping_add(i as u16), byte);
        }
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }
}

/// Seeded generator behind the random-number registers
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn next_byte(&mut self) -> u8 {
        self.rng.gen()
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new(0)
    }
}
