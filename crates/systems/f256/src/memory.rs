//! Physical memory arena
//!
//! One flat byte array holds every banked RAM page plus the flash/ROM area.
//! The MMU and the DMA engine both index it through explicit offsets; every
//! offset is masked to the arena size, so no computed address can fall
//! outside it.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Physical memory size (1 MiB)
pub const MEMORY_SIZE: usize = 0x10_0000;

/// Mask applied to every physical offset
pub const MEMORY_MASK: usize = MEMORY_SIZE - 1;

/// CPU writes at or above this physical offset are dropped (flash area)
pub const WRITE_CEILING: usize = 0x8_0000;

/// Start of the region filled with noise at power-on
pub const NOISE_START: usize = 0x1_0000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalMemory {
    bytes: Vec<u8>,
}

impl Default for PhysicalMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicalMemory {
    pub fn new() -> Self {
        Self {
            bytes: vec![0; MEMORY_SIZE],
        }
    }

    /// Read a byte; the offset wraps to the arena size
    #[inline]
    pub fn read(&self, offset: usize) -> u8 {
        self.bytes[offset & MEMORY_MASK]
    }

    /// Write a byte; the offset wraps to the arena size
    #[inline]
    pub fn write(&mut self, offset: usize, val: u8) {
        self.bytes[offset & MEMORY_MASK] = val;
    }

    /// Copy a block in, dropping whatever would land past the end.
    /// Returns the number of bytes stored.
    pub fn load(&mut self, offset: usize, data: &[u8]) -> usize {
        if offset >= MEMORY_SIZE {
            return 0;
        }
        let count = data.len().min(MEMORY_SIZE - offset);
        self.bytes[offset..offset + count].copy_from_slice(&data[..count]);
        count
    }

    /// Power-on contents: low 64K cleared, everything above it noise
    pub fn power_on<R: Rng>(&mut self, rng: &mut R) {
        self.bytes[..NOISE_START].fill(0);
        rng.fill(&mut self.bytes[NOISE_START..]);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}
