//! Memory management unit
//!
//! The 64K CPU space is split into eight 8K windows. Each window is mapped
//! through one entry of the active lookup table (LUT) to an 8K page of
//! physical memory. Four LUTs exist; one is active at a time.
//!
//! CPU map of the reserved low addresses:
//!
//! ```text
//! $0000      MMU_MEM_CTRL  bits 0-1 active LUT, bits 4-5 edit LUT, bit 7 edit enable
//! $0001      MMU_IO_CTRL   bits 0-1 I/O page, bit 2 page C is memory
//! $0008-$000F              entries of the edit LUT (only while edit is enabled)
//! $C000-$DFFF              I/O window (unless page C is memory)
//! ```

use crate::memory::MEMORY_MASK;
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

pub const MEM_CTRL: u16 = 0x0000;
pub const IO_CTRL: u16 = 0x0001;
pub const LUT_EDIT_START: u16 = 0x0008;
pub const LUT_EDIT_END: u16 = 0x000F;
pub const IO_WINDOW_START: u16 = 0xC000;
pub const IO_WINDOW_END: u16 = 0xDFFF;

pub const LUT_COUNT: usize = 4;
pub const WINDOWS: usize = 8;
pub const PAGE_SHIFT: u32 = 13;
pub const PAGE_OFFSET_MASK: u16 = 0x1FFF;

const MEM_CTRL_ACTIVE_MASK: u8 = 0x03;
const MEM_CTRL_EDIT_SHIFT: u8 = 4;
const MEM_CTRL_EDIT_ENABLE: u8 = 0x80;
const IO_CTRL_PAGE_MASK: u8 = 0x03;
const IO_CTRL_PAGE_C_MEMORY: u8 = 0x04;

/// Where a CPU access lands after decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The MMU memory control register
    MemCtrl,
    /// The I/O control register
    IoCtrl,
    /// A mapping entry exposed through the edit overlay
    LutEntry { lut: usize, window: usize },
    /// The I/O register file
    Io { page: u8, addr: u16 },
    /// Ordinary physical memory
    Memory(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mmu {
    luts: [[u8; WINDOWS]; LUT_COUNT],
    mem_ctrl: u8,
    io_ctrl: u8,
    active: usize,
    edit: Option<usize>,
    page_c_memory: bool,
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}

impl Mmu {
    /// Every LUT maps window N to physical page N
    pub fn new() -> Self {
        let identity: [u8; WINDOWS] = std::array::from_fn(|i| i as u8);
        Self {
            luts: [identity; LUT_COUNT],
            mem_ctrl: 0,
            io_ctrl: 0,
            active: 0,
            edit: None,
            page_c_memory: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Decode a CPU address into the thing it accesses
    pub fn decode(&self, addr: u16) -> Target {
        if addr < 0x10 {
            if let Some(lut) = self.edit {
                if (LUT_EDIT_START..=LUT_EDIT_END).contains(&addr) {
                    return Target::LutEntry {
                        lut,
                        window: (addr - LUT_EDIT_START) as usize,
                    };
                }
            }
            match addr {
                MEM_CTRL => return Target::MemCtrl,
                IO_CTRL => return Target::IoCtrl,
                _ => {}
            }
        }

        if !self.page_c_memory && (IO_WINDOW_START..=IO_WINDOW_END).contains(&addr) {
            return Target::Io {
                page: self.io_page(),
                addr,
            };
        }

        Target::Memory(self.translate(addr))
    }

    /// Physical offset of a CPU address through the active LUT.
    ///
    /// Pure function of the mapping state; ignores the control registers and
    /// the I/O window.
    #[inline]
    pub fn translate(&self, addr: u16) -> usize {
        let page = self.luts[self.active][(addr >> PAGE_SHIFT) as usize] as usize;
        ((page << PAGE_SHIFT) | (addr & PAGE_OFFSET_MASK) as usize) & MEMORY_MASK
    }

    pub fn mem_ctrl(&self) -> u8 {
        self.mem_ctrl
    }

    pub fn io_ctrl(&self) -> u8 {
        self.io_ctrl
    }

    /// Select the active LUT and the edit overlay
    pub fn write_mem_ctrl(&mut self, val: u8) {
        self.mem_ctrl = val;
        self.active = (val & MEM_CTRL_ACTIVE_MASK) as usize;
        self.edit = if val & MEM_CTRL_EDIT_ENABLE != 0 {
            Some(((val >> MEM_CTRL_EDIT_SHIFT) & MEM_CTRL_ACTIVE_MASK) as usize)
        } else {
            None
        };
        log(LogCategory::Mmu, LogLevel::Debug, || {
            format!(
                "MMU: MEM_CTRL={:02X} active LUT {} edit {:?}",
                val, self.active, self.edit
            )
        });
    }

    pub fn write_io_ctrl(&mut self, val: u8) {
        self.io_ctrl = val;
        self.page_c_memory = val & IO_CTRL_PAGE_C_MEMORY != 0;
        log(LogCategory::Mmu, LogLevel::Debug, || {
            if self.page_c_memory {
                format!("MMU: IO_CTRL={:02X} page C is memory", val)
            } else {
                format!("MMU: IO_CTRL={:02X} I/O page {}", val, self.io_page())
            }
        });
    }

    pub fn lut_entry(&self, lut: usize, window: usize) -> u8 {
        self.luts[lut % LUT_COUNT][window % WINDOWS]
    }

    pub fn set_lut_entry(&mut self, lut: usize, window: usize, val: u8) {
        self.luts[lut % LUT_COUNT][window % WINDOWS] = val;
    }

    /// The eight entries of a LUT
    pub fn lut(&self, lut: usize) -> [u8; WINDOWS] {
        self.luts[lut % LUT_COUNT]
    }

    pub fn active_lut(&self) -> usize {
        self.active
    }

    /// LUT exposed at $0008-$000F, if the overlay is on
    pub fn edit_lut(&self) -> Option<usize> {
        self.edit
    }

    pub fn io_page(&self) -> u8 {
        self.io_ctrl & IO_CTRL_PAGE_MASK
    }

    pub fn page_c_is_memory(&self) -> bool {
        self.page_c_memory
    }
}
