//! DMA engine
//!
//! Fill and copy transfers straight against physical memory, either linear
//! (1D) or rectangular with independent source/target strides (2D). A
//! transfer is armed by writing the control register with bit 7 set and runs
//! to completion inside that write. It costs no CPU cycles.
//!
//! Control block, I/O page 0:
//!
//! ```text
//! $DF00        control: bit 1 2D, bit 2 fill, bit 7 start
//! $DF01        fill byte; cleared when the transfer completes
//! $DF04-$DF06  source address
//! $DF08-$DF0A  target address
//! $DF0C-$DF0E  count (1D)
//! $DF0C-$DF0D  width (2D)
//! $DF0E-$DF0F  height (2D)
//! $DF10-$DF11  source stride (2D)
//! $DF12-$DF13  target stride (2D)
//! ```
//!
//! Every address the engine computes is masked to 18 bits on its own, so a
//! transfer running off the end wraps instead of faulting.

use crate::io::IoRegisters;
use crate::memory::PhysicalMemory;
use emu_core::logging::{log, LogCategory, LogLevel};

pub const DMA_CTRL: u16 = 0xDF00;
pub const DMA_FILL: u16 = 0xDF01;
pub const DMA_SOURCE: u16 = 0xDF04;
pub const DMA_TARGET: u16 = 0xDF08;
pub const DMA_COUNT: u16 = 0xDF0C;
pub const DMA_WIDTH: u16 = 0xDF0C;
pub const DMA_HEIGHT: u16 = 0xDF0E;
pub const DMA_STRIDE_SOURCE: u16 = 0xDF10;
pub const DMA_STRIDE_TARGET: u16 = 0xDF12;

pub const CTRL_2D: u8 = 0x02;
pub const CTRL_FILL: u8 = 0x04;
pub const CTRL_START: u8 = 0x80;

/// Reach of the engine's address lines (256 KiB)
pub const DMA_ADDRESS_MASK: usize = 0x3_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Linear {
        count: u32,
    },
    Rect {
        width: u16,
        height: u16,
        source_stride: u16,
        target_stride: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaRequest {
    /// Byte written for every source read, if filling
    pub fill: Option<u8>,
    pub source: usize,
    pub target: usize,
    pub shape: Shape,
}

impl DmaRequest {
    /// Decode the control block. `ctrl` is the value being written to
    /// `$DF00`; the rest comes from the stored registers.
    pub fn decode(ctrl: u8, io: &IoRegisters) -> Self {
        let fill = if ctrl & CTRL_FILL != 0 {
            Some(io.reg(DMA_FILL))
        } else {
            None
        };
        let shape = if ctrl & CTRL_2D != 0 {
            Shape::Rect {
                width: io.reg_le(DMA_WIDTH, 2) as u16,
                height: io.reg_le(DMA_HEIGHT, 2) as u16,
                source_stride: io.reg_le(DMA_STRIDE_SOURCE, 2) as u16,
                target_stride: io.reg_le(DMA_STRIDE_TARGET, 2) as u16,
            }
        } else {
            Shape::Linear {
                count: io.reg_le(DMA_COUNT, 3),
            }
        };
        Self {
            fill,
            source: io.reg_le(DMA_SOURCE, 3) as usize & DMA_ADDRESS_MASK,
            target: io.reg_le(DMA_TARGET, 3) as usize & DMA_ADDRESS_MASK,
            shape,
        }
    }

    /// Bytes the transfer writes
    pub fn len(&self) -> usize {
        match self.shape {
            Shape::Linear { count } => count as usize,
            Shape::Rect { width, height, .. } => width as usize * height as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run a transfer to completion
pub fn execute(request: &DmaRequest, memory: &mut PhysicalMemory) {
    log(LogCategory::Dma, LogLevel::Debug, || {
        format!(
            "DMA: {} {:?} {:05X} -> {:05X}",
            if request.fill.is_some() { "fill" } else { "copy" },
            request.shape,
            request.source,
            request.target
        )
    });

    let source_byte = |memory: &PhysicalMemory, offset: usize| match request.fill {
        Some(value) => value,
        None => memory.read(offset & DMA_ADDRESS_MASK),
    };

    match request.shape {
        Shape::Linear { count } => {
            for i in 0..count as usize {
                let byte = source_byte(&*memory, request.source + i);
                memory.write((request.target + i) & DMA_ADDRESS_MASK, byte);
            }
        }
        Shape::Rect {
            width,
            height,
            source_stride,
            target_stride,
        } => {
            for w in 0..width as usize {
                for h in 0..height as usize {
                    let source = request.source + w + h * source_stride as usize;
                    let byte = source_byte(&*memory, source);
                    let target = request.target + w + h * target_stride as usize;
                    memory.write(target & DMA_ADDRESS_MASK, byte);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_le(io: &mut IoRegisters, addr: u16, value: u32, width: u16) {
        for i in 0..width {
            io.set_reg(addr + i, (value >> (8 * i)) as u8);
        }
    }

    #[test]
    fn test_decode_linear_fill() {
        let mut io = IoRegisters::new();
        io.set_reg(DMA_FILL, 0xAA);
        set_le(&mut io, DMA_TARGET, 0x1000, 3);
        set_le(&mut io, DMA_COUNT, 4, 3);

        let req = DmaRequest::decode(CTRL_START | CTRL_FILL, &io);
        assert_eq!(req.fill, Some(0xAA));
        assert_eq!(req.target, 0x1000);
        assert_eq!(req.shape, Shape::Linear { count: 4 });
        assert_eq!(req.len(), 4);
    }

    #[test]
    fn test_decode_masks_addresses() {
        let mut io = IoRegisters::new();
        set_le(&mut io, DMA_SOURCE, 0xFF_FFFF, 3);
        set_le(&mut io, DMA_TARGET, 0x04_0010, 3);
        let req = DmaRequest::decode(CTRL_START, &io);
        assert_eq!(req.source, DMA_ADDRESS_MASK);
        assert_eq!(req.target, 0x10);
        assert_eq!(req.fill, None);
    }

    #[test]
    fn test_linear_fill() {
        let mut mem = PhysicalMemory::new();
        let req = DmaRequest {
            fill: Some(0xAA),
            source: 0,
            target: 0x1000,
            shape: Shape::Linear { count: 4 },
        };
        execute(&req, &mut mem);
        assert_eq!(&mem.as_slice()[0x1000..0x1004], &[0xAA; 4]);
        assert_eq!(mem.read(0x0FFF), 0);
        assert_eq!(mem.read(0x1004), 0);
    }

    #[test]
    fn test_linear_copy_wraps_both_addresses() {
        let mut mem = PhysicalMemory::new();
        mem.write(DMA_ADDRESS_MASK, 0x11);
        mem.write(0, 0x22);
        let req = DmaRequest {
            fill: None,
            source: DMA_ADDRESS_MASK,
            target: DMA_ADDRESS_MASK - 1,
            shape: Shape::Linear { count: 2 },
        };
        execute(&req, &mut mem);
        assert_eq!(mem.read(DMA_ADDRESS_MASK - 1), 0x11);
        assert_eq!(mem.read(DMA_ADDRESS_MASK), 0x22);
    }

    #[test]
    fn test_rect_copy() {
        let mut mem = PhysicalMemory::new();
        // 2x2 block in a 4-byte-wide source
        mem.load(0x2000, &[1, 2, 9, 9, 3, 4, 9, 9]);
        let req = DmaRequest {
            fill: None,
            source: 0x2000,
            target: 0x3000,
            shape: Shape::Rect {
                width: 2,
                height: 2,
                source_stride: 4,
                target_stride: 4,
            },
        };
        execute(&req, &mut mem);
        assert_eq!(&mem.as_slice()[0x3000..0x3008], &[1, 2, 0, 0, 3, 4, 0, 0]);
    }

    #[test]
    fn test_rect_fill_with_distinct_strides() {
        let mut mem = PhysicalMemory::new();
        let req = DmaRequest {
            fill: Some(0x7E),
            source: 0,
            target: 0x100,
            shape: Shape::Rect {
                width: 3,
                height: 2,
                source_stride: 0,
                target_stride: 8,
            },
        };
        execute(&req, &mut mem);
        assert_eq!(&mem.as_slice()[0x100..0x104], &[0x7E, 0x7E, 0x7E, 0]);
        assert_eq!(&mem.as_slice()[0x108..0x10C], &[0x7E, 0x7E, 0x7E, 0]);
        assert_eq!(req.len(), 6);
    }

    #[test]
    fn test_empty_transfer_touches_nothing() {
        let mut mem = PhysicalMemory::new();
        let req = DmaRequest {
            fill: Some(0xFF),
            source: 0,
            target: 0,
            shape: Shape::Linear { count: 0 },
        };
        assert!(req.is_empty());
        execute(&req, &mut mem);
        assert!(mem.as_slice().iter().all(|&b| b == 0));
    }
}
