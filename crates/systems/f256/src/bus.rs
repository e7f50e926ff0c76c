//! F256 machine context and memory bus
//!
//! [`Machine`] owns every piece of hardware state and is what the
//! instruction executor sees as memory. CPU accesses go through the MMU;
//! those landing in the I/O window are dispatched to the device models.
//!
//! Two CPU addresses are intercepted before translation:
//! - `$FFFA` read returns the next byte of the source stream
//! - `$FFFA` write sets fast mode (non-zero = on), then lands in memory

use crate::config::{KeyboardKind, MachineConfig};
use crate::dma::{self, DmaRequest, CTRL_START, DMA_CTRL, DMA_FILL};
use crate::interrupts::{InterruptController, INT_MASK, INT_PENDING};
use crate::io::{
    IoRegisters, RandomSource, FONT_BASE, FONT_PAGE, JOYSTICK, KEYBOARD_RANGE, RANDOM_HI,
    RANDOM_LO, SOUND_LEFT, SOUND_RIGHT,
};
use crate::keyboard::{KeyboardController, KeyboardDevice};
use crate::loader::{self, LoadError, SourceStream};
use crate::memory::{PhysicalMemory, WRITE_CEILING};
use crate::mmu::{Mmu, Target, WINDOWS};
use crate::sound::{Sn76489, CHANNELS};
use crate::F256Error;
use emu_core::audio::{AudioBackend, SilentAudio};
use emu_core::cpu::{Executor6502, Memory6502};
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::types::FrameOutcome;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source stream read / fast mode write
pub const SOURCE_PORT: u16 = 0xFFFA;
/// Executor PC that stops the machine
pub const HALT_PC: u16 = 0xFFFF;
/// Where the kernel ROM is copied at reset
pub const KERNEL_BASE: u16 = 0xF000;
/// Physical address receiving the load address of the last program
pub const START_ADDRESS: usize = 0xFE;

const STOP_OPCODE: u8 = 0xDB;
const JSR_OPCODE: u8 = 0x20;

pub struct Machine {
    config: MachineConfig,
    memory: PhysicalMemory,
    mmu: Mmu,
    io: IoRegisters,
    keyboard: KeyboardDevice,
    sound: Sn76489,
    interrupts: InterruptController,
    random: RandomSource,
    source: SourceStream,
    font: Option<Vec<u8>>,
    kernel: Option<Vec<u8>>,
    /// Program images replayed into memory on every reset
    programs: Vec<(usize, Vec<u8>)>,
    audio: Box<dyn AudioBackend>,
    joystick: u8,
    fast_mode: bool,
    write_protect: bool,
    cycles: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(MachineConfig::default())
    }
}

impl Machine {
    /// Build a machine and put it through reset
    pub fn new(config: MachineConfig) -> Self {
        let mut machine = Self {
            keyboard: KeyboardDevice::new(config.keyboard),
            random: RandomSource::new(config.random_seed),
            config,
            memory: PhysicalMemory::new(),
            mmu: Mmu::new(),
            io: IoRegisters::new(),
            sound: Sn76489::new(),
            interrupts: InterruptController::new(),
            source: SourceStream::default(),
            font: None,
            kernel: None,
            programs: Vec::new(),
            audio: Box::new(SilentAudio),
            joystick: 0,
            fast_mode: false,
            write_protect: false,
            cycles: 0,
        };
        machine.reset();
        machine
    }

    /// Power-on reset. ROM images and registered programs are installed
    /// again.
    pub fn reset(&mut self) {
        self.write_protect = true;

        self.random.reseed(self.config.random_seed);
        self.memory.power_on(self.random.rng_mut());
        self.mmu.reset();
        self.io.clear();
        self.keyboard.reset();
        for change in self.sound.reset() {
            self.audio.set_frequency(change.channel, change.frequency);
        }
        self.interrupts.reset();

        if let Some(font) = &self.font {
            self.io.load(FONT_PAGE, FONT_BASE, font);
        }
        if let Some(kernel) = self.kernel.take() {
            self.copy_rom(KERNEL_BASE, &kernel);
            self.kernel = Some(kernel);
        }
        let programs = std::mem::take(&mut self.programs);
        for (address, data) in &programs {
            self.load_bytes(*address, data);
        }
        self.programs = programs;

        self.source.rewind();
        self.fast_mode = false;
        self.cycles = 0;
        self.write_protect = false;

        log(LogCategory::Cpu, LogLevel::Info, || {
            format!("F256: reset ({:?} keyboard)", self.keyboard.kind())
        });
    }

    /// Store through the MMU without the write-protect gate
    fn store(&mut self, addr: u16, val: u8) {
        match self.mmu.decode(addr) {
            Target::MemCtrl => self.mmu.write_mem_ctrl(val),
            Target::IoCtrl => self.mmu.write_io_ctrl(val),
            Target::LutEntry { lut, window } => self.mmu.set_lut_entry(lut, window, val),
            Target::Io { page, addr } => self.io_write(page, addr, val),
            Target::Memory(offset) => {
                if offset < WRITE_CEILING {
                    self.memory.write(offset, val);
                } else {
                    log(LogCategory::Mmu, LogLevel::Trace, || {
                        format!("MMU: write {:04X} -> {:05X} above ceiling", addr, offset)
                    });
                }
            }
        }
    }

    /// Read from the I/O register space, applying device side effects
    pub fn io_read(&mut self, page: u8, addr: u16) -> u8 {
        if page == 0 {
            match addr {
                a if KEYBOARD_RANGE.contains(&a) => return self.keyboard.read(a),
                RANDOM_LO | RANDOM_HI => return self.random.next_byte(),
                JOYSTICK => return self.joystick,
                _ => {}
            }
        }
        self.io.read(page, addr)
    }

    /// Write to the I/O register space. Device side effects run first; the
    /// byte is always stored afterwards.
    pub fn io_write(&mut self, page: u8, addr: u16, val: u8) {
        log(LogCategory::Io, LogLevel::Trace, || {
            format!("IO: write {}:{:04X}={:02X}", page, addr, val)
        });
        if page == 0 {
            match addr {
                SOUND_LEFT | SOUND_RIGHT => {
                    if let Some(change) = self.sound.write(val) {
                        self.audio.set_frequency(change.channel, change.frequency);
                    }
                }
                a if KEYBOARD_RANGE.contains(&a) => self.keyboard.write(a, val),
                DMA_CTRL if val & CTRL_START != 0 => {
                    let request = DmaRequest::decode(val, &self.io);
                    dma::execute(&request, &mut self.memory);
                    self.io.write(page, addr, val & !CTRL_START);
                    self.io.set_reg(DMA_FILL, 0);
                    return;
                }
                _ => {}
            }
        }
        self.io.write(page, addr, val);
    }

    /// Read a CPU address without side effects
    pub fn peek(&self, addr: u16) -> u8 {
        if addr == SOURCE_PORT {
            return self.source.peek();
        }
        match self.mmu.decode(addr) {
            Target::MemCtrl => self.mmu.mem_ctrl(),
            Target::IoCtrl => self.mmu.io_ctrl(),
            Target::LutEntry { lut, window } => self.mmu.lut_entry(lut, window),
            Target::Io { page, addr } => self.io.read(page, addr),
            Target::Memory(offset) => self.memory.read(offset),
        }
    }

    /// Physical offset of a CPU address through the active LUT
    pub fn translate(&self, addr: u16) -> usize {
        self.mmu.translate(addr)
    }

    /// End-of-frame device update. Returns the IRQ line.
    pub fn synchronize(&mut self) -> bool {
        self.interrupts.synchronize(&mut self.io, &mut self.keyboard)
    }

    /// Account executed cycles. Synchronizes and returns true when the frame
    /// budget is reached.
    pub fn add_cycles(&mut self, cycles: u64) -> bool {
        self.cycles += cycles;
        if self.cycles < self.frame_budget() {
            return false;
        }
        self.cycles = 0;
        self.synchronize();
        true
    }

    pub fn frame_budget(&self) -> u64 {
        self.config.frame_budget(self.fast_mode)
    }

    /// Run the executor until the frame ends, it halts, or it reaches a
    /// breakpoint. A `STP` opcode at the new PC counts as a breakpoint.
    pub fn run_frame(
        &mut self,
        cpu: &mut dyn Executor6502,
        breakpoints: &[u16],
    ) -> FrameOutcome {
        loop {
            if cpu.pc() == HALT_PC {
                log(LogCategory::Cpu, LogLevel::Info, || {
                    "F256: halted".to_string()
                });
                return FrameOutcome::Halted;
            }

            let cycles = cpu.step(self);
            if self.add_cycles(cycles as u64) {
                if self.interrupts.irq_line() {
                    cpu.irq(self);
                }
                return FrameOutcome::Frame;
            }

            let pc = cpu.pc();
            if breakpoints.contains(&pc) || self.peek(pc) == STOP_OPCODE {
                return FrameOutcome::Breakpoint(pc);
            }
        }
    }

    /// Breakpoint that steps over the instruction at `pc`, if it is a
    /// subroutine call
    pub fn step_over_target(&self, pc: u16) -> Option<u16> {
        (self.peek(pc) == JSR_OPCODE).then(|| pc.wrapping_add(3))
    }

    /// Copy a ROM image through the MMU starting at a CPU address. Ignores
    /// write protection. Bytes past `$FFFF` are discarded.
    pub fn copy_rom(&mut self, addr: u16, data: &[u8]) {
        let room = 0x1_0000 - addr as usize;
        if data.len() > room {
            log(LogCategory::Loader, LogLevel::Warn, || {
                format!(
                    "ROM: {} bytes at ${:04X} truncated to {}",
                    data.len(),
                    addr,
                    room
                )
            });
        }
        for (i, &byte) in data.iter().take(room).enumerate() {
            self.store(addr + i as u16, byte);
        }
    }

    /// Write bytes straight into physical memory and record the load address
    /// at `$FE/$FF`. Returns the number of bytes stored.
    pub fn load_bytes(&mut self, address: usize, data: &[u8]) -> usize {
        let stored = self.memory.load(address, data);
        self.memory.write(START_ADDRESS, address as u8);
        self.memory.write(START_ADDRESS + 1, (address >> 8) as u8);
        stored
    }

    /// Register a program image to be loaded on every reset. An image
    /// already registered at the same address is replaced.
    pub fn add_program(&mut self, address: usize, data: Vec<u8>) {
        match self.programs.iter_mut().find(|(a, _)| *a == address) {
            Some(entry) => entry.1 = data,
            None => self.programs.push((address, data)),
        }
    }

    /// Write the whole of physical memory to a file
    pub fn dump_memory(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        loader::write_dump(path.as_ref(), self.memory.as_slice())
    }

    pub fn queue_key_event(&mut self, code: u8) {
        self.keyboard.queue_event(code);
    }

    pub fn set_joystick(&mut self, value: u8) {
        self.joystick = value;
    }

    pub fn set_audio_backend(&mut self, backend: Box<dyn AudioBackend>) {
        self.audio = backend;
        for (channel, hz) in self.sound.frequencies().into_iter().enumerate() {
            self.audio.set_frequency(channel, hz);
        }
    }

    pub fn set_source(&mut self, data: Vec<u8>) {
        self.source = SourceStream::new(data);
    }

    pub fn set_font(&mut self, font: Option<Vec<u8>>) {
        self.font = font;
    }

    pub fn set_kernel(&mut self, kernel: Option<Vec<u8>>) {
        self.kernel = kernel;
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn has_kernel(&self) -> bool {
        self.kernel.is_some()
    }

    pub fn has_source(&self) -> bool {
        !self.source.is_empty()
    }

    pub fn set_write_protect(&mut self, on: bool) {
        self.write_protect = on;
    }

    pub fn write_protected(&self) -> bool {
        self.write_protect
    }

    pub fn set_fast_mode(&mut self, on: bool) {
        if on != self.fast_mode {
            log(LogCategory::Cpu, LogLevel::Debug, || {
                format!("F256: fast mode {}", if on { "on" } else { "off" })
            });
        }
        self.fast_mode = on;
    }

    pub fn fast_mode(&self) -> bool {
        self.fast_mode
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn irq_line(&self) -> bool {
        self.interrupts.irq_line()
    }

    pub fn frames(&self) -> u64 {
        self.interrupts.frames()
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn keyboard_kind(&self) -> KeyboardKind {
        self.keyboard.kind()
    }

    pub fn physical_memory(&self) -> &[u8] {
        self.memory.as_slice()
    }

    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    pub fn io(&self) -> &IoRegisters {
        &self.io
    }

    pub fn sound(&self) -> &Sn76489 {
        &self.sound
    }

    pub fn debug_info(&self) -> DebugInfo {
        let active = self.mmu.active_lut();
        DebugInfo {
            mem_ctrl: self.mmu.mem_ctrl(),
            io_ctrl: self.mmu.io_ctrl(),
            io_page: (!self.mmu.page_c_is_memory()).then(|| self.mmu.io_page()),
            active_lut: active,
            edit_lut: self.mmu.edit_lut(),
            mapping: self.mmu.lut(active).map(|page| (page as u32) << 13),
            cycles: self.cycles,
            frames: self.interrupts.frames(),
            fast_mode: self.fast_mode,
            irq_line: self.interrupts.irq_line(),
            irq_pending: self.io.reg(INT_PENDING),
            irq_mask: self.io.reg(INT_MASK),
            timer: InterruptController::timer(&self.io),
            keyboard_queue: self.keyboard.queued(),
            frequencies: self.sound.frequencies(),
        }
    }

    /// Capture the hardware state (ROM images and the audio backend excluded)
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            memory: self.memory.clone(),
            mmu: self.mmu.clone(),
            io: self.io.clone(),
            keyboard: self.keyboard.clone(),
            sound: self.sound.clone(),
            interrupts: self.interrupts.clone(),
            source: self.source.clone(),
            joystick: self.joystick,
            fast_mode: self.fast_mode,
            write_protect: self.write_protect,
            cycles: self.cycles,
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) -> Result<(), F256Error> {
        if snapshot.keyboard.kind() != self.keyboard.kind() {
            return Err(F256Error::IncompatibleState(format!(
                "state has a {:?} keyboard, machine has {:?}",
                snapshot.keyboard.kind(),
                self.keyboard.kind()
            )));
        }
        self.memory = snapshot.memory;
        self.mmu = snapshot.mmu;
        self.io = snapshot.io;
        self.keyboard = snapshot.keyboard;
        self.sound = snapshot.sound;
        self.interrupts = snapshot.interrupts;
        self.source = snapshot.source;
        self.joystick = snapshot.joystick;
        self.fast_mode = snapshot.fast_mode;
        self.write_protect = snapshot.write_protect;
        self.cycles = snapshot.cycles;
        for (channel, hz) in self.sound.frequencies().into_iter().enumerate() {
            self.audio.set_frequency(channel, hz);
        }
        Ok(())
    }
}

impl Memory6502 for Machine {
    fn read(&mut self, addr: u16) -> u8 {
        if addr == SOURCE_PORT {
            return self.source.next_byte();
        }
        match self.mmu.decode(addr) {
            Target::MemCtrl => self.mmu.mem_ctrl(),
            Target::IoCtrl => self.mmu.io_ctrl(),
            Target::LutEntry { lut, window } => self.mmu.lut_entry(lut, window),
            Target::Io { page, addr } => self.io_read(page, addr),
            Target::Memory(offset) => self.memory.read(offset),
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        if self.write_protect {
            log(LogCategory::Mmu, LogLevel::Trace, || {
                format!("MMU: write {:04X}={:02X} dropped (protected)", addr, val)
            });
            return;
        }
        if addr == SOURCE_PORT {
            self.set_fast_mode(val != 0);
        }
        self.store(addr, val);
    }
}

/// Machine state for the debugger view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub mem_ctrl: u8,
    pub io_ctrl: u8,
    /// I/O page behind $C000-$DFFF, `None` when that window is memory
    pub io_page: Option<u8>,
    pub active_lut: usize,
    pub edit_lut: Option<usize>,
    /// Physical base address of each window through the active LUT
    pub mapping: [u32; WINDOWS],
    pub cycles: u64,
    pub frames: u64,
    pub fast_mode: bool,
    pub irq_line: bool,
    pub irq_pending: u8,
    pub irq_mask: u8,
    pub timer: u32,
    pub keyboard_queue: usize,
    pub frequencies: [u32; CHANNELS],
}

/// Serializable hardware state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    memory: PhysicalMemory,
    mmu: Mmu,
    io: IoRegisters,
    keyboard: KeyboardDevice,
    sound: Sn76489,
    interrupts: InterruptController,
    source: SourceStream,
    joystick: u8,
    fast_mode: bool,
    write_protect: bool,
    cycles: u64,
}
