//! Foenix F256 system implementation
//!
//! Emulates the memory and I/O side of the machine: the MMU, the I/O register
//! pages and the devices behind them (keyboard controller, SN76489 sound
//! registers, DMA engine, interrupt/timer controller). The 6502 itself is an
//! external [`Executor6502`]; the machine is the memory it runs against.

pub mod bus;
pub mod config;
pub mod dma;
pub mod interrupts;
pub mod io;
pub mod keyboard;
pub mod loader;
pub mod memory;
pub mod mmu;
pub mod sound;

pub use bus::{DebugInfo, Machine, Snapshot};
pub use config::{ConfigError, KeyboardKind, MachineConfig};
pub use loader::{LoadError, LoadSpec};

use emu_core::cpu::{Executor6502, IdleExecutor};
use emu_core::types::FrameOutcome;
use emu_core::{MountPointInfo, System};
use serde::de::Error as _;
use serde_json::Value;
use thiserror::Error;

const STATE_VERSION: u64 = 1;
const SYSTEM_NAME: &str = "f256";

#[derive(Debug, Error)]
pub enum F256Error {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
    #[error("Incompatible save state: {0}")]
    IncompatibleState(String),
}

/// F256 system: the machine plus the executor driving it
pub struct F256System {
    machine: Machine,
    executor: Box<dyn Executor6502>,
    breakpoints: Vec<u16>,
}

impl Default for F256System {
    fn default() -> Self {
        Self::new()
    }
}

impl F256System {
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    /// Build with a configuration; runs on an [`IdleExecutor`] until another
    /// executor is attached
    pub fn with_config(config: MachineConfig) -> Self {
        let mut sys = Self {
            machine: Machine::new(config),
            executor: Box::new(IdleExecutor::default()),
            breakpoints: Vec::new(),
        };
        sys.executor.reset(&mut sys.machine);
        sys
    }

    /// Replace the instruction executor and reset it against the machine
    pub fn attach_executor(&mut self, mut executor: Box<dyn Executor6502>) {
        executor.reset(&mut self.machine);
        self.executor = executor;
    }

    pub fn set_breakpoints(&mut self, breakpoints: Vec<u16>) {
        self.breakpoints = breakpoints;
    }

    pub fn pc(&self) -> u16 {
        self.executor.pc()
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    pub fn debug_info(&self) -> DebugInfo {
        self.machine.debug_info()
    }

    fn check_mount_point(mount_point_id: &str) -> Result<(), F256Error> {
        match mount_point_id {
            "Source" | "Font" | "Kernel" => Ok(()),
            _ => Err(F256Error::InvalidMountPoint(mount_point_id.to_string())),
        }
    }
}

impl System for F256System {
    type Error = F256Error;

    fn reset(&mut self) {
        self.machine.reset();
        self.executor.reset(&mut self.machine);
    }

    fn step_frame(&mut self) -> Result<FrameOutcome, Self::Error> {
        Ok(self
            .machine
            .run_frame(self.executor.as_mut(), &self.breakpoints))
    }

    fn save_state(&self) -> Value {
        serde_json::json!({
            "version": STATE_VERSION,
            "system": SYSTEM_NAME,
            "keyboard": self.machine.keyboard_kind(),
            "machine": self.machine.snapshot(),
        })
    }

    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        if v["version"].as_u64() != Some(STATE_VERSION) {
            return Err(serde_json::Error::custom("unsupported save state version"));
        }
        if v["system"].as_str() != Some(SYSTEM_NAME) {
            return Err(serde_json::Error::custom("save state is not for the F256"));
        }

        let snapshot: Snapshot = serde_json::from_value(v["machine"].clone())?;
        self.machine
            .restore(snapshot)
            .map_err(|e| serde_json::Error::custom(e.to_string()))
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![
            MountPointInfo {
                id: "Kernel".to_string(),
                name: "Kernel ROM".to_string(),
                extensions: vec!["bin".to_string(), "rom".to_string()],
                required: false,
            },
            MountPointInfo {
                id: "Font".to_string(),
                name: "Character Font".to_string(),
                extensions: vec!["bin".to_string(), "fnt".to_string()],
                required: false,
            },
            MountPointInfo {
                id: "Source".to_string(),
                name: "Source Stream".to_string(),
                extensions: vec!["bin".to_string(), "bas".to_string(), "txt".to_string()],
                required: false,
            },
        ]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        Self::check_mount_point(mount_point_id)?;
        match mount_point_id {
            "Source" => self.machine.set_source(data.to_vec()),
            "Font" => self.machine.set_font(Some(data.to_vec())),
            _ => self.machine.set_kernel(Some(data.to_vec())),
        }
        self.reset();
        Ok(())
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        Self::check_mount_point(mount_point_id)?;
        match mount_point_id {
            "Source" => self.machine.set_source(Vec::new()),
            "Font" => self.machine.set_font(None),
            _ => self.machine.set_kernel(None),
        }
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        match mount_point_id {
            "Source" => self.machine.has_source(),
            "Font" => self.machine.has_font(),
            "Kernel" => self.machine.has_kernel(),
            _ => false,
        }
    }
}
