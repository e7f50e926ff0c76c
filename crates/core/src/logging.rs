//! Centralized logging configuration for the emulator.
//!
//! Components log through [`log()`] with a category and a level. Whether a
//! message is produced is decided here, per category, before the message
//! closure runs; accepted messages are handed to the `log` crate facade with
//! the target `emu::<category>`, so whichever backend the frontend installed
//! (e.g. `env_logger`) prints them.
//!
//! # Architecture
//!
//! - **LogConfig**: Thread-safe global configuration using atomic operations
//! - **LogLevel**: Hierarchical log levels (Off < Error < Warn < Info < Debug < Trace)
//! - **LogCategory**: One category per machine component
//! - **log()**: Common logging entry point with lazy message evaluation
//!
//! # Usage
//!
//! ```rust
//! use emu_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Mmu, LogLevel::Debug, || {
//!     format!("MMU: active bank {}", 2)
//! });
//! ```

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }

    /// Matching `log` crate level (`None` for Off)
    fn to_facade(self) -> Option<::log::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(::log::Level::Error),
            LogLevel::Warn => Some(::log::Level::Warn),
            LogLevel::Info => Some(::log::Level::Info),
            LogLevel::Debug => Some(::log::Level::Debug),
            LogLevel::Trace => Some(::log::Level::Trace),
        }
    }
}

/// Log category for different machine components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Executor hand-off (halt, breakpoints, frame boundaries)
    Cpu,
    /// Address translation and mapping registers
    Mmu,
    /// I/O register space dispatch
    Io,
    /// Keyboard queue and controller protocol
    Keyboard,
    /// Sound register model
    Sound,
    /// Blitter transfers
    Dma,
    /// Interrupt pending/mask and frame timer
    Interrupts,
    /// ROM installation and file loading
    Loader,
}

const CATEGORY_COUNT: usize = 8;

impl LogCategory {
    /// Every category, in index order
    pub const ALL: [LogCategory; CATEGORY_COUNT] = [
        LogCategory::Cpu,
        LogCategory::Mmu,
        LogCategory::Io,
        LogCategory::Keyboard,
        LogCategory::Sound,
        LogCategory::Dma,
        LogCategory::Interrupts,
        LogCategory::Loader,
    ];

    fn index(self) -> usize {
        match self {
            LogCategory::Cpu => 0,
            LogCategory::Mmu => 1,
            LogCategory::Io => 2,
            LogCategory::Keyboard => 3,
            LogCategory::Sound => 4,
            LogCategory::Dma => 5,
            LogCategory::Interrupts => 6,
            LogCategory::Loader => 7,
        }
    }

    /// Target string handed to the `log` facade
    pub fn target(self) -> &'static str {
        match self {
            LogCategory::Cpu => "emu::cpu",
            LogCategory::Mmu => "emu::mmu",
            LogCategory::Io => "emu::io",
            LogCategory::Keyboard => "emu::keyboard",
            LogCategory::Sound => "emu::sound",
            LogCategory::Dma => "emu::dma",
            LogCategory::Interrupts => "emu::interrupts",
            LogCategory::Loader => "emu::loader",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown log category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for LogCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(LogCategory::Cpu),
            "mmu" => Ok(LogCategory::Mmu),
            "io" => Ok(LogCategory::Io),
            "keyboard" | "kbd" => Ok(LogCategory::Keyboard),
            "sound" | "psg" => Ok(LogCategory::Sound),
            "dma" => Ok(LogCategory::Dma),
            "interrupts" | "irq" => Ok(LogCategory::Interrupts),
            "loader" => Ok(LogCategory::Loader),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// Sliding-window limiter on messages per second, tracked per category.
struct RateLimiter {
    max_logs_per_second: AtomicUsize,
    window_duration: Duration,
    state: Mutex<[WindowState; CATEGORY_COUNT]>,
}

#[derive(Default)]
struct WindowState {
    timestamps: VecDeque<Instant>,
    dropped: usize,
    last_drop_report: Option<Instant>,
}

impl RateLimiter {
    fn new(max_logs_per_second: usize) -> Self {
        Self {
            max_logs_per_second: AtomicUsize::new(max_logs_per_second),
            window_duration: Duration::from_secs(1),
            state: Mutex::new(Default::default()),
        }
    }

    /// Returns (allowed, dropped_count) where dropped_count is Some(n) when a
    /// summary of dropped messages is due.
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let max_logs = self.max_logs_per_second.load(Ordering::Relaxed);
        // A poisoned lock only means another thread panicked mid-log
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = &mut state[category.index()];

        while let Some(&front) = window.timestamps.front() {
            if now.duration_since(front) > self.window_duration {
                window.timestamps.pop_front();
            } else {
                break;
            }
        }

        if window.timestamps.len() < max_logs {
            window.timestamps.push_back(now);
            if window.dropped > 0 {
                let dropped = std::mem::take(&mut window.dropped);
                window.last_drop_report = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        window.dropped += 1;
        let report_due = match window.last_drop_report {
            None => true,
            Some(last) => now.duration_since(last) >= Duration::from_secs(1),
        };
        if report_due {
            let dropped = std::mem::take(&mut window.dropped);
            window.last_drop_report = Some(now);
            (false, Some(dropped))
        } else {
            (false, None)
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    /// Applies to every category without its own level
    global_level: AtomicU8,
    category_levels: [AtomicU8; CATEGORY_COUNT],
    rate_limiter: RateLimiter,
}

impl LogConfig {
    /// All logging disabled, 60 messages per second per category
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            category_levels: Default::default(),
            rate_limiter: RateLimiter::new(60),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    /// Set log level for a specific category
    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.category_levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    /// Get log level for a specific category
    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.category_levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category with its own level uses it; otherwise the global level applies.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        let category_level = self.get_level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.get_global_level()
        }
    }

    /// Reset all logging to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    /// Set the maximum logs per second per category
    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .max_logs_per_second
            .store(max_logs_per_second, Ordering::Relaxed);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.max_logs_per_second.load(Ordering::Relaxed)
    }

    /// Apply a `category=level` or bare `level` directive.
    ///
    /// Returns false when either half does not parse.
    pub fn apply_directive(&self, directive: &str) -> bool {
        match directive.split_once('=') {
            Some((category, level)) => {
                match (category.trim().parse::<LogCategory>(), LogLevel::from_str(level.trim())) {
                    (Ok(category), Some(level)) => {
                        self.set_level(category, level);
                        true
                    }
                    _ => false,
                }
            }
            None => match LogLevel::from_str(directive.trim()) {
                Some(level) => {
                    self.set_global_level(level);
                    true
                }
                None => false,
            },
        }
    }
}

/// Log a message with the specified category and level.
///
/// The closure only runs when the category is enabled at `level` and the
/// category is under its rate limit.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    let (allowed, dropped) = config.rate_limiter.should_allow(category);
    if let Some(count) = dropped.filter(|&n| n > 0) {
        ::log::warn!(
            target: category.target(),
            "rate limit exceeded, {} message(s) dropped in the last second",
            count
        );
    }

    if allowed {
        if let Some(facade_level) = level.to_facade() {
            ::log::log!(target: category.target(), facade_level, "{}", message_fn());
        }
    }
}
