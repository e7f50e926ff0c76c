use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use emu_core::logging::{LogConfig, LogLevel};
use emu_core::types::FrameOutcome;
use emu_core::System;
use emu_f256::loader::{self, LoadSpec};
use emu_f256::{F256System, KeyboardKind, MachineConfig};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Keyboard {
    /// 8042 handshake controller
    I8042,
    /// Status bit plus data FIFO
    Fifo,
}

impl From<Keyboard> for KeyboardKind {
    fn from(kbd: Keyboard) -> Self {
        match kbd {
            Keyboard::I8042 => KeyboardKind::I8042,
            Keyboard::Fifo => KeyboardKind::Fifo,
        }
    }
}

#[derive(Parser)]
#[command(name = "f256", about = "Headless F256 machine runner")]
struct Args {
    /// Programs to load, as <file>@<hex address>
    #[arg(value_parser = parse_load_spec)]
    load: Vec<LoadSpec>,

    /// Machine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keyboard controller, overriding the configuration
    #[arg(long, value_enum)]
    keyboard: Option<Keyboard>,

    /// Number of frames to run
    #[arg(long, default_value_t = 5)]
    frames: u32,

    /// Byte stream readable at $FFFA
    #[arg(long)]
    source: Option<PathBuf>,

    /// Character font installed in I/O page 1
    #[arg(long)]
    font: Option<PathBuf>,

    /// Kernel ROM copied to $F000
    #[arg(long)]
    kernel: Option<PathBuf>,

    /// PS/2 codes to inject, one per frame (hex, comma separated)
    #[arg(long, value_delimiter = ',', value_parser = parse_hex_byte)]
    keys: Vec<u8>,

    /// Start in fast mode
    #[arg(long, default_value_t = false)]
    fast: bool,

    /// Write physical memory here on exit
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Dump save-state to this file as JSON
    #[arg(long, default_value = "state.json")]
    save: PathBuf,

    /// Level for every log category
    #[arg(long)]
    log_level: Option<String>,

    /// Per-category level, e.g. --log dma=debug
    #[arg(long = "log")]
    log: Vec<String>,

    /// Maximum log messages per second per category
    #[arg(long)]
    log_rate: Option<usize>,

    /// Suppress all per-frame output (still writes --save)
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn parse_load_spec(s: &str) -> Result<LoadSpec, String> {
    LoadSpec::parse(s).map_err(|e| e.to_string())
}

fn parse_hex_byte(s: &str) -> Result<u8, String> {
    let digits = s
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches('$');
    u8::from_str_radix(digits, 16).map_err(|_| format!("'{}' is not a hex byte", s))
}

fn configure_logging(args: &Args) -> Result<()> {
    let config = LogConfig::global();
    if let Some(level) = &args.log_level {
        match LogLevel::from_str(level) {
            Some(level) => config.set_global_level(level),
            None => bail!("Unknown log level: {}", level),
        }
    }
    if let Some(rate) = args.log_rate {
        config.set_rate_limit(rate);
    }
    for directive in &args.log {
        if !config.apply_directive(directive) {
            bail!("Bad log directive: {}", directive);
        }
    }

    // Category filtering happens in LogConfig; let everything it passes through
    let default_filter = if args.log_level.is_some() || !args.log.is_empty() {
        "trace"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>> {
    Ok(loader::read_file(path)?)
}

fn main() -> Result<()> {
    let args = Args::parse();
    configure_logging(&args)?;

    let mut config = match &args.config {
        Some(path) => MachineConfig::load(path)?,
        None => MachineConfig::default(),
    };
    if let Some(kbd) = args.keyboard {
        config.keyboard = kbd.into();
    }

    let mut sys = F256System::with_config(config);
    if let Some(path) = &args.font {
        sys.mount("Font", &read(path)?)?;
    }
    if let Some(path) = &args.kernel {
        sys.mount("Kernel", &read(path)?)?;
    }
    if let Some(path) = &args.source {
        sys.mount("Source", &read(path)?)?;
    }

    for spec in &args.load {
        let (start, end) = loader::load_file(sys.machine_mut(), spec)
            .with_context(|| format!("loading {}", spec.path.display()))?;
        println!("Loaded '{}' to ${:04x}..${:04x}", spec.path.display(), start, end);
    }
    if !args.load.is_empty() {
        // Executor restarts against the loaded images
        sys.reset();
    }
    if args.fast {
        sys.machine_mut().set_fast_mode(true);
    }

    let mut keys = args.keys.iter().copied();
    for fnum in 1..=args.frames {
        if let Some(code) = keys.next() {
            sys.machine_mut().queue_key_event(code);
        }

        let outcome = sys.step_frame()?;
        if !args.quiet {
            println!(
                "Frame {} ({:?}):\n{}",
                fnum,
                outcome,
                serde_json::to_string_pretty(&sys.debug_info())?
            );
        }
        match outcome {
            FrameOutcome::Frame => {}
            FrameOutcome::Halted => {
                log::info!("halted at frame {}", fnum);
                break;
            }
            FrameOutcome::Breakpoint(pc) => {
                log::info!("stopped at ${:04X} in frame {}", pc, fnum);
                break;
            }
        }
    }

    let state = sys.save_state();
    let mut f = File::create(&args.save)
        .with_context(|| format!("creating {}", args.save.display()))?;
    write!(f, "{}", serde_json::to_string_pretty(&state)?)?;

    if let Some(path) = &args.dump {
        sys.machine().dump_memory(path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_byte() {
        assert_eq!(parse_hex_byte("1c"), Ok(0x1C));
        assert_eq!(parse_hex_byte("0xF0"), Ok(0xF0));
        assert_eq!(parse_hex_byte("$5A"), Ok(0x5A));
        assert!(parse_hex_byte("100").is_err());
        assert!(parse_hex_byte("zz").is_err());
    }

    #[test]
    fn test_args() {
        let args = Args::try_parse_from([
            "f256",
            "basic.rom@8000",
            "--keyboard",
            "fifo",
            "--keys",
            "1c,f0,1c",
            "--log",
            "dma=debug",
            "--log-rate",
            "500",
        ])
        .unwrap();
        assert_eq!(args.load.len(), 1);
        assert_eq!(args.load[0].address, 0x8000);
        assert!(matches!(args.keyboard, Some(Keyboard::Fifo)));
        assert_eq!(args.keys, vec![0x1C, 0xF0, 0x1C]);
        assert_eq!(args.frames, 5);
        assert_eq!(args.log, vec!["dma=debug".to_string()]);
        assert_eq!(args.log_rate, Some(500));
    }

    #[test]
    fn test_bad_load_spec_is_rejected() {
        assert!(Args::try_parse_from(["f256", "basic.rom"]).is_err());
        assert!(Args::try_parse_from(["f256", "basic.rom@xyz"]).is_err());
    }
}
