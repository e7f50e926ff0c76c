//! Program loading and the source stream
//!
//! Programs are given as `<path>@<hexaddr>` and copied straight into
//! physical memory, bypassing the MMU. The load address of the last program
//! is left at `$FE/$FF` for the kernel to start.

use crate::bus::Machine;
use crate::memory::MEMORY_SIZE;
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("bad argument '{0}': expected <file>@<hex address>")]
    BadSpec(String),
    #[error("bad load address '{0}'")]
    BadAddress(String),
    #[error("no file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("load address ${0:X} is outside physical memory")]
    OutOfRange(usize),
}

/// A file and the physical address it loads at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSpec {
    pub path: PathBuf,
    pub address: usize,
}

impl LoadSpec {
    pub fn parse(spec: &str) -> Result<Self, LoadError> {
        spec.parse()
    }
}

impl FromStr for LoadSpec {
    type Err = LoadError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (path, address) = spec
            .rsplit_once('@')
            .ok_or_else(|| LoadError::BadSpec(spec.to_string()))?;
        if path.is_empty() {
            return Err(LoadError::BadSpec(spec.to_string()));
        }

        let digits = address
            .strip_prefix('$')
            .or_else(|| address.strip_prefix("0x"))
            .or_else(|| address.strip_prefix("0X"))
            .unwrap_or(address);
        let address = usize::from_str_radix(digits, 16)
            .map_err(|_| LoadError::BadAddress(address.to_string()))?;

        Ok(Self {
            path: PathBuf::from(path),
            address,
        })
    }
}

/// Read a spec's file and load it. Returns the first and last addresses
/// written.
pub fn load_file(machine: &mut Machine, spec: &LoadSpec) -> Result<(usize, usize), LoadError> {
    if spec.address >= MEMORY_SIZE {
        return Err(LoadError::OutOfRange(spec.address));
    }
    let data = read_file(&spec.path)?;
    machine.add_program(spec.address, data.clone());
    let stored = machine.load_bytes(spec.address, &data);
    let end = spec.address + stored.saturating_sub(1);

    log(LogCategory::Loader, LogLevel::Info, || {
        format!(
            "Loader: '{}' to ${:04X}..${:04X}",
            spec.path.display(),
            spec.address,
            end
        )
    });
    Ok((spec.address, end))
}

/// Read a whole file, mapping failures to [`LoadError::Io`]
pub fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a byte image to disk
pub fn write_dump(path: &Path, bytes: &[u8]) -> Result<(), LoadError> {
    fs::write(path, bytes).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Byte stream the CPU reads one byte at a time through `$FFFA`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStream {
    data: Vec<u8>,
    pos: usize,
}

impl SourceStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Next byte, or 0 once the stream is exhausted
    pub fn next_byte(&mut self) -> u8 {
        match self.data.get(self.pos) {
            Some(&byte) => {
                self.pos += 1;
                byte
            }
            None => 0,
        }
    }

    /// The byte the next read would return
    pub fn peek(&self) -> u8 {
        self.data.get(self.pos).copied().unwrap_or(0)
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spec() {
        let spec = LoadSpec::parse("basic.rom@8000").unwrap();
        assert_eq!(spec.path, PathBuf::from("basic.rom"));
        assert_eq!(spec.address, 0x8000);

        assert_eq!(LoadSpec::parse("a.bin@$2000").unwrap().address, 0x2000);
        assert_eq!(LoadSpec::parse("a.bin@0x1F000").unwrap().address, 0x1F000);
    }

    #[test]
    fn test_parse_splits_on_last_at() {
        let spec = LoadSpec::parse("dir@x/prog.bin@c000").unwrap();
        assert_eq!(spec.path, PathBuf::from("dir@x/prog.bin"));
        assert_eq!(spec.address, 0xC000);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            LoadSpec::parse("prog.bin"),
            Err(LoadError::BadSpec(_))
        ));
        assert!(matches!(LoadSpec::parse("@1000"), Err(LoadError::BadSpec(_))));
        assert!(matches!(
            LoadSpec::parse("prog.bin@zz"),
            Err(LoadError::BadAddress(_))
        ));
        assert!(matches!(
            LoadSpec::parse("prog.bin@"),
            Err(LoadError::BadAddress(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = read_file(Path::new("/nonexistent/prog.bin")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/prog.bin"));
    }

    #[test]
    fn test_source_stream() {
        let mut src = SourceStream::new(vec![1, 2]);
        assert_eq!(src.peek(), 1);
        assert_eq!(src.next_byte(), 1);
        assert_eq!(src.next_byte(), 2);
        assert_eq!(src.remaining(), 0);
        assert_eq!(src.next_byte(), 0);
        assert_eq!(src.next_byte(), 0);

        src.rewind();
        assert_eq!(src.next_byte(), 1);
    }
}
