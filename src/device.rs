//! Block device: a thin wrapper around a random-access backing file.
//!
//! Exposes positional `read`/`write` and `ensure_size`, per §4.1. All
//! positions are byte offsets into the backing file; callers are responsible
//! for staying inside the computed region offsets (header/entries/nodes/data).

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::error::Result;

/// A byte-addressable backing file of a fixed logical capacity.
pub struct BlockDevice {
    file: File,
}

impl BlockDevice {
    /// Opens `path` for read/write, creating it if absent.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self { file })
    }

    /// Current length of the backing file, in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Extends the backing file to at least `n` bytes. Never truncates: if
    /// the file is already at least `n` bytes long, this is a no-op. Newly
    /// extended bytes read back as zero.
    pub fn ensure_size(&mut self, n: u64) -> Result<()> {
        if self.len()? < n {
            self.file.set_len(n)?;
        }
        Ok(())
    }

    /// Reads exactly `buf.len()` bytes starting at `off`.
    pub fn read(&self, off: u64, buf: &mut [u8]) -> Result<()> {
        self.file.read_exact_at(buf, off)?;
        Ok(())
    }

    /// Writes exactly `buf.len()` bytes starting at `off`.
    pub fn write(&self, off: u64, buf: &[u8]) -> Result<()> {
        self.file.write_all_at(buf, off)?;
        Ok(())
    }

    /// Writes `len` zero bytes starting at `off`.
    pub fn zero_fill(&self, off: u64, len: usize) -> Result<()> {
        const CHUNK: usize = 4096;
        let zeros = [0u8; CHUNK];
        let mut remaining = len;
        let mut pos = off;
        while remaining > 0 {
            let n = remaining.min(CHUNK);
            self.write(pos, &zeros[..n])?;
            pos += n as u64;
            remaining -= n;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_size_never_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.img");
        let mut dev = BlockDevice::open(&path).unwrap();
        dev.ensure_size(100).unwrap();
        assert_eq!(dev.len().unwrap(), 100);
        dev.ensure_size(10).unwrap();
        assert_eq!(dev.len().unwrap(), 100);
    }

    #[test]
    fn extended_bytes_are_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.img");
        let mut dev = BlockDevice::open(&path).unwrap();
        dev.ensure_size(64).unwrap();
        let mut buf = [0xffu8; 64];
        dev.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0u8; 64]);
    }

    #[test]
    fn read_write_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.img");
        let mut dev = BlockDevice::open(&path).unwrap();
        dev.ensure_size(32).unwrap();
        dev.write(8, &[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 4];
        dev.read(8, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }
}
