//! Inode table (§4.4).
//!
//! A fixed array of [`EntryRecord`] slots. This module knows how to load and
//! flush slots and how to scan for them by name or freeness; it has no
//! opinion on block chains — that's [`crate::alloc`] and, above both,
//! [`crate::manager`].

use crate::config::VolumeConfig;
use crate::device::BlockDevice;
use crate::error::{Result, VolumeError};
use crate::layout::{EntryRecord, ENTRY_LEN};

/// Maximum printable-ASCII filename length, in bytes (§3.2).
pub const MAX_NAME_LEN: usize = crate::layout::NAME_LEN;

/// In-memory mirror of the inode table: one [`EntryRecord`] per slot.
pub struct InodeTable {
    entries: Vec<EntryRecord>,
}

impl InodeTable {
    pub fn all_free(max_files: u32) -> Self {
        Self {
            entries: (0..max_files).map(|_| EntryRecord::free()).collect(),
        }
    }

    pub fn load(device: &BlockDevice, cfg: &VolumeConfig) -> Result<Self> {
        let base = cfg.entries_off();
        let mut entries = Vec::with_capacity(cfg.max_files as usize);
        let mut buf = [0u8; ENTRY_LEN];
        for i in 0..cfg.max_files as u64 {
            device.read(base + i * ENTRY_LEN as u64, &mut buf)?;
            entries.push(EntryRecord::from_bytes(&buf));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, slot: u16) -> &EntryRecord {
        &self.entries[slot as usize]
    }

    pub fn set(&mut self, slot: u16, entry: EntryRecord) {
        self.entries[slot as usize] = entry;
    }

    pub fn is_live(&self, slot: u16) -> bool {
        !self.entries[slot as usize].is_free()
    }

    /// Linear scan for a live slot bound to `name`.
    pub fn find_by_name(&self, name: &str) -> Option<u16> {
        self.entries
            .iter()
            .position(|e| !e.is_free() && e.name == name)
            .map(|i| i as u16)
    }

    /// Lowest-index free slot.
    pub fn find_free(&self) -> Option<u16> {
        self.entries
            .iter()
            .position(|e| e.is_free())
            .map(|i| i as u16)
    }

    /// Names of all live entries, in ascending slot order.
    pub fn list_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| !e.is_free())
            .map(|e| e.name.clone())
            .collect()
    }

    /// Writes slot `slot`'s current in-memory state to disk.
    pub fn flush_one(&self, device: &BlockDevice, cfg: &VolumeConfig, slot: u16) -> Result<()> {
        let off = cfg.entries_off() + u64::from(slot) * ENTRY_LEN as u64;
        device.write(off, &self.entries[slot as usize].to_bytes())
    }
}

/// Validates a caller-supplied filename against §4.5's rules: non-empty,
/// at most 11 bytes, printable ASCII, not all whitespace.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VolumeError::InvalidArgument("name is empty".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(VolumeError::InvalidArgument(format!(
            "name exceeds {MAX_NAME_LEN} bytes"
        )));
    }
    if name.trim().is_empty() {
        return Err(VolumeError::InvalidArgument("name is blank".into()));
    }
    if !name.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        return Err(VolumeError::InvalidArgument(
            "name must be printable ASCII".into(),
        ));
    }
    Ok(())
}
