//! Volume manager (§4.5): the orchestrator tying the block device, the
//! binary codec, the allocator, and the inode table together behind the
//! fair gate.
//!
//! Every mutating entry point acquires [`Gate::write`]; every read-only one
//! acquires [`Gate::read`] (§2, §4.6). The backing file is touched only
//! through [`BlockDevice`] and only while the gate is held, matching the
//! shared-resource policy in §5.

use std::path::Path;

use crate::alloc::NodeTable;
use crate::config::VolumeConfig;
use crate::device::BlockDevice;
use crate::error::{Result, VolumeError};
use crate::gate::Gate;
use crate::layout::{EntryRecord, Header, HEADER_LEN, MAGIC};
use crate::table::{self, InodeTable};

/// Maximum file size the format can represent (§1 Non-goals, §8).
pub const MAX_FILE_SIZE: usize = 65_535;

struct State {
    entries: InodeTable,
    nodes: NodeTable,
}

/// A snapshot of allocation pressure, exposed for operators and tests.
/// Not part of the core's required surface (§6.2) — an addition for
/// observability that doesn't change on-disk format or semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeStats {
    pub max_blocks: u32,
    pub free_blocks: u32,
    pub max_files: u32,
    pub live_files: u32,
}

/// A live handle onto one volume image. Cheaply shared across threads via
/// `Arc<VolumeManager>` — the gate inside makes that safe (§9: "a
/// first-class value with an explicit lifecycle", not a process-wide
/// singleton).
pub struct VolumeManager {
    device: BlockDevice,
    cfg: VolumeConfig,
    state: Gate<State>,
}

impl VolumeManager {
    /// Opens or creates the volume at `path` (§4.5 Construction).
    pub fn open(
        path: &Path,
        total_bytes: u32,
        block_size: u32,
        max_files: u32,
        max_blocks: u32,
    ) -> Result<Self> {
        Self::open_opts(path, total_bytes, block_size, max_files, max_blocks, false)
    }

    /// Like [`Self::open`], but when resuming an existing volume also scans
    /// for block-node chains that are allocated but unreachable from any
    /// live entry and reclaims them. §9 documents this as an optional
    /// enhancement the reference implementation does not perform; callers
    /// that want it opt in explicitly.
    pub fn open_with_scrub(
        path: &Path,
        total_bytes: u32,
        block_size: u32,
        max_files: u32,
        max_blocks: u32,
    ) -> Result<Self> {
        Self::open_opts(path, total_bytes, block_size, max_files, max_blocks, true)
    }

    fn open_opts(
        path: &Path,
        total_bytes: u32,
        block_size: u32,
        max_files: u32,
        max_blocks: u32,
        scrub: bool,
    ) -> Result<Self> {
        let cfg = VolumeConfig {
            total_bytes,
            block_size,
            max_files,
            max_blocks,
        };
        cfg.validate()?;

        let mut device = BlockDevice::open(path)?;
        let prior_len = device.len()?;
        device.ensure_size(u64::from(cfg.total_bytes))?;

        let want_header = Header {
            magic: MAGIC,
            total_bytes: cfg.total_bytes,
            block_size: cfg.block_size,
            max_files: cfg.max_files,
            max_blocks: cfg.max_blocks,
        };

        let resumable = prior_len >= HEADER_LEN as u64 && {
            let mut buf = [0u8; HEADER_LEN];
            device.read(0, &mut buf)?;
            Header::from_bytes(&buf) == want_header
        };

        let (entries, nodes) = if resumable {
            (
                InodeTable::load(&device, &cfg)?,
                NodeTable::load(&device, &cfg)?,
            )
        } else {
            Self::initialize(&device, &cfg, want_header)?
        };

        let mut nodes = nodes;
        let mut entries = entries;
        if resumable && scrub {
            Self::scrub(&device, &cfg, &mut entries, &mut nodes)?;
        }

        Ok(Self {
            device,
            cfg,
            state: Gate::new(State { entries, nodes }),
        })
    }

    fn initialize(
        device: &BlockDevice,
        cfg: &VolumeConfig,
        header: Header,
    ) -> Result<(InodeTable, NodeTable)> {
        let entries = InodeTable::all_free(cfg.max_files);
        let nodes = NodeTable::all_free(cfg.max_blocks);

        device.write(0, &header.to_bytes())?;
        for slot in 0..cfg.max_files as u16 {
            entries.flush_one(device, cfg, slot)?;
        }
        for idx in 0..cfg.max_blocks as u16 {
            nodes.flush_one(device, cfg, idx)?;
        }
        let data_len = u64::from(cfg.block_size) * u64::from(cfg.max_blocks);
        device.zero_fill(cfg.data_off(), data_len as usize)?;

        Ok((entries, nodes))
    }

    /// Marks reachable every node visited from a live entry's chain; any
    /// other non-`Free` node is leaked allocator state from a crash between
    /// `writeFile`'s commit point and its post-commit reclaim (§4.5) and is
    /// returned to `Free` here.
    fn scrub(
        device: &BlockDevice,
        cfg: &VolumeConfig,
        entries: &mut InodeTable,
        nodes: &mut NodeTable,
    ) -> Result<()> {
        let mut reachable = vec![false; nodes.len()];
        for slot in 0..entries.len() as u16 {
            let entry = entries.get(slot);
            if !entry.is_free() && entry.first_block >= 0 {
                for idx in nodes.follow_chain(entry.first_block as u16)? {
                    reachable[idx as usize] = true;
                }
            }
        }

        let mut orphans = Vec::new();
        for idx in 0..nodes.len() as u16 {
            if !reachable[idx as usize] && !matches!(nodes.link_of(idx), crate::layout::NodeLink::Free) {
                orphans.push(idx);
            }
        }
        if orphans.is_empty() {
            return Ok(());
        }
        for &idx in &orphans {
            let off = cfg.data_off() + u64::from(idx) * u64::from(cfg.block_size);
            device.zero_fill(off, cfg.block_size as usize)?;
        }
        nodes.release_raw(&orphans);
        nodes.flush_many(device, cfg, &orphans)
    }

    /// §4.5 `createFile`.
    pub fn create_file(&self, name: &str) -> Result<()> {
        table::validate_name(name)?;
        let mut state = self.state.write();
        if state.entries.find_by_name(name).is_some() {
            return Err(VolumeError::AlreadyExists);
        }
        let slot = state.entries.find_free().ok_or(VolumeError::NoSpace)?;
        state.entries.set(
            slot,
            EntryRecord {
                name: name.to_string(),
                size: 0,
                first_block: -1,
            },
        );
        state.entries.flush_one(&self.device, &self.cfg, slot)
    }

    /// §4.5 `deleteFile`.
    pub fn delete_file(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        let slot = state
            .entries
            .find_by_name(name)
            .ok_or(VolumeError::NotFound)?;
        let first_block = state.entries.get(slot).first_block;

        if first_block >= 0 {
            let chain = state.nodes.follow_chain(first_block as u16)?;
            for &idx in &chain {
                let off = self.cfg.data_off() + u64::from(idx) * u64::from(self.cfg.block_size);
                self.device.zero_fill(off, self.cfg.block_size as usize)?;
            }
            state.nodes.free_chain(&self.device, &self.cfg, first_block as u16)?;
        }

        state.entries.set(slot, EntryRecord::free());
        state.entries.flush_one(&self.device, &self.cfg, slot)
    }

    /// §4.5 `writeFile`. The non-trivial commit sequence: allocate and
    /// populate the new chain, flush it, flip the entry to point at it
    /// (the commit point), then reclaim whatever the entry pointed at
    /// before.
    pub fn write_file(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.write();
        let slot = state
            .entries
            .find_by_name(name)
            .ok_or(VolumeError::NotFound)?;

        let new_size = bytes.len().min(MAX_FILE_SIZE);
        let need = div_ceil(new_size, self.cfg.block_size as usize);

        if state.nodes.count_free() < need as u32 {
            return Err(VolumeError::NoSpace);
        }

        let chain = state.nodes.allocate_chain(&self.device, &self.cfg, need)?;

        if let Err(e) = self.populate_chain(&chain, &bytes[..new_size]) {
            for &idx in &chain {
                let off = self.cfg.data_off() + u64::from(idx) * u64::from(self.cfg.block_size);
                let _ = self.device.zero_fill(off, self.cfg.block_size as usize);
            }
            state.nodes.release_raw(&chain);
            let _ = state.nodes.flush_many(&self.device, &self.cfg, &chain);
            return Err(e);
        }

        let old_first_block = state.entries.get(slot).first_block;
        let new_first_block = chain.first().map(|&i| i as i16).unwrap_or(-1);
        state.entries.set(
            slot,
            EntryRecord {
                name: name.to_string(),
                size: new_size as u16,
                first_block: new_first_block,
            },
        );
        state.entries.flush_one(&self.device, &self.cfg, slot)?;

        if old_first_block >= 0 {
            let old_chain = state.nodes.follow_chain(old_first_block as u16)?;
            for &idx in &old_chain {
                let off = self.cfg.data_off() + u64::from(idx) * u64::from(self.cfg.block_size);
                self.device.zero_fill(off, self.cfg.block_size as usize)?;
            }
            state.nodes.release_raw(&old_chain);
            state.nodes.flush_many(&self.device, &self.cfg, &old_chain)?;
        }

        Ok(())
    }

    fn populate_chain(&self, chain: &[u16], payload: &[u8]) -> Result<()> {
        let block_size = self.cfg.block_size as usize;
        let mut offset = 0usize;
        for &idx in chain {
            let chunk = (payload.len() - offset).min(block_size);
            let off = self.cfg.data_off() + u64::from(idx) * u64::from(self.cfg.block_size);
            self.device.write(off, &payload[offset..offset + chunk])?;
            if chunk < block_size {
                self.device.zero_fill(off + chunk as u64, block_size - chunk)?;
            }
            offset += chunk;
        }
        Ok(())
    }

    /// §4.5 `readFile`.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let state = self.state.read();
        let slot = state
            .entries
            .find_by_name(name)
            .ok_or(VolumeError::NotFound)?;
        let entry = state.entries.get(slot);

        if entry.size == 0 {
            return Ok(Vec::new());
        }
        if entry.first_block < 0 {
            return Err(VolumeError::Corrupt(
                "live entry has zero-length chain but non-zero size".into(),
            ));
        }

        let chain = state.nodes.follow_chain(entry.first_block as u16)?;
        let expected = div_ceil(entry.size as usize, self.cfg.block_size as usize);
        if chain.len() != expected {
            return Err(VolumeError::Corrupt(format!(
                "chain length {} does not match expected {expected} blocks for size {}",
                chain.len(),
                entry.size
            )));
        }

        let mut out = Vec::with_capacity(entry.size as usize);
        let mut remaining = entry.size as usize;
        let block_size = self.cfg.block_size as usize;
        let mut buf = vec![0u8; block_size];
        for &idx in &chain {
            let chunk = remaining.min(block_size);
            let off = self.cfg.data_off() + u64::from(idx) * u64::from(self.cfg.block_size);
            self.device.read(off, &mut buf[..chunk])?;
            out.extend_from_slice(&buf[..chunk]);
            remaining -= chunk;
        }
        Ok(out)
    }

    /// §4.5 `listFiles`.
    pub fn list_files(&self) -> Vec<String> {
        self.state.read().entries.list_names()
    }

    /// Not part of the required surface (§6.2) — a supplemental read-only
    /// view of allocation pressure for operators.
    pub fn stats(&self) -> VolumeStats {
        let state = self.state.read();
        VolumeStats {
            max_blocks: self.cfg.max_blocks,
            free_blocks: state.nodes.count_free(),
            max_files: self.cfg.max_files,
            live_files: state.entries.list_names().len() as u32,
        }
    }
}

fn div_ceil(n: usize, d: usize) -> usize {
    if n == 0 {
        0
    } else {
        (n + d - 1) / d
    }
}
