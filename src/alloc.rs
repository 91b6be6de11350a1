//! Free-chain allocator (§4.3).
//!
//! Owns the in-memory mirror of the node table and the lowest-index-first
//! allocation policy the reference implementation's test scenarios (§8) rely
//! on. Flushing a node to disk is this module's job too, since the on-disk
//! `blockIndex` field is redundant with slot position (§9) and is
//! regenerated here rather than carried around in memory.

use crate::config::VolumeConfig;
use crate::device::BlockDevice;
use crate::error::{Result, VolumeError};
use crate::layout::{NodeLink, NodeRecord, END, FREE, NODE_LEN};

/// In-memory mirror of the node table: one [`NodeLink`] per data block.
pub struct NodeTable {
    nodes: Vec<NodeLink>,
}

impl NodeTable {
    pub fn all_free(max_blocks: u32) -> Self {
        Self {
            nodes: vec![NodeLink::Free; max_blocks as usize],
        }
    }

    pub fn load(device: &BlockDevice, cfg: &VolumeConfig) -> Result<Self> {
        let base = cfg.nodes_off();
        let mut nodes = Vec::with_capacity(cfg.max_blocks as usize);
        let mut buf = [0u8; NODE_LEN];
        for i in 0..cfg.max_blocks as u64 {
            device.read(base + i * NODE_LEN as u64, &mut buf)?;
            nodes.push(NodeRecord::from_bytes(&buf)?.next);
        }
        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_of(&self, idx: u16) -> NodeLink {
        self.nodes[idx as usize]
    }

    /// Number of nodes with `next == FREE`.
    pub fn count_free(&self) -> u32 {
        self.nodes
            .iter()
            .filter(|n| matches!(n, NodeLink::Free))
            .count() as u32
    }

    /// Writes node `idx`'s current in-memory state to disk.
    pub fn flush_one(&self, device: &BlockDevice, cfg: &VolumeConfig, idx: u16) -> Result<()> {
        let rec = NodeRecord {
            block_index: idx,
            next: self.nodes[idx as usize],
        };
        let off = cfg.nodes_off() + u64::from(idx) * NODE_LEN as u64;
        device.write(off, &rec.to_bytes())
    }

    pub(crate) fn flush_many(&self, device: &BlockDevice, cfg: &VolumeConfig, indices: &[u16]) -> Result<()> {
        for &idx in indices {
            self.flush_one(device, cfg, idx)?;
        }
        Ok(())
    }

    /// Allocates `n` nodes, lowest-index-first, chains them together ending
    /// in `End`, and flushes them to disk. Returns the ordered chain. Does
    /// not touch the data blocks themselves — that's the caller's job.
    ///
    /// On any failure partway through, already-marked nodes are rolled back
    /// to `Free` and flushed before returning the error.
    pub fn allocate_chain(
        &mut self,
        device: &BlockDevice,
        cfg: &VolumeConfig,
        n: usize,
    ) -> Result<Vec<u16>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        if (self.count_free() as usize) < n {
            return Err(VolumeError::NoSpace);
        }

        let mut chain = Vec::with_capacity(n);
        for (pos, link) in self.nodes.iter().enumerate() {
            if chain.len() == n {
                break;
            }
            if matches!(link, NodeLink::Free) {
                chain.push(pos as u16);
            }
        }
        debug_assert_eq!(chain.len(), n);

        for (pos, &idx) in chain.iter().enumerate() {
            let link = if pos + 1 < chain.len() {
                NodeLink::Next(chain[pos + 1])
            } else {
                NodeLink::End
            };
            self.nodes[idx as usize] = link;
        }
        if let Err(e) = self.flush_many(device, cfg, &chain) {
            self.release_raw(&chain);
            let _ = self.flush_many(device, cfg, &chain);
            return Err(e);
        }

        Ok(chain)
    }

    /// Marks the given indices `Free` in memory without touching disk.
    /// Used to roll back a chain whose allocation partially failed, or by a
    /// caller that zeroes data blocks before flushing nodes itself.
    pub fn release_raw(&mut self, indices: &[u16]) {
        for &idx in indices {
            self.nodes[idx as usize] = NodeLink::Free;
        }
    }

    /// Walks the chain from `head`, returning its ordered indices without
    /// mutating anything. Fails on `Free` mid-walk or a value other than
    /// `End`/`Next` (the latter can't happen post-decode, but a walk that
    /// runs past `max_blocks` links indicates a cycle).
    pub fn follow_chain(&self, head: u16) -> Result<Vec<u16>> {
        let mut out = Vec::new();
        let mut cur = head;
        loop {
            if out.len() > self.nodes.len() {
                return Err(VolumeError::Corrupt("chain walk did not terminate".into()));
            }
            out.push(cur);
            match self.nodes[cur as usize] {
                NodeLink::End => return Ok(out),
                NodeLink::Next(next) => cur = next,
                NodeLink::Free => {
                    return Err(VolumeError::Corrupt(format!(
                        "node {cur} is free mid-chain"
                    )))
                }
            }
        }
    }

    /// Walks the chain from `head`, setting each visited node to `Free` and
    /// flushing it, stopping after the node whose `next` was `End`. A `Free`
    /// encountered mid-walk is fatal (§4.3).
    pub fn free_chain(&mut self, device: &BlockDevice, cfg: &VolumeConfig, head: u16) -> Result<()> {
        let chain = self.follow_chain(head)?;
        self.release_raw(&chain);
        self.flush_many(device, cfg, &chain)
    }
}

/// Sanity check kept for documentation purposes: the sentinels must never
/// collide with a valid non-negative chain index range we rely on.
const _: () = assert!(FREE < 0 && END < 0 && FREE != END);
