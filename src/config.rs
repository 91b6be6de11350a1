//! Volume geometry and front-end configuration.
//!
//! `VolumeConfig` mirrors the immutable volume parameters of §3.1: it is
//! loadable from a TOML file (`serde` + `toml`, the pair `maestro-os-maestro`'s
//! own `config` crate reaches for) and overridable from the CLI flags parsed
//! by the binaries with `argh`.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolumeError};

/// The four immutable parameters of a volume (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Size of the backing file, in bytes.
    pub total_bytes: u32,
    /// Payload bytes per data block.
    pub block_size: u32,
    /// Capacity of the inode table.
    pub max_files: u32,
    /// Number of data blocks (and block nodes).
    pub max_blocks: u32,
}

impl VolumeConfig {
    /// Offset of the entry table, right after the 24-byte header.
    pub const HEADER_BYTES: u32 = 24;
    pub const ENTRY_BYTES: u32 = 16;
    pub const NODE_BYTES: u32 = 4;

    pub fn entries_off(&self) -> u64 {
        u64::from(Self::HEADER_BYTES)
    }

    pub fn nodes_off(&self) -> u64 {
        self.entries_off() + u64::from(Self::ENTRY_BYTES) * u64::from(self.max_files)
    }

    pub fn data_off(&self) -> u64 {
        self.nodes_off() + u64::from(Self::NODE_BYTES) * u64::from(self.max_blocks)
    }

    pub fn required_bytes(&self) -> u64 {
        self.data_off() + u64::from(self.block_size) * u64::from(self.max_blocks)
    }

    /// Validates that the geometry is internally consistent and that
    /// `total_bytes` can hold the computed layout.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(VolumeError::InvalidArgument(
                "block_size must be > 0".into(),
            ));
        }
        if self.max_files == 0 {
            return Err(VolumeError::InvalidArgument(
                "max_files must be > 0".into(),
            ));
        }
        if self.max_blocks == 0 {
            return Err(VolumeError::InvalidArgument(
                "max_blocks must be > 0".into(),
            ));
        }
        if u64::from(self.total_bytes) < self.required_bytes() {
            return Err(VolumeError::InvalidArgument(format!(
                "total_bytes ({}) is too small for the computed layout ({})",
                self.total_bytes,
                self.required_bytes()
            )));
        }
        Ok(())
    }
}

/// Bounds and bind address for the line-oriented TCP front-end (§6.3).
///
/// These are interface constraints only — the front-end's internal design is
/// explicitly out of scope as an engineering subject (spec.md §1) — but a
/// complete server still needs somewhere to hold them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the server listens on, e.g. `"127.0.0.1:7070"`.
    pub bind_addr: String,
    /// Number of worker threads servicing connections.
    pub workers: usize,
    /// Maximum number of connections accepted concurrently; beyond this the
    /// server replies `ERROR server busy, try again later` and closes.
    pub max_connections: usize,
    /// Maximum accepted line length, in bytes.
    pub max_line_len: usize,
    /// Maximum number of commands processed per connection before it is
    /// closed.
    pub max_commands_per_conn: usize,
    /// Maximum decoded payload length accepted by `WRITE`, in bytes.
    pub max_payload_len: usize,
    /// Per-connection read timeout.
    pub read_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7070".to_string(),
            workers: 4,
            max_connections: 64,
            max_line_len: 4096,
            max_commands_per_conn: 10_000,
            max_payload_len: 2 * 65535 + 1,
            read_timeout_secs: 30,
        }
    }
}

/// Top-level configuration file, combining volume geometry and front-end
/// bounds. Either section may be omitted and filled in by CLI flags instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub volume: Option<VolumeConfig>,
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

impl FileConfig {
    /// Parses a TOML configuration file from `path`.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_undersized_total_bytes() {
        let cfg = VolumeConfig {
            total_bytes: 10,
            block_size: 4,
            max_files: 2,
            max_blocks: 4,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accepts_exact_fit() {
        let cfg = VolumeConfig {
            total_bytes: 0,
            block_size: 4,
            max_files: 2,
            max_blocks: 4,
        };
        let required = cfg.required_bytes() as u32;
        let cfg = VolumeConfig {
            total_bytes: required,
            ..cfg
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn default_server_config_roundtrips_toml() {
        let cfg = ServerConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let back: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(cfg, back);
    }
}
