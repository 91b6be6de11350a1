//! `fsv2-server` — the TCP front-end binary (§6.3).

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use argh::FromArgs;
use log::info;

use fsv2::config::{FileConfig, ServerConfig, VolumeConfig};
use fsv2::front::Server;
use fsv2::VolumeManager;

/// fsv2 line-oriented TCP server
#[derive(FromArgs)]
struct Args {
    /// path to the backing volume image
    #[argh(option)]
    image: PathBuf,

    /// optional TOML file supplying volume/server parameters
    #[argh(option)]
    config: Option<PathBuf>,

    /// total size of the backing file, in bytes
    #[argh(option, default = "1 << 20")]
    total_bytes: u32,

    /// payload bytes per data block
    #[argh(option, default = "512")]
    block_size: u32,

    /// capacity of the inode table
    #[argh(option, default = "64")]
    max_files: u32,

    /// number of data blocks
    #[argh(option, default = "2048")]
    max_blocks: u32,

    /// address to bind the TCP listener on
    #[argh(option)]
    bind: Option<String>,

    /// scan for and reclaim unreferenced block chains on open (§9)
    #[argh(switch)]
    scrub_on_open: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: Args = argh::from_env();

    let file_cfg = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let volume_cfg = file_cfg.volume.unwrap_or(VolumeConfig {
        total_bytes: args.total_bytes,
        block_size: args.block_size,
        max_files: args.max_files,
        max_blocks: args.max_blocks,
    });

    let mut server_cfg = file_cfg.server.unwrap_or_default();
    if let Some(bind) = args.bind {
        server_cfg.bind_addr = bind;
    }

    type OpenFn = fn(&std::path::Path, u32, u32, u32, u32) -> fsv2::Result<VolumeManager>;
    let open: OpenFn = if args.scrub_on_open {
        VolumeManager::open_with_scrub
    } else {
        VolumeManager::open
    };
    let volume = Arc::new(open(
        &args.image,
        volume_cfg.total_bytes,
        volume_cfg.block_size,
        volume_cfg.max_files,
        volume_cfg.max_blocks,
    )?);

    info!(
        "opened {} ({} live files, {} free blocks)",
        args.image.display(),
        volume.stats().live_files,
        volume.stats().free_blocks
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_for_handler = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("received interrupt, shutting down");
        shutdown_for_handler.store(true, std::sync::atomic::Ordering::SeqCst);
    })?;

    let server = Server::new(server_cfg, volume);
    server.run(&shutdown)
}
