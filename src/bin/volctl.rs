//! `fsv2ctl` — a direct, in-process CLI for a volume image, bypassing the
//! TCP front-end entirely. Not part of the core spec (§6.2 only commits to
//! the five manager operations); this is the supplemental "operator can
//! poke at a volume from a shell" convenience noted in SPEC_FULL.md.

use std::io::{Read, Write};
use std::path::PathBuf;

use argh::FromArgs;

use fsv2::VolumeManager;

/// fsv2 volume utility
#[derive(FromArgs)]
struct Args {
    /// path to the backing volume image
    #[argh(option)]
    image: PathBuf,

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

    #[argh(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCommand {
    Create(CreateArgs),
    Write(WriteArgs),
    Read(ReadArgs),
    Delete(DeleteArgs),
    List(ListArgs),
    Stat(StatArgs),
}

/// create an empty file
#[derive(FromArgs)]
#[argh(subcommand, name = "create")]
struct CreateArgs {
    #[argh(positional)]
    name: String,
}

/// write bytes to a file, replacing its contents
#[derive(FromArgs)]
#[argh(subcommand, name = "write")]
struct WriteArgs {
    #[argh(positional)]
    name: String,
    /// local file to read the payload from; reads stdin if omitted
    #[argh(option)]
    file: Option<PathBuf>,
}

/// read a file's contents
#[derive(FromArgs)]
#[argh(subcommand, name = "read")]
struct ReadArgs {
    #[argh(positional)]
    name: String,
    /// local file to write the payload to; writes stdout if omitted
    #[argh(option)]
    out: Option<PathBuf>,
}

/// delete a file
#[derive(FromArgs)]
#[argh(subcommand, name = "delete")]
struct DeleteArgs {
    #[argh(positional)]
    name: String,
}

/// list all files
#[derive(FromArgs)]
#[argh(subcommand, name = "list")]
struct ListArgs {}

/// print allocation stats
#[derive(FromArgs)]
#[argh(subcommand, name = "stat")]
struct StatArgs {}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: Args = argh::from_env();

    let volume = VolumeManager::open(
        &args.image,
        args.total_bytes,
        args.block_size,
        args.max_files,
        args.max_blocks,
    )?;

    match args.command {
        SubCommand::Create(a) => {
            volume.create_file(&a.name)?;
            println!("OK");
        }
        SubCommand::Write(a) => {
            let mut bytes = Vec::new();
            match &a.file {
                Some(path) => {
                    std::fs::File::open(path)?.read_to_end(&mut bytes)?;
                }
                None => {
                    std::io::stdin().read_to_end(&mut bytes)?;
                }
            }
            volume.write_file(&a.name, &bytes)?;
            println!("OK");
        }
        SubCommand::Read(a) => {
            let bytes = volume.read_file(&a.name)?;
            match &a.out {
                Some(path) => {
                    std::fs::File::create(path)?.write_all(&bytes)?;
                }
                None => {
                    std::io::stdout().write_all(&bytes)?;
                }
            }
        }
        SubCommand::Delete(a) => {
            volume.delete_file(&a.name)?;
            println!("OK");
        }
        SubCommand::List(_) => {
            println!("{}", volume.list_files().join(","));
        }
        SubCommand::Stat(_) => {
            let s = volume.stats();
            println!(
                "files {}/{}  blocks free {}/{}",
                s.live_files, s.max_files, s.free_blocks, s.max_blocks
            );
        }
    }
    Ok(())
}
