//! The line-oriented TCP front-end (§6.3). An interface-constrained
//! collaborator, not a core engineering subject: this module exists so the
//! volume manager can be exercised end-to-end over a socket, and follows
//! the teacher's own mix of `log` for status and plain `std::net` for I/O
//! rather than pulling in an async runtime the core doesn't need.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::config::ServerConfig;
use crate::front::pool::WorkerPool;
use crate::front::protocol::{self, Command};
use crate::manager::VolumeManager;

/// Listens on `cfg.bind_addr` and dispatches accepted connections to a
/// bounded worker pool, each running the volume manager behind `volume`.
pub struct Server {
    cfg: ServerConfig,
    volume: Arc<VolumeManager>,
}

impl Server {
    pub fn new(cfg: ServerConfig, volume: Arc<VolumeManager>) -> Self {
        Self { cfg, volume }
    }

    /// Runs the accept loop until `shutdown` is set. Returns once the
    /// listener has stopped accepting and all in-flight connections have
    /// been handed to the pool (not necessarily finished — dropping the
    /// returned `Server` waits for those via `WorkerPool`'s `Drop`).
    pub fn run(&self, shutdown: &Arc<AtomicBool>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.cfg.bind_addr)?;
        listener.set_nonblocking(true)?;
        info!("fsv2-server listening on {}", self.cfg.bind_addr);

        let pool = WorkerPool::new(self.cfg.workers, self.cfg.max_connections);
        let active = Arc::new(AtomicUsize::new(0));

        while !shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, addr)) => {
                    if active.load(Ordering::SeqCst) >= self.cfg.max_connections {
                        warn!("rejecting {addr}: server busy");
                        let _ = writeln!(&stream, "ERROR server busy, try again later");
                        continue;
                    }
                    active.fetch_add(1, Ordering::SeqCst);
                    let volume = Arc::clone(&self.volume);
                    let cfg = self.cfg.clone();
                    let active = Arc::clone(&active);
                    pool.submit(move || {
                        if let Err(e) = handle_connection(stream, &cfg, &volume) {
                            warn!("connection error: {e}");
                        }
                        active.fetch_sub(1, Ordering::SeqCst);
                    });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(20));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn handle_connection(
    stream: TcpStream,
    cfg: &ServerConfig,
    volume: &VolumeManager,
) -> anyhow::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(cfg.read_timeout_secs)))?;
    let peer = stream.peer_addr().ok();
    let mut writer = stream.try_clone()?;
    writeln!(writer, "OK fsv2 ready")?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let mut commands = 0usize;

    loop {
        if commands >= cfg.max_commands_per_conn {
            writeln!(writer, "ERROR too many commands, closing")?;
            break;
        }
        line.clear();
        let n = match reader.read_line(&mut line) {
            Ok(n) => n,
            Err(e) => {
                warn!("read error from {peer:?}: {e}");
                break;
            }
        };
        if n == 0 {
            break; // client closed
        }
        if line.len() > cfg.max_line_len {
            writeln!(writer, "ERROR line too long")?;
            break;
        }
        commands += 1;

        match protocol::parse_command(&line) {
            Ok(Command::Quit) => {
                writeln!(writer, "OK bye")?;
                break;
            }
            Ok(cmd) => {
                let response = execute(cmd, volume, cfg.max_payload_len);
                writeln!(writer, "{response}")?;
            }
            Err(e) => {
                writeln!(writer, "ERROR {e}")?;
            }
        }
    }
    Ok(())
}

fn execute(cmd: Command, volume: &VolumeManager, max_payload_len: usize) -> String {
    match cmd {
        Command::Create { name } => match volume.create_file(&name) {
            Ok(()) => "OK".to_string(),
            Err(e) => format!("ERROR {e}"),
        },
        Command::Write { name, payload } => {
            if payload.len() > max_payload_len {
                return format!("ERROR payload exceeds maximum of {max_payload_len} bytes");
            }
            match volume.write_file(&name, &payload) {
                Ok(()) => "OK".to_string(),
                Err(e) => format!("ERROR {e}"),
            }
        }
        Command::Read { name } => match volume.read_file(&name) {
            Ok(bytes) => format!("OK {}", protocol::encode_hex(&bytes)),
            Err(e) => format!("ERROR {e}"),
        },
        Command::Delete { name } => match volume.delete_file(&name) {
            Ok(()) => "OK".to_string(),
            Err(e) => format!("ERROR {e}"),
        },
        Command::List => format!("OK {}", volume.list_files().join(",")),
        Command::Help => format!("OK {}", protocol::usage()),
        Command::Quit => unreachable!("handled before dispatch"),
    }
}
