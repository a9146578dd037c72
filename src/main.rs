use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;

use kiosk_http_server::{Address, ServerConfig, ServerManager, DEFAULT_PORT};

/// Serve a kiosk UI directory on the local network until Ctrl-C.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Directory holding index.html and assets/
    #[arg(long, default_value = "ui/web")]
    root: PathBuf,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Consecutive ports to try when the first one is taken
    #[arg(long, default_value_t = 1)]
    port_attempts: u16,

    #[arg(long, default_value = "info")]
    log_level: log::Level,
}

fn start_with_retries(manager: &ServerManager, args: &Args) -> Result<Address> {
    let attempts = args.port_attempts.max(1);
    let mut port = args.port;
    let mut attempt = 1;
    loop {
        let config = ServerConfig::new(&args.root)
            .with_port(port)
            .with_bind_address(args.bind);
        match manager.start(config) {
            Err(e) if e.is_port_conflict() && attempt < attempts => {
                let Some(next) = next_port(port) else {
                    return Err(e).context("no ports left above the requested one");
                };
                port = next;
                attempt += 1;
                warn!("{}; trying port {}", e, port);
            }
            result => return result.with_context(|| format!("starting server for {}", args.root.display())),
        }
    }
}

/// The next port to try; `None` past 65535 instead of wrapping to the ephemeral port 0.
fn next_port(port: u16) -> Option<u16> {
    port.checked_add(1)
}

fn main() -> Result<()> {
    let args = Args::parse();
    simple_logger::init_with_level(args.log_level)?;

    let manager = ServerManager::new();
    let address = start_with_retries(&manager, &args)?;
    println!("Serving {} at http://{}", args.root.display(), address);

    let signals = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    signals.block_on(tokio::signal::ctrl_c())?;

    manager.stop()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn port_retries_stop_at_the_top() {
        assert_eq!(next_port(8000), Some(8001));
        assert_eq!(next_port(u16::MAX), None);
    }
}
