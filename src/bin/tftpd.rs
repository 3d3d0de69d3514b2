use anyhow::Context;
use clap::Parser;
use ltftp::srv_conn;
use ltftp::{Session, TransferConfig};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::net::UdpSocket;

const TAG: &str = "lsrv";

/// Little TFTP server. Serves one transfer at a time from a single socket.
#[derive(Debug, Parser)]
#[command(name = "tftpd", version)]
struct Cli {
    /// IPv4 address to listen on
    addr: Ipv4Addr,

    /// UDP port to listen on
    port: u16,

    /// Directory that request paths are resolved against (defaults to the working directory)
    root: Option<PathBuf>,

    /// Milliseconds to wait for a reply before retransmitting
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Give up on a client after this many retransmissions (retries forever by default)
    #[arg(long)]
    max_retransmits: Option<u32>,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let root = match cli.root {
        Some(root) => {
            let root = root
                .canonicalize()
                .with_context(|| format!("failed to change root to {}", root.display()))?;
            anyhow::ensure!(root.is_dir(), "{} is not a directory", root.display());
            log::info!("[{TAG}] Root changed to {}", root.display());
            root
        }
        None => PathBuf::from("."),
    };

    let bind = SocketAddr::from((cli.addr, cli.port));
    let sock = UdpSocket::bind(bind)
        .await
        .with_context(|| format!("failed to bind socket to {bind}"))?;
    log::info!("[{TAG}] Listening on {}", sock.local_addr()?);

    let config = TransferConfig::default()
        .with_timeout(Duration::from_millis(cli.timeout_ms))
        .with_max_retransmits(cli.max_retransmits);
    let mut session = Session::new(&sock, SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)), TAG, config);

    srv_conn::serve(&mut session, &root).await;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    log::info!("[{TAG}] Little TFTP server - ver. {}", env!("CARGO_PKG_VERSION"));
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("[{TAG}] {e:#}");
            ExitCode::FAILURE
        }
    }
}
