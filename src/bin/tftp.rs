use clap::{Parser, ValueEnum};
use ltftp::client::{self, Command, HELP};
use ltftp::{Session, TransferConfig, TransferError, TransferStats};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UdpSocket;

const TAG: &str = "tftp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Operation {
    Put,
    Get,
}

/// Little TFTP client.
///
/// Without `-c` an interactive prompt accepts `put <file>`, `get <file>`, `help` and `exit`.
#[derive(Debug, Parser)]
#[command(name = "tftp", version)]
struct Cli {
    /// IPv4 address of the server
    addr: Ipv4Addr,

    /// UDP port of the server
    port: u16,

    /// Run a single operation and exit
    #[arg(short = 'c', num_args = 2, value_names = ["put|get", "FILE"])]
    command: Option<Vec<String>>,

    /// Milliseconds to wait for a reply before retransmitting
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Give up after this many retransmissions (retries forever by default)
    #[arg(long)]
    max_retransmits: Option<u32>,
}

fn report(result: &Result<TransferStats, TransferError>) {
    match result {
        Ok(stats) => log::info!("[{TAG}] Status: success ({} blocks, {} bytes)", stats.blocks, stats.bytes),
        Err(e) => log::error!("[{TAG}] Status: failure ({e})"),
    }
}

async fn run_operation(
    session: &mut Session<'_>,
    operation: Operation,
    path: &str,
) -> Result<TransferStats, TransferError> {
    match operation {
        Operation::Put => client::put_file(session, Path::new(path), path).await,
        Operation::Get => client::get_file(session, path, Path::new(path)).await,
    }
}

async fn interactive(session: &mut Session<'_>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while session.is_alive() {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let result = match Command::parse(&line) {
            Command::Exit => break,
            Command::Help => {
                stdout.write_all(HELP.as_bytes()).await?;
                continue;
            }
            Command::Put(path) => run_operation(session, Operation::Put, &path).await,
            Command::Get(path) => run_operation(session, Operation::Get, &path).await,
        };
        report(&result);
    }

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let server = SocketAddr::from((cli.addr, cli.port));
    let sock = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    log::info!("[{TAG}] Socket allocated");

    let config = TransferConfig::default()
        .with_timeout(Duration::from_millis(cli.timeout_ms))
        .with_max_retransmits(cli.max_retransmits);
    let mut session = Session::new(&sock, server, TAG, config);

    match cli.command {
        Some(command) => {
            let operation = Operation::from_str(&command[0], true).map_err(anyhow::Error::msg)?;
            // A failed transfer is reported, it does not change the exit status.
            let result = run_operation(&mut session, operation, &command[1]).await;
            report(&result);
            Ok(())
        }
        None => interactive(&mut session).await,
    }
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

    log::info!("[{TAG}] Little TFTP client - ver. {}", env!("CARGO_PKG_VERSION"));
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("[{TAG}] {e:#}");
            ExitCode::FAILURE
        }
    }
}
