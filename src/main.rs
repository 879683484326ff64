//! Entry point: a `serve` subcommand that runs one mesh node, and a `run`
//! subcommand that acts as a client firing a single plan at an ephemeral
//! local node. Mirrors `original_source/cmd/server/main.go` and
//! `cmd/client/main.go`'s split, folded into one clap CLI per spec §6.

use callmesh::{client, server, telemetry};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "callmesh")]
#[command(about = "Distributed service-call simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs one mesh node, serving every path and method on `--listen`.
    Serve {
        /// Address to listen on. Falls back to `LISTEN_ADDRESS`, then `:8080`.
        #[arg(long)]
        listen: Option<String>,

        /// Accepted for interface parity with the original CLI; this
        /// engine has no profiling hook of its own (spec §1's
        /// out-of-scope list).
        #[arg(long)]
        profile: Option<String>,
    },
    /// Loads a plan and fires it at an ephemeral local node, blocking
    /// until every request the plan caused has drained.
    Run {
        /// Path to a plan file (YAML or JSON), or `-` for stdin.
        plan_file: String,

        /// Local port to bind for this run; 0 picks an ephemeral port.
        #[arg(long, default_value_t = 0)]
        port: u16,

        #[arg(long)]
        profile: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen, profile: _ } => {
            let addr = listen
                .or_else(|| std::env::var("LISTEN_ADDRESS").ok())
                .unwrap_or_else(|| ":8080".to_string());
            let addr = normalize_listen_addr(&addr);
            server::serve(&addr).await?;
        }
        Commands::Run { plan_file, port, profile: _ } => {
            client::run(&plan_file, port).await?;
        }
    }

    Ok(())
}

/// `:8080`-style addresses (no host) are a Go-ism; bind them on all
/// interfaces the way `net.Listen("tcp", addr)` would.
fn normalize_listen_addr(addr: &str) -> String {
    if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_port_addresses() {
        assert_eq!(normalize_listen_addr(":8080"), "0.0.0.0:8080");
        assert_eq!(normalize_listen_addr("127.0.0.1:9000"), "127.0.0.1:9000");
    }
}
