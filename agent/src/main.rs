mod handler;
mod io;
mod protocol;

use tracing::info;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the log filter; `RUST_LOG` is the fallback.
const LOG_ENV: &str = "FSBRIDGE_LOG";

const USAGE: &str = "\
Usage: fsbridge-agent --stdio

Serves storage.run, storage.metadata and health.check as JSON-RPC 2.0,
one request per stdin line. Logs go to stderr, filtered by FSBRIDGE_LOG
(falls back to RUST_LOG, then info).

Options:
  --stdio     Serve requests over stdin/stdout
  --version   Print version and exit
  --help      Print this help message";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Serve,
    Version,
    Help,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    match args.get(1).map(String::as_str) {
        Some("--stdio") => Ok(Command::Serve),
        Some("--version") => Ok(Command::Version),
        Some("--help") => Ok(Command::Help),
        Some(other) => Err(format!("Unknown option: {other}")),
        None => Err("Missing mode".to_string()),
    }
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match parse_args(&args) {
        Ok(Command::Version) => {
            println!("fsbridge-agent {VERSION}");
            Ok(())
        }
        Ok(Command::Help) => {
            println!("{USAGE}");
            Ok(())
        }
        Ok(Command::Serve) => {
            tracing_subscriber::fmt()
                .with_env_filter(log_filter())
                .with_writer(std::io::stderr)
                .init();

            info!("fsbridge-agent {VERSION} serving on stdio");
            io::stdio::run_stdio_loop().await
        }
        Err(message) => {
            eprintln!("{message}");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }
}
