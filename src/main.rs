use clap::{Parser, Subcommand};
use filmrent::bootstrap::build_router;
use filmrent::config::EngineArgs;
use filmrent::interfaces::tcp::{serve, serve_lines, shutdown_signal};
use filmrent::telemetry::init_tracing;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::BufReader;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the rental desk protocol over TCP.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "FILMRENT_BIND", default_value = "127.0.0.1:5000")]
        bind: String,
    },
    /// Run request lines from a file and print the replies to stdout.
    Replay {
        /// File with one request per line.
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let router = build_router(&cli.engine).await.into_diagnostic()?;

    match cli.command {
        Command::Serve { bind } => {
            let listener = TcpListener::bind(&bind).await.into_diagnostic()?;
            serve(listener, Arc::new(router), shutdown_signal())
                .await
                .into_diagnostic()?;
        }
        Command::Replay { input } => {
            let file = File::open(input).await.into_diagnostic()?;
            serve_lines(BufReader::new(file), tokio::io::stdout(), &router)
                .await
                .into_diagnostic()?;
        }
    }

    Ok(())
}
