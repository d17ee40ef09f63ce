//! MCP server for Google Cloud Firestore.
//!
//! Run with `firestore-mcp` inside a Firebase project directory, or with
//! `GOOGLE_CLOUD_PROJECT` set. `FIRESTORE_EMULATOR_HOST` targets a local emulator.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use firestore_mcp::{bootstrap, ProjectResolver, Settings, DEFAULT_DATABASE_ID};

/// MCP server for Google Cloud Firestore.
///
/// Exposes Firestore document operations as MCP tools for AI agents.
/// Communicates via JSON-RPC 2.0 over stdin/stdout.
#[derive(Parser, Debug)]
#[command(name = "firestore-mcp")]
#[command(version, about, long_about = None)]
struct Args {
    /// Firestore database id within the project.
    #[arg(long, value_name = "ID", default_value = DEFAULT_DATABASE_ID)]
    database: String,

    /// Serve from an in-process store instead of Firestore.
    /// Data is not persisted.
    #[arg(long)]
    in_memory: bool,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn log_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Logs go to stderr; stdout carries the protocol.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Any panic leaves the server in an unknown state; stop the process.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!(panic = %panic_info, "unrecoverable error");
        default_hook(panic_info);
        std::process::exit(1);
    }));
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_tracing(log_level(args.verbose, args.quiet));
    install_panic_hook();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Failed to create Tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let settings = Settings::from_env()
        .with_database(args.database)
        .with_in_memory(args.in_memory);

    runtime.block_on(async {
        let resolver = ProjectResolver::from_process();
        let server = match bootstrap(&settings, &resolver).await {
            Ok(server) => server,
            Err(e) => {
                error!(error = %e, "startup failed");
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        };

        info!(
            version = env!("CARGO_PKG_VERSION"),
            project_id = %server.session().project_id(),
            "firestore-mcp ready, waiting for client"
        );

        let result = tokio::select! {
            result = server.run() => result,
            _ = shutdown_signal() => {
                info!("shutdown signal received");
                Ok(())
            }
        };

        match result {
            Ok(()) => {
                info!("server shut down");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "server error");
                eprintln!("Error: Server error: {}", e);
                ExitCode::FAILURE
            }
        }
    })
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
