mod commands;

use std::env;
use std::io::{self, IsTerminal};
use std::process::ExitCode;

use inliner_driver::InlinerError;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(InlinerError::Diagnostics) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Logging stays off unless `INLINER_LOG` holds a filter.
fn init_tracing() {
    if let Ok(filter) = EnvFilter::try_from_env("INLINER_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .without_time()
            .compact()
            .init();
    }
}

async fn run() -> Result<(), InlinerError> {
    let use_color = io::stderr().is_terminal();
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };
    let rest: Vec<String> = args.collect();
    debug!(command = %command, args = rest.len(), "dispatch");

    match command.as_str() {
        "-h" | "--help" | "help" => {
            print_help();
            Ok(())
        }
        "-V" | "--version" | "version" => {
            println!("inliner {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "inline" => commands::cmd_inline(&rest, use_color).await,
        "fold" => commands::cmd_fold(&rest, use_color).await,
        "comprehension" => commands::cmd_comprehension(&rest, use_color).await,
        "resolve" => commands::cmd_resolve(&rest, use_color).await,
        other => Err(InlinerError::InvalidCommand(format!(
            "unknown command `{other}` (see `inliner --help`)"
        ))),
    }
}

fn print_help() {
    println!(
        "inliner {}\n\nUSAGE:\n  inliner <COMMAND>\n\nCOMMANDS:\n  inline <file> <line:col> [--root <dir>] [--write]\n  fold <file> <line:col> [--write]\n  comprehension <file> <line:col> [--write]\n  resolve <file> <name> [--root <dir>]\n\nOPTIONS:\n  --config <path>\n  -h, --help\n  -V, --version\n\nSet INLINER_LOG (e.g. INLINER_LOG=debug) to log resolver steps to stderr.",
        env!("CARGO_PKG_VERSION")
    );
}
